//! Expression-tree helpers: builders, chain flattening, and comparison
//! operator algebra.

use harrier_types::ScalarValue;

use crate::node::{AttrValue, ColumnRef, NodeType, PlanNode};

/// Comparison operators carried by `Comparison` nodes as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    NotBetween,
}

impl CompareOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "Eq",
            Self::NotEq => "NotEq",
            Self::Lt => "Lt",
            Self::LtEq => "LtEq",
            Self::Gt => "Gt",
            Self::GtEq => "GtEq",
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Like => "Like",
            Self::NotLike => "NotLike",
            Self::Between => "Between",
            Self::NotBetween => "NotBetween",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "Eq" => Self::Eq,
            "NotEq" => Self::NotEq,
            "Lt" => Self::Lt,
            "LtEq" => Self::LtEq,
            "Gt" => Self::Gt,
            "GtEq" => Self::GtEq,
            "In" => Self::In,
            "NotIn" => Self::NotIn,
            "Like" => Self::Like,
            "NotLike" => Self::NotLike,
            "Between" => Self::Between,
            "NotBetween" => Self::NotBetween,
            _ => return None,
        })
    }

    /// Logical negation: `NOT (x op y)` equals `x inverse(op) y`.
    /// Every operator in the set has an inverse.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Lt => Self::GtEq,
            Self::GtEq => Self::Lt,
            Self::Gt => Self::LtEq,
            Self::LtEq => Self::Gt,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
            Self::Like => Self::NotLike,
            Self::NotLike => Self::Like,
            Self::Between => Self::NotBetween,
            Self::NotBetween => Self::Between,
        }
    }

    /// Whether the operator is one of the six order comparisons.
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }
}

// ── Builders ───────────────────────────────────────────────────────────

/// `Literal` node carrying a typed value.
#[must_use]
pub fn literal(value: ScalarValue) -> PlanNode {
    PlanNode::new(NodeType::Literal).with_attr("value", AttrValue::Scalar(value))
}

/// Boolean literal shortcuts.
#[must_use]
pub fn true_literal() -> PlanNode {
    literal(ScalarValue::Bool(true))
}

#[must_use]
pub fn false_literal() -> PlanNode {
    literal(ScalarValue::Bool(false))
}

/// `Identifier` node referencing a schema column.
#[must_use]
pub fn identifier(column: ColumnRef) -> PlanNode {
    PlanNode::new(NodeType::Identifier).with_attr("column", AttrValue::Column(column))
}

/// `Comparison` node.
#[must_use]
pub fn comparison(op: CompareOp, left: PlanNode, right: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::Comparison)
        .with_attr("op", AttrValue::Text(op.as_str().to_owned()))
        .with_child("left", left)
        .with_child("right", right)
}

#[must_use]
pub fn and(left: PlanNode, right: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::And)
        .with_child("left", left)
        .with_child("right", right)
}

#[must_use]
pub fn or(left: PlanNode, right: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::Or)
        .with_child("left", left)
        .with_child("right", right)
}

#[must_use]
pub fn not(input: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::Not).with_child("input", input)
}

/// `FunctionCall` node.
#[must_use]
pub fn function_call(name: &str, args: Vec<PlanNode>) -> PlanNode {
    PlanNode::new(NodeType::FunctionCall)
        .with_attr("name", AttrValue::Text(name.to_owned()))
        .with_attr("args", AttrValue::Nodes(args))
}

/// `ExpressionList` node.
#[must_use]
pub fn expression_list(items: Vec<PlanNode>) -> PlanNode {
    PlanNode::new(NodeType::ExpressionList).with_attr("items", AttrValue::Nodes(items))
}

// ── Chain flattening and rebuilding ────────────────────────────────────

/// Leaf conjuncts of an AND chain, left to right. A non-AND node is its
/// own single conjunct.
#[must_use]
pub fn flatten_and_chain(node: &PlanNode) -> Vec<&PlanNode> {
    flatten_chain(node, NodeType::And)
}

/// Leaf disjuncts of an OR chain, left to right.
#[must_use]
pub fn flatten_or_chain(node: &PlanNode) -> Vec<&PlanNode> {
    flatten_chain(node, NodeType::Or)
}

fn flatten_chain(node: &PlanNode, tag: NodeType) -> Vec<&PlanNode> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.node_type() == tag {
            // Push right first so the left leaf surfaces first.
            if let Some(right) = current.node_attr("right") {
                stack.push(right);
            }
            if let Some(left) = current.node_attr("left") {
                stack.push(left);
            }
        } else {
            leaves.push(current);
        }
    }
    // The stack discipline above yields left-to-right order directly.
    leaves
}

/// Rebuild a right-leaning AND chain from conjuncts.
/// Panics on an empty list in debug builds; callers guarantee at least
/// one conjunct.
#[must_use]
pub fn rebuild_and_chain(mut conjuncts: Vec<PlanNode>) -> PlanNode {
    debug_assert!(!conjuncts.is_empty(), "cannot rebuild an empty AND chain");
    let mut chain = conjuncts.pop().unwrap_or_else(true_literal);
    while let Some(next) = conjuncts.pop() {
        chain = and(next, chain);
    }
    chain
}

/// Rebuild a right-leaning OR chain from disjuncts.
#[must_use]
pub fn rebuild_or_chain(mut disjuncts: Vec<PlanNode>) -> PlanNode {
    debug_assert!(!disjuncts.is_empty(), "cannot rebuild an empty OR chain");
    let mut chain = disjuncts.pop().unwrap_or_else(false_literal);
    while let Some(next) = disjuncts.pop() {
        chain = or(next, chain);
    }
    chain
}

// ── Recognizers ────────────────────────────────────────────────────────

#[must_use]
pub fn is_true_literal(node: &PlanNode) -> bool {
    node.node_type() == NodeType::Literal
        && matches!(node.scalar_attr("value"), Some(ScalarValue::Bool(true)))
}

#[must_use]
pub fn is_false_literal(node: &PlanNode) -> bool {
    node.node_type() == NodeType::Literal
        && matches!(node.scalar_attr("value"), Some(ScalarValue::Bool(false)))
}

/// The comparison operator of a `Comparison` node, if parseable.
#[must_use]
pub fn comparison_op(node: &PlanNode) -> Option<CompareOp> {
    if node.node_type() != NodeType::Comparison {
        return None;
    }
    CompareOp::parse(node.text_attr("op")?)
}

/// Matches `column op literal` and returns the pieces.
#[must_use]
pub fn column_op_literal(node: &PlanNode) -> Option<(&ColumnRef, CompareOp, &ScalarValue)> {
    let op = comparison_op(node)?;
    let left = node.node_attr("left")?;
    let right = node.node_attr("right")?;
    if left.node_type() != NodeType::Identifier || right.node_type() != NodeType::Literal {
        return None;
    }
    Some((left.column_attr("column")?, op, right.scalar_attr("value")?))
}

/// Every column referenced anywhere under an expression node.
#[must_use]
pub fn referenced_columns(node: &PlanNode) -> Vec<ColumnRef> {
    let mut columns = Vec::new();
    collect_columns(node, &mut columns);
    columns
}

fn collect_columns(node: &PlanNode, out: &mut Vec<ColumnRef>) {
    if node.node_type() == NodeType::Identifier {
        if let Some(column) = node.column_attr("column") {
            if !out.contains(column) {
                out.push(column.clone());
            }
        }
    }
    for name in node.child_attr_names() {
        if let Some(child) = node.node_attr(&name) {
            collect_columns(child, out);
        } else if let Some(children) = node.nodes_attr(&name) {
            for child in children {
                collect_columns(child, out);
            }
        }
    }
}
