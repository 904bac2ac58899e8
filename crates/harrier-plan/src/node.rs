//! Plan node representation.
//!
//! A node's identity is a 128-bit value assigned at construction and
//! retained across deep copies, so equivalence checks stay stable while
//! optimizer passes clone and rebuild subtrees. Attributes form an open
//! map; setting an attribute to absent removes it, reading an unknown
//! attribute yields `None`, never an error.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use harrier_types::ScalarValue;

/// Stable node identifier. Survives [`PlanNode::deep_copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u128);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    fn mint() -> Self {
        Self(u128::from(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{:x}", self.0)
    }
}

/// Discriminated node tag covering relational and expression nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Scan,
    Filter,
    Project,
    Join,
    Aggregate,
    Distinct,
    Sort,
    Limit,
    Subquery,
    And,
    Or,
    Not,
    Comparison,
    Literal,
    Identifier,
    Nested,
    ExpressionList,
    FunctionCall,
}

impl NodeType {
    /// Stable lowercase name, used in counters and diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Filter => "filter",
            Self::Project => "project",
            Self::Join => "join",
            Self::Aggregate => "aggregate",
            Self::Distinct => "distinct",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Subquery => "subquery",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Comparison => "comparison",
            Self::Literal => "literal",
            Self::Identifier => "identifier",
            Self::Nested => "nested",
            Self::ExpressionList => "expression_list",
            Self::FunctionCall => "function_call",
        }
    }

    /// Whether this tag belongs to the expression sub-shape.
    #[must_use]
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Not
                | Self::Comparison
                | Self::Literal
                | Self::Identifier
                | Self::Nested
                | Self::ExpressionList
                | Self::FunctionCall
        )
    }
}

/// Reference to a schema column with a stable identity: two refs name
/// the same column exactly when both `source` and `name` agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub source: String,
    pub name: String,
}

impl ColumnRef {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }

    /// A ref with an anonymous source, for single-relation plans.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new("", name)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.source, self.name)
        }
    }
}

/// Attribute values: primitives plus nodes, node lists, column refs, and
/// opaque payloads for collaborator-owned data (statistics and the like).
#[derive(Clone)]
pub enum AttrValue {
    Scalar(ScalarValue),
    Text(String),
    Flag(bool),
    Column(ColumnRef),
    Node(Box<PlanNode>),
    Nodes(Vec<PlanNode>),
    Payload(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "Scalar({v})"),
            Self::Text(v) => write!(f, "Text({v:?})"),
            Self::Flag(v) => write!(f, "Flag({v})"),
            Self::Column(v) => write!(f, "Column({v})"),
            Self::Node(v) => write!(f, "Node({})", v.id()),
            Self::Nodes(v) => write!(f, "Nodes(len={})", v.len()),
            Self::Payload(_) => write!(f, "Payload(..)"),
        }
    }
}

/// A logical plan node.
#[derive(Debug, Clone)]
pub struct PlanNode {
    id: NodeId,
    node_type: NodeType,
    attrs: HashMap<String, AttrValue>,
}

impl PlanNode {
    #[must_use]
    pub fn new(node_type: NodeType) -> Self {
        Self {
            id: NodeId::mint(),
            node_type,
            attrs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Deep copy: independent children, same identifiers throughout.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Identity equality, the node comparison the optimizer uses.
    #[must_use]
    pub fn same_node(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Read an attribute. Unknown names are absent, never an error.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Write an attribute; `None` removes it.
    pub fn set_attr(&mut self, name: &str, value: Option<AttrValue>) {
        match value {
            Some(value) => {
                self.attrs.insert(name.to_owned(), value);
            }
            None => {
                self.attrs.remove(name);
            }
        }
    }

    /// Remove and return an attribute.
    pub fn take_attr(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.remove(name)
    }

    /// Builder-style attribute set.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.set_attr(name, Some(value));
        self
    }

    /// Builder-style child node attribute.
    #[must_use]
    pub fn with_child(self, name: &str, child: Self) -> Self {
        self.with_attr(name, AttrValue::Node(Box::new(child)))
    }

    // Typed accessors. Each returns `None` on absence or a type mismatch.

    #[must_use]
    pub fn node_attr(&self, name: &str) -> Option<&Self> {
        match self.attrs.get(name) {
            Some(AttrValue::Node(node)) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn nodes_attr(&self, name: &str) -> Option<&[Self]> {
        match self.attrs.get(name) {
            Some(AttrValue::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    #[must_use]
    pub fn text_attr(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn scalar_attr(&self, name: &str) -> Option<&ScalarValue> {
        match self.attrs.get(name) {
            Some(AttrValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn column_attr(&self, name: &str) -> Option<&ColumnRef> {
        match self.attrs.get(name) {
            Some(AttrValue::Column(column)) => Some(column),
            _ => None,
        }
    }

    #[must_use]
    pub fn flag_attr(&self, name: &str) -> bool {
        matches!(self.attrs.get(name), Some(AttrValue::Flag(true)))
    }

    #[must_use]
    pub fn payload_attr<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        match self.attrs.get(name) {
            Some(AttrValue::Payload(payload)) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Names of attributes that hold child nodes, in a stable order.
    #[must_use]
    pub fn child_attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .attrs
            .iter()
            .filter(|(_, value)| matches!(value, AttrValue::Node(_) | AttrValue::Nodes(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }
}
