//! Boolean simplification over expression trees.
//!
//! Applied bottom-up to every filter condition and join predicate:
//! double-negation removal, comparison inversion under NOT, n-ary
//! De Morgan over flattened OR chains (binary over AND), truth-literal
//! absorption, duplicate elimination by node identity, and AND-chain
//! re-association into right-leaning form.

use harrier_error::Result;
use harrier_plan::expr::{
    self, comparison_op, flatten_and_chain, flatten_or_chain, is_false_literal, is_true_literal,
    rebuild_and_chain,
};
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::map_expr_attr;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct BooleanSimplification;

impl OptimizerStrategy for BooleanSimplification {
    fn name(&self) -> &'static str {
        "boolean_simplification"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        match node.node_type() {
            NodeType::Filter => {
                map_expr_attr(&mut node, "condition", |expr| Ok(simplify(expr, context)))?;
            }
            NodeType::Join => {
                map_expr_attr(&mut node, "on", |expr| Ok(simplify(expr, context)))?;
            }
            _ => {}
        }
        Ok(node)
    }
}

/// Recursively simplify an expression tree, children first.
fn simplify(mut expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    for name in ["left", "right", "input"] {
        if let Some(AttrValue::Node(child)) = expr.take_attr(name) {
            expr.set_attr(
                name,
                Some(AttrValue::Node(Box::new(simplify(*child, context)))),
            );
        }
    }

    match expr.node_type() {
        NodeType::Not => simplify_not(expr, context),
        NodeType::And => simplify_and(expr, context),
        NodeType::Or => simplify_or(expr, context),
        _ => expr,
    }
}

fn simplify_not(mut expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let Some(AttrValue::Node(inner)) = expr.take_attr("input") else {
        return expr;
    };
    let inner = *inner;

    match inner.node_type() {
        // NOT(NOT x) -> x
        NodeType::Not => {
            if let Some(grandchild) = inner.node_attr("input") {
                context.stats.increment("boolean_not_not_removed");
                return grandchild.deep_copy();
            }
            expr.set_attr("input", Some(AttrValue::Node(Box::new(inner))));
            expr
        }
        // NOT(x op y) -> x op' y for the six order comparisons.
        NodeType::Comparison => {
            if let Some(op) = comparison_op(&inner) {
                if op.is_ordering() {
                    context.stats.increment("boolean_comparison_inverted");
                    let mut inverted = inner;
                    inverted.set_attr(
                        "op",
                        Some(AttrValue::Text(op.inverse().as_str().to_owned())),
                    );
                    return inverted;
                }
            }
            expr.set_attr("input", Some(AttrValue::Node(Box::new(inner))));
            expr
        }
        // NOT(a OR b OR ...) -> NOT a AND NOT b AND ... (n-ary).
        NodeType::Or => {
            context.stats.increment("boolean_demorgan_or");
            let negated: Vec<PlanNode> = flatten_or_chain(&inner)
                .into_iter()
                .map(|leaf| simplify(expr::not(leaf.deep_copy()), context))
                .collect();
            rebuild_and_chain(negated)
        }
        // NOT(a AND b) -> NOT a OR NOT b (binary).
        NodeType::And => {
            context.stats.increment("boolean_demorgan_and");
            let left = inner.node_attr("left").map(PlanNode::deep_copy);
            let right = inner.node_attr("right").map(PlanNode::deep_copy);
            match (left, right) {
                (Some(left), Some(right)) => expr::or(
                    simplify(expr::not(left), context),
                    simplify(expr::not(right), context),
                ),
                _ => {
                    expr.set_attr("input", Some(AttrValue::Node(Box::new(inner))));
                    expr
                }
            }
        }
        // NOT TRUE -> FALSE, NOT FALSE -> TRUE.
        NodeType::Literal => {
            if is_true_literal(&inner) {
                context.stats.increment("boolean_literal_negated");
                return expr::false_literal();
            }
            if is_false_literal(&inner) {
                context.stats.increment("boolean_literal_negated");
                return expr::true_literal();
            }
            expr.set_attr("input", Some(AttrValue::Node(Box::new(inner))));
            expr
        }
        _ => {
            expr.set_attr("input", Some(AttrValue::Node(Box::new(inner))));
            expr
        }
    }
}

fn simplify_and(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let (Some(left), Some(right)) = (expr.node_attr("left"), expr.node_attr("right")) else {
        return expr;
    };

    if is_false_literal(left) || is_false_literal(right) {
        context.stats.increment("boolean_and_false_short_circuit");
        return expr::false_literal();
    }
    if is_true_literal(left) {
        context.stats.increment("boolean_and_true_eliminated");
        return right.deep_copy();
    }
    if is_true_literal(right) {
        context.stats.increment("boolean_and_true_eliminated");
        return left.deep_copy();
    }
    if left.same_node(right) {
        context.stats.increment("boolean_duplicate_conjunct_removed");
        return left.deep_copy();
    }
    // Re-associate a left-leaning chain into right-leaning form.
    if left.node_type() == NodeType::And {
        context.stats.increment("boolean_and_reassociated");
        let conjuncts: Vec<PlanNode> = flatten_and_chain(&expr)
            .into_iter()
            .map(PlanNode::deep_copy)
            .collect();
        return rebuild_and_chain(conjuncts);
    }
    expr
}

fn simplify_or(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let (Some(left), Some(right)) = (expr.node_attr("left"), expr.node_attr("right")) else {
        return expr;
    };

    if is_true_literal(left) || is_true_literal(right) {
        context.stats.increment("boolean_or_true_short_circuit");
        return expr::true_literal();
    }
    if is_false_literal(left) {
        context.stats.increment("boolean_or_false_eliminated");
        return right.deep_copy();
    }
    if is_false_literal(right) {
        context.stats.increment("boolean_or_false_eliminated");
        return left.deep_copy();
    }
    if left.same_node(right) {
        context.stats.increment("boolean_duplicate_disjunct_removed");
        return left.deep_copy();
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_strategy;
    use harrier_plan::expr::{and, comparison, identifier, literal, not, or};
    use harrier_plan::{ColumnRef, CompareOp};
    use harrier_types::ScalarValue;

    fn col(name: &str) -> PlanNode {
        identifier(ColumnRef::new("t", name))
    }

    fn int(v: i64) -> PlanNode {
        literal(ScalarValue::Int64(v))
    }

    fn filter(condition: PlanNode) -> PlanNode {
        PlanNode::new(NodeType::Filter)
            .with_child("input", PlanNode::new(NodeType::Scan))
            .with_child("condition", condition)
    }

    fn optimize_condition(condition: PlanNode) -> (PlanNode, OptimizeContext) {
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&BooleanSimplification, filter(condition), &mut context).unwrap();
        (plan.node_attr("condition").unwrap().deep_copy(), context)
    }

    #[test]
    fn double_negation_unwraps() {
        let inner = comparison(CompareOp::Eq, col("a"), int(1));
        let inner_id = inner.id();
        let (result, context) = optimize_condition(not(not(inner)));
        assert_eq!(result.id(), inner_id);
        assert_eq!(context.stats.get("boolean_not_not_removed"), 1);
    }

    #[test]
    fn not_comparison_inverts_operator() {
        let (result, context) = optimize_condition(not(comparison(CompareOp::Lt, col("a"), int(5))));
        assert_eq!(result.node_type(), NodeType::Comparison);
        assert_eq!(result.text_attr("op"), Some("GtEq"));
        assert_eq!(context.stats.get("boolean_comparison_inverted"), 1);
    }

    #[test]
    fn nary_demorgan_over_or_chain() {
        // NOT(a=1 OR a=2 OR a=3) -> a!=1 AND a!=2 AND a!=3
        let chain = or(
            comparison(CompareOp::Eq, col("a"), int(1)),
            or(
                comparison(CompareOp::Eq, col("a"), int(2)),
                comparison(CompareOp::Eq, col("a"), int(3)),
            ),
        );
        let (result, context) = optimize_condition(not(chain));

        let conjuncts = flatten_and_chain(&result);
        assert_eq!(conjuncts.len(), 3);
        for (idx, conjunct) in conjuncts.iter().enumerate() {
            assert_eq!(conjunct.node_type(), NodeType::Comparison);
            assert_eq!(conjunct.text_attr("op"), Some("NotEq"));
            assert_eq!(
                conjunct.node_attr("right").unwrap().scalar_attr("value"),
                Some(&ScalarValue::Int64(idx as i64 + 1))
            );
        }
        assert_eq!(context.stats.get("boolean_demorgan_or"), 1);
        assert_eq!(context.stats.get("boolean_comparison_inverted"), 3);
    }

    #[test]
    fn binary_demorgan_over_and() {
        let (result, context) = optimize_condition(not(and(
            comparison(CompareOp::Eq, col("a"), int(1)),
            comparison(CompareOp::Eq, col("b"), int(2)),
        )));
        assert_eq!(result.node_type(), NodeType::Or);
        assert_eq!(
            result.node_attr("left").unwrap().text_attr("op"),
            Some("NotEq")
        );
        assert_eq!(context.stats.get("boolean_demorgan_and"), 1);
    }

    #[test]
    fn truth_literal_absorption() {
        let keep = comparison(CompareOp::Eq, col("a"), int(1));
        let keep_id = keep.id();
        let (result, _) = optimize_condition(and(keep, expr::true_literal()));
        assert_eq!(result.id(), keep_id);

        let (result, _) = optimize_condition(and(
            comparison(CompareOp::Eq, col("a"), int(1)),
            expr::false_literal(),
        ));
        assert!(is_false_literal(&result));

        let (result, _) = optimize_condition(or(
            comparison(CompareOp::Eq, col("a"), int(1)),
            expr::true_literal(),
        ));
        assert!(is_true_literal(&result));

        let keep = comparison(CompareOp::Eq, col("a"), int(1));
        let keep_id = keep.id();
        let (result, _) = optimize_condition(or(expr::false_literal(), keep));
        assert_eq!(result.id(), keep_id);
    }

    #[test]
    fn duplicate_by_identity_collapses() {
        let shared = comparison(CompareOp::Eq, col("a"), int(1));
        let (result, context) = optimize_condition(and(shared.deep_copy(), shared));
        assert_eq!(result.node_type(), NodeType::Comparison);
        assert_eq!(context.stats.get("boolean_duplicate_conjunct_removed"), 1);
    }

    #[test]
    fn structurally_equal_but_distinct_nodes_stay() {
        // Same shape, different identity: not collapsed.
        let left = comparison(CompareOp::Eq, col("a"), int(1));
        let right = comparison(CompareOp::Eq, col("a"), int(1));
        let (result, _) = optimize_condition(and(left, right));
        assert_eq!(result.node_type(), NodeType::And);
    }

    #[test]
    fn left_leaning_and_rebuilds_right_leaning() {
        let a = comparison(CompareOp::Eq, col("a"), int(1));
        let b = comparison(CompareOp::Eq, col("b"), int(2));
        let c = comparison(CompareOp::Eq, col("c"), int(3));
        let ids = [a.id(), b.id(), c.id()];

        let (result, context) = optimize_condition(and(and(a, b), c));
        assert!(context.stats.get("boolean_and_reassociated") >= 1);
        assert_eq!(result.node_attr("left").unwrap().id(), ids[0]);
        let tail = result.node_attr("right").unwrap();
        assert_eq!(tail.node_attr("left").unwrap().id(), ids[1]);
        assert_eq!(tail.node_attr("right").unwrap().id(), ids[2]);
    }

    mod properties {
        use super::*;
        use harrier_plan::expr::rebuild_or_chain;
        use proptest::prelude::*;

        proptest! {
            /// NOT over an n-ary OR of equality comparisons always
            /// yields an AND chain of the same arity, every conjunct the
            /// inverted comparison of the matching disjunct.
            #[test]
            fn nary_demorgan_is_sound(values in proptest::collection::vec(-100_i64..100, 1..12)) {
                let disjuncts: Vec<PlanNode> = values
                    .iter()
                    .map(|&v| comparison(CompareOp::Eq, col("a"), int(v)))
                    .collect();
                let (result, _) = optimize_condition(not(rebuild_or_chain(disjuncts)));

                let conjuncts = flatten_and_chain(&result);
                prop_assert_eq!(conjuncts.len(), values.len());
                for (conjunct, expected) in conjuncts.iter().zip(&values) {
                    prop_assert_eq!(conjunct.text_attr("op"), Some("NotEq"));
                    prop_assert_eq!(
                        conjunct.node_attr("right").unwrap().scalar_attr("value"),
                        Some(&ScalarValue::Int64(*expected))
                    );
                }
            }
        }
    }

    #[test]
    fn join_predicates_are_simplified_too() {
        let join = PlanNode::new(NodeType::Join)
            .with_child("left", PlanNode::new(NodeType::Scan))
            .with_child("right", PlanNode::new(NodeType::Scan))
            .with_child(
                "on",
                not(not(comparison(CompareOp::Eq, col("a"), col("b")))),
            );
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&BooleanSimplification, join, &mut context).unwrap();
        assert_eq!(
            plan.node_attr("on").unwrap().node_type(),
            NodeType::Comparison
        );
    }
}
