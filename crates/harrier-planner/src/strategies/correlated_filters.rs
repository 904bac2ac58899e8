//! Correlated-filter handling.
//!
//! A correlated subquery re-evaluates per outer row, so any outer
//! predicate on a column the subquery exposes can also filter inside
//! it. The strategy copies (never moves) eligible `column op literal`
//! filters into correlated subqueries that expose the same column
//! identity; the original filter stays in place, so the rewrite is
//! equivalence-preserving by construction.

use harrier_error::Result;
use harrier_plan::expr::column_op_literal;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::contains_node_type;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct CorrelatedFilters;

impl OptimizerStrategy for CorrelatedFilters {
    fn name(&self) -> &'static str {
        "correlated_filters"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Subquery)
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() != NodeType::Filter {
            return Ok(node);
        }
        let Some(condition) = node.node_attr("condition") else {
            return Ok(node);
        };
        let Some((column, _op, _value)) = column_op_literal(condition) else {
            return Ok(node);
        };
        let column = column.clone();
        let condition = condition.deep_copy();

        if let Some(AttrValue::Node(input)) = node.take_attr("input") {
            let seeded = seed_subqueries(*input, &column, &condition, context);
            node.set_attr("input", Some(AttrValue::Node(Box::new(seeded))));
        }
        Ok(node)
    }
}

/// Copy the filter into every correlated subquery below that exposes
/// the column.
fn seed_subqueries(
    mut node: PlanNode,
    column: &harrier_plan::ColumnRef,
    condition: &PlanNode,
    context: &mut OptimizeContext,
) -> PlanNode {
    if node.node_type() == NodeType::Subquery
        && node.flag_attr("correlated")
        && exposes_column(&node, column)
    {
        if let Some(AttrValue::Node(input)) = node.take_attr("input") {
            context.stats.increment("correlated_filter_copied");
            let filtered = PlanNode::new(NodeType::Filter)
                .with_child("condition", condition.deep_copy())
                .with_child("input", *input);
            node.set_attr("input", Some(AttrValue::Node(Box::new(filtered))));
        }
        return node;
    }
    for name in ["input", "left", "right"] {
        if let Some(AttrValue::Node(child)) = node.take_attr(name) {
            let seeded = seed_subqueries(*child, column, condition, context);
            node.set_attr(name, Some(AttrValue::Node(Box::new(seeded))));
        }
    }
    node
}

fn exposes_column(subquery: &PlanNode, column: &harrier_plan::ColumnRef) -> bool {
    subquery.nodes_attr("exposes").is_some_and(|exposed| {
        exposed
            .iter()
            .any(|node| node.column_attr("column") == Some(column))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_strategy;
    use harrier_plan::expr::{comparison, identifier, literal};
    use harrier_plan::{ColumnRef, CompareOp};
    use harrier_types::ScalarValue;

    fn cond() -> PlanNode {
        comparison(
            CompareOp::Gt,
            identifier(ColumnRef::new("orders", "total")),
            literal(ScalarValue::Int64(100)),
        )
    }

    fn subquery(correlated: bool, exposes_total: bool) -> PlanNode {
        let mut node = PlanNode::new(NodeType::Subquery)
            .with_child("input", PlanNode::new(NodeType::Scan));
        if correlated {
            node = node.with_attr("correlated", AttrValue::Flag(true));
        }
        if exposes_total {
            node = node.with_attr(
                "exposes",
                AttrValue::Nodes(vec![identifier(ColumnRef::new("orders", "total"))]),
            );
        }
        node
    }

    fn plan_over(sub: PlanNode) -> PlanNode {
        PlanNode::new(NodeType::Filter)
            .with_child("condition", cond())
            .with_child(
                "input",
                PlanNode::new(NodeType::Join)
                    .with_child("left", PlanNode::new(NodeType::Scan))
                    .with_child("right", sub),
            )
    }

    #[test]
    fn copies_into_exposing_correlated_subqueries() {
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&CorrelatedFilters, plan_over(subquery(true, true)), &mut context)
            .unwrap();

        // Original filter still present.
        assert_eq!(plan.node_type(), NodeType::Filter);
        // Subquery input now wrapped in the copied filter.
        let sub = plan
            .node_attr("input")
            .unwrap()
            .node_attr("right")
            .unwrap();
        let inner = sub.node_attr("input").unwrap();
        assert_eq!(inner.node_type(), NodeType::Filter);
        assert_eq!(context.stats.get("correlated_filter_copied"), 1);
    }

    #[test]
    fn uncorrelated_subqueries_are_left_alone() {
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&CorrelatedFilters, plan_over(subquery(false, true)), &mut context)
            .unwrap();
        let sub = plan
            .node_attr("input")
            .unwrap()
            .node_attr("right")
            .unwrap();
        assert_eq!(sub.node_attr("input").unwrap().node_type(), NodeType::Scan);
        assert_eq!(context.stats.get("correlated_filter_copied"), 0);
    }

    #[test]
    fn non_exposing_subqueries_are_left_alone() {
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&CorrelatedFilters, plan_over(subquery(true, false)), &mut context)
            .unwrap();
        let sub = plan
            .node_attr("input")
            .unwrap()
            .node_attr("right")
            .unwrap();
        assert_eq!(sub.node_attr("input").unwrap().node_type(), NodeType::Scan);
    }
}
