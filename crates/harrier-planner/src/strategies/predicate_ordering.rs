//! Predicate ordering over stacked filters.
//!
//! After splitting, consecutive filters are reordered by estimated
//! evaluation cost: trivial comparisons first, then range predicates,
//! then function calls, then subqueries. Ties break by the referenced
//! column's cardinality estimate (more selective columns first), pulled
//! from relation statistics attached to the scans below.

use harrier_error::Result;
use harrier_plan::expr::{column_op_literal, comparison_op, referenced_columns};
use harrier_plan::{AttrValue, CompareOp, NodeType, PlanNode};

use crate::strategies::support::{any_node, column_cardinality, contains_node_type};
use crate::{OptimizeContext, OptimizerStrategy};

pub struct PredicateOrdering;

impl OptimizerStrategy for PredicateOrdering {
    fn name(&self) -> &'static str {
        "predicate_ordering"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Filter)
    }

    fn visit(&self, node: PlanNode, _context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(node)
    }

    fn complete(&self, plan: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(reorder(plan, context))
    }
}

/// Cost class of one filter condition; lower runs earlier.
fn cost_class(condition: &PlanNode) -> u8 {
    if any_node(condition, &|n| n.node_type() == NodeType::Subquery) {
        return 3;
    }
    if any_node(condition, &|n| n.node_type() == NodeType::FunctionCall) {
        return 2;
    }
    if let Some(op) = comparison_op(condition) {
        if column_op_literal(condition).is_some() && op.is_ordering() {
            return 0;
        }
        if matches!(op, CompareOp::Between | CompareOp::NotBetween) {
            return 1;
        }
    }
    1
}

fn reorder(mut node: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    // Recurse first so nested chains settle bottom-up.
    for name in ["input", "left", "right"] {
        if let Some(AttrValue::Node(child)) = node.take_attr(name) {
            node.set_attr(
                name,
                Some(AttrValue::Node(Box::new(reorder(*child, context)))),
            );
        }
    }

    if node.node_type() != NodeType::Filter {
        return node;
    }
    // Collect the maximal filter chain starting here.
    let mut conditions: Vec<PlanNode> = Vec::new();
    let mut current = node;
    loop {
        if current.node_type() != NodeType::Filter {
            break;
        }
        let condition = current
            .node_attr("condition")
            .map(PlanNode::deep_copy)
            .unwrap_or_else(harrier_plan::expr::true_literal);
        conditions.push(condition);
        let Some(AttrValue::Node(input)) = current.take_attr("input") else {
            break;
        };
        current = *input;
    }
    if conditions.len() < 2 {
        // Rebuild the single filter.
        return PlanNode::new(NodeType::Filter)
            .with_child("condition", conditions.remove(0))
            .with_child("input", current);
    }

    // Execution order is bottom-up: the innermost filter runs first.
    // Seed the sort in that order so the stable sort leaves equal-cost
    // chains untouched.
    let before_execution: Vec<_> = conditions.iter().rev().map(PlanNode::id).collect();
    let base = current;
    let mut keyed: Vec<(u8, i64, PlanNode)> = conditions
        .into_iter()
        .rev()
        .map(|condition| {
            let class = cost_class(&condition);
            let cardinality = referenced_columns(&condition)
                .first()
                .map_or(i64::MAX, |column| column_cardinality(&base, column));
            (class, cardinality, condition)
        })
        .collect();
    keyed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    if keyed.iter().map(|(_, _, c)| c.id()).collect::<Vec<_>>() != before_execution {
        context.stats.increment("predicates_reordered");
    }

    // Cheapest predicate goes deepest: it runs first over the input.
    let mut rebuilt = base;
    for (_, _, condition) in keyed.into_iter() {
        rebuilt = PlanNode::new(NodeType::Filter)
            .with_child("condition", condition)
            .with_child("input", rebuilt);
    }
    rebuilt
}
