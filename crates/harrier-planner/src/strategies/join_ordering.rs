//! Greedy join ordering: smallest build side first.
//!
//! A left-deep chain of inner equi-joins is flattened into its leaf
//! relations and conditions, the leaves are ordered by ascending record
//! count from their scan statistics, and the chain is rebuilt left-deep
//! with each condition attached at the first join where both of its
//! sides are available. Conditions that never find both sides become a
//! filter on top, so no predicate is lost.

use harrier_error::Result;
use harrier_plan::expr::referenced_columns;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::{
    columns_covered_by, contains_node_type, subtree_record_count, subtree_sources,
};
use crate::{OptimizeContext, OptimizerStrategy};

pub struct JoinOrdering;

impl OptimizerStrategy for JoinOrdering {
    fn name(&self) -> &'static str {
        "join_ordering"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Join)
    }

    fn visit(&self, node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        // Only reorder at the top of a join chain: the parent of this
        // node is not itself an inner join (the driver visits bottom-up,
        // so inner chain nodes were already seen and skipped by the
        // flatten step from the chain head).
        Ok(reorder_chain(node, context))
    }
}

fn is_inner_join(node: &PlanNode) -> bool {
    node.node_type() == NodeType::Join && node.text_attr("join_type") == Some("inner")
}

fn reorder_chain(node: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    if !is_inner_join(&node) {
        return node;
    }
    // Gather leaves and conditions of the maximal inner-join subtree.
    let mut leaves: Vec<PlanNode> = Vec::new();
    let mut conditions: Vec<PlanNode> = Vec::new();
    flatten(&node, &mut leaves, &mut conditions);
    if leaves.len() < 3 {
        return node;
    }

    let before: Vec<_> = leaves.iter().map(PlanNode::id).collect();
    leaves.sort_by_key(subtree_record_count);
    if leaves.iter().map(PlanNode::id).collect::<Vec<_>>() == before {
        return node;
    }
    context.stats.increment("join_reordered");

    // Rebuild left-deep, attaching each condition at the first join
    // where both of its sides are present.
    let mut remaining = conditions;
    let mut iter = leaves.into_iter();
    let mut built = iter.next().unwrap_or_else(|| PlanNode::new(NodeType::Scan));
    for leaf in iter {
        let mut join = PlanNode::new(NodeType::Join)
            .with_attr("join_type", AttrValue::Text("inner".to_owned()))
            .with_child("left", built)
            .with_child("right", leaf);
        let sources = subtree_sources(&join);
        if let Some(position) = remaining
            .iter()
            .position(|cond| columns_covered_by(&referenced_columns(cond), &sources))
        {
            let condition = remaining.remove(position);
            join = join.with_child("on", condition);
        }
        built = join;
    }
    // Unplaced conditions survive as filters above the chain.
    for condition in remaining {
        built = PlanNode::new(NodeType::Filter)
            .with_child("condition", condition)
            .with_child("input", built);
    }
    built
}

fn flatten(node: &PlanNode, leaves: &mut Vec<PlanNode>, conditions: &mut Vec<PlanNode>) {
    if is_inner_join(node) {
        if let Some(on) = node.node_attr("on") {
            conditions.push(on.deep_copy());
        }
        for side in ["left", "right"] {
            if let Some(child) = node.node_attr(side) {
                flatten(child, leaves, conditions);
            }
        }
        return;
    }
    leaves.push(node.deep_copy());
}
