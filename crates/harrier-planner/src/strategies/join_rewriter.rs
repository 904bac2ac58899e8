//! Join rewriting into semi and anti variants.
//!
//! Two rewrites, both driven by evidence already in the plan:
//! - An inner join whose build side is a DISTINCT over exactly the join
//!   key columns can only match each probe row once per key; the
//!   distinct is absorbed and the join becomes SEMI.
//! - An inner join flagged `not_exists` by the plan producer (the shape
//!   a `NOT EXISTS` subquery lowers to) becomes ANTI.

use harrier_error::Result;
use harrier_plan::expr::{comparison_op, referenced_columns};
use harrier_plan::{AttrValue, CompareOp, NodeType, PlanNode};

use crate::strategies::support::{contains_node_type, subtree_sources};
use crate::{OptimizeContext, OptimizerStrategy};

pub struct JoinRewriter;

impl OptimizerStrategy for JoinRewriter {
    fn name(&self) -> &'static str {
        "join_rewriter"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Join)
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() != NodeType::Join {
            return Ok(node);
        }
        if node.text_attr("join_type") != Some("inner") {
            return Ok(node);
        }

        // NOT EXISTS lowering: inner join flagged by the producer.
        if node.flag_attr("not_exists") {
            context.stats.increment("join_rewrite_anti");
            node.set_attr("join_type", Some(AttrValue::Text("anti".to_owned())));
            node.set_attr("not_exists", None);
            return Ok(node);
        }

        // Unique build side: DISTINCT over exactly the join keys.
        if let Some(right) = node.node_attr("right") {
            if right.node_type() == NodeType::Distinct
                && distinct_covers_join_keys(&node, right)
            {
                context.stats.increment("join_rewrite_semi");
                let inner = right
                    .node_attr("input")
                    .map(PlanNode::deep_copy);
                if let Some(inner) = inner {
                    node.set_attr("join_type", Some(AttrValue::Text("semi".to_owned())));
                    node.set_attr("right", Some(AttrValue::Node(Box::new(inner))));
                }
                return Ok(node);
            }
        }
        Ok(node)
    }
}

/// The distinct's projected columns are exactly the right-side join key
/// columns of the equality condition.
fn distinct_covers_join_keys(join: &PlanNode, distinct: &PlanNode) -> bool {
    let Some(on) = join.node_attr("on") else {
        return false;
    };
    if comparison_op(on) != Some(CompareOp::Eq) {
        return false;
    }
    let Some(project) = distinct.node_attr("input") else {
        return false;
    };
    if project.node_type() != NodeType::Project {
        return false;
    }
    let Some(projected) = project.nodes_attr("columns") else {
        return false;
    };

    let right_sources = subtree_sources(project);
    let right_keys: Vec<_> = referenced_columns(on)
        .into_iter()
        .filter(|column| right_sources.contains(&column.source))
        .collect();
    if right_keys.is_empty() || projected.len() != right_keys.len() {
        return false;
    }
    right_keys.iter().all(|key| {
        projected
            .iter()
            .any(|column| column.column_attr("column") == Some(key))
    })
}
