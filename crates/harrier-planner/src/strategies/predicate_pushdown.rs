//! Predicate pushdown toward the scans.
//!
//! Each filter slides as deep as its semantics allow: through
//! projections that keep every referenced column, into the matching
//! side of an inner join, only into the outer side of a left/right
//! outer join (pushing onto the inner side would fabricate rows via
//! null padding), never across a full outer join, and past an
//! aggregation only when it touches group keys alone. Distinct and sort
//! are transparent.

use harrier_error::Result;
use harrier_plan::expr::referenced_columns;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::{columns_covered_by, contains_node_type, subtree_sources};
use crate::{OptimizeContext, OptimizerStrategy};

pub struct PredicatePushdown;

impl OptimizerStrategy for PredicatePushdown {
    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Filter)
    }

    fn visit(&self, node: PlanNode, _context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(node)
    }

    fn complete(&self, plan: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(push(plan, context))
    }
}

fn push(mut node: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    // Children first, so lower filters settle before upper ones arrive.
    for name in ["input", "left", "right"] {
        if let Some(AttrValue::Node(child)) = node.take_attr(name) {
            node.set_attr(name, Some(AttrValue::Node(Box::new(push(*child, context)))));
        }
    }

    if node.node_type() != NodeType::Filter {
        return node;
    }
    let Some(AttrValue::Node(condition)) = node.take_attr("condition") else {
        return node;
    };
    let Some(AttrValue::Node(input)) = node.take_attr("input") else {
        node.set_attr("condition", Some(AttrValue::Node(condition)));
        return node;
    };
    push_into(*condition, *input, context)
}

/// Place `condition` as deep as possible above `input`.
fn push_into(condition: PlanNode, mut input: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let columns = referenced_columns(&condition);

    match input.node_type() {
        NodeType::Project => {
            let survives = input.nodes_attr("columns").is_some_and(|projected| {
                columns.iter().all(|column| {
                    projected
                        .iter()
                        .any(|p| p.column_attr("column") == Some(column))
                })
            });
            if survives {
                if let Some(AttrValue::Node(project_input)) = input.take_attr("input") {
                    context.stats.increment("predicate_pushdown_project");
                    let pushed = push_into(condition, *project_input, context);
                    return input.with_child("input", pushed);
                }
            }
            filter_over(condition, input)
        }
        NodeType::Join => {
            let join_type = input.text_attr("join_type").unwrap_or("inner").to_owned();
            let side = match join_type.as_str() {
                "inner" | "cross" => pick_side(&input, &columns),
                // Only the outer side is safe for outer joins.
                "left" | "semi" | "anti" => {
                    pick_side(&input, &columns).filter(|side| side == "left")
                }
                "right" => pick_side(&input, &columns).filter(|side| side == "right"),
                // Never across a full outer join.
                _ => None,
            };
            match side {
                Some(side) => {
                    if let Some(AttrValue::Node(side_input)) = input.take_attr(&side) {
                        context.stats.increment("predicate_pushdown_join");
                        let pushed = push_into(condition, *side_input, context);
                        input.set_attr(&side, Some(AttrValue::Node(Box::new(pushed))));
                        return input;
                    }
                    filter_over(condition, input)
                }
                None => filter_over(condition, input),
            }
        }
        NodeType::Aggregate => {
            let group_keys_only = input.nodes_attr("group_by").is_some_and(|keys| {
                columns.iter().all(|column| {
                    keys.iter()
                        .any(|key| key.column_attr("column") == Some(column))
                })
            });
            if group_keys_only {
                if let Some(AttrValue::Node(agg_input)) = input.take_attr("input") {
                    context.stats.increment("predicate_pushdown_aggregate");
                    let pushed = push_into(condition, *agg_input, context);
                    return input.with_child("input", pushed);
                }
            }
            filter_over(condition, input)
        }
        // Distinct and sort do not change which rows satisfy the
        // predicate.
        NodeType::Distinct | NodeType::Sort => {
            if let Some(AttrValue::Node(inner)) = input.take_attr("input") {
                context.stats.increment("predicate_pushdown_transparent");
                let pushed = push_into(condition, *inner, context);
                return input.with_child("input", pushed);
            }
            filter_over(condition, input)
        }
        _ => filter_over(condition, input),
    }
}

fn pick_side(join: &PlanNode, columns: &[harrier_plan::ColumnRef]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    for side in ["left", "right"] {
        if let Some(child) = join.node_attr(side) {
            if columns_covered_by(columns, &subtree_sources(child)) {
                return Some(side.to_owned());
            }
        }
    }
    None
}

fn filter_over(condition: PlanNode, input: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::Filter)
        .with_child("condition", condition)
        .with_child("input", input)
}
