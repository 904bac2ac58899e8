//! Limit pushdown.
//!
//! A LIMIT commutes with row-count-preserving operators: it slides
//! below projections, and stamps a `limit_hint` on a scan directly
//! beneath it so readers can stop early. It never crosses filters,
//! joins, aggregations, sorts, or distincts, all of which change which
//! or how many rows survive.

use harrier_error::Result;
use harrier_plan::{AttrValue, NodeType, PlanNode};
use harrier_types::ScalarValue;

use crate::strategies::support::contains_node_type;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct LimitPushdown;

impl OptimizerStrategy for LimitPushdown {
    fn name(&self) -> &'static str {
        "limit_pushdown"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Limit)
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() != NodeType::Limit {
            return Ok(node);
        }
        let Some(AttrValue::Node(input)) = node.take_attr("input") else {
            return Ok(node);
        };
        let mut input = *input;

        match input.node_type() {
            NodeType::Project => {
                context.stats.increment("limit_pushdown_project");
                let Some(AttrValue::Node(projected)) = input.take_attr("input") else {
                    node.set_attr("input", Some(AttrValue::Node(Box::new(input))));
                    return Ok(node);
                };
                node.set_attr("input", Some(AttrValue::Node(projected)));
                let node = self.visit(node, context)?;
                Ok(input.with_child("input", node))
            }
            NodeType::Scan => {
                if let Some(ScalarValue::Int64(count)) = node.scalar_attr("count") {
                    if input.scalar_attr("limit_hint").is_none() {
                        context.stats.increment("limit_pushdown_scan_hint");
                        input.set_attr(
                            "limit_hint",
                            Some(AttrValue::Scalar(ScalarValue::Int64(*count))),
                        );
                    }
                }
                node.set_attr("input", Some(AttrValue::Node(Box::new(input))));
                Ok(node)
            }
            _ => {
                node.set_attr("input", Some(AttrValue::Node(Box::new(input))));
                Ok(node)
            }
        }
    }
}
