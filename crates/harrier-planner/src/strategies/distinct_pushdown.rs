//! Distinct pushdown.
//!
//! A DISTINCT commutes with ORDER BY (deduplicating a sorted stream
//! leaves it sorted), so it slides below SORT where deduplication
//! shrinks the sort input. A DISTINCT sitting directly on a scan
//! additionally stamps the scan with a `distinct_hint` flag so a reader
//! that can deduplicate at the source may do so; the operator itself
//! stays, keeping the plan's semantics independent of reader support.

use harrier_error::Result;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::contains_node_type;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct DistinctPushdown;

impl OptimizerStrategy for DistinctPushdown {
    fn name(&self) -> &'static str {
        "distinct_pushdown"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Distinct)
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() != NodeType::Distinct {
            return Ok(node);
        }
        let Some(AttrValue::Node(input)) = node.take_attr("input") else {
            return Ok(node);
        };
        let mut input = *input;

        match input.node_type() {
            NodeType::Sort => {
                context.stats.increment("distinct_pushdown_sort");
                let Some(AttrValue::Node(sorted)) = input.take_attr("input") else {
                    node.set_attr("input", Some(AttrValue::Node(Box::new(input))));
                    return Ok(node);
                };
                node.set_attr("input", Some(AttrValue::Node(sorted)));
                // Re-apply in case the sort sat directly on a scan.
                let node = self.visit(node, context)?;
                Ok(input.with_child("input", node))
            }
            NodeType::Scan => {
                if !input.flag_attr("distinct_hint") {
                    context.stats.increment("distinct_pushdown_scan_hint");
                    input.set_attr("distinct_hint", Some(AttrValue::Flag(true)));
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
