//! Split conjunctive predicates: one filter per conjunct.
//!
//! A filter whose condition is an AND chain becomes a stack of
//! single-predicate filters, so pushdown can later relocate each
//! conjunct independently.

use harrier_error::Result;
use harrier_plan::expr::flatten_and_chain;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::strategies::support::contains_node_type;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct SplitConjunctivePredicates;

impl OptimizerStrategy for SplitConjunctivePredicates {
    fn name(&self) -> &'static str {
        "split_conjunctive_predicates"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Filter)
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() != NodeType::Filter {
            return Ok(node);
        }
        let Some(condition) = node.node_attr("condition") else {
            return Ok(node);
        };
        if condition.node_type() != NodeType::And {
            return Ok(node);
        }

        let conjuncts: Vec<PlanNode> = flatten_and_chain(condition)
            .into_iter()
            .map(PlanNode::deep_copy)
            .collect();
        let Some(AttrValue::Node(input)) = node.take_attr("input") else {
            return Ok(node);
        };

        // Innermost filter carries the last conjunct; the original
        // left-to-right order is preserved top-down. Splitting n
        // conjuncts counts n - 1 rewrites.
        let mut rebuilt = *input;
        for (idx, conjunct) in conjuncts.into_iter().enumerate().rev() {
            rebuilt = PlanNode::new(NodeType::Filter)
                .with_child("condition", conjunct)
                .with_child("input", rebuilt);
            if idx > 0 {
                context.stats.increment("conjunction_split");
            }
        }
        Ok(rebuilt)
    }
}
