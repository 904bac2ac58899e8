//! Redundant operator removal.
//!
//! Drops filters whose condition has simplified to literal TRUE and
//! projections that re-emit their input's projection unchanged and in
//! order (a no-op once projection pushdown has stamped the scan).

use harrier_error::Result;
use harrier_plan::expr::is_true_literal;
use harrier_plan::{AttrValue, NodeType, PlanNode};

use crate::{OptimizeContext, OptimizerStrategy};

pub struct RedundantOperators;

impl OptimizerStrategy for RedundantOperators {
    fn name(&self) -> &'static str {
        "redundant_operator_removal"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        match node.node_type() {
            NodeType::Filter => {
                let is_noop = node
                    .node_attr("condition")
                    .is_some_and(is_true_literal);
                if is_noop {
                    if let Some(AttrValue::Node(input)) = node.take_attr("input") {
                        context.stats.increment("redundant_filter_removed");
                        return Ok(*input);
                    }
                }
                Ok(node)
            }
            NodeType::Project => {
                if project_is_noop(&node) {
                    if let Some(AttrValue::Node(input)) = node.take_attr("input") {
                        context.stats.increment("redundant_project_removed");
                        return Ok(*input);
                    }
                }
                Ok(node)
            }
            _ => Ok(node),
        }
    }
}

/// A projection is a no-op when it lists exactly its input's columns,
/// in order. The input's column list is its projection when the input
/// is a scan, or its `columns` when the input is another project.
fn project_is_noop(project: &PlanNode) -> bool {
    let Some(columns) = project.nodes_attr("columns") else {
        return false;
    };
    let Some(input) = project.node_attr("input") else {
        return false;
    };
    let input_columns = match input.node_type() {
        NodeType::Scan => input.nodes_attr("projection"),
        NodeType::Project => input.nodes_attr("columns"),
        _ => None,
    };
    let Some(input_columns) = input_columns else {
        return false;
    };
    columns.len() == input_columns.len()
        && columns.iter().zip(input_columns).all(|(a, b)| {
            match (a.column_attr("column"), b.column_attr("column")) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        })
}
