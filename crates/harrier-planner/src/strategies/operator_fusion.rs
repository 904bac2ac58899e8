//! Operator fusion: adjacent projects collapse to the outermost,
//! adjacent distincts collapse to one, and nested limits collapse to
//! the most restrictive count.

use harrier_error::Result;
use harrier_plan::{AttrValue, NodeType, PlanNode};
use harrier_types::ScalarValue;

use crate::{OptimizeContext, OptimizerStrategy};

pub struct OperatorFusion;

impl OptimizerStrategy for OperatorFusion {
    fn name(&self) -> &'static str {
        "operator_fusion"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        loop {
            let Some(input) = node.node_attr("input") else {
                return Ok(node);
            };
            match (node.node_type(), input.node_type()) {
                // Keep the outermost projection.
                (NodeType::Project, NodeType::Project) => {
                    context.stats.increment("fusion_adjacent_projects");
                    let grandchild = input.node_attr("input").map(PlanNode::deep_copy);
                    match grandchild {
                        Some(grandchild) => {
                            node.set_attr(
                                "input",
                                Some(AttrValue::Node(Box::new(grandchild))),
                            );
                        }
                        None => return Ok(node),
                    }
                }
                (NodeType::Distinct, NodeType::Distinct) => {
                    context.stats.increment("fusion_adjacent_distincts");
                    let grandchild = input.node_attr("input").map(PlanNode::deep_copy);
                    match grandchild {
                        Some(grandchild) => {
                            node.set_attr(
                                "input",
                                Some(AttrValue::Node(Box::new(grandchild))),
                            );
                        }
                        None => return Ok(node),
                    }
                }
                // Keep the most restrictive count.
                (NodeType::Limit, NodeType::Limit) => {
                    context.stats.increment("fusion_nested_limits");
                    let outer_count = limit_count(&node);
                    let inner_count = limit_count(input);
                    let grandchild = input.node_attr("input").map(PlanNode::deep_copy);
                    let merged = match (outer_count, inner_count) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                    match grandchild {
                        Some(grandchild) => {
                            node.set_attr(
                                "input",
                                Some(AttrValue::Node(Box::new(grandchild))),
                            );
                            if let Some(count) = merged {
                                node.set_attr(
                                    "count",
                                    Some(AttrValue::Scalar(ScalarValue::Int64(count))),
                                );
                            }
                        }
                        None => return Ok(node),
                    }
                }
                _ => return Ok(node),
            }
        }
    }
}

fn limit_count(node: &PlanNode) -> Option<i64> {
    match node.scalar_attr("count") {
        Some(ScalarValue::Int64(count)) => Some(*count),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_strategy;
    use harrier_plan::expr::identifier;
    use harrier_plan::ColumnRef;

    fn scan() -> PlanNode {
        PlanNode::new(NodeType::Scan).with_attr("relation", AttrValue::Text("t".to_owned()))
    }

    fn project(names: &[&str], input: PlanNode) -> PlanNode {
        PlanNode::new(NodeType::Project)
            .with_attr(
                "columns",
                AttrValue::Nodes(
                    names
                        .iter()
                        .map(|&n| identifier(ColumnRef::new("t", n)))
                        .collect(),
                ),
            )
            .with_child("input", input)
    }

    fn limit(count: i64, input: PlanNode) -> PlanNode {
        PlanNode::new(NodeType::Limit)
            .with_attr("count", AttrValue::Scalar(ScalarValue::Int64(count)))
            .with_child("input", input)
    }

    #[test]
    fn adjacent_projects_keep_the_outermost() {
        let plan = project(&["a"], project(&["a", "b"], project(&["a", "b", "c"], scan())));
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&OperatorFusion, plan, &mut context).unwrap();

        assert_eq!(plan.node_type(), NodeType::Project);
        assert_eq!(plan.nodes_attr("columns").unwrap().len(), 1);
        assert_eq!(plan.node_attr("input").unwrap().node_type(), NodeType::Scan);
        assert!(context.stats.get("fusion_adjacent_projects") >= 2);
    }

    #[test]
    fn adjacent_distincts_collapse() {
        let plan = PlanNode::new(NodeType::Distinct)
            .with_child("input", PlanNode::new(NodeType::Distinct).with_child("input", scan()));
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&OperatorFusion, plan, &mut context).unwrap();
        assert_eq!(plan.node_type(), NodeType::Distinct);
        assert_eq!(plan.node_attr("input").unwrap().node_type(), NodeType::Scan);
        assert_eq!(context.stats.get("fusion_adjacent_distincts"), 1);
    }

    #[test]
    fn nested_limits_keep_the_most_restrictive() {
        let plan = limit(100, limit(5, limit(50, scan())));
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&OperatorFusion, plan, &mut context).unwrap();
        assert_eq!(plan.node_type(), NodeType::Limit);
        assert_eq!(plan.scalar_attr("count"), Some(&ScalarValue::Int64(5)));
        assert_eq!(plan.node_attr("input").unwrap().node_type(), NodeType::Scan);
        assert_eq!(context.stats.get("fusion_nested_limits"), 2);
    }

    #[test]
    fn mixed_neighbors_are_untouched() {
        let plan = limit(10, project(&["a"], scan()));
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&OperatorFusion, plan, &mut context).unwrap();
        assert_eq!(plan.node_type(), NodeType::Limit);
        assert_eq!(
            plan.node_attr("input").unwrap().node_type(),
            NodeType::Project
        );
    }
}
