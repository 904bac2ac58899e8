//! Projection pushdown: scans materialize only the columns the plan
//! above them actually touches.
//!
//! One pass collects every column referenced by projections, filter
//! conditions, join predicates, group keys, aggregates, and sort keys;
//! a second pass stamps each scan with the subset of those columns that
//! belongs to its relation. A scan that already carries a narrower
//! projection is left alone.

use harrier_error::Result;
use harrier_plan::expr::{identifier, referenced_columns};
use harrier_plan::{AttrValue, ColumnRef, NodeType, PlanNode};

use crate::strategies::support::contains_node_type;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct ProjectionPushdown;

impl OptimizerStrategy for ProjectionPushdown {
    fn name(&self) -> &'static str {
        "projection_pushdown"
    }

    fn should_run(&self, plan: &PlanNode) -> bool {
        contains_node_type(plan, NodeType::Project)
    }

    fn visit(&self, node: PlanNode, _context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(node)
    }

    fn complete(&self, plan: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        let mut required: Vec<ColumnRef> = Vec::new();
        collect_required(&plan, &mut required);
        Ok(stamp_scans(plan, &required, context))
    }
}

const EXPR_ATTRS: [&str; 2] = ["condition", "on"];
const EXPR_LIST_ATTRS: [&str; 5] = ["columns", "group_by", "aggregates", "order_by", "exposes"];

fn collect_required(node: &PlanNode, out: &mut Vec<ColumnRef>) {
    for attr in EXPR_ATTRS {
        if let Some(expr) = node.node_attr(attr) {
            merge(out, referenced_columns(expr));
        }
    }
    for attr in EXPR_LIST_ATTRS {
        if let Some(exprs) = node.nodes_attr(attr) {
            for expr in exprs {
                merge(out, referenced_columns(expr));
            }
        }
    }
    for name in ["input", "left", "right"] {
        if let Some(child) = node.node_attr(name) {
            collect_required(child, out);
        }
    }
}

fn merge(out: &mut Vec<ColumnRef>, columns: Vec<ColumnRef>) {
    for column in columns {
        if !out.contains(&column) {
            out.push(column);
        }
    }
}

fn stamp_scans(
    mut node: PlanNode,
    required: &[ColumnRef],
    context: &mut OptimizeContext,
) -> PlanNode {
    if node.node_type() == NodeType::Scan {
        let Some(relation) = node.text_attr("relation").map(str::to_owned) else {
            return node;
        };
        let mine: Vec<&ColumnRef> = required
            .iter()
            .filter(|column| column.source == relation)
            .collect();
        if mine.is_empty() {
            // Nothing above references this scan by name; leave its
            // projection untouched rather than materializing nothing.
            return node;
        }
        let current_width = node.nodes_attr("projection").map(<[PlanNode]>::len);
        if current_width.is_some_and(|width| width <= mine.len()) {
            return node;
        }
        context.stats.increment("projection_pushdown");
        let columns: Vec<PlanNode> = mine
            .into_iter()
            .map(|column| identifier(column.clone()))
            .collect();
        node.set_attr("projection", Some(AttrValue::Nodes(columns)));
        return node;
    }
    for name in ["input", "left", "right"] {
        if let Some(AttrValue::Node(child)) = node.take_attr(name) {
            node.set_attr(
                name,
                Some(AttrValue::Node(Box::new(stamp_scans(
                    *child, required, context,
                )))),
            );
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_strategy;
    use harrier_plan::expr::{comparison, literal};
    use harrier_plan::CompareOp;
    use harrier_types::ScalarValue;

    fn scan(relation: &str) -> PlanNode {
        PlanNode::new(NodeType::Scan).with_attr("relation", AttrValue::Text(relation.to_owned()))
    }

    fn ident(source: &str, name: &str) -> PlanNode {
        identifier(ColumnRef::new(source, name))
    }

    fn scan_projection(plan: &PlanNode) -> Vec<String> {
        let mut node = plan;
        loop {
            if node.node_type() == NodeType::Scan {
                return node
                    .nodes_attr("projection")
                    .map(|columns| {
                        columns
                            .iter()
                            .filter_map(|c| c.column_attr("column"))
                            .map(|c| c.name.clone())
                            .collect()
                    })
                    .unwrap_or_default();
            }
            node = node.node_attr("input").unwrap();
        }
    }

    #[test]
    fn scans_receive_only_referenced_columns() {
        let plan = PlanNode::new(NodeType::Project)
            .with_attr(
                "columns",
                AttrValue::Nodes(vec![ident("t", "a"), ident("t", "b")]),
            )
            .with_child(
                "input",
                PlanNode::new(NodeType::Filter)
                    .with_child(
                        "condition",
                        comparison(
                            CompareOp::Gt,
                            ident("t", "c"),
                            literal(ScalarValue::Int64(0)),
                        ),
                    )
                    .with_child("input", scan("t")),
            );

        let mut context = OptimizeContext::default();
        let plan = run_strategy(&ProjectionPushdown, plan, &mut context).unwrap();

        let mut projected = scan_projection(&plan);
        projected.sort();
        assert_eq!(projected, vec!["a", "b", "c"]);
        assert_eq!(context.stats.get("projection_pushdown"), 1);
    }

    #[test]
    fn unreferenced_scans_are_left_alone() {
        let plan = PlanNode::new(NodeType::Project)
            .with_attr("columns", AttrValue::Nodes(vec![ident("t", "a")]))
            .with_child(
                "input",
                PlanNode::new(NodeType::Join)
                    .with_attr("join_type", AttrValue::Text("inner".to_owned()))
                    .with_child("left", scan("t"))
                    .with_child("right", scan("u")),
            );
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&ProjectionPushdown, plan, &mut context).unwrap();
        let join = plan.node_attr("input").unwrap();
        assert!(join
            .node_attr("right")
            .unwrap()
            .nodes_attr("projection")
            .is_none());
        assert_eq!(context.stats.get("projection_pushdown"), 1);
    }

    #[test]
    fn narrower_existing_projection_is_kept() {
        let narrow = scan("t").with_attr(
            "projection",
            AttrValue::Nodes(vec![ident("t", "a")]),
        );
        let plan = PlanNode::new(NodeType::Project)
            .with_attr("columns", AttrValue::Nodes(vec![ident("t", "a")]))
            .with_child("input", narrow);
        let mut context = OptimizeContext::default();
        let plan = run_strategy(&ProjectionPushdown, plan, &mut context).unwrap();
        assert_eq!(scan_projection(&plan), vec!["a"]);
        assert_eq!(context.stats.get("projection_pushdown"), 0);
    }
}
