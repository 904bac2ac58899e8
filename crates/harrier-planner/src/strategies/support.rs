//! Shared helpers for strategy implementations.

use hashbrown::HashSet;

use harrier_error::Result;
use harrier_plan::{AttrValue, ColumnRef, NodeType, PlanNode};

use crate::stats::RelationStatistics;

/// Rewrite an expression-valued attribute in place.
pub fn map_expr_attr<F>(node: &mut PlanNode, attr: &str, f: F) -> Result<()>
where
    F: FnOnce(PlanNode) -> Result<PlanNode>,
{
    if let Some(AttrValue::Node(expr)) = node.take_attr(attr) {
        let rewritten = f(*expr)?;
        node.set_attr(attr, Some(AttrValue::Node(Box::new(rewritten))));
    }
    Ok(())
}

/// Does any node in the plan match the predicate? Walks every child
/// attribute, expressions included.
pub fn any_node(plan: &PlanNode, predicate: &dyn Fn(&PlanNode) -> bool) -> bool {
    if predicate(plan) {
        return true;
    }
    for name in plan.child_attr_names() {
        if let Some(child) = plan.node_attr(&name) {
            if any_node(child, predicate) {
                return true;
            }
        } else if let Some(children) = plan.nodes_attr(&name) {
            if children.iter().any(|child| any_node(child, predicate)) {
                return true;
            }
        }
    }
    false
}

/// Whether the plan contains a node of the given type anywhere.
pub fn contains_node_type(plan: &PlanNode, ty: NodeType) -> bool {
    any_node(plan, &|node| node.node_type() == ty)
}

/// Relation names scanned anywhere below (and including) a node.
pub fn subtree_sources(node: &PlanNode) -> HashSet<String> {
    let mut sources = HashSet::new();
    collect_sources(node, &mut sources);
    sources
}

fn collect_sources(node: &PlanNode, out: &mut HashSet<String>) {
    if node.node_type() == NodeType::Scan {
        if let Some(relation) = node.text_attr("relation") {
            out.insert(relation.to_owned());
        }
    }
    for name in ["input", "left", "right"] {
        if let Some(child) = node.node_attr(name) {
            collect_sources(child, out);
        }
    }
}

/// Every column reference comes from the given source set. Columns with
/// an anonymous source cannot be attributed and fail the check.
pub fn columns_covered_by(columns: &[ColumnRef], sources: &HashSet<String>) -> bool {
    columns
        .iter()
        .all(|column| !column.source.is_empty() && sources.contains(&column.source))
}

/// Smallest record count advertised by any scan statistics in the
/// subtree, or `i64::MAX` when none are attached.
pub fn subtree_record_count(node: &PlanNode) -> i64 {
    let mut best = i64::MAX;
    visit_scans(node, &mut |scan| {
        if let Some(stats) = scan.payload_attr::<RelationStatistics>("statistics") {
            best = best.min(stats.record_count);
        }
    });
    best
}

/// Cardinality estimate for a column from any scan statistics in the
/// plan, or `i64::MAX` when unknown.
pub fn column_cardinality(plan: &PlanNode, column: &ColumnRef) -> i64 {
    let mut estimate = i64::MAX;
    visit_scans(plan, &mut |scan| {
        if let Some(stats) = scan.payload_attr::<RelationStatistics>("statistics") {
            if let Some(&value) = stats.cardinality_estimate.get(&column.name) {
                estimate = estimate.min(value);
            }
        }
    });
    estimate
}

fn visit_scans(node: &PlanNode, f: &mut dyn FnMut(&PlanNode)) {
    if node.node_type() == NodeType::Scan {
        f(node);
    }
    for name in ["input", "left", "right"] {
        if let Some(child) = node.node_attr(name) {
            visit_scans(child, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrier_plan::AttrValue;

    fn scan(relation: &str) -> PlanNode {
        PlanNode::new(NodeType::Scan).with_attr("relation", AttrValue::Text(relation.to_owned()))
    }

    #[test]
    fn sources_cover_both_join_sides() {
        let join = PlanNode::new(NodeType::Join)
            .with_child("left", scan("orders"))
            .with_child("right", scan("customers"));
        let sources = subtree_sources(&join);
        assert!(sources.contains("orders"));
        assert!(sources.contains("customers"));

        let left_only = subtree_sources(join.node_attr("left").unwrap());
        assert!(columns_covered_by(
            &[ColumnRef::new("orders", "id")],
            &left_only
        ));
        assert!(!columns_covered_by(
            &[ColumnRef::new("customers", "id")],
            &left_only
        ));
        assert!(!columns_covered_by(&[ColumnRef::bare("id")], &left_only));
    }

    #[test]
    fn record_count_prefers_attached_statistics() {
        let mut stats = RelationStatistics::new();
        stats.record_count = 42;
        let node = scan("t").with_attr(
            "statistics",
            AttrValue::Payload(std::sync::Arc::new(stats)),
        );
        assert_eq!(subtree_record_count(&node), 42);
        assert_eq!(subtree_record_count(&scan("u")), i64::MAX);
    }
}
