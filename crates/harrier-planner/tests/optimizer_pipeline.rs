//! End-to-end pipeline tests: full optimizer runs checked against a
//! row-at-a-time reference evaluator over small batches.

use harrier_plan::expr::{
    self, comparison, flatten_and_chain, identifier, is_false_literal, literal, not, or,
};
use harrier_plan::{AttrValue, ColumnRef, CompareOp, NodeType, PlanNode};
use harrier_planner::Optimizer;
use harrier_types::{Batch, ColumnSpec, ColumnType, ScalarValue};

// ── Reference evaluator ────────────────────────────────────────────────

/// Three-valued boolean evaluation of a filter expression over one row.
fn eval(expr: &PlanNode, batch: &Batch, row: usize) -> Option<bool> {
    match expr.node_type() {
        NodeType::Literal => match expr.scalar_attr("value") {
            Some(ScalarValue::Bool(b)) => Some(*b),
            Some(ScalarValue::Null) | None => None,
            Some(_) => None,
        },
        NodeType::And => {
            let left = eval(expr.node_attr("left")?, batch, row);
            let right = eval(expr.node_attr("right")?, batch, row);
            match (left, right) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }
        NodeType::Or => {
            let left = eval(expr.node_attr("left")?, batch, row);
            let right = eval(expr.node_attr("right")?, batch, row);
            match (left, right) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }
        NodeType::Not => eval(expr.node_attr("input")?, batch, row).map(|b| !b),
        NodeType::Comparison => {
            let op = expr::comparison_op(expr)?;
            let left = value_of(expr.node_attr("left")?, batch, row)?;
            match op {
                CompareOp::In | CompareOp::NotIn => {
                    let items = expr.node_attr("right")?.nodes_attr("items")?;
                    let mut found = false;
                    for item in items {
                        let candidate = value_of(item, batch, row)?;
                        if left.try_compare(&candidate).ok()?? == std::cmp::Ordering::Equal {
                            found = true;
                            break;
                        }
                    }
                    Some(if op == CompareOp::In { found } else { !found })
                }
                _ => {
                    let right = value_of(expr.node_attr("right")?, batch, row)?;
                    let ordering = left.try_compare(&right).ok()??;
                    Some(match op {
                        CompareOp::Eq => ordering.is_eq(),
                        CompareOp::NotEq => !ordering.is_eq(),
                        CompareOp::Lt => ordering.is_lt(),
                        CompareOp::LtEq => ordering.is_le(),
                        CompareOp::Gt => ordering.is_gt(),
                        CompareOp::GtEq => ordering.is_ge(),
                        _ => return None,
                    })
                }
            }
        }
        _ => None,
    }
}

fn value_of(node: &PlanNode, batch: &Batch, row: usize) -> Option<ScalarValue> {
    match node.node_type() {
        NodeType::Literal => node.scalar_attr("value").cloned(),
        NodeType::Identifier => {
            let column = node.column_attr("column")?;
            batch.column(&column.name).map(|c| c.value_at(row))
        }
        _ => None,
    }
}

/// Execute a Filter-over-Scan plan against a batch: surviving row set.
fn execute(plan: &PlanNode, batch: &Batch) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..batch.row_count()).collect();
    let mut filters = Vec::new();
    let mut node = plan;
    while node.node_type() == NodeType::Filter {
        filters.push(node.node_attr("condition").expect("filter condition"));
        node = node.node_attr("input").expect("filter input");
    }
    for condition in filters {
        rows.retain(|&row| eval(condition, batch, row) == Some(true));
    }
    rows
}

// ── Fixtures ───────────────────────────────────────────────────────────

fn id_batch(count: i64) -> Batch {
    let specs = vec![ColumnSpec::new("id", ColumnType::Int64)];
    let rows: Vec<Vec<ScalarValue>> = (1..=count).map(|i| vec![ScalarValue::Int64(i)]).collect();
    Batch::from_rows(&rows, &specs).unwrap()
}

fn id_col() -> PlanNode {
    identifier(ColumnRef::new("t", "id"))
}

fn int(v: i64) -> PlanNode {
    literal(ScalarValue::Int64(v))
}

fn scan() -> PlanNode {
    PlanNode::new(NodeType::Scan).with_attr("relation", AttrValue::Text("t".to_owned()))
}

fn filter_plan(condition: PlanNode) -> PlanNode {
    PlanNode::new(NodeType::Filter)
        .with_child("condition", condition)
        .with_child("input", scan())
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn nary_demorgan_shapes_and_evaluates() {
    // NOT(id=1 OR id=2 OR id=3) over ids 1..8 leaves 5 rows.
    let condition = not(or(
        comparison(CompareOp::Eq, id_col(), int(1)),
        or(
            comparison(CompareOp::Eq, id_col(), int(2)),
            comparison(CompareOp::Eq, id_col(), int(3)),
        ),
    ));
    let plan = filter_plan(condition);

    let (optimized, stats) = Optimizer::new().optimize(plan.deep_copy()).unwrap();
    assert!(stats.get("boolean_demorgan_or") >= 1);

    // Shape: a stack of single-predicate filters (split ran after the
    // three-way AND formed), each an id != k comparison.
    let mut ops = Vec::new();
    let mut node = &optimized;
    while node.node_type() == NodeType::Filter {
        let condition = node.node_attr("condition").unwrap();
        for conjunct in flatten_and_chain(condition) {
            ops.push(conjunct.text_attr("op").unwrap().to_owned());
        }
        node = node.node_attr("input").unwrap();
    }
    assert_eq!(ops, vec!["NotEq", "NotEq", "NotEq"]);

    let batch = id_batch(8);
    let rows = execute(&optimized, &batch);
    assert_eq!(rows.len(), 5);
    assert_eq!(execute(&plan, &batch), rows, "optimizer must preserve semantics");
}

#[test]
fn range_compaction_scenario() {
    // id>5 AND id<10 AND id>7 AND id<9  ->  exactly id>7 AND id<9.
    let condition = expr::and(
        comparison(CompareOp::Gt, id_col(), int(5)),
        expr::and(
            comparison(CompareOp::Lt, id_col(), int(10)),
            expr::and(
                comparison(CompareOp::Gt, id_col(), int(7)),
                comparison(CompareOp::Lt, id_col(), int(9)),
            ),
        ),
    );
    let plan = filter_plan(condition);

    let (optimized, stats) = Optimizer::new().optimize(plan.deep_copy()).unwrap();
    assert_eq!(stats.get("compaction_range_simplified"), 1);

    let mut ops = Vec::new();
    let mut node = &optimized;
    while node.node_type() == NodeType::Filter {
        ops.push(
            node.node_attr("condition")
                .unwrap()
                .text_attr("op")
                .unwrap()
                .to_owned(),
        );
        node = node.node_attr("input").unwrap();
    }
    ops.sort();
    assert_eq!(ops, vec!["Gt", "Lt"], "exactly two conjuncts survive");

    let batch = id_batch(12);
    let rows = execute(&optimized, &batch);
    assert_eq!(rows, vec![7], "only id=8 (row index 7) is inside (7, 9)");
    assert_eq!(execute(&plan, &batch), rows);
}

#[test]
fn contradiction_scenario_returns_no_rows() {
    // id>10 AND id<5 -> literal FALSE, zero rows.
    let condition = expr::and(
        comparison(CompareOp::Gt, id_col(), int(10)),
        comparison(CompareOp::Lt, id_col(), int(5)),
    );
    let plan = filter_plan(condition);

    let (optimized, stats) = Optimizer::new().optimize(plan.deep_copy()).unwrap();
    assert_eq!(stats.get("contradiction_detected"), 1);

    assert_eq!(optimized.node_type(), NodeType::Filter);
    assert!(is_false_literal(optimized.node_attr("condition").unwrap()));

    let batch = id_batch(20);
    assert!(execute(&optimized, &batch).is_empty());
    assert!(execute(&plan, &batch).is_empty());
}

#[test]
fn equality_or_chain_becomes_in_and_still_matches() {
    let condition = or(
        comparison(CompareOp::Eq, id_col(), int(2)),
        or(
            comparison(CompareOp::Eq, id_col(), int(4)),
            comparison(CompareOp::Eq, id_col(), int(6)),
        ),
    );
    let plan = filter_plan(condition);

    let (optimized, stats) = Optimizer::new().optimize(plan.deep_copy()).unwrap();
    assert_eq!(stats.get("rewrite_eq_chain_to_in"), 1);

    let batch = id_batch(8);
    let rows = execute(&optimized, &batch);
    assert_eq!(rows, vec![1, 3, 5]);
    assert_eq!(execute(&plan, &batch), rows);
}

#[test]
fn tautologies_erase_the_filter() {
    // id < 5 OR TRUE simplifies away entirely.
    let condition = or(
        comparison(CompareOp::Lt, id_col(), int(5)),
        expr::true_literal(),
    );
    let plan = filter_plan(condition);
    let (optimized, stats) = Optimizer::new().optimize(plan).unwrap();
    assert_eq!(optimized.node_type(), NodeType::Scan);
    assert!(stats.get("redundant_filter_removed") >= 1);
}

#[test]
fn optimizer_is_idempotent_on_its_own_output() {
    let condition = expr::and(
        comparison(CompareOp::Gt, id_col(), int(5)),
        expr::and(
            comparison(CompareOp::Lt, id_col(), int(10)),
            comparison(CompareOp::Gt, id_col(), int(7)),
        ),
    );
    let (once, _) = Optimizer::new().optimize(filter_plan(condition)).unwrap();
    let (twice, stats) = Optimizer::new().optimize(once.deep_copy()).unwrap();

    let batch = id_batch(12);
    assert_eq!(execute(&once, &batch), execute(&twice, &batch));
    assert_eq!(stats.get("compaction_range_simplified"), 0);
    assert_eq!(stats.get("contradiction_detected"), 0);
}
