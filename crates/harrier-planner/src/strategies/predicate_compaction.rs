//! Predicate compaction: range consolidation and contradiction
//! detection over the conjuncts of each filter.
//!
//! Conjuncts of shape `column op literal` with an order comparison are
//! grouped by column identity and accumulated into a per-column
//! [`ValueRange`]. Each range then regenerates at most two conjuncts
//! (one lower, one upper bound), or a single equality when the bounds
//! coincide inclusively. An impossible range rewrites the whole filter
//! to literal FALSE so the executor can short-circuit. Conjuncts of any
//! other shape pass through untouched.

use std::cmp::Ordering;

use harrier_error::Result;
use harrier_plan::expr::{
    self, column_op_literal, flatten_and_chain, rebuild_and_chain,
};
use harrier_plan::{ColumnRef, CompareOp, NodeType, PlanNode};
use harrier_types::ScalarValue;

use crate::strategies::support::map_expr_attr;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct PredicateCompaction;

impl OptimizerStrategy for PredicateCompaction {
    fn name(&self) -> &'static str {
        "predicate_compaction"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() == NodeType::Filter {
            map_expr_attr(&mut node, "condition", |condition| {
                Ok(compact_condition(condition, context))
            })?;
        }
        Ok(node)
    }
}

/// One bound of a range: the literal plus inclusivity.
#[derive(Debug, Clone)]
struct Limit {
    value: ScalarValue,
    inclusive: bool,
}

/// Accumulated range of every tracked predicate on one column.
#[derive(Debug, Clone, Default)]
struct ValueRange {
    lower: Option<Limit>,
    upper: Option<Limit>,
    /// Set when a conjunct makes range reasoning unsound; the group's
    /// original conjuncts are preserved verbatim.
    untrackable: bool,
}

impl ValueRange {
    fn apply(&mut self, op: CompareOp, value: &ScalarValue) {
        match op {
            CompareOp::Eq => {
                self.raise_lower(value, true);
                self.lower_upper(value, true);
            }
            CompareOp::Gt => self.raise_lower(value, false),
            CompareOp::GtEq => self.raise_lower(value, true),
            CompareOp::Lt => self.lower_upper(value, false),
            CompareOp::LtEq => self.lower_upper(value, true),
            _ => self.untrackable = true,
        }
    }

    /// Raise the lower bound iff the candidate is more restrictive.
    /// Ties resolve to exclusive.
    fn raise_lower(&mut self, value: &ScalarValue, inclusive: bool) {
        match &self.lower {
            None => {
                self.lower = Some(Limit {
                    value: value.clone(),
                    inclusive,
                });
            }
            Some(existing) => match compare(value, &existing.value) {
                Some(Ordering::Greater) => {
                    self.lower = Some(Limit {
                        value: value.clone(),
                        inclusive,
                    });
                }
                Some(Ordering::Equal) => {
                    if existing.inclusive && !inclusive {
                        self.lower = Some(Limit {
                            value: value.clone(),
                            inclusive: false,
                        });
                    }
                }
                Some(Ordering::Less) => {}
                None => self.untrackable = true,
            },
        }
    }

    /// Lower the upper bound iff the candidate is more restrictive.
    fn lower_upper(&mut self, value: &ScalarValue, inclusive: bool) {
        match &self.upper {
            None => {
                self.upper = Some(Limit {
                    value: value.clone(),
                    inclusive,
                });
            }
            Some(existing) => match compare(value, &existing.value) {
                Some(Ordering::Less) => {
                    self.upper = Some(Limit {
                        value: value.clone(),
                        inclusive,
                    });
                }
                Some(Ordering::Equal) => {
                    if existing.inclusive && !inclusive {
                        self.upper = Some(Limit {
                            value: value.clone(),
                            inclusive: false,
                        });
                    }
                }
                Some(Ordering::Greater) => {}
                None => self.untrackable = true,
            },
        }
    }

    /// An empty range: `lower > upper`, or equal with an exclusive end.
    fn is_contradiction(&self) -> bool {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return false;
        };
        match compare(&lower.value, &upper.value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => !(lower.inclusive && upper.inclusive),
            _ => false,
        }
    }

    /// Regenerate the minimal conjunct list for this range.
    fn regenerate(&self, column: &ColumnRef) -> Vec<PlanNode> {
        let column_node = || expr::identifier(column.clone());
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            if lower.inclusive
                && upper.inclusive
                && compare(&lower.value, &upper.value) == Some(Ordering::Equal)
            {
                return vec![expr::comparison(
                    CompareOp::Eq,
                    column_node(),
                    expr::literal(lower.value.clone()),
                )];
            }
        }
        let mut out = Vec::new();
        if let Some(lower) = &self.lower {
            let op = if lower.inclusive {
                CompareOp::GtEq
            } else {
                CompareOp::Gt
            };
            out.push(expr::comparison(
                op,
                column_node(),
                expr::literal(lower.value.clone()),
            ));
        }
        if let Some(upper) = &self.upper {
            let op = if upper.inclusive {
                CompareOp::LtEq
            } else {
                CompareOp::Lt
            };
            out.push(expr::comparison(
                op,
                column_node(),
                expr::literal(upper.value.clone()),
            ));
        }
        out
    }
}

/// Ordering of two literals; `None` when incomparable (which makes the
/// group untrackable, never an error here).
fn compare(a: &ScalarValue, b: &ScalarValue) -> Option<Ordering> {
    a.try_compare(b).ok().flatten()
}

/// Whether a literal belongs to an ordered scalar type the range
/// tracker understands.
fn is_ordered_scalar(value: &ScalarValue) -> bool {
    matches!(
        value,
        ScalarValue::Int64(_)
            | ScalarValue::Float64(_)
            | ScalarValue::Timestamp(_)
            | ScalarValue::Utf8(_)
            | ScalarValue::Bytes(_)
    )
}

fn compact_condition(condition: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let conjuncts = flatten_and_chain(&condition);
    if conjuncts.len() < 2 {
        return condition;
    }

    // Group trackable conjuncts by column identity, first-seen order.
    let mut groups: Vec<(ColumnRef, ValueRange, usize)> = Vec::new();
    let mut preserved: Vec<PlanNode> = Vec::new();

    for conjunct in conjuncts {
        let trackable = column_op_literal(conjunct).and_then(|(column, op, value)| {
            let range_op = matches!(
                op,
                CompareOp::Eq | CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq
            );
            (range_op && is_ordered_scalar(value)).then(|| (column.clone(), op, value.clone()))
        });
        match trackable {
            Some((column, op, value)) => {
                let group = groups.iter_mut().find(|(c, _, _)| *c == column);
                match group {
                    Some((_, range, count)) => {
                        range.apply(op, &value);
                        *count += 1;
                    }
                    None => {
                        let mut range = ValueRange::default();
                        range.apply(op, &value);
                        groups.push((column, range, 1));
                    }
                }
            }
            None => preserved.push(conjunct.deep_copy()),
        }
    }

    let mut regenerated: Vec<PlanNode> = Vec::new();
    for (column, range, original_count) in groups {
        if range.untrackable {
            // The whole group reverts to its original shape; the
            // conjuncts were consumed, so rebuild them from the range is
            // unsound. Give up on this filter entirely.
            return condition;
        }
        if range.is_contradiction() {
            context.stats.increment("contradiction_detected");
            return expr::false_literal();
        }
        let conjuncts = range.regenerate(&column);
        if conjuncts.len() < original_count {
            context.stats.increment("compaction_range_simplified");
        }
        regenerated.extend(conjuncts);
    }

    regenerated.extend(preserved);
    if regenerated.is_empty() {
        return condition;
    }
    rebuild_and_chain(regenerated)
}
