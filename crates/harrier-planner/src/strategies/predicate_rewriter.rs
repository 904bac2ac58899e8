//! Predicate rewriting into cheaper or more pushable equivalents.
//!
//! Rules:
//! - `x IN (v)` becomes `x = v`
//! - `x LIKE 'literal'` with no wildcard becomes `x = 'literal'`
//! - `x LIKE '%p%'` becomes `INSTR(x, 'p') > 0`
//! - `STARTS_WITH(x, p)` / `ENDS_WITH(x, p)` become anchored LIKEs
//! - `x LIKE p1 OR x LIKE p2` becomes `REGEX_MATCH(x, p1|p2)`
//! - `x = v1 OR x = v2 OR ...` becomes `x IN (v1, v2, ...)`
//! - `CASE WHEN c THEN c ELSE FALSE` collapses to `c`

use harrier_error::Result;
use harrier_plan::expr::{
    self, column_op_literal, comparison_op, flatten_or_chain, is_false_literal,
};
use harrier_plan::{AttrValue, ColumnRef, CompareOp, NodeType, PlanNode};
use harrier_types::ScalarValue;

use crate::strategies::support::map_expr_attr;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct PredicateRewriter;

impl OptimizerStrategy for PredicateRewriter {
    fn name(&self) -> &'static str {
        "predicate_rewriter"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        if node.node_type() == NodeType::Filter {
            map_expr_attr(&mut node, "condition", |condition| {
                Ok(rewrite(condition, context))
            })?;
        }
        Ok(node)
    }
}

fn rewrite(mut expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    for name in ["left", "right", "input"] {
        if let Some(AttrValue::Node(child)) = expr.take_attr(name) {
            expr.set_attr(
                name,
                Some(AttrValue::Node(Box::new(rewrite(*child, context)))),
            );
        }
    }

    match expr.node_type() {
        NodeType::Comparison => rewrite_comparison(expr, context),
        NodeType::Or => rewrite_disjunction(expr, context),
        NodeType::FunctionCall => rewrite_function(expr, context),
        _ => expr,
    }
}

fn rewrite_comparison(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let Some(op) = comparison_op(&expr) else {
        return expr;
    };
    match op {
        // x IN (v) -> x = v
        CompareOp::In => {
            let Some(right) = expr.node_attr("right") else {
                return expr;
            };
            if right.node_type() == NodeType::ExpressionList {
                if let Some([only]) = right.nodes_attr("items") {
                    let left = expr
                        .node_attr("left")
                        .map(PlanNode::deep_copy)
                        .unwrap_or_else(expr::true_literal);
                    context.stats.increment("rewrite_in_singleton");
                    return expr::comparison(CompareOp::Eq, left, only.deep_copy());
                }
            }
            expr
        }
        CompareOp::Like => rewrite_like(expr, context),
        _ => expr,
    }
}

fn rewrite_like(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let Some(pattern) = like_pattern(&expr) else {
        return expr;
    };
    let Some(left) = expr.node_attr("left") else {
        return expr;
    };

    // No wildcard at all: plain equality.
    if !pattern.contains('%') && !pattern.contains('_') {
        context.stats.increment("rewrite_like_exact");
        return expr::comparison(
            CompareOp::Eq,
            left.deep_copy(),
            expr::literal(ScalarValue::Utf8(pattern)),
        );
    }

    // %p% with a wildcard-free needle: containment test.
    if let Some(needle) = pattern
        .strip_prefix('%')
        .and_then(|p| p.strip_suffix('%'))
    {
        if !needle.is_empty() && !needle.contains('%') && !needle.contains('_') {
            context.stats.increment("rewrite_like_contains");
            let instr = expr::function_call(
                "instr",
                vec![
                    left.deep_copy(),
                    expr::literal(ScalarValue::Utf8(needle.to_owned())),
                ],
            );
            return expr::comparison(
                CompareOp::Gt,
                instr,
                expr::literal(ScalarValue::Int64(0)),
            );
        }
    }
    expr
}

fn rewrite_function(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let Some(name) = expr.text_attr("name") else {
        return expr;
    };
    match name {
        // STARTS_WITH(x, p) -> x LIKE 'p%'
        "starts_with" | "ends_with" => {
            let is_prefix = name == "starts_with";
            let Some([subject, needle]) = expr.nodes_attr("args") else {
                return expr;
            };
            let Some(ScalarValue::Utf8(needle)) = needle.scalar_attr("value") else {
                return expr;
            };
            if needle.contains('%') || needle.contains('_') {
                return expr;
            }
            let pattern = if is_prefix {
                format!("{needle}%")
            } else {
                format!("%{needle}")
            };
            context.stats.increment(if is_prefix {
                "rewrite_starts_with"
            } else {
                "rewrite_ends_with"
            });
            expr::comparison(
                CompareOp::Like,
                subject.deep_copy(),
                expr::literal(ScalarValue::Utf8(pattern)),
            )
        }
        // CASE WHEN c THEN c ELSE FALSE -> c (by node identity).
        "case_when" => {
            let Some([when, then, otherwise]) = expr.nodes_attr("args") else {
                return expr;
            };
            if when.same_node(then) && is_false_literal(otherwise) {
                context.stats.increment("rewrite_case_collapsed");
                return when.deep_copy();
            }
            expr
        }
        _ => expr,
    }
}

fn rewrite_disjunction(expr: PlanNode, context: &mut OptimizeContext) -> PlanNode {
    let disjuncts = flatten_or_chain(&expr);
    if disjuncts.len() < 2 {
        return expr;
    }

    // x = v1 OR x = v2 OR ... -> x IN (v1, v2, ...)
    if let Some(column) = common_column(&disjuncts, CompareOp::Eq) {
        context.stats.increment("rewrite_eq_chain_to_in");
        let items: Vec<PlanNode> = disjuncts
            .iter()
            .filter_map(|d| d.node_attr("right").map(PlanNode::deep_copy))
            .collect();
        return expr::comparison(
            CompareOp::In,
            expr::identifier(column),
            expr::expression_list(items),
        );
    }

    // x LIKE p1 OR x LIKE p2 -> REGEX_MATCH(x, p1|p2)
    if let Some(column) = common_column(&disjuncts, CompareOp::Like) {
        let patterns: Vec<String> = disjuncts
            .iter()
            .filter_map(|d| like_pattern(d).map(|p| like_to_regex(&p)))
            .collect();
        if patterns.len() == disjuncts.len() {
            context.stats.increment("rewrite_like_union");
            return expr::function_call(
                "regex_match",
                vec![
                    expr::identifier(column),
                    expr::literal(ScalarValue::Utf8(patterns.join("|"))),
                ],
            );
        }
    }
    expr
}

/// The shared left column when every disjunct is `column op literal`
/// with the given operator and one column identity.
fn common_column(disjuncts: &[&PlanNode], op: CompareOp) -> Option<ColumnRef> {
    let mut column: Option<ColumnRef> = None;
    for disjunct in disjuncts {
        let (this_column, this_op, _value) = column_op_literal(disjunct)?;
        if this_op != op {
            return None;
        }
        match &column {
            None => column = Some(this_column.clone()),
            Some(existing) if existing == this_column => {}
            Some(_) => return None,
        }
    }
    column
}

/// The string pattern of `x LIKE 'pattern'`, if that is the shape.
fn like_pattern(node: &PlanNode) -> Option<String> {
    let (_, op, value) = column_op_literal(node)?;
    if op != CompareOp::Like {
        return None;
    }
    match value {
        ScalarValue::Utf8(pattern) => Some(pattern.clone()),
        _ => None,
    }
}

/// Translate a LIKE pattern to an anchored regex alternative branch.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|'
            | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}
