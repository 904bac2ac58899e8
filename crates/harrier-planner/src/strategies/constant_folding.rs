//! Constant folding over expression trees.
//!
//! Literal-only comparisons and boolean operators reduce to their value.
//! A comparison between incompatible literal types is a fatal
//! `TypeMismatch`: the plan is rejected rather than executed with a
//! coercion the user never wrote. Comparisons involving NULL fold to
//! nothing (three-valued logic leaves them to the executor).

use harrier_error::Result;
use harrier_plan::expr::{self, comparison_op, is_false_literal, is_true_literal};
use harrier_plan::{AttrValue, CompareOp, NodeType, PlanNode};
use harrier_types::ScalarValue;

use crate::strategies::support::map_expr_attr;
use crate::{OptimizeContext, OptimizerStrategy};

pub struct ConstantFolding;

impl OptimizerStrategy for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant_folding"
    }

    fn visit(&self, mut node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
        match node.node_type() {
            NodeType::Filter => map_expr_attr(&mut node, "condition", |e| fold(e, context))?,
            NodeType::Join => map_expr_attr(&mut node, "on", |e| fold(e, context))?,
            _ => {}
        }
        Ok(node)
    }
}

fn fold(mut expr: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
    for name in ["left", "right", "input"] {
        if let Some(AttrValue::Node(child)) = expr.take_attr(name) {
            expr.set_attr(name, Some(AttrValue::Node(Box::new(fold(*child, context)?))));
        }
    }

    match expr.node_type() {
        NodeType::Comparison => fold_comparison(expr, context),
        NodeType::And => {
            let (Some(left), Some(right)) = (expr.node_attr("left"), expr.node_attr("right"))
            else {
                return Ok(expr);
            };
            if is_false_literal(left) || is_false_literal(right) {
                context.stats.increment("constant_folded");
                return Ok(expr::false_literal());
            }
            if is_true_literal(left) && is_true_literal(right) {
                context.stats.increment("constant_folded");
                return Ok(expr::true_literal());
            }
            Ok(expr)
        }
        NodeType::Or => {
            let (Some(left), Some(right)) = (expr.node_attr("left"), expr.node_attr("right"))
            else {
                return Ok(expr);
            };
            if is_true_literal(left) || is_true_literal(right) {
                context.stats.increment("constant_folded");
                return Ok(expr::true_literal());
            }
            if is_false_literal(left) && is_false_literal(right) {
                context.stats.increment("constant_folded");
                return Ok(expr::false_literal());
            }
            Ok(expr)
        }
        NodeType::Not => {
            let Some(inner) = expr.node_attr("input") else {
                return Ok(expr);
            };
            if is_true_literal(inner) {
                context.stats.increment("constant_folded");
                return Ok(expr::false_literal());
            }
            if is_false_literal(inner) {
                context.stats.increment("constant_folded");
                return Ok(expr::true_literal());
            }
            Ok(expr)
        }
        _ => Ok(expr),
    }
}

fn fold_comparison(expr: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode> {
    let Some(op) = comparison_op(&expr) else {
        return Ok(expr);
    };
    if !op.is_ordering() {
        return Ok(expr);
    }
    let (Some(left), Some(right)) = (expr.node_attr("left"), expr.node_attr("right")) else {
        return Ok(expr);
    };
    if left.node_type() != NodeType::Literal || right.node_type() != NodeType::Literal {
        return Ok(expr);
    }
    let (Some(lhs), Some(rhs)) = (left.scalar_attr("value"), right.scalar_attr("value")) else {
        return Ok(expr);
    };

    // TypeMismatch propagates: the plan is rejected.
    let Some(ordering) = lhs.try_compare(rhs)? else {
        // NULL comparison: unknown, leave to the executor.
        return Ok(expr);
    };

    let truth = match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::NotEq => !ordering.is_eq(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::LtEq => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::GtEq => ordering.is_ge(),
        _ => return Ok(expr),
    };
    context.stats.increment("constant_folded");
    Ok(if truth {
        expr::true_literal()
    } else {
        expr::false_literal()
    })
}
