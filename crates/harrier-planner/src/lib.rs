//! Rule-based logical-plan optimizer.
//!
//! A fixed pipeline of strategies transforms a logical plan into a
//! semantically equivalent one with simpler expressions, more pushable
//! predicates, and earlier filtering. Each strategy exposes a node-wise
//! `visit` applied bottom-up plus a whole-plan `complete`, and may skip
//! plans that cannot contain its target shapes via `should_run`. Every
//! rewrite increments a named counter in the per-query statistics; a
//! strategy that cannot prove a rewrite equivalent leaves the subtree
//! alone.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug_span;

use harrier_error::Result;
use harrier_plan::{AttrValue, PlanNode};

pub mod stats;
pub mod strategies;

pub use stats::RelationStatistics;

/// Per-query named rewrite counters. Not process-wide: one instance per
/// optimization run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct QueryStatistics {
    counters: BTreeMap<String, u64>,
}

impl QueryStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &str) {
        *self.counters.entry(name.to_owned()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }
}

/// Shared state threaded through one strategy run.
#[derive(Debug, Default)]
pub struct OptimizeContext {
    pub stats: QueryStatistics,
}

/// One rewrite rule of the pipeline.
pub trait OptimizerStrategy {
    /// Strategy name, used for tracing spans and diagnostics.
    fn name(&self) -> &'static str;

    /// Cheap gate: skip plans that cannot contain the target shape.
    fn should_run(&self, _plan: &PlanNode) -> bool {
        true
    }

    /// Node-wise rewrite, applied to every relational node bottom-up.
    fn visit(&self, node: PlanNode, context: &mut OptimizeContext) -> Result<PlanNode>;

    /// Whole-plan pass after traversal.
    fn complete(&self, plan: PlanNode, _context: &mut OptimizeContext) -> Result<PlanNode> {
        Ok(plan)
    }
}

/// Relational child attributes traversed by the driver.
const CHILD_ATTRS: [&str; 3] = ["input", "left", "right"];

/// Apply a strategy's `visit` bottom-up across the relational tree.
fn rewrite_bottom_up(
    strategy: &dyn OptimizerStrategy,
    mut node: PlanNode,
    context: &mut OptimizeContext,
) -> Result<PlanNode> {
    for name in CHILD_ATTRS {
        if let Some(AttrValue::Node(child)) = node.take_attr(name) {
            let rewritten = rewrite_bottom_up(strategy, *child, context)?;
            node.set_attr(name, Some(AttrValue::Node(Box::new(rewritten))));
        }
    }
    strategy.visit(node, context)
}

/// Run one strategy over a plan.
pub fn run_strategy(
    strategy: &dyn OptimizerStrategy,
    plan: PlanNode,
    context: &mut OptimizeContext,
) -> Result<PlanNode> {
    if !strategy.should_run(&plan) {
        return Ok(plan);
    }
    let _span = debug_span!("optimizer_strategy", name = strategy.name()).entered();
    let plan = rewrite_bottom_up(strategy, plan, context)?;
    strategy.complete(plan, context)
}

/// The fixed-order rule pipeline.
pub struct Optimizer {
    strategies: Vec<Box<dyn OptimizerStrategy>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Assemble the pipeline in its fixed order. Constant folding runs
    /// twice: once early so later strategies see folded literals, once
    /// last to fold what the other rewrites exposed.
    #[must_use]
    pub fn new() -> Self {
        use strategies::{
            boolean_simplification::BooleanSimplification,
            constant_folding::ConstantFolding,
            correlated_filters::CorrelatedFilters,
            distinct_pushdown::DistinctPushdown,
            join_ordering::JoinOrdering,
            join_rewriter::JoinRewriter,
            limit_pushdown::LimitPushdown,
            operator_fusion::OperatorFusion,
            predicate_compaction::PredicateCompaction,
            predicate_ordering::PredicateOrdering,
            predicate_pushdown::PredicatePushdown,
            predicate_rewriter::PredicateRewriter,
            projection_pushdown::ProjectionPushdown,
            redundant_operators::RedundantOperators,
            split_conjunctions::SplitConjunctivePredicates,
        };

        Self {
            strategies: vec![
                Box::new(BooleanSimplification),
                Box::new(ConstantFolding),
                Box::new(CorrelatedFilters),
                Box::new(PredicateCompaction),
                Box::new(SplitConjunctivePredicates),
                Box::new(PredicateRewriter),
                Box::new(PredicateOrdering),
                Box::new(PredicatePushdown),
                Box::new(ProjectionPushdown),
                Box::new(DistinctPushdown),
                Box::new(LimitPushdown),
                Box::new(JoinRewriter),
                Box::new(JoinOrdering),
                Box::new(OperatorFusion),
                Box::new(RedundantOperators),
                Box::new(ConstantFolding),
            ],
        }
    }

    /// Optimize a plan, returning the rewritten plan and the per-query
    /// rewrite counters.
    pub fn optimize(&self, plan: PlanNode) -> Result<(PlanNode, QueryStatistics)> {
        let mut context = OptimizeContext::default();
        let mut plan = plan;
        for strategy in &self.strategies {
            plan = run_strategy(strategy.as_ref(), plan, &mut context)?;
        }
        Ok((plan, context.stats))
    }
}
