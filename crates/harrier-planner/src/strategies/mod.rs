//! Optimizer strategies, one module per rule, run in the fixed pipeline
//! order assembled by [`crate::Optimizer::new`].

pub mod boolean_simplification;
pub mod constant_folding;
pub mod correlated_filters;
pub mod distinct_pushdown;
pub mod join_ordering;
pub mod join_rewriter;
pub mod limit_pushdown;
pub mod operator_fusion;
pub mod predicate_compaction;
pub mod predicate_ordering;
pub mod predicate_pushdown;
pub mod predicate_rewriter;
pub mod projection_pushdown;
pub mod redundant_operators;
pub mod split_conjunctions;
pub(crate) mod support;
