//! Logical plan graph.
//!
//! Plans are trees of [`PlanNode`]: a discriminated `node_type` tag, a
//! stable identifier minted at construction, and an open attribute map.
//! Relational nodes and expression nodes share the same shape; the
//! attribute names below are the conventions the optimizer relies on.
//!
//! Relational nodes:
//! - `Scan`: `relation` (text), optional `projection` (nodes),
//!   `statistics` (payload)
//! - `Filter`: `input` (node), `condition` (node)
//! - `Project`: `input`, `columns` (nodes)
//! - `Join`: `left`, `right`, `join_type` (text: `inner`, `left`,
//!   `right`, `full`, `semi`, `anti`, `cross`), `on` (node), optional
//!   `not_exists` (flag)
//! - `Aggregate`: `input`, `group_by` (nodes), `aggregates` (nodes)
//! - `Distinct` / `Sort`: `input` (+ `order_by` for sort)
//! - `Limit`: `input`, `count` (scalar)
//! - `Subquery`: `input`, optional `correlated` (flag)
//!
//! Expression nodes:
//! - `Comparison`: `op` (text, see [`expr::CompareOp`]), `left`, `right`
//! - `And` / `Or`: `left`, `right` (chains are right-leaning)
//! - `Not` / `Nested`: `input`
//! - `Literal`: `value` (scalar)
//! - `Identifier`: `column` (column ref)
//! - `ExpressionList`: `items` (nodes)
//! - `FunctionCall`: `name` (text), `args` (nodes)

pub mod expr;
pub mod node;

pub use expr::CompareOp;
pub use node::{AttrValue, ColumnRef, NodeId, NodeType, PlanNode};
