//! A main-memory, column-oriented relational engine.
//!
//! SQL text is parsed by the external `sqlparser` crate, translated into a
//! logical query plan (a DAG of relational-algebra nodes), rewritten by a
//! rule-based optimizer, turned into a physical operator DAG and executed as
//! tasks on the NUMA-aware scheduler, under MVCC transaction control.
//!
//! The [`engine::Engine`] value owns all shared state; see
//! [`engine::Session`] for the driver-facing entry point.

pub mod concurrency;
pub mod engine;
pub mod execution;
pub mod explain;
pub mod expr;
pub mod logical;
pub mod optimizer;
pub mod sql;
pub mod statistics;
pub mod storage;
