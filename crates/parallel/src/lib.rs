//! # rivulet parallel
//!
//! Execution strategies for the rivulet routing engine.
//!
//! This crate provides:
//! - `Executor`: sequential or rayon-backed execution with a reusable pool
//! - `sweep_layers`: layer-by-layer parallel updates with deterministic results
//! - `reduce_by_key`: per-sub-basin totals from per-worker partial arrays
//! - `BoundaryExchange`: blocking mailboxes between reach groups

pub mod exchange;
pub mod layered;
pub mod reduce;
pub mod strategy;

pub use exchange::{BoundaryExchange, Mailbox, Postman};
pub use layered::sweep_layers;
pub use reduce::{reduce_by_key, REDUCE_CHUNK};
pub use strategy::{num_cpus, Executor, ParallelStrategy, ProcessingMode};
