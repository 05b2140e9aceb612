//! Relational measurement store.
//!
//! `Measurements` holds the generic record of every capture; each tool has its
//! own child table keyed by `measure_id`. Repositories add query methods to
//! [`Database`] in separate `impl` blocks.

pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{CompositeView, Measure, NewMeasure, OnConflict, ToolKind, ToolReading};
