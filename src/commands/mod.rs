//! Command implementations for the brewsmith CLI
//!
//! - **install**: the pipeline commands (`install`, `test`, `fetch`)
//! - **query**: read-only inspection (`info`, `list`)

pub mod install;
pub mod query;

pub use install::{fetch, install, report_error, test};
pub use query::{info, list};
