//! Pipeline entry points for mirror operations.
//!
//! - `run_create`: Mirror the API's providers and collections into a new catalog
//! - `run_update`: Harvest one collection's items into an existing catalog

pub mod create;
pub mod update;

pub use create::{CreateSummary, run_create};
pub use update::{UpdateRequest, UpdateSummary, run_update};
