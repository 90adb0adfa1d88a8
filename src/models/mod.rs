// src/models/mod.rs

//! Domain models for the mirror.
//!
//! Query inputs (`TimeRange`, `QuerySpec`), fetched documents (`Record`),
//! the in-memory `Catalog` tree, layout templates and configuration.

pub mod catalog;
mod config;
mod query;
pub mod range;
mod record;
pub mod template;

// Re-export all public types
pub use catalog::{Catalog, Node, NodeId, NodeKind};
pub use config::{Config, HarvestConfig, LayoutConfig};
pub use query::QuerySpec;
pub use range::TimeRange;
pub use record::{Link, REFERENCE_RELS, Record, STAC_VERSION, is_path_segment};
pub use template::{DEFAULT_ITEM_TEMPLATE, PathTemplate};
