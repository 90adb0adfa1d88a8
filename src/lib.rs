// src/lib.rs

//! Catalog mirror library
//!
//! Harvests a paginated STAC search API and assembles the records into a
//! static, date-partitioned catalog on local disk or S3.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
