//! Service layer for the mirror.
//!
//! This module contains the harvest and assembly logic:
//! - Remote API access (`RemoteReader`, `HttpReader`)
//! - Result-set sizing (`CardinalityProbe`)
//! - Concurrent paging with retry (`PagedFetcher`, `RetryPolicy`)
//! - Date-range batching (`splitter`)
//! - Tree assembly and persistence (`TreeAssembler`)
//! - Record validation (`RecordValidator`)

mod assembler;
mod fetcher;
pub mod layout;
#[cfg(test)]
pub(crate) mod mock;
mod probe;
mod remote;
mod retry;
pub mod splitter;
mod validator;

pub use assembler::{PersistSummary, TreeAssembler};
pub use fetcher::{PagedFetcher, parse_features};
pub use probe::{CardinalityProbe, matched_count};
pub use remote::{HttpReader, RemoteReader};
pub use retry::RetryPolicy;
pub use validator::{AcceptAll, RecordValidator, StacItemValidator};
