//! Structural checks applied to harvested records.

use serde_json::Value;

use crate::models::Record;

/// Decides whether a record is kept.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, record: &Record) -> bool;
}

/// Keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RecordValidator for AcceptAll {
    fn validate(&self, _record: &Record) -> bool {
        true
    }
}

/// Minimal STAC item shape: a `Feature` with a `properties` object and a
/// `geometry` member (which may be null).
#[derive(Debug, Clone, Copy, Default)]
pub struct StacItemValidator;

impl RecordValidator for StacItemValidator {
    fn validate(&self, record: &Record) -> bool {
        record.kind() == Some("Feature")
            && record.fields.get("properties").is_some_and(Value::is_object)
            && record.fields.contains_key("geometry")
    }
}
