//! Catalog documents: search-result records and branch descriptors.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::range::parse_timestamp;
use crate::error::{AppError, Result};

/// Default STAC version for generated descriptors.
pub const STAC_VERSION: &str = "1.0.0";

/// Link relations that reference child documents.
pub const REFERENCE_RELS: [&str; 2] = ["child", "item"];

/// Whether `name` can be used as a single path segment.
///
/// Empty names, `.`, `..` and names containing a path separator are rejected.
pub fn is_path_segment(name: &str) -> bool {
    !name.trim().is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// A named reference to a related document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,

    /// Media type, title and any other link attributes
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            extra: Map::new(),
        }
    }

    /// Attach a media type.
    pub fn with_type(mut self, media_type: &str) -> Self {
        self.extra
            .insert("type".to_string(), Value::String(media_type.to_string()));
        self
    }

    /// Whether this link points at a child catalog or item.
    pub fn is_reference(&self) -> bool {
        REFERENCE_RELS.contains(&self.rel.as_str())
    }
}

/// An opaque JSON document with a stable `id` and `links`.
///
/// Everything other than `id` and `links` is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,

    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Parse a record from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let record: Record = serde_json::from_value(value)
            .map_err(|e| AppError::parse(format!("invalid record: {e}")))?;
        if record.id.trim().is_empty() {
            return Err(AppError::parse("record has an empty id"));
        }
        if !is_path_segment(&record.id) {
            return Err(AppError::parse(format!(
                "record id '{}' is not a valid path segment",
                record.id
            )));
        }
        Ok(record)
    }

    /// Parse a record from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| AppError::parse(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build an empty catalog descriptor.
    pub fn catalog(id: impl Into<String>, description: impl Into<String>, stac_version: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("type".into(), Value::String("Catalog".into()));
        fields.insert("stac_version".into(), Value::String(stac_version.into()));
        fields.insert("description".into(), Value::String(description.into()));
        Self {
            id: id.into(),
            links: Vec::new(),
            fields,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The document's `type` field (`Feature`, `Catalog`, `Collection`).
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    pub fn is_collection(&self) -> bool {
        self.kind() == Some("Collection")
    }

    pub fn stac_version(&self) -> Option<&str> {
        self.fields.get("stac_version").and_then(Value::as_str)
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.fields.get("properties").and_then(Value::as_object)
    }

    /// Look up a property as text; numbers are rendered as-is.
    pub fn property_text(&self, name: &str) -> Option<String> {
        match self.properties()?.get(name)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Effective timestamp: `datetime`, else `start_datetime`.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        let properties = self.properties()?;
        ["datetime", "start_datetime"]
            .iter()
            .filter_map(|key| properties.get(*key).and_then(Value::as_str))
            .find_map(parse_timestamp)
    }

    /// First link with the given relation.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Remove links matching `pred`, returning them.
    pub fn remove_links(&mut self, mut pred: impl FnMut(&Link) -> bool) -> Vec<Link> {
        let (removed, kept): (Vec<Link>, Vec<Link>) = std::mem::take(&mut self.links)
            .into_iter()
            .partition(|l| pred(l));
        self.links = kept;
        removed
    }
}
