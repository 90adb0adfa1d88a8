//! Path templates mapping a record to its subcatalog path.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, Timelike};
use regex::Regex;

use super::{Record, is_path_segment};
use crate::error::{AppError, Result};

/// Default layout: one subcatalog per year, month and day.
pub const DEFAULT_ITEM_TEMPLATE: &str = "${year}/${month}/${day}";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder regex is valid"))
}

/// A value substituted into a template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Year,
    Month,
    Day,
    Hour,
    /// Any other name is looked up in the record's `properties`
    Property(String),
}

impl Field {
    fn from_name(name: &str) -> Self {
        match name {
            "year" => Field::Year,
            "month" => Field::Month,
            "day" => Field::Day,
            "hour" => Field::Hour,
            other => Field::Property(other.to_string()),
        }
    }

    fn is_temporal(&self) -> bool {
        !matches!(self, Field::Property(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(Field),
}

/// A parsed template such as `${year}/${month}/${day}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Vec<Piece>>,
}

impl PathTemplate {
    /// Parse a template, rejecting empty segments and empty placeholders.
    pub fn parse(template: &str) -> Result<Self> {
        let trimmed = template.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(AppError::validation("item template is empty"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(AppError::validation(format!(
                    "item template '{template}' has an empty segment"
                )));
            }

            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(AppError::validation(format!(
                    "item template '{template}' has an invalid segment '{segment}'"
                )));
            }

            let mut pieces = Vec::new();
            let mut last = 0;
            for caps in placeholder_re().captures_iter(segment) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let name = caps[1].trim();
                if name.is_empty() {
                    return Err(AppError::validation(format!(
                        "item template '{template}' has an empty placeholder"
                    )));
                }
                if whole.start() > last {
                    pieces.push(Piece::Literal(segment[last..whole.start()].to_string()));
                }
                pieces.push(Piece::Field(Field::from_name(name)));
                last = whole.end();
            }
            if last < segment.len() {
                pieces.push(Piece::Literal(segment[last..].to_string()));
            }
            segments.push(pieces);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Number of branch levels this template produces.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Compute the branch names for a record.
    ///
    /// Returns `None` when a temporal placeholder is used and the record has
    /// no usable timestamp, a property placeholder is missing, or a segment
    /// would not be a plain directory name (`..`, `.`, a backslash).
    pub fn apply(&self, record: &Record) -> Option<Vec<String>> {
        let needs_time = self
            .segments
            .iter()
            .flatten()
            .any(|p| matches!(p, Piece::Field(f) if f.is_temporal()));
        let timestamp = if needs_time {
            Some(record.datetime()?)
        } else {
            None
        };

        self.segments
            .iter()
            .map(|pieces| {
                let mut name = String::new();
                for piece in pieces {
                    match piece {
                        Piece::Literal(text) => name.push_str(text),
                        Piece::Field(Field::Property(prop)) => {
                            name.push_str(&record.property_text(prop)?.replace('/', "_"))
                        }
                        Piece::Field(field) => {
                            let ts = timestamp?;
                            let value = match field {
                                Field::Year => format!("{:04}", ts.year()),
                                Field::Month => format!("{:02}", ts.month()),
                                Field::Day => format!("{:02}", ts.day()),
                                Field::Hour => format!("{:02}", ts.hour()),
                                Field::Property(_) => unreachable!("handled above"),
                            };
                            name.push_str(&value);
                        }
                    }
                }
                is_path_segment(&name).then_some(name)
            })
            .collect()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
