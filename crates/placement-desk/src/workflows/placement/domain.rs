use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable roster identifier (the `student_id` column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Originator of one criteria message per run, usually a recruiter address.
/// Stored trimmed and lower-cased, so `HR@acme.test` and `hr@acme.test` share
/// one status column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_lowercase())
    }

    /// Splits a comma separated list, dropping blanks.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(Self::new)
            .collect()
    }

    pub fn status_column(&self) -> String {
        format!("{STATUS_COLUMN_PREFIX}{}", self.0)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const STATUS_COLUMN_PREFIX: &str = "status_";

static MISSING: AttributeValue = AttributeValue::Missing;

/// Declared type of an eligibility attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Numeric,
    Categorical,
}

/// Typed cell value used for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Numeric(f64),
    Categorical(String),
    Missing,
}

impl AttributeValue {
    /// Types a raw cell. Numeric columns fall back to categorical text when the
    /// cell does not parse, which keeps it out of every threshold clause.
    pub fn from_cell(raw: &str, kind: Option<AttributeKind>) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }

        match kind {
            Some(AttributeKind::Numeric) => match trimmed.parse::<f64>() {
                Ok(value) if value.is_finite() => Self::Numeric(value),
                _ => Self::Categorical(raw.to_string()),
            },
            _ => Self::Categorical(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Categorical(value) => Some(value),
            _ => None,
        }
    }

    /// Cell text for tabular output. Whole numbers drop the fractional part.
    pub fn render(&self) -> String {
        match self {
            Self::Numeric(value) => render_number(*value),
            Self::Categorical(value) => value.clone(),
            Self::Missing => String::new(),
        }
    }
}

pub(crate) fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Per-source outcome recorded on every roster record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Selected,
    NotSelected,
    NotResponded,
}

impl SourceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Selected => "Selected",
            Self::NotSelected => "Not Selected",
            Self::NotResponded => "Not Responded",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "selected" => Some(Self::Selected),
            "not selected" => Some(Self::NotSelected),
            "not responded" | "" => Some(Self::NotResponded),
            _ => None,
        }
    }
}

/// One roster record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub contact: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub statuses: BTreeMap<SourceId, SourceStatus>,
    /// Cell text as loaded, by lower-cased column name. Written back in place
    /// of the typed value, and kept for status cells with no known label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw_cells: BTreeMap<String, String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            id: CandidateId(id.into()),
            name: name.into(),
            contact: contact.into(),
            attributes: BTreeMap::new(),
            statuses: BTreeMap::new(),
            raw_cells: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.raw_cells.remove(name);
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Missing and absent attributes both read as `Missing`.
    pub fn attribute(&self, name: &str) -> &AttributeValue {
        self.attributes.get(name).unwrap_or(&MISSING)
    }

    pub fn status(&self, source: &SourceId) -> Option<SourceStatus> {
        self.statuses.get(source).copied()
    }
}

/// Ordered, deduplicated candidate ids matched for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub candidate_ids: Vec<CandidateId>,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.candidate_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidate_ids.len()
    }
}

/// Exam slot bound to a candidate for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub date: NaiveDate,
    pub time: String,
}

/// Union member with its slot attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCandidate {
    pub candidate: Candidate,
    pub slot: SlotAssignment,
}
