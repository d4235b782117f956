use serde::{Deserialize, Serialize};

use super::super::domain::{AttributeKind, Candidate};
use super::config::{EligibilitySchema, UnknownFieldPolicy};
use crate::workflows::criteria::CriteriaMapping;

/// Single typed constraint compiled from one criteria key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Clause {
    AtLeast { field: String, threshold: f64 },
    Equals { field: String, value: String },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::AtLeast { field, .. } | Clause::Equals { field, .. } => field,
        }
    }

    /// Total over the attribute model: a value of the wrong kind, or a missing
    /// one, never satisfies the clause.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            Clause::AtLeast { field, threshold } => candidate
                .attribute(field)
                .as_number()
                .map(|value| value >= *threshold)
                .unwrap_or(false),
            Clause::Equals { field, value } => candidate
                .attribute(field)
                .as_text()
                .map(|text| text == value)
                .unwrap_or(false),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Clause::AtLeast { field, threshold } => format!("{field} >= {threshold}"),
            Clause::Equals { field, value } => format!("{field} == '{value}'"),
        }
    }
}

/// AND of clauses plus the keys that named no known attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledCriteria {
    pub clauses: Vec<Clause>,
    pub unrecognized: Vec<String>,
}

impl CompiledCriteria {
    /// No clause means no match, never match-all.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        !self.clauses.is_empty() && self.clauses.iter().all(|clause| clause.matches(candidate))
    }
}

/// Reasons a single mapping is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriteriaError {
    #[error("value '{value}' for numeric field '{field}' is not a number")]
    MalformedNumeric { field: String, value: String },
    #[error("criteria name unknown field(s): {}", .fields.join(", "))]
    UnknownField { fields: Vec<String> },
}

pub fn compile(
    mapping: &CriteriaMapping,
    schema: &EligibilitySchema,
) -> Result<CompiledCriteria, CriteriaError> {
    let mut compiled = CompiledCriteria::default();

    for (field, raw) in mapping.iter() {
        match schema.kind_of(field) {
            Some(AttributeKind::Numeric) => {
                let threshold = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| CriteriaError::MalformedNumeric {
                        field: field.to_string(),
                        value: raw.to_string(),
                    })?;
                compiled.clauses.push(Clause::AtLeast {
                    field: field.to_string(),
                    threshold,
                });
            }
            Some(AttributeKind::Categorical) => compiled.clauses.push(Clause::Equals {
                field: field.to_string(),
                value: raw.to_string(),
            }),
            None => compiled.unrecognized.push(field.to_string()),
        }
    }

    if schema.unknown_fields() == UnknownFieldPolicy::Reject && !compiled.unrecognized.is_empty()
    {
        return Err(CriteriaError::UnknownField {
            fields: compiled.unrecognized,
        });
    }

    Ok(compiled)
}
