mod config;
mod rules;

pub use config::{EligibilitySchema, UnknownFieldPolicy};
pub use rules::{compile, Clause, CompiledCriteria, CriteriaError};

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{SelectionResult, SourceId};
use super::roster::Roster;
use crate::workflows::criteria::CriteriaMapping;

/// Criteria reference an attribute the roster does not carry. Fatal for a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("criteria from '{source_id}' reference '{field}' but the roster has no such column")]
    MissingColumn { source_id: SourceId, field: String },
}

/// A mapping that was discarded, with its position in the source's sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaIssue {
    pub mapping_index: usize,
    pub error: CriteriaError,
}

/// Selection for one source plus what was dropped along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub selection: SelectionResult,
    pub applied_mappings: usize,
    pub issues: Vec<CriteriaIssue>,
    pub unrecognized: Vec<String>,
}

/// Stateless evaluator applying a source's mappings to the roster.
#[derive(Debug, Clone, Default)]
pub struct EligibilityResolver {
    schema: EligibilitySchema,
}

impl EligibilityResolver {
    pub fn new(schema: EligibilitySchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &EligibilitySchema {
        &self.schema
    }

    pub fn compile(&self, mapping: &CriteriaMapping) -> Result<CompiledCriteria, CriteriaError> {
        rules::compile(mapping, &self.schema)
    }

    /// OR across mappings, AND within one. Matches keep mapping order, then
    /// roster order, and each identifier appears once.
    pub fn resolve(
        &self,
        source: &SourceId,
        roster: &Roster,
        mappings: &[CriteriaMapping],
    ) -> Result<Resolution, SchemaError> {
        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        for (mapping_index, mapping) in mappings.iter().enumerate() {
            if mapping.is_empty() {
                continue;
            }

            let compiled = match self.compile(mapping) {
                Ok(compiled) => compiled,
                Err(error) => {
                    warn!(%source, mapping_index, %error, "discarding criteria mapping");
                    resolution.issues.push(CriteriaIssue {
                        mapping_index,
                        error,
                    });
                    continue;
                }
            };

            for field in &compiled.unrecognized {
                debug!(%source, field = field.as_str(), "ignoring unrecognized criteria field");
                if !resolution.unrecognized.contains(field) {
                    resolution.unrecognized.push(field.clone());
                }
            }

            if let Some(clause) = compiled
                .clauses
                .iter()
                .find(|clause| !roster.has_attribute(clause.field()))
            {
                return Err(SchemaError::MissingColumn {
                    source_id: source.clone(),
                    field: clause.field().to_string(),
                });
            }

            if compiled.clauses.is_empty() {
                continue;
            }
            resolution.applied_mappings += 1;

            for candidate in roster.candidates() {
                if compiled.matches(candidate) && seen.insert(candidate.id.clone()) {
                    resolution.selection.candidate_ids.push(candidate.id.clone());
                }
            }
        }

        debug!(
            %source,
            selected = resolution.selection.len(),
            applied = resolution.applied_mappings,
            "resolved eligibility"
        );

        Ok(resolution)
    }
}
