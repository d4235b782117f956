use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::domain::{
    AttributeValue, Candidate, CandidateId, SourceId, SourceStatus, STATUS_COLUMN_PREFIX,
};
use super::eligibility::EligibilitySchema;
use super::tabular::Table;

/// Names of the columns every roster must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterLayout {
    pub id_column: String,
    pub name_column: String,
    pub contact_column: String,
}

impl Default for RosterLayout {
    fn default() -> Self {
        Self {
            id_column: "student_id".to_string(),
            name_column: "name".to_string(),
            contact_column: "email".to_string(),
        }
    }
}

/// Structural problems found while typing a roster table.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster is missing required column '{column}'")]
    MissingColumn { column: String },
    #[error("roster column '{column}' appears more than once")]
    DuplicateColumn { column: String },
    #[error("roster row {row} has no identifier")]
    MissingIdentifier { row: usize },
    #[error("roster identifier '{id}' is not unique")]
    DuplicateId { id: CandidateId },
}

/// Candidate records plus the column order of the backing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    layout: RosterLayout,
    columns: Vec<String>,
    candidates: Vec<Candidate>,
}

impl Roster {
    /// Builds a roster from already typed records. Columns follow the layout,
    /// then attributes in first-seen order.
    pub fn from_candidates(
        layout: RosterLayout,
        candidates: Vec<Candidate>,
    ) -> Result<Self, RosterError> {
        let mut columns = vec![
            layout.id_column.clone(),
            layout.name_column.clone(),
            layout.contact_column.clone(),
        ];
        let mut seen_ids = HashSet::new();
        let mut status_columns = Vec::new();

        for candidate in &candidates {
            if !seen_ids.insert(candidate.id.clone()) {
                return Err(RosterError::DuplicateId {
                    id: candidate.id.clone(),
                });
            }
            for name in candidate.attributes.keys() {
                if !columns.iter().any(|column| column_key(column) == *name) {
                    columns.push(name.clone());
                }
            }
            for source in candidate.statuses.keys() {
                let column = source.status_column();
                if !status_columns.contains(&column) {
                    status_columns.push(column);
                }
            }
        }
        columns.extend(status_columns);

        Ok(Self {
            layout,
            columns,
            candidates,
        })
    }

    /// Types a raw table. `Unnamed*` index columns left behind by spreadsheet
    /// exports are dropped.
    pub fn from_table(
        table: Table,
        layout: RosterLayout,
        schema: &EligibilitySchema,
    ) -> Result<Self, RosterError> {
        let kept: Vec<(usize, String)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.trim().starts_with("Unnamed"))
            .map(|(index, header)| (index, header.trim().to_string()))
            .collect();

        let mut seen = HashSet::new();
        for (_, header) in &kept {
            if !seen.insert(column_key(header)) {
                return Err(RosterError::DuplicateColumn {
                    column: header.clone(),
                });
            }
        }

        let locate = |wanted: &str| -> Result<usize, RosterError> {
            kept.iter()
                .find(|(_, header)| column_key(header) == column_key(wanted))
                .map(|(index, _)| *index)
                .ok_or_else(|| RosterError::MissingColumn {
                    column: wanted.to_string(),
                })
        };
        let id_index = locate(&layout.id_column)?;
        let name_index = locate(&layout.name_column)?;
        let contact_index = locate(&layout.contact_column)?;

        let mut candidates = Vec::with_capacity(table.rows.len());
        let mut seen_ids = HashSet::new();

        for (row_number, row) in table.rows.iter().enumerate() {
            let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("");
            let row_number = row_number + 1;

            let id = cell(id_index).trim();
            if id.is_empty() {
                return Err(RosterError::MissingIdentifier { row: row_number });
            }
            let mut candidate = Candidate::new(id, cell(name_index).trim(), cell(contact_index).trim());
            if !seen_ids.insert(candidate.id.clone()) {
                return Err(RosterError::DuplicateId { id: candidate.id });
            }

            for (index, header) in &kept {
                if [id_index, name_index, contact_index].contains(index) {
                    continue;
                }
                let raw = cell(*index);
                let key = column_key(header);
                if let Some(source) = status_source(header) {
                    // Unknown labels stay verbatim until this source is reconciled.
                    match SourceStatus::from_label(raw) {
                        Some(status) => {
                            candidate.statuses.insert(source, status);
                        }
                        None => {
                            candidate.raw_cells.insert(key, raw.to_string());
                        }
                    }
                } else {
                    let value = AttributeValue::from_cell(raw, schema.kind_of(&key));
                    if value.render() != raw {
                        candidate.raw_cells.insert(key.clone(), raw.to_string());
                    }
                    candidate.attributes.insert(key, value);
                }
            }

            candidates.push(candidate);
        }

        Ok(Self {
            layout,
            columns: kept.into_iter().map(|(_, header)| header).collect(),
            candidates,
        })
    }

    pub fn to_table(&self) -> Table {
        Table {
            headers: self.columns.clone(),
            rows: self
                .candidates
                .iter()
                .map(|candidate| self.render_row(candidate))
                .collect(),
        }
    }

    /// Renders one record in column order.
    pub fn render_row(&self, candidate: &Candidate) -> Vec<String> {
        self.render_columns(candidate, &self.columns)
    }

    /// Renders the given columns of one record.
    pub fn render_columns(&self, candidate: &Candidate, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|column| self.render_cell(candidate, column))
            .collect()
    }

    fn render_cell(&self, candidate: &Candidate, column: &str) -> String {
        let key = column_key(column);
        if key == column_key(&self.layout.id_column) {
            candidate.id.0.clone()
        } else if key == column_key(&self.layout.name_column) {
            candidate.name.clone()
        } else if key == column_key(&self.layout.contact_column) {
            candidate.contact.clone()
        } else if let Some(source) = status_source(column) {
            candidate
                .status(&source)
                .map(|status| status.label().to_string())
                .or_else(|| candidate.raw_cells.get(&key).cloned())
                .unwrap_or_default()
        } else {
            candidate
                .raw_cells
                .get(&key)
                .cloned()
                .unwrap_or_else(|| candidate.attribute(&key).render())
        }
    }

    /// Every column except the per-source status columns.
    pub fn attribute_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| status_source(column).is_none())
            .cloned()
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidates_mut(&mut self) -> &mut [Candidate] {
        &mut self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|candidate| &candidate.id == id)
    }

    /// Whether an attribute column with this (lower-cased) name exists.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column_key(column) == name && status_source(column).is_none())
    }

    /// Header case is ignored; an existing `status_HR@acme.test` serves
    /// `hr@acme.test`.
    pub fn has_status_column(&self, source: &SourceId) -> bool {
        let column = column_key(&source.status_column());
        self.columns
            .iter()
            .any(|existing| column_key(existing) == column)
    }

    /// Appends the source's status column, defaulting every record to
    /// `NotResponded`. Returns false when the column already existed.
    pub fn ensure_status_column(&mut self, source: &SourceId) -> bool {
        if self.has_status_column(source) {
            for candidate in &mut self.candidates {
                candidate
                    .statuses
                    .entry(source.clone())
                    .or_insert(SourceStatus::NotResponded);
            }
            return false;
        }

        self.columns.push(source.status_column());
        for candidate in &mut self.candidates {
            candidate
                .statuses
                .insert(source.clone(), SourceStatus::NotResponded);
        }
        true
    }

    /// Index of every record by identifier.
    pub fn index(&self) -> HashMap<&CandidateId, &Candidate> {
        self.candidates
            .iter()
            .map(|candidate| (&candidate.id, candidate))
            .collect()
    }
}

pub(crate) fn column_key(column: &str) -> String {
    column.trim().to_lowercase()
}

fn status_source(column: &str) -> Option<SourceId> {
    column_key(column)
        .strip_prefix(STATUS_COLUMN_PREFIX)
        .map(SourceId::new)
}
