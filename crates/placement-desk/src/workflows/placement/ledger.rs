use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::info;

use super::domain::{CandidateId, SelectionResult, SourceId, SourceStatus};
use super::roster::Roster;

/// Per-source tally written back to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub source: SourceId,
    pub column: String,
    pub created: bool,
    pub selected: usize,
    pub not_selected: usize,
}

/// Writes each source's selection into its own status column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationLedger;

impl ReconciliationLedger {
    pub fn new() -> Self {
        Self
    }

    /// A source without a selection, or with an empty one, marks every record
    /// `NotSelected`. Columns of sources not listed are left alone.
    pub fn reconcile(
        &self,
        roster: &mut Roster,
        sources: &[SourceId],
        selections: &BTreeMap<SourceId, SelectionResult>,
    ) -> Vec<LedgerEntry> {
        let mut entries = Vec::with_capacity(sources.len());

        for source in sources {
            let created = roster.ensure_status_column(source);
            let selected: HashSet<&CandidateId> = selections
                .get(source)
                .map(|selection| selection.candidate_ids.iter().collect())
                .unwrap_or_default();

            let mut entry = LedgerEntry {
                source: source.clone(),
                column: source.status_column(),
                created,
                selected: 0,
                not_selected: 0,
            };

            for candidate in roster.candidates_mut() {
                let status = if selected.contains(&candidate.id) {
                    entry.selected += 1;
                    SourceStatus::Selected
                } else {
                    entry.not_selected += 1;
                    SourceStatus::NotSelected
                };
                candidate.statuses.insert(source.clone(), status);
                candidate.raw_cells.remove(&entry.column);
            }

            info!(
                %source,
                column = entry.column.as_str(),
                selected = entry.selected,
                not_selected = entry.not_selected,
                "reconciled source status"
            );
            entries.push(entry);
        }

        entries
    }
}
