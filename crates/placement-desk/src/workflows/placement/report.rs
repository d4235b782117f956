use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::roster::Roster;
use super::slots::SlotSchedule;
use super::tabular::Table;

pub const EXAM_DATE_COLUMN: &str = "exam_date";
pub const EXAM_TIME_COLUMN: &str = "exam_time";
pub const REPORT_FILE_STEM: &str = "selected_students_with_exams";

/// On-disk encoding for rosters and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Csv,
    Xlsx,
}

impl ReportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(format!("unknown report format '{other}' (expected csv|xlsx)")),
        }
    }
}

/// Lays the schedule out as the outbound table: the roster's own columns in
/// order (status columns excluded), then the exam date and time.
pub struct ReportEmitter;

impl ReportEmitter {
    pub fn emit(roster: &Roster, schedule: &SlotSchedule) -> Table {
        let columns = roster.attribute_columns();
        let mut headers = columns.clone();
        headers.push(EXAM_DATE_COLUMN.to_string());
        headers.push(EXAM_TIME_COLUMN.to_string());

        let rows = schedule
            .entries
            .iter()
            .map(|entry| {
                let mut row = roster.render_columns(&entry.candidate, &columns);
                row.push(entry.slot.date.format("%Y-%m-%d").to_string());
                row.push(entry.slot.time.clone());
                row
            })
            .collect();

        Table { headers, rows }
    }
}
