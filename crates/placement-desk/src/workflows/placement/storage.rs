//! File-backed and in-memory adapters for the placement collaborators.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use super::domain::SourceId;
use super::eligibility::EligibilitySchema;
use super::report::{ReportFormat, REPORT_FILE_STEM};
use super::repository::{
    CriteriaSource, NotifyError, ReportNotice, ReportNotifier, ReportSink, ReportSinkError,
    RosterStore, RosterStoreError, SourceError,
};
use super::roster::{Roster, RosterLayout};
use super::tabular::{self, Table};

/// Roster kept in a CSV or spreadsheet file, picked by extension.
#[derive(Debug, Clone)]
pub struct FileRosterStore {
    path: PathBuf,
    format: ReportFormat,
    layout: RosterLayout,
    schema: EligibilitySchema,
}

impl FileRosterStore {
    pub fn new(path: impl Into<PathBuf>, schema: EligibilitySchema) -> Self {
        let path = path.into();
        let format = format_for_path(&path);
        Self {
            path,
            format,
            layout: RosterLayout::default(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Only xlsx can be written back; `.xls` and `.ods` rosters are saved next
    /// to the original with an `.xlsx` extension.
    pub fn writable_path(&self) -> PathBuf {
        let is_xlsx = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if self.format == ReportFormat::Xlsx && !is_xlsx {
            self.path.with_extension("xlsx")
        } else {
            self.path.clone()
        }
    }
}

/// `.xlsx`, `.xls`, and `.ods` are spreadsheets; everything else is CSV.
pub fn format_for_path(path: &Path) -> ReportFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("xlsx") | Some("xls") | Some("ods") => ReportFormat::Xlsx,
        _ => ReportFormat::Csv,
    }
}

impl RosterStore for FileRosterStore {
    fn load_roster(&self) -> Result<Roster, RosterStoreError> {
        if !self.path.is_file() {
            return Err(RosterStoreError::NotFound(self.path.display().to_string()));
        }

        let table = match self.format {
            ReportFormat::Csv => {
                let file = fs::File::open(&self.path)
                    .map_err(|err| RosterStoreError::Unavailable(err.to_string()))?;
                tabular::read_csv(file)?
            }
            ReportFormat::Xlsx => tabular::read_xlsx(&self.path)?,
        };

        let roster = Roster::from_table(table, self.layout.clone(), &self.schema)?;
        info!(path = %self.path.display(), candidates = roster.len(), "loaded roster");
        Ok(roster)
    }

    fn save_roster(&self, roster: &Roster) -> Result<(), RosterStoreError> {
        let table = roster.to_table();
        match self.format {
            ReportFormat::Csv => {
                let file = fs::File::create(&self.path)
                    .map_err(|err| RosterStoreError::Unavailable(err.to_string()))?;
                tabular::write_csv(&table, file)?;
            }
            ReportFormat::Xlsx => tabular::write_xlsx(&table, &self.writable_path())?,
        }
        info!(path = %self.writable_path().display(), "saved roster");
        Ok(())
    }
}

/// Roster held in memory, for request-scoped runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    roster: Mutex<Option<Roster>>,
}

impl MemoryRosterStore {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster: Mutex::new(Some(roster)),
        }
    }

    pub fn snapshot(&self) -> Option<Roster> {
        self.roster.lock().ok().and_then(|guard| guard.clone())
    }
}

impl RosterStore for MemoryRosterStore {
    fn load_roster(&self) -> Result<Roster, RosterStoreError> {
        let guard = self
            .roster
            .lock()
            .map_err(|_| RosterStoreError::Unavailable("roster mutex poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| RosterStoreError::NotFound("memory".to_string()))
    }

    fn save_roster(&self, roster: &Roster) -> Result<(), RosterStoreError> {
        let mut guard = self
            .roster
            .lock()
            .map_err(|_| RosterStoreError::Unavailable("roster mutex poisoned".to_string()))?;
        *guard = Some(roster.clone());
        Ok(())
    }
}

/// Criteria messages stored as text files under one directory.
///
/// `<root>/<source>.txt` holds a single message. Alternatively `<root>/<source>/`
/// holds several, and file names sort oldest to newest (timestamps work well).
#[derive(Debug, Clone)]
pub struct DirectoryCriteriaSource {
    root: PathBuf,
}

impl DirectoryCriteriaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path separators are escaped; ids made only of dots are refused so no
    /// source can reach outside the root.
    fn entry_name(source: &SourceId) -> Result<String, SourceError> {
        let name = source.0.replace(['/', '\\'], "_");
        if name.chars().all(|ch| ch == '.') {
            return Err(SourceError::InvalidSource(source.0.clone()));
        }
        Ok(name)
    }

    fn message_files(&self, source: &SourceId) -> Result<Vec<PathBuf>, SourceError> {
        let name = Self::entry_name(source)?;
        let single = self.root.join(format!("{name}.txt"));
        if single.is_file() {
            return Ok(vec![single]);
        }

        let folder = self.root.join(&name);
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&folder)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        files.reverse();
        Ok(files)
    }
}

impl CriteriaSource for DirectoryCriteriaSource {
    fn fetch_latest_text(&self, source: &SourceId) -> Result<Option<String>, SourceError> {
        Ok(self.fetch_recent_texts(source, 1)?.into_iter().next())
    }

    fn fetch_recent_texts(
        &self,
        source: &SourceId,
        limit: usize,
    ) -> Result<Vec<String>, SourceError> {
        self.message_files(source)?
            .into_iter()
            .take(limit)
            .map(|path| fs::read_to_string(path).map_err(SourceError::from))
            .collect()
    }
}

/// Fixed criteria texts per source, newest first.
#[derive(Debug, Clone, Default)]
pub struct StaticCriteriaSource {
    messages: BTreeMap<SourceId, Vec<String>>,
}

impl StaticCriteriaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(mut self, source: SourceId, messages: Vec<String>) -> Self {
        self.messages.insert(source, messages);
        self
    }
}

impl CriteriaSource for StaticCriteriaSource {
    fn fetch_latest_text(&self, source: &SourceId) -> Result<Option<String>, SourceError> {
        Ok(self
            .messages
            .get(source)
            .and_then(|messages| messages.first().cloned()))
    }

    fn fetch_recent_texts(
        &self,
        source: &SourceId,
        limit: usize,
    ) -> Result<Vec<String>, SourceError> {
        Ok(self
            .messages
            .get(source)
            .map(|messages| messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Writes reports into a directory under a fixed file name.
#[derive(Debug, Clone)]
pub struct DirectoryReportSink {
    dir: PathBuf,
    format: ReportFormat,
}

impl DirectoryReportSink {
    pub fn new(dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }
}

impl ReportSink for DirectoryReportSink {
    fn save_report(&self, report: &Table) -> Result<PathBuf, ReportSinkError> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{REPORT_FILE_STEM}.{}", self.format.extension()));

        match self.format {
            ReportFormat::Csv => tabular::write_csv(report, fs::File::create(&path)?)?,
            ReportFormat::Xlsx => tabular::write_xlsx(report, &path)?,
        }

        info!(path = %path.display(), rows = report.rows.len(), "saved report");
        Ok(path)
    }
}

/// Keeps reports in memory; paths are synthetic.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reports: Mutex<Vec<Table>>,
}

impl MemoryReportSink {
    pub fn reports(&self) -> Vec<Table> {
        self.reports
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemoryReportSink {
    fn save_report(&self, report: &Table) -> Result<PathBuf, ReportSinkError> {
        let mut guard = self.reports.lock().map_err(|_| {
            ReportSinkError::Io(std::io::Error::other("report mutex poisoned"))
        })?;
        guard.push(report.clone());
        Ok(PathBuf::from(format!(
            "memory/{REPORT_FILE_STEM}-{}",
            guard.len()
        )))
    }
}

/// Records notices in the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ReportNotifier for LogNotifier {
    fn notify(&self, notice: ReportNotice) -> Result<(), NotifyError> {
        info!(
            run_id = notice.run_id.as_str(),
            recipients = %notice.recipients.join(", "),
            report = %notice.report_path.display(),
            scheduled = notice.scheduled,
            "report ready"
        );
        Ok(())
    }
}

/// Collects notices for inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<ReportNotice>>,
}

impl MemoryNotifier {
    pub fn notices(&self) -> Vec<ReportNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReportNotifier for MemoryNotifier {
    fn notify(&self, notice: ReportNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .map_err(|_| NotifyError::Transport("notice mutex poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}
