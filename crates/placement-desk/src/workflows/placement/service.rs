use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Candidate, SelectionResult, SourceId};
use super::eligibility::{CriteriaIssue, EligibilityResolver, EligibilitySchema, SchemaError};
use super::ledger::{LedgerEntry, ReconciliationLedger};
use super::report::ReportEmitter;
use super::repository::{
    CriteriaSource, ReportNotice, ReportNotifier, ReportSink, ReportSinkError, RosterStore,
    RosterStoreError, SourceError,
};
use super::roster::Roster;
use super::slots::{CollisionPolicy, SlotAssigner, SlotCalendar, SlotError};
use crate::config::PlacementConfig;
use crate::workflows::criteria::{parse_criteria, CriteriaMapping};

/// Run-independent knobs shared by every pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub schema: EligibilitySchema,
    pub calendar: SlotCalendar,
    pub collision_policy: CollisionPolicy,
    pub fetch_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &PlacementConfig) -> Result<Self, SlotError> {
        Ok(Self {
            schema: config.schema(),
            calendar: config.calendar()?,
            collision_policy: config.collision_policy,
            fetch_timeout: config.fetch_timeout,
        })
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            schema: EligibilitySchema::default(),
            calendar: SlotCalendar::default(),
            collision_policy: CollisionPolicy::Wrap,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-run inputs besides the source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub recipients: Vec<String>,
    /// How many recent messages each source contributes as mappings.
    pub messages_per_source: usize,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            messages_per_source: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceState {
    Responded,
    NoCriteria,
    Unavailable { reason: String },
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub source: SourceId,
    #[serde(flatten)]
    pub state: SourceState,
    pub mappings: usize,
    pub applied: usize,
    pub selected: usize,
    pub issues: Vec<CriteriaIssue>,
    pub unrecognized: Vec<String>,
}

impl SourceSummary {
    fn empty(source: SourceId, state: SourceState) -> Self {
        Self {
            source,
            state,
            mappings: 0,
            applied: 0,
            selected: 0,
            issues: Vec::new(),
            unrecognized: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub report_path: Option<PathBuf>,
    pub counts_per_source: BTreeMap<SourceId, usize>,
    pub sources: Vec<SourceSummary>,
    pub ledger: Vec<LedgerEntry>,
    pub scheduled: usize,
    pub collisions: usize,
    pub notified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("failed to load roster: {0}")]
    RosterLoad(#[source] RosterStoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("failed to persist roster: {0}")]
    RosterPersistence(#[source] RosterStoreError),
    #[error("failed to persist report: {0}")]
    ReportPersistence(#[from] ReportSinkError),
    #[error(transparent)]
    Slots(#[from] SlotError),
}

impl PlacementError {
    /// Errors caused by the inputs of a run rather than its infrastructure.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::RosterLoad(RosterStoreError::Schema(_))
            | Self::RosterLoad(RosterStoreError::Encoding(_))
            | Self::Schema(_)
            | Self::Slots(_) => true,
            Self::RosterLoad(_)
            | Self::RosterPersistence(_)
            | Self::ReportPersistence(_) => false,
        }
    }
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_run_id() -> String {
    let id = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("run-{id:06}")
}

/// Runs parse, resolve, reconcile, assign, and emit against one roster.
pub struct PlacementService<R, C> {
    roster: Arc<R>,
    criteria: Arc<C>,
    reports: Arc<dyn ReportSink>,
    notifier: Arc<dyn ReportNotifier>,
    resolver: EligibilityResolver,
    ledger: ReconciliationLedger,
    assigner: SlotAssigner,
    fetch_timeout: Duration,
}

impl<R, C> PlacementService<R, C>
where
    R: RosterStore + 'static,
    C: CriteriaSource + 'static,
{
    pub fn new(
        roster: Arc<R>,
        criteria: Arc<C>,
        reports: Arc<dyn ReportSink>,
        notifier: Arc<dyn ReportNotifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            roster,
            criteria,
            reports,
            notifier,
            resolver: EligibilityResolver::new(settings.schema),
            ledger: ReconciliationLedger::new(),
            assigner: SlotAssigner::new(settings.calendar, settings.collision_policy),
            fetch_timeout: settings.fetch_timeout,
        }
    }

    pub async fn run(
        &self,
        sources: &[SourceId],
        parameters: &RunParameters,
    ) -> Result<RunOutcome, PlacementError> {
        let run_id = next_run_id();
        let sources = distinct_sources(sources);
        info!(run_id = run_id.as_str(), sources = sources.len(), "starting placement run");

        let mut roster = self
            .roster
            .load_roster()
            .map_err(PlacementError::RosterLoad)?;

        let mut selections = BTreeMap::new();
        let mut summaries = Vec::with_capacity(sources.len());
        for source in &sources {
            let texts = match self
                .fetch_texts(source, parameters.messages_per_source)
                .await
            {
                Ok(texts) => texts,
                Err(error) => {
                    warn!(%source, %error, "criteria source unavailable");
                    summaries.push(SourceSummary::empty(
                        source.clone(),
                        SourceState::Unavailable {
                            reason: error.to_string(),
                        },
                    ));
                    continue;
                }
            };

            let mappings: Vec<CriteriaMapping> = texts
                .iter()
                .map(|text| parse_criteria(text))
                .filter(|mapping| !mapping.is_empty())
                .collect();
            if mappings.is_empty() {
                info!(%source, "no parseable criteria");
                summaries.push(SourceSummary::empty(source.clone(), SourceState::NoCriteria));
                continue;
            }

            let resolution = self.resolver.resolve(source, &roster, &mappings)?;
            summaries.push(SourceSummary {
                source: source.clone(),
                state: SourceState::Responded,
                mappings: mappings.len(),
                applied: resolution.applied_mappings,
                selected: resolution.selection.len(),
                issues: resolution.issues,
                unrecognized: resolution.unrecognized,
            });
            selections.insert(source.clone(), resolution.selection);
        }

        let ledger = self.ledger.reconcile(&mut roster, &sources, &selections);
        self.roster
            .save_roster(&roster)
            .map_err(PlacementError::RosterPersistence)?;

        let union = selection_union(&roster, &sources, &selections);
        let schedule = self.assigner.assign(union)?;

        let report_path = if schedule.is_empty() {
            info!(run_id = run_id.as_str(), "no candidates selected; skipping report");
            None
        } else {
            let report = ReportEmitter::emit(&roster, &schedule);
            Some(self.reports.save_report(&report)?)
        };

        let counts_per_source: BTreeMap<SourceId, usize> = sources
            .iter()
            .map(|source| {
                let count = selections.get(source).map_or(0, SelectionResult::len);
                (source.clone(), count)
            })
            .collect();

        let notified = match &report_path {
            Some(path) if !parameters.recipients.is_empty() => {
                let notice = ReportNotice {
                    run_id: run_id.clone(),
                    recipients: parameters.recipients.clone(),
                    report_path: path.clone(),
                    scheduled: schedule.len(),
                    counts_per_source: counts_per_source.clone(),
                };
                match self.notifier.notify(notice) {
                    Ok(()) => true,
                    Err(error) => {
                        warn!(run_id = run_id.as_str(), %error, "report notification failed");
                        false
                    }
                }
            }
            _ => false,
        };

        info!(
            run_id = run_id.as_str(),
            scheduled = schedule.len(),
            collisions = schedule.collisions,
            notified,
            "placement run finished"
        );

        Ok(RunOutcome {
            run_id,
            report_path,
            counts_per_source,
            sources: summaries,
            ledger,
            scheduled: schedule.len(),
            collisions: schedule.collisions,
            notified,
        })
    }

    /// Blocking fetch on the blocking pool, bounded by the configured timeout.
    async fn fetch_texts(
        &self,
        source: &SourceId,
        limit: usize,
    ) -> Result<Vec<String>, SourceError> {
        let criteria = Arc::clone(&self.criteria);
        let owned = source.clone();
        let task = tokio::task::spawn_blocking(move || criteria.fetch_recent_texts(&owned, limit));

        match tokio::time::timeout(self.fetch_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(SourceError::Transport(join.to_string())),
            Err(_) => Err(SourceError::TimedOut {
                after: self.fetch_timeout,
            }),
        }
    }
}

fn distinct_sources(sources: &[SourceId]) -> Vec<SourceId> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter(|source| seen.insert(*source))
        .cloned()
        .collect()
}

/// Selected candidates in source order, then resolver order, each id once.
pub fn selection_union(
    roster: &Roster,
    sources: &[SourceId],
    selections: &BTreeMap<SourceId, SelectionResult>,
) -> Vec<Candidate> {
    let index = roster.index();
    let mut seen = HashSet::new();
    let mut union = Vec::new();

    for selection in sources.iter().filter_map(|source| selections.get(source)) {
        for id in &selection.candidate_ids {
            if !seen.insert(id) {
                continue;
            }
            if let Some(candidate) = index.get(id) {
                union.push((*candidate).clone());
            }
        }
    }

    union
}
