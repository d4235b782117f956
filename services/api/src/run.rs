use chrono::NaiveDate;
use clap::Args;
use placement_desk::config::{AppConfig, PlacementConfig};
use placement_desk::error::AppError;
use placement_desk::telemetry::{self, LogOutput};
use placement_desk::workflows::criteria::parse_criteria;
use placement_desk::workflows::placement::{
    CollisionPolicy, DirectoryCriteriaSource, DirectoryReportSink, EligibilityResolver,
    FileRosterStore, LogNotifier, PipelineSettings, PlacementService, ReportFormat, RunOutcome,
    RunParameters, SourceId, SourceState,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Criteria source to process; repeat the flag or pass a comma separated list
    #[arg(long, required = true, value_name = "ID")]
    pub(crate) source: Vec<String>,
    /// Roster file (.csv, .xlsx, .xls, or .ods)
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Directory holding `<source>.txt` files or `<source>/` message folders
    #[arg(long)]
    pub(crate) criteria_dir: Option<PathBuf>,
    /// Directory the report is written into
    #[arg(long)]
    pub(crate) report_dir: Option<PathBuf>,
    /// Report encoding (csv or xlsx)
    #[arg(long)]
    pub(crate) format: Option<ReportFormat>,
    /// Address notified once a report exists; repeatable
    #[arg(long = "recipient", value_name = "ADDRESS")]
    pub(crate) recipients: Vec<String>,
    /// What to do when candidates outnumber distinct exam slots (wrap, reject, expand)
    #[arg(long)]
    pub(crate) collision_policy: Option<CollisionPolicy>,
    /// First exam date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) calendar_start: Option<NaiveDate>,
    /// Recent messages per source to treat as separate criteria
    #[arg(long, default_value_t = 1)]
    pub(crate) messages_per_source: usize,
}

impl RunArgs {
    pub(crate) fn sources(&self) -> Vec<SourceId> {
        self.source
            .iter()
            .flat_map(|raw| SourceId::parse_list(raw))
            .collect()
    }

    fn apply_overrides(&self, config: &mut PlacementConfig) {
        if let Some(path) = &self.roster {
            config.roster_path = path.clone();
        }
        if let Some(dir) = &self.criteria_dir {
            config.criteria_dir = dir.clone();
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.report_format = format;
        }
        if let Some(policy) = self.collision_policy {
            config.collision_policy = policy;
        }
        if let Some(start) = self.calendar_start {
            config.calendar_start = start;
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct CriteriaParseArgs {
    /// Text file holding one criteria message
    pub(crate) file: PathBuf,
}

pub(crate) async fn run_pipeline(args: RunArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply_overrides(&mut config.placement);
    telemetry::init_with_output(&config.telemetry, LogOutput::Stderr)?;

    let placement = &config.placement;
    let settings = PipelineSettings::from_config(placement)?;
    let roster = Arc::new(FileRosterStore::new(
        placement.roster_path.clone(),
        settings.schema.clone(),
    ));
    let criteria = Arc::new(DirectoryCriteriaSource::new(placement.criteria_dir.clone()));
    let reports = Arc::new(DirectoryReportSink::new(
        placement.report_dir.clone(),
        placement.report_format,
    ));
    let service = PlacementService::new(roster, criteria, reports, Arc::new(LogNotifier), settings);

    let parameters = RunParameters {
        recipients: args.recipients.clone(),
        messages_per_source: args.messages_per_source,
    };
    let outcome = service.run(&args.sources(), &parameters).await?;

    println!("{}", render_outcome(&outcome));
    Ok(())
}

pub(crate) fn run_criteria_parse(args: CriteriaParseArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let text = std::fs::read_to_string(&args.file)?;
    let mapping = parse_criteria(&text);

    println!("Parsed {} field(s) from {}", mapping.len(), args.file.display());
    for (key, value) in mapping.iter() {
        println!("  {key}: {value}");
    }

    let resolver = EligibilityResolver::new(config.placement.schema());
    match resolver.compile(&mapping) {
        Ok(compiled) if compiled.clauses.is_empty() => {
            println!("No usable clauses; this message would select nobody.");
        }
        Ok(compiled) => {
            println!("Clauses (all must hold):");
            for clause in &compiled.clauses {
                println!("  - {}", clause.describe());
            }
            if !compiled.unrecognized.is_empty() {
                println!("Ignored fields: {}", compiled.unrecognized.join(", "));
            }
        }
        Err(err) => println!("Discarded: {err}"),
    }

    Ok(())
}

pub(crate) fn render_outcome(outcome: &RunOutcome) -> String {
    let mut lines = vec![format!("Placement run {}", outcome.run_id), "Sources:".to_string()];

    for summary in &outcome.sources {
        let state = match &summary.state {
            SourceState::Responded => "responded".to_string(),
            SourceState::NoCriteria => "no usable criteria".to_string(),
            SourceState::Unavailable { reason } => format!("unavailable ({reason})"),
        };
        lines.push(format!(
            "  - {}: {state}, {} of {} mapping(s) applied, {} selected",
            summary.source, summary.applied, summary.mappings, summary.selected
        ));
        for issue in &summary.issues {
            lines.push(format!(
                "      discarded mapping #{}: {}",
                issue.mapping_index + 1,
                issue.error
            ));
        }
        if !summary.unrecognized.is_empty() {
            lines.push(format!("      ignored fields: {}", summary.unrecognized.join(", ")));
        }
    }

    lines.push(format!(
        "Scheduled {} candidate(s), {} sharing an earlier slot",
        outcome.scheduled, outcome.collisions
    ));
    lines.push(match &outcome.report_path {
        Some(path) => format!("Report: {}", path.display()),
        None => "Report: none (no candidates selected)".to_string(),
    });
    if outcome.notified {
        lines.push("Recipients notified".to_string());
    }

    lines.join("\n")
}
