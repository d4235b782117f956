use crate::run::{run_criteria_parse, run_pipeline, CriteriaParseArgs, RunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Desk",
    about = "Match student rosters against recruiter criteria and schedule placement exams",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the placement pipeline once against the configured roster
    Run(RunArgs),
    /// Inspect criteria messages
    Criteria {
        #[command(subcommand)]
        command: CriteriaCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CriteriaCommand {
    /// Parse a criteria message and show the clauses it compiles to
    Parse(CriteriaParseArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Run(args) => run_pipeline(args).await,
        Command::Criteria {
            command: CriteriaCommand::Parse(args),
        } => run_criteria_parse(args),
    }
}
