use crate::commands::{
    run_history_list, run_history_report, run_history_summary, run_score, HistoryListArgs,
    HistoryReportArgs, LedgerArgs, ScoreArgs,
};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tenant_credit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "tenant-credit-api",
    about = "Run the tenant credit desk and inspect finalized credit cases",
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
    /// Walk one sample case from extraction to a finalized report
    Demo(DemoArgs),
    /// Score a case record stored as JSON
    Score(ScoreArgs),
    /// Browse finalized cases in the ledger
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// List finalized cases, optionally filtered
    List(HistoryListArgs),
    /// Verdict counts and cases per day
    Summary(LedgerArgs),
    /// Re-render the report of one finalized case
    Report(HistoryReportArgs),
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
        Command::Demo(args) => run_demo(args),
        Command::Score(args) => run_score(args),
        Command::History { command } => match command {
            HistoryCommand::List(args) => run_history_list(args),
            HistoryCommand::Summary(args) => run_history_summary(args),
            HistoryCommand::Report(args) => run_history_report(args),
        },
    }
}
