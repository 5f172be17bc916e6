use crate::commands::{self, Session};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use summer_lottery::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "summer-lottery",
    about = "Run and audit the seeded summer-job lottery",
    version
)]
struct Cli {
    /// Lottery data file (JSON snapshot). Falls back to LOTTERY_DATA.
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show job and applicant counts for a group without changing anything
    Preview(GroupArgs),
    /// Run the lottery for one group
    Run(RunArgs),
    /// Run the lottery for every group concurrently
    RunAll(RunAllArgs),
    /// List past runs for a group, newest first
    History(GroupArgs),
    /// Replay a recorded run from its audit report
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub(crate) struct GroupArgs {
    /// Job group identifier
    #[arg(long)]
    pub(crate) group: String,
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Job group identifier
    #[arg(long)]
    pub(crate) group: String,
    /// Administrator triggering the run
    #[arg(long)]
    pub(crate) actor: String,
    /// Fixed seed for a reproducible draw. Overrides LOTTERY_SEED.
    #[arg(long, value_parser = crate::infra::parse_seed)]
    pub(crate) seed: Option<u64>,
    /// Date used for age checks (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Also write the offers and reserves to this CSV file
    #[arg(long)]
    pub(crate) results_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RunAllArgs {
    /// Administrator triggering the runs
    #[arg(long)]
    pub(crate) actor: String,
    /// Fixed seed applied to every group. Overrides LOTTERY_SEED.
    #[arg(long, value_parser = crate::infra::parse_seed)]
    pub(crate) seed: Option<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct VerifyArgs {
    /// Run identifier, e.g. run-000001
    #[arg(long)]
    pub(crate) run: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let session = Session::open(cli.data)?;

    match cli.command {
        Command::Preview(args) => commands::preview(&session, args),
        Command::Run(args) => commands::run_group(&session, args),
        Command::RunAll(args) => commands::run_all(&session, args).await,
        Command::History(args) => commands::history(&session, args),
        Command::Verify(args) => commands::verify(&session, args),
    }
}
