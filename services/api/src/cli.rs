use crate::admin::{run_ranking, run_recalculate, RankingArgs, StoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use date_score::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Date Score",
    about = "Score date plans with an AI judge and serve the leaderboard",
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
    /// Recompute every stored deviation score once and exit
    Recalculate(StoreArgs),
    /// Print the current leaderboard
    Ranking(RankingArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override DATABASE_URL
    #[arg(long)]
    pub(crate) database_url: Option<String>,
    /// Keep everything in process memory; nothing survives a restart
    #[arg(long, conflicts_with = "database_url")]
    pub(crate) ephemeral: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Recalculate(args) => run_recalculate(args).await,
        Command::Ranking(args) => run_ranking(args).await,
    }
}
