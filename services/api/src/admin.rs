use clap::Args;
use date_score::config::AppConfig;
use date_score::error::AppError;
use date_score::plans::{PlanRepository, RankedPlan};
use date_score::scoring::recalculate_all;
use date_score::store::SqlitePlanStore;
use date_score::telemetry;

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// Override DATABASE_URL
    #[arg(long)]
    pub(crate) database_url: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RankingArgs {
    #[command(flatten)]
    pub(crate) store: StoreArgs,
    /// Number of plans to print
    #[arg(long, default_value_t = 10)]
    pub(crate) limit: usize,
}

async fn open_store(args: StoreArgs) -> Result<SqlitePlanStore, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let url = args.database_url.unwrap_or(config.database.url);
    Ok(SqlitePlanStore::connect(&url, config.database.max_connections).await?)
}

pub(crate) async fn run_recalculate(args: StoreArgs) -> Result<(), AppError> {
    let store = open_store(args).await?;
    let updated = recalculate_all(&store).await?;
    println!("Recalculated {updated} date plan scores");
    Ok(())
}

pub(crate) async fn run_ranking(args: RankingArgs) -> Result<(), AppError> {
    let RankingArgs { store, limit } = args;
    let store = open_store(store).await?;
    let ranking = store.ranking().await?;

    if ranking.is_empty() {
        println!("No date plans scored yet");
        return Ok(());
    }

    println!("Date plan ranking (top {} of {})", limit.min(ranking.len()), ranking.len());
    for (position, plan) in ranking.iter().take(limit).enumerate() {
        println!("{}", ranking_line(position + 1, plan));
    }
    Ok(())
}

fn ranking_line(position: usize, plan: &RankedPlan) -> String {
    let summary = &plan.summary;
    format!(
        "{position:>3}. [{score}] #{id} {location} | {date_time} | {cost} | {likes} likes",
        score = summary.score,
        id = summary.id,
        location = summary.metadata.location,
        date_time = summary.metadata.date_time,
        cost = summary.metadata.cost,
        likes = plan.like_count,
    )
}
