use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod import;
mod models;
mod orchestrator;
mod ranking;
mod report;
mod store;

use config::Settings;
use models::ScopeReviews;
use store::ReviewStore;

#[derive(Parser)]
#[command(name = "substitute-rankings")]
#[command(about = "Substitute teacher leaderboards built from school reviews", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["school", "district"])
        .required(true)
        .multiple(false)
))]
struct ScopeArgs {
    /// School id to include; repeat for several schools
    #[arg(long)]
    school: Vec<String>,
    /// Rank across every school in this district
    #[arg(long)]
    district: Option<String>,
    /// Read reviews from a CSV export instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import reviews from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the substitute leaderboard for a school or district
    Rank {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Group the leaderboard by city
        #[arg(long)]
        by_city: bool,
        #[arg(long, default_value_t = ranking::DEFAULT_LIMIT)]
        limit: usize,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show complaints and compliments for one substitute
    Reviews {
        sub_id: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = ranking::DEFAULT_LIMIT)]
        limit: usize,
        #[arg(long, default_value = "rankings.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = config::database_url()?;
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_scope(settings: &Settings, args: &ScopeArgs) -> anyhow::Result<(String, ScopeReviews)> {
    let store: Arc<dyn ReviewStore> = match &args.csv {
        Some(path) => {
            let imported = import::read_reviews_from_path(path)?;
            info!(reviews = imported.len(), path = %path.display(), "ranking from csv");
            Arc::new(import::memory_store(imported))
        }
        None => Arc::new(db::PgReviewStore::new(connect(settings).await?)),
    };

    let scope =
        orchestrator::resolve_scope(store.as_ref(), &args.school, args.district.as_deref()).await?;
    let label = match &args.district {
        Some(district) => format!("district {district}"),
        None => scope.school_ids().join(", "),
    };

    let fetched = orchestrator::fetch_scope(store, &scope, settings.fetch_timeout).await;
    Ok((label, fetched))
}

fn print_incomplete_notice(fetched: &ScopeReviews) {
    if fetched.is_incomplete() {
        println!(
            "Results may be incomplete: could not load {}.",
            fetched.failed_schools.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&settings).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = import::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} reviews from {}.", csv.display());
        }
        Commands::Rank {
            scope,
            by_city,
            limit,
            json,
        } => {
            let (label, fetched) = load_scope(&settings, &scope).await?;
            let rankings = ranking::rank(&fetched.reviews, limit);

            if json {
                let payload = serde_json::json!({
                    "scope": label,
                    "failed_schools": fetched.failed_schools,
                    "rankings": rankings,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            print_incomplete_notice(&fetched);
            if rankings.overall.is_empty() {
                println!("No substitute reviews found for {label}.");
                return Ok(());
            }

            if by_city {
                print!("{}", report::format_city_leaderboard(&rankings));
            } else {
                println!("Top substitutes for {label}:");
                for (index, item) in rankings.overall.iter().enumerate() {
                    println!("{}", report::format_row(index + 1, item));
                    println!("   {}", report::format_breakdown(item));
                }
            }
        }
        Commands::Reviews { sub_id, scope } => {
            let (label, fetched) = load_scope(&settings, &scope).await?;
            let detail = ranking::reviews_for(&sub_id, &fetched.reviews);

            print_incomplete_notice(&fetched);
            if detail.is_empty() {
                println!("No reviews for {sub_id} in {label}.");
                return Ok(());
            }

            println!("Complaints & compliments for {sub_id} ({} total):", detail.len());
            for review in detail.iter().take(report::DETAIL_LIMIT) {
                println!("- {}", report::format_review(review));
            }
        }
        Commands::Report { scope, limit, out } => {
            let (label, fetched) = load_scope(&settings, &scope).await?;
            let report = report::build_report(&label, &fetched, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
