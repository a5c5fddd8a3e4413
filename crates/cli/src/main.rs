use anyhow::Context;
use clap::{Parser, Subcommand};
use lectern_app::{app, App};
use lectern_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "LECTERN - book catalog and review service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API until interrupted
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Replace the store content with the sample catalog
    #[command(long_about = "Remove every book and review, then insert the sample catalog and reviews. The books are attributed to catalog.seed_admin_id.")]
    Seed,
    /// Rebuild rating aggregates from reviews
    #[command(long_about = "Recompute averageRating and reviewCount from the stored reviews. Safe to run at any time; repairs aggregates left stale by an interrupted write.")]
    Recompute {
        /// Only recompute this book
        #[arg(long, value_name = "BOOK_ID")]
        book: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load LECTERN settings")?;
    lectern_telemetry::init(&settings.telemetry)?;

    tracing::info!(env = ?settings.environment, "lectern CLI starting");

    match cli.command {
        Commands::Serve => App::bootstrap(settings).await?.serve().await,
        Commands::Migrate => {
            // Building the app applies pending migrations.
            let app = App::build(settings.clone(), app::open_database(&settings).await?).await?;
            app.shutdown().await
        }
        Commands::Seed => {
            let app = App::build(settings.clone(), app::open_database(&settings).await?).await?;
            let report = lectern_app::seed::run(app.services(), &settings.catalog.seed_admin_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            app.shutdown().await
        }
        Commands::Recompute { book } => {
            let app = App::build(settings.clone(), app::open_database(&settings).await?).await?;
            let aggregator = &app.services().aggregator;
            let output = match book {
                Some(book_id) => {
                    let summary = aggregator
                        .recompute(&book_id)
                        .await
                        .with_context(|| format!("failed to recompute book {book_id}"))?;
                    serde_json::to_string_pretty(&summary)?
                }
                None => serde_json::to_string_pretty(&aggregator.recompute_all().await?)?,
            };
            println!("{output}");
            app.shutdown().await
        }
    }
}
