use anyhow::{Context, Result};
use clap::Parser;
use searchku::{index_pending_pages, DatabaseArgs, OpenAiArgs, OpenAiEmbedder, PgStore};

#[derive(Parser, Debug)]
#[command(
    name = "searchku-indexer",
    about = "Embed pages that have no vector yet so they become searchable"
)]
struct IndexerCli {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    openai: OpenAiArgs,

    /// Stop after this many pages (default: all pending pages)
    #[arg(long, env = "SEARCHKU_INDEX_MAX_PAGES")]
    max_pages: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = IndexerCli::parse();
    let batch_size = cli.openai.batch_size.max(1);
    let embedder = OpenAiEmbedder::new(
        cli.openai.openai_api_key.clone(),
        cli.openai.openai_base_url.clone(),
        cli.openai.embedding_model.clone(),
        cli.openai.embedding_dimensions,
        cli.openai.timeout(),
        cli.openai.max_retries,
        batch_size,
    )
    .context("failed to build embedding client")?;

    let store = PgStore::connect(&cli.database.store_config())
        .await
        .context("failed to connect to Postgres")?;
    if cli.database.prepare_schema {
        let dims = embedder
            .expected_dimensions()
            .context("--embedding-dimensions is required to prepare the schema for this model")?;
        store
            .ensure_schema(dims)
            .await
            .context("failed to prepare page schema")?;
    }

    let report = index_pending_pages(&store, &embedder, batch_size, cli.max_pages)
        .await
        .context("embedding backfill failed")?;
    println!(
        "Indexed {} page{} in {} batch{}; skipped {} without text.",
        report.indexed,
        if report.indexed == 1 { "" } else { "s" },
        report.batches,
        if report.batches == 1 { "" } else { "es" },
        report.skipped
    );
    Ok(())
}
