use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use searchku::{
    router, AppState, DatabaseArgs, EmbeddingProvider, OpenAiArgs, OpenAiEmbedder,
    OpenAiTranslator, PageStore, PgStore, SearchArgs, SearchService, TranslationArgs, Translator,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "searchku-api",
    about = "HTTP API for multilingual semantic search over book pages"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "SEARCHKU_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    search: SearchArgs,

    #[command(flatten)]
    translation: TranslationArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = ApiCli::parse();
    let embedder = OpenAiEmbedder::new(
        cli.openai.openai_api_key.clone(),
        cli.openai.openai_base_url.clone(),
        cli.openai.embedding_model.clone(),
        cli.openai.embedding_dimensions,
        cli.openai.timeout(),
        cli.openai.max_retries,
        cli.openai.batch_size,
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

    let translator: Option<Arc<dyn Translator>> =
        if cli.translation.translation_model.trim().is_empty() {
            warn!("translation model not configured; /api/translate disabled");
            None
        } else {
            let translator = OpenAiTranslator::new(
                cli.openai.openai_api_key.clone(),
                cli.openai.openai_base_url.clone(),
                cli.translation.translation_model.clone(),
                cli.translation.translation_temperature,
                cli.openai.timeout(),
            )
            .context("failed to build translation client")?;
            Some(Arc::new(translator) as Arc<dyn Translator>)
        };

    let store: Arc<dyn PageStore> = Arc::new(store);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);
    let state = AppState {
        search: SearchService::new(store, embedder, cli.search.build_settings()),
        translator,
    };
    let app = router(state);

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    info!(%addr, "searchku-api listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}
