//! pgvector Query
//!
//! Runs a similarity search (or a health probe) against a PostgreSQL store
//! with the pgvector extension, configured entirely from the environment.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::postgres::{ConnectionPool, check_health_detailed};
use domain_retrieval::{
    OpenAIProvider, OutputKind, RetrieverOutput, SimilaritySearchEngine, build_output,
};
use eyre::{Result, WrapErr};
use tracing::info;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "pgvector-query")]
#[command(about = "Similarity search against a pgvector store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search with free text, or with a JSON payload when a query template is configured
    Query {
        /// Search text or multi-key JSON payload
        query: String,

        /// Number of results. Defaults to PGVECTOR_TOP_K.
        #[arg(short, long)]
        k: Option<usize>,

        /// jsonb containment filter on metadata, e.g. '{"source":"wiki"}'
        #[arg(short, long)]
        filter: Option<String>,

        /// Handle to search through: retriever (documents) or vectorStore (with scores)
        #[arg(short, long, default_value = "retriever")]
        output: OutputKind,
    },

    /// Check connectivity and the pgvector extension
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    info!(target_db = %config.database.display_target(), "Connecting to database...");
    let pool = Arc::new(
        ConnectionPool::connect(&config.database)
            .await
            .wrap_err("Database connection failed")?,
    );

    run_and_close(cli.command, &config, &pool).await
}

/// Run one command, then close the pool whatever the outcome
async fn run_and_close(
    command: Commands,
    config: &Config,
    pool: &Arc<ConnectionPool>,
) -> Result<()> {
    let outcome = run(command, config, pool).await;
    pool.close().await?;
    outcome
}

async fn run(command: Commands, config: &Config, pool: &Arc<ConnectionPool>) -> Result<()> {
    match command {
        Commands::Query {
            query,
            k,
            filter,
            output,
        } => {
            let mut search = config.search.clone();
            if let Some(k) = k {
                search = search.with_k(k);
            }
            if let Some(raw) = filter {
                search = search.with_filter(
                    serde_json::from_str(&raw).wrap_err("--filter must be valid JSON")?,
                );
            }

            let embeddings = Arc::new(OpenAIProvider::from_env()?);
            let engine = SimilaritySearchEngine::new(Arc::clone(pool), embeddings, &search)?;

            info!(table = %search.table, k = search.k, %output, "Running similarity search");

            match build_output(Arc::new(engine), search.k, output) {
                RetrieverOutput::Retriever(retriever) => {
                    let docs = retriever.retrieve(&query).await?;
                    info!(results = docs.len(), "Search complete");
                    println!("{}", serde_json::to_string_pretty(&docs)?);
                }
                RetrieverOutput::VectorStore(store) => {
                    let docs = store.similarity_search_with_score(&query).await?;
                    info!(results = docs.len(), "Search complete");
                    println!("{}", serde_json::to_string_pretty(&docs)?);
                }
            }
        }

        Commands::Health => {
            let status = check_health_detailed(pool).await;
            println!(
                "healthy: {}, pgvector: {}, response time: {}ms",
                status.healthy,
                status.vector_version.as_deref().unwrap_or("missing"),
                status.response_time_ms
            );
            if let Some(message) = status.message {
                eyre::bail!("Health check failed: {}", message);
            }
        }
    }

    Ok(())
}
