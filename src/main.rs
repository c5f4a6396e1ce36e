use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tree_api::config::{Config, LogFormat};
use tree_api::{api, render, storage, TreeManager};

#[derive(Parser)]
#[command(name = "tree-api")]
#[command(about = "Durable forest-of-trees service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the stored forest as a tree
    Show,
    /// Load the stored snapshot and report its state and storage health
    Check,
}

#[derive(Args, Debug, PartialEq, Eq)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for HTTP API
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

/// Used when no subcommand is given.
impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Initialize tracing from RUST_LOG, as plain text or JSON lines
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tree_api=info,tower_http=info".into()),
    );

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn open(config: &Config) -> anyhow::Result<TreeManager> {
    let backend = storage::from_config(config)?;
    let tree = TreeManager::hydrate(backend).await?;
    Ok(tree)
}

async fn serve(config: Config, args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!("Starting tree server with {} storage", config.storage.kind());

    let tree = open(&config).await.inspect_err(|e| {
        tracing::error!("Failed to initialize: {:#}", e);
    })?;
    let app = api::create_router(Arc::new(tree));

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    tracing::info!("Tree server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down tree server");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command {
        Some(Commands::Serve(args)) => serve(config, args).await?,
        None => serve(config, ServeArgs::default()).await?,
        Some(Commands::Show) => {
            let tree = open(&config).await?;
            print!("{}", render::render_forest(&tree.list_trees().await));
        }
        Some(Commands::Check) => {
            let tree = open(&config).await?;
            let stats = tree.stats().await;
            let health = tree.storage_health().await;
            println!(
                "{} nodes in {} trees, next id {}",
                stats.nodes, stats.roots, stats.next_id
            );
            println!(
                "storage ({}): {}",
                config.storage.kind(),
                health.detail
            );
            if !health.healthy {
                anyhow::bail!("storage is unhealthy");
            }
        }
    }

    Ok(())
}
