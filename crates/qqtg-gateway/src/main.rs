use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use qqtg_channels::{DestinationChannel, SourceChannel};
use qqtg_onebot::OneBotClient;
use qqtg_relay::{Bridge, RelayOptions};
use qqtg_store::CorrelationStore;
use qqtg_telegram::{TelegramAdapter, TelegramCredential};
use tracing::info;

mod app;
mod http;

#[derive(Parser)]
#[command(name = "qqtg-gateway")]
#[command(about = "Relay QQ conversations into Telegram forum topics", long_about = None)]
struct Cli {
    /// Config file path (default: QQTG_CONFIG or ~/.qqtg/qqtg.toml)
    #[arg(long, short, value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qqtg_gateway=info,qqtg_relay=info".into()),
        )
        .init();

    // explicit path > QQTG_CONFIG env > ~/.qqtg/qqtg.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("QQTG_CONFIG").ok());
    let config = qqtg_core::config::QqtgConfig::load(config_path.as_deref())?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    qqtg_store::db::init_db(&db)?;
    let store = Arc::new(CorrelationStore::new(db));

    // one credential per token; the first is the master bot
    let mut credentials: Vec<Arc<TelegramCredential>> = Vec::new();
    for token in config.telegram.tokens.iter().filter(|t| !t.trim().is_empty()) {
        credentials.push(Arc::new(
            TelegramCredential::connect(token, &config.telegram).await?,
        ));
    }
    let master = Arc::clone(credentials.first().ok_or_else(|| {
        anyhow::anyhow!("no usable Telegram bot token configured")
    })?);
    info!(bots = credentials.len(), "Telegram credentials ready");

    let source: Arc<dyn SourceChannel> = Arc::new(OneBotClient::new(&config.onebot)?);
    let destinations: Vec<Arc<dyn DestinationChannel>> = credentials
        .into_iter()
        .map(|c| c as Arc<dyn DestinationChannel>)
        .collect();
    let bridge = Arc::new(Bridge::new(
        Arc::clone(&store),
        source,
        destinations,
        RelayOptions::from(&config.relay),
    )?);

    let adapter = TelegramAdapter::new(master, Arc::clone(&bridge));
    tokio::spawn(async move {
        adapter.run().await;
    });
    info!("Telegram dispatcher started");

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let onebot_path = config.onebot.path.clone();
    let state = Arc::new(app::AppState::new(config, bridge, store));
    let router = app::build_router(state, &onebot_path);

    info!(%addr, path = %onebot_path, "qqtg gateway listening for OneBot events");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
