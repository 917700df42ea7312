use anyhow::{Context, Result};
use clap::Parser;
use predictor_server::store::{MemoryStore, RedisStore, Store};
use predictor_server::{Api, AppState};
use predictor_types::record::{DEFAULT_FIRST_DEPOSIT_USD, DEFAULT_REDEPOSIT_USD};
use predictor_types::Thresholds;
use std::net::{IpAddr, SocketAddr};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Redis connection URL (falls back to the REDIS_URL env var).
    #[arg(long)]
    redis_url: Option<String>,

    /// Use an in-memory record store instead of redis (local development).
    #[arg(long, default_value_t = false)]
    memory_store: bool,

    /// Key prefix for user records in redis.
    #[arg(long, default_value = "user:")]
    user_key_prefix: String,

    /// Minimum qualifying first deposit in USD.
    #[arg(long, default_value_t = DEFAULT_FIRST_DEPOSIT_USD)]
    first_deposit_usd: f64,

    /// Minimum qualifying repeat deposit in USD.
    #[arg(long, default_value_t = DEFAULT_REDEPOSIT_USD)]
    redeposit_usd: f64,
}

fn build_store(args: &Args) -> Result<Option<Store>> {
    if args.memory_store {
        info!("using in-memory record store");
        return Ok(Some(Store::Memory(MemoryStore::default())));
    }
    let url = args
        .redis_url
        .clone()
        .or_else(|| std::env::var("REDIS_URL").ok())
        .filter(|url| !url.trim().is_empty());
    match url {
        Some(url) => {
            let store = RedisStore::new(&url, args.user_key_prefix.clone())
                .context("invalid redis URL")?;
            info!("using redis record store");
            Ok(Some(Store::Redis(store)))
        }
        None => {
            warn!("no record store configured; requests will fail until REDIS_URL is set");
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let thresholds = Thresholds {
        first_deposit_usd: args.first_deposit_usd,
        redeposit_usd: args.redeposit_usd,
    };
    let store = build_store(&args)?;
    let state = AppState::new(store, thresholds);
    let api = Api::new(state);
    let app = api.router();

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
