use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use krx_lookup::marketplace::fixture::FixtureMarketplace;
use krx_lookup::marketplace::krx::{KrxMarketplace, ENDPOINT};
use krx_lookup::marketplace::MarketDataApi;
use krx_lookup::server::{self, ServerState};

#[derive(Parser, Debug)]
#[command(about = "Korean stock and ETF lookup API")]
struct Args {
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "127.0.0.1:5001")]
    address: String,
    #[arg(long, env = "KRX_API_KEY", hide_env_values = true)]
    krx_api_key: Option<String>,
    #[arg(long, env = "KRX_BASE_URL", default_value = ENDPOINT)]
    krx_base_url: String,
    /// Seconds before a KRX request is abandoned
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout: u64,
    /// Serve a JSON market snapshot instead of calling KRX
    #[arg(long, env = "FIXTURE_PATH")]
    fixture_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "{}=debug,krx_lookup=debug,tower_http=debug,reqwest=debug",
                env!("CARGO_CRATE_NAME")
            )
            .into()
        }))
        .with(fmt::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match (args.fixture_path, args.krx_api_key) {
        (Some(path), _) => {
            let market = FixtureMarketplace::load(&path).await?;
            serve(args.address, market).await
        }
        (None, Some(key)) => {
            let market = KrxMarketplace::new(
                key,
                args.krx_base_url,
                Duration::from_secs(args.request_timeout),
            )?;
            serve(args.address, market).await
        }
        (None, None) => bail!("Either --krx-api-key (KRX_API_KEY) or --fixture-path is required"),
    }
}

/// Builds the ticker directory before accepting requests, so a failing source stops startup.
async fn serve<M: MarketDataApi + 'static>(address: String, market: M) -> Result<()> {
    let state = Arc::new(ServerState::new(market));
    let directory = state.directory().await?;
    info!("{} names ready", directory.len());

    server::start(address, state).await
}
