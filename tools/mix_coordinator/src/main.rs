use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sol_wallet::{RetryConfig, RpcGateway};

use mix_coordinator::config::{validate_rpc_url, MixConfig};
use mix_coordinator::db::{JsonFileDb, SessionDb};
use mix_coordinator::http::{router, AppState};
use mix_coordinator::metrics::LogMetrics;
use mix_coordinator::solana::SolanaChain;

#[derive(Parser)]
#[command(name = "mix-coordinator", version, about = "Custodial mix-session engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the mix-session HTTP API.
    Serve(ServeArgs),
    /// Print a stored session record (secrets redacted).
    Inspect(InspectArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// RPC endpoint, in fallback order (repeatable)
    #[arg(long = "rpc", default_values_t = [
        "https://api.mainnet-beta.solana.com".to_string(),
    ])]
    rpc_endpoints: Vec<String>,
    /// Bind address
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,
    /// Session state directory
    #[arg(long, default_value = "mix_state")]
    state_dir: PathBuf,
    /// Session TTL in seconds
    #[arg(long)]
    ttl_secs: Option<i64>,
    /// Flat network fee withheld from payouts, in lamports
    #[arg(long)]
    fee_lamports: Option<u64>,
}

#[derive(Parser)]
struct InspectArgs {
    /// Session state directory
    #[arg(long, default_value = "mix_state")]
    state_dir: PathBuf,
    /// Session id
    #[arg(long)]
    session_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Inspect(args) => inspect(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    for endpoint in &args.rpc_endpoints {
        validate_rpc_url("rpc endpoint", endpoint)?;
    }

    let mut config = MixConfig::from_env();
    if let Some(ttl_secs) = args.ttl_secs {
        config.session_ttl_secs = ttl_secs;
    }
    if let Some(fee_lamports) = args.fee_lamports {
        config.flat_fee_lamports = fee_lamports;
    }
    config.validate()?;

    let gateway = RpcGateway::connect(&args.rpc_endpoints, RetryConfig::from_env())
        .await
        .context("no usable rpc endpoint")?;
    let chain = SolanaChain::new(gateway);
    info!(endpoint = chain.endpoint(), "chain gateway ready");

    let db = JsonFileDb::new(&args.state_dir)?;
    let state = AppState {
        db: Arc::new(db),
        chain: Arc::new(chain),
        metrics: Arc::new(LogMetrics),
        config: Arc::new(config),
    };

    let bind: SocketAddr = args.bind.parse().context("invalid bind address")?;
    info!(%bind, "serving mix-session api");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let db = JsonFileDb::new(&args.state_dir)?;
    let mut session = db
        .get(&args.session_id)?
        .ok_or_else(|| anyhow!("session not found: {}", args.session_id))?;

    session.deposit_secret_encrypted.clear();
    if let Some(secret) = session.output_secret.as_mut() {
        secret.clear();
    }

    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
