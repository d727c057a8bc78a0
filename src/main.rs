//! Engine API probe.
//!
//! Connects to an execution client's authenticated Engine API endpoint,
//! negotiates capabilities and optionally announces a fork-choice head.
//!
//! Run with:
//! ```sh
//! cargo run --bin engine-probe -- \
//!     --engine-url http://127.0.0.1:8551 \
//!     --jwt-secret /path/to/jwt.hex \
//!     --fork prague \
//!     --head 0x...
//! ```

use alloy_primitives::B256;
use alloy_rpc_types_engine::JwtSecret;
use engine_bridge::{
    engine::{connect_http, ForkchoiceState},
    CallContext, EngineBridge, EngineClientConfig, EngineFork,
};
use eyre::{eyre, WrapErr};
use reth_tracing::{
    tracing::{info, warn},
    tracing_subscriber::filter::LevelFilter,
    LayerInfo, LogFormat, RethTracer, Tracer,
};
use std::path::PathBuf;

/// Command line arguments
struct Args {
    /// Authenticated Engine API URL
    engine_url: String,
    /// Hex-encoded JWT secret file
    jwt_secret: PathBuf,
    /// Fork selecting the Engine API method versions
    fork: EngineFork,
    /// Head to announce with `engine_forkchoiceUpdated`
    head: Option<B256>,
}

impl Args {
    fn parse() -> eyre::Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut engine_url = engine_bridge::engine::DEFAULT_RPC_URL.to_string();
        let mut jwt_secret = None;
        let mut fork = EngineFork::Prague;
        let mut head = None;

        let mut i = 1;
        while i < args.len() {
            let value = || args.get(i + 1).ok_or_else(|| eyre!("missing value for {}", args[i]));
            match args[i].as_str() {
                "--engine-url" => {
                    engine_url = value()?.clone();
                    i += 2;
                }
                "--jwt-secret" => {
                    jwt_secret = Some(PathBuf::from(value()?));
                    i += 2;
                }
                "--fork" => {
                    fork = value()?.parse().map_err(|err: String| eyre!(err))?;
                    i += 2;
                }
                "--head" => {
                    head = Some(value()?.parse().wrap_err("invalid head hash")?);
                    i += 2;
                }
                _ => i += 1,
            }
        }

        let jwt_secret = jwt_secret.ok_or_else(|| eyre!("--jwt-secret is required"))?;
        Ok(Self { engine_url, jwt_secret, fork, head })
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = RethTracer::new()
        .with_stdout(LayerInfo::new(
            LogFormat::Terminal,
            LevelFilter::INFO.to_string(),
            "engine=debug".to_string(),
            Some("always".to_string()),
        ))
        .init();

    let args = Args::parse()?;
    let config = EngineClientConfig::new(&args.engine_url).with_jwt_secret_path(&args.jwt_secret);

    info!(url = %config.rpc_url, fork = %args.fork, "Connecting to execution client");

    let secret = JwtSecret::from_file(&args.jwt_secret)
        .wrap_err_with(|| format!("failed to read JWT secret {}", args.jwt_secret.display()))?;
    let transport = connect_http(&config.rpc_url, secret, config.max_timeout())?;
    let bridge = EngineBridge::new(config, transport);
    let ctx = CallContext::new();

    let capabilities = bridge.exchange_capabilities(&ctx).await?;
    info!(
        supported = capabilities.supported().count(),
        missing = capabilities.missing().count(),
        "Capabilities negotiated"
    );

    let Some(head) = args.head else { return Ok(()) };

    let state = ForkchoiceState {
        head_block_hash: head,
        safe_block_hash: head,
        finalized_block_hash: B256::ZERO,
    };
    match bridge.forkchoice_updated(&ctx, &state, None, args.fork).await {
        Ok(_) => info!(%head, "Fork choice accepted"),
        Err(err) if err.is_not_ready() => warn!(%head, %err, "Execution client is not ready"),
        Err(err) => {
            warn!(%head, kind = %err.kind(), %err, "Fork choice update failed");
            return Err(err.into());
        }
    }

    Ok(())
}
