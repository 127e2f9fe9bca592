use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::pubsub::PubSubFrontend;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::ws::WsConnect;
use doomsday_miner::chain::alloy_client::SubmitSettings;
use doomsday_miner::chain::{AlloyChain, ChainClient};
use doomsday_miner::error::{ConfigError, MinerError, RpcError};
use doomsday_miner::miner::{MinerState, SearchConfig, SearchEngine};
use doomsday_miner::monitor::RoundMonitor;
use doomsday_miner::runtime::{emit_runtime_status, parse_runtime_args};
use doomsday_miner::utils::config::Config;
use doomsday_miner::utils::error::compact_error_message;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    // Default to `info` when `RUST_LOG` is unset or invalid to avoid silent startup.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        eprintln!("[BOOT] RUST_LOG invalid or unset; defaulting to 'info'");
        tracing_subscriber::EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let runtime_args = parse_runtime_args()?;
    if runtime_args.help {
        println!("{}", doomsday_miner::runtime::args::USAGE);
        return Ok(());
    }

    doomsday_miner::utils::env_guard::harden_env_setup();
    init_tracing();

    let mut config = Config::load()?;
    config.dry_run |= runtime_args.dry_run;

    let signer: PrivateKeySigner = config
        .eth_private_key
        .trim()
        .parse()
        .map_err(|err| ConfigError::Invalid(format!("ETH_PRIVATE_KEY rejected: {err}")))
        .map_err(MinerError::from)?;
    let participant = signer.address();
    emit_runtime_status(&config, participant);
    if runtime_args.explain_config {
        return Ok(());
    }

    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_ws(WsConnect::new(config.eth_ws_url.clone()))
        .await
        .map_err(|err| RpcError::Transport(compact_error_message(&err.to_string(), 260)))
        .map_err(MinerError::from)?;
    tracing::info!("[BOOT] Connected.");

    let chain = Arc::new(AlloyChain::<_, PubSubFrontend>::new(
        provider,
        participant,
        SubmitSettings {
            chain_id: config.chain_id,
            dry_run: config.dry_run,
            receipt_timeout: Duration::from_millis(config.receipt_timeout_ms),
        },
    ));
    let state = Arc::new(MinerState::new());
    let engine = Arc::new(SearchEngine::new(
        Arc::clone(&chain),
        Arc::clone(&state),
        SearchConfig {
            progress_interval: config.progress_interval,
            ..SearchConfig::new(participant)
        },
    ));
    let monitor = RoundMonitor::new(Arc::clone(&chain), state, engine, config.retry_policy());

    let blocks = chain
        .subscribe_new_blocks()
        .await
        .map_err(|err| RpcError::Subscription(compact_error_message(&format!("{err:#}"), 260)))
        .map_err(MinerError::from)?;
    tracing::info!("[BOOT] Listening for new blocks...");
    monitor.run(blocks).await;

    Err(MinerError::from(RpcError::Subscription("block feed closed".to_string())).into())
}
