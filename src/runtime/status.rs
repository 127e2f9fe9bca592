use crate::miner::DifficultyParams;
use crate::utils::config::Config;
use crate::utils::constants::{DOOMSDAY_ADDRESS, SETTLE_TOPIC};
use alloy::primitives::Address;

/// Strip credentials and path from an endpoint for logging.
fn redact_endpoint(raw: &str) -> String {
    match raw.parse::<reqwest::Url>() {
        Ok(url) => format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or("?"),
            url.port().map(|p| format!(":{p}")).unwrap_or_default()
        ),
        Err(_) => "<unparseable>".to_string(),
    }
}

pub fn emit_runtime_status(config: &Config, participant: Address) {
    let params = DifficultyParams::contract();
    tracing::info!(
        "[BOOT] Runtime resolved: endpoint={} chain={} participant={:#x} mode={}",
        redact_endpoint(&config.eth_ws_url),
        config.chain_id,
        participant,
        if config.dry_run { "dry-run" } else { "live" }
    );
    tracing::info!(
        "[BOOT] Contract {:#x} settle_topic={:#x} base_difficulty={} ramp={} cooldown={}x{}",
        DOOMSDAY_ADDRESS,
        SETTLE_TOPIC,
        params.base,
        params.ramp,
        params.cooldown_window,
        params.cooldown_slope
    );
    tracing::info!(
        "[BOOT] RPC reads: attempts={} timeout={}ms receipt_timeout={}ms progress_every={}",
        config.rpc_read_retries,
        config.rpc_call_timeout_ms,
        config.receipt_timeout_ms,
        config.progress_interval
    );
}
