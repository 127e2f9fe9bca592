use crate::error::{ConfigError, Result, RpcError};
use crate::utils::constants::DEFAULT_PROGRESS_INTERVAL;
use crate::utils::rpc::RetryPolicy;
use std::env;

const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_RPC_READ_RETRIES: usize = 3;
const DEFAULT_RPC_CALL_TIMEOUT_MS: u64 = 1_500;
const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 60_000;

/// Resolved runtime configuration. Deliberately not `Debug`: it carries the signing key.
#[derive(Clone)]
pub struct Config {
    pub eth_ws_url: String,
    pub eth_private_key: String,
    pub chain_id: u64,
    pub dry_run: bool,
    pub rpc_read_retries: usize,
    pub rpc_call_timeout_ms: u64,
    pub receipt_timeout_ms: u64,
    pub progress_interval: u64,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_ranged<T>(name: &str, default: T, range: std::ops::RangeInclusive<T>) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let Some(raw) = optional_env(name) else {
        return Ok(default);
    };
    let parsed = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be a number, got `{raw}`"))
    })?;
    if !range.contains(&parsed) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be within {}..={}, got {parsed}",
            range.start(),
            range.end()
        ))
        .into());
    }
    Ok(parsed)
}

fn validate_ws_url(name: &str, raw: &str) -> Result<()> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| RpcError::InvalidUrl {
        url: raw.to_string(),
        reason: format!("{name} is not a valid URL: {e}"),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{name} must use ws(s) scheme, got `{other}`"
        ))
        .into()),
    }
}

fn validate_private_key(raw: &str) -> Result<()> {
    let trimmed = raw.trim().trim_start_matches("0x");
    let hexish = trimmed.len() == 64 && trimmed.bytes().all(|b| b.is_ascii_hexdigit());
    if !hexish {
        return Err(ConfigError::Invalid(
            "ETH_PRIVATE_KEY must be 32 bytes of hex (optionally 0x-prefixed)".to_string(),
        )
        .into());
    }
    Ok(())
}

impl Config {
    pub fn load() -> Result<Self> {
        let eth_ws_url = optional_env("ETH_WS_URL")
            .ok_or_else(|| ConfigError::Missing("ETH_WS_URL must be set".to_string()))?;
        validate_ws_url("ETH_WS_URL", &eth_ws_url)?;

        let eth_private_key = optional_env("ETH_PRIVATE_KEY")
            .ok_or_else(|| ConfigError::Missing("ETH_PRIVATE_KEY must be set".to_string()))?;
        validate_private_key(&eth_private_key)?;

        let chain_id = parse_ranged("CHAIN_ID", DEFAULT_CHAIN_ID, 1..=u64::MAX)?;

        let dry_run = match optional_env("MINER_DRY_RUN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::Invalid(format!("MINER_DRY_RUN must be a boolean, got `{raw}`"))
            })?,
            None => false,
        };

        let rpc_read_retries = parse_ranged("RPC_READ_RETRIES", DEFAULT_RPC_READ_RETRIES, 1..=10)?;
        let rpc_call_timeout_ms =
            parse_ranged("RPC_CALL_TIMEOUT_MS", DEFAULT_RPC_CALL_TIMEOUT_MS, 250..=20_000)?;
        let receipt_timeout_ms = parse_ranged(
            "SUBMIT_RECEIPT_TIMEOUT_MS",
            DEFAULT_RECEIPT_TIMEOUT_MS,
            1_000..=600_000,
        )?;
        let progress_interval = parse_ranged(
            "MINER_PROGRESS_EVERY",
            DEFAULT_PROGRESS_INTERVAL,
            1..=u64::MAX,
        )?;

        Ok(Self {
            eth_ws_url,
            eth_private_key,
            chain_id,
            dry_run,
            rpc_read_retries,
            rpc_call_timeout_ms,
            receipt_timeout_ms,
            progress_interval,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.rpc_read_retries,
            call_timeout_ms: self.rpc_call_timeout_ms,
            ..RetryPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::error::{ConfigError, MinerError, RpcError};
    use std::sync::{Mutex, OnceLock};

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_miner_env() {
        for key in [
            "ETH_WS_URL",
            "ETH_PRIVATE_KEY",
            "CHAIN_ID",
            "MINER_DRY_RUN",
            "RPC_READ_RETRIES",
            "RPC_CALL_TIMEOUT_MS",
            "SUBMIT_RECEIPT_TIMEOUT_MS",
            "MINER_PROGRESS_EVERY",
        ] {
            std::env::remove_var(key);
        }
    }

    fn set_required() {
        std::env::set_var("ETH_WS_URL", "wss://eth.example.org/ws");
        std::env::set_var("ETH_PRIVATE_KEY", KEY);
    }

    #[test]
    fn config_applies_defaults() {
        let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());
        clear_miner_env();
        set_required();

        let config = Config::load().expect("config loads");
        assert_eq!(config.chain_id, 1);
        assert!(!config.dry_run);
        assert_eq!(config.rpc_read_retries, 3);
        assert_eq!(config.retry_policy().call_timeout_ms, 1_500);
        assert_eq!(config.progress_interval, 100_000);

        clear_miner_env();
    }

    #[test]
    fn config_reads_overrides() {
        let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());
        clear_miner_env();
        set_required();
        std::env::set_var("CHAIN_ID", "11155111");
        std::env::set_var("MINER_DRY_RUN", "yes");
        std::env::set_var("RPC_READ_RETRIES", "5");

        let config = Config::load().expect("config loads");
        assert_eq!(config.chain_id, 11_155_111);
        assert!(config.dry_run);
        assert_eq!(config.retry_policy().attempts, 5);

        clear_miner_env();
    }

    #[test]
    fn config_requires_ws_url() {
        let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());
        clear_miner_env();
        std::env::set_var("ETH_PRIVATE_KEY", KEY);

        let err = Config::load().err().expect("missing url");
        assert!(matches!(err, MinerError::Config(ConfigError::Missing(_))));

        clear_miner_env();
    }

    #[test]
    fn config_rejects_http_scheme_and_bad_key() {
        let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());
        clear_miner_env();
        set_required();
        std::env::set_var("ETH_WS_URL", "https://eth.example.org");
        let err = Config::load().err().expect("http rejected");
        assert!(err.to_string().contains("ws(s) scheme"), "unexpected: {err}");

        std::env::set_var("ETH_WS_URL", "not a url");
        let err = Config::load().err().expect("garbage rejected");
        assert!(matches!(err, MinerError::Net(RpcError::InvalidUrl { .. })));

        set_required();
        std::env::set_var("ETH_PRIVATE_KEY", "0xnothex");
        let err = Config::load().err().expect("bad key rejected");
        assert!(err.to_string().contains("ETH_PRIVATE_KEY"), "unexpected: {err}");

        clear_miner_env();
    }

    #[test]
    fn config_rejects_out_of_range_retries() {
        let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());
        clear_miner_env();
        set_required();
        std::env::set_var("RPC_READ_RETRIES", "0");

        let err = Config::load().err().expect("zero retries rejected");
        assert!(err.to_string().contains("RPC_READ_RETRIES"), "unexpected: {err}");

        clear_miner_env();
    }
}
