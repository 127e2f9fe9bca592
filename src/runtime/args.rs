pub const USAGE: &str = "\
usage: doomsday_miner [--dry-run] [--explain-config]
options:
  --dry-run          simulate the winning settle() but never broadcast it
  --explain-config   print the resolved configuration and exit
  -h, --help         show this message
configuration is read from the environment (and ./.env): ETH_WS_URL, ETH_PRIVATE_KEY,
CHAIN_ID, MINER_DRY_RUN, RPC_READ_RETRIES, RPC_CALL_TIMEOUT_MS, SUBMIT_RECEIPT_TIMEOUT_MS,
MINER_PROGRESS_EVERY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeArgs {
    pub dry_run: bool,
    pub explain_config: bool,
    pub help: bool,
}

fn parse_runtime_args_from_iter<I, S>(args: I) -> anyhow::Result<RuntimeArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = RuntimeArgs::default();
    for arg in args {
        match arg.as_ref() {
            "--dry-run" => parsed.dry_run = true,
            "--explain-config" => parsed.explain_config = true,
            "--help" | "-h" => parsed.help = true,
            other => {
                return Err(anyhow::anyhow!(
                    "unknown argument '{other}' (see --help)"
                ))
            }
        }
    }
    Ok(parsed)
}

pub fn parse_runtime_args() -> anyhow::Result<RuntimeArgs> {
    parse_runtime_args_from_iter(std::env::args().skip(1))
}
