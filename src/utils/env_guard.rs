use std::fs;
use std::path::Path;

const ENV_TEMPLATE: &str = "\
# Doomsday miner configuration

ETH_WS_URL=\"wss://mainnet.infura.io/ws/v3/CHANGE_ME\"
ETH_PRIVATE_KEY=\"0xCHANGE_ME\"
CHAIN_ID=\"1\"

# Simulate the winning settle() but never broadcast it.
MINER_DRY_RUN=\"false\"

RUST_LOG=\"info,doomsday_miner=info\"
";

/// Parse one `KEY=value` line. Comments, blanks and malformed lines yield `None`.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim().trim_start_matches("export ").trim();
    if key.is_empty() {
        return None;
    }

    let value = value.split(" #").next().unwrap_or("").trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Some((key, unquoted))
}

fn load_dot_env(path: &Path) {
    if !path.exists() {
        return;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ENV] Failed to read {}: {}", path.display(), e);
            return;
        }
    };
    for (key, value) in content.lines().filter_map(parse_env_line) {
        // The process environment always wins over the file.
        if std::env::var_os(key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
    }
}

fn ensure_env_example_exists() {
    let example = Path::new(".env.example");
    if example.exists() {
        return;
    }
    if let Err(e) = fs::write(example, ENV_TEMPLATE) {
        eprintln!("[ENV] Could not write .env.example: {}", e);
    }
}

/// Load `.env` from the working directory and warn about missing essentials.
///
/// Runs before tracing is initialised, so everything here goes to stderr directly.
pub fn harden_env_setup() {
    ensure_env_example_exists();
    load_dot_env(Path::new(".env"));
    for key in ["ETH_WS_URL", "ETH_PRIVATE_KEY"] {
        if std::env::var(key).is_err() {
            eprintln!("[ENV] WARN: {} is not set", key);
        }
    }
}
