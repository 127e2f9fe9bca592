/// Collapse an RPC/transport error into a single bounded log line.
///
/// Providers like to echo whole JSON payloads and backtraces back at us; neither is useful in
/// a block-by-block log.
pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let mut raw = message;
    if let Some((prefix, _)) = raw.split_once("Stack backtrace:") {
        raw = prefix;
    }
    let (raw, elided) = match raw.split_once(" text: ") {
        Some((prefix, _)) => (prefix, true),
        None => (raw, false),
    };

    let mut compact = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if elided {
        compact.push_str(" text=<omitted>");
    }
    if compact.len() <= max_len {
        return compact;
    }
    let mut cut = max_len;
    while !compact.is_char_boundary(cut) {
        cut -= 1;
    }
    compact.truncate(cut);
    compact.push_str("...(truncated)");
    compact
}
