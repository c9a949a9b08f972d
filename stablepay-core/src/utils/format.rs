const BASESCAN_TX_BASE: &str = "https://basescan.org/tx/";

/// Block explorer URL for a settled transaction on Base.
pub fn basescan_tx_url(tx_hash: &str) -> String {
    format!("{BASESCAN_TX_BASE}{tx_hash}")
}

/// Shorten a transaction hash for display: first six characters, an
/// ellipsis, and the last four.  Hashes too short to shorten (or with
/// non-ASCII content) come back unchanged.
pub fn short_hash(hash: &str) -> String {
    if hash.len() <= 10 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
}
