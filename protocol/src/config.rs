//! # Protocol Configuration & Constants
//!
//! Every magic number the relay depends on lives here. Most of them are not
//! ours to choose: cell limits, the BoC magic, and workchain identifiers are
//! fixed by the ledger, and getting one wrong silently breaks address
//! derivation.

// ---------------------------------------------------------------------------
// Workchains
// ---------------------------------------------------------------------------

/// The basechain. Every account the relay talks to lives here.
pub const BASECHAIN: i8 = 0;

/// The masterchain. Validators and config contracts only.
pub const MASTERCHAIN: i8 = -1;

// ---------------------------------------------------------------------------
// Cell Limits
// ---------------------------------------------------------------------------

/// Maximum number of data bits in a single cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell may hold.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum cell tree depth accepted when hashing or deserializing.
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Bit length of a standard internal address (`addr_std` without anycast).
pub const STD_ADDRESS_BITS: usize = 267;

/// `Coins` are a `VarUInteger 16`: at most 15 payload bytes.
pub const MAX_COINS_BYTES: usize = 15;

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Generic bag-of-cells magic prefix.
pub const BOC_MAGIC: u32 = 0xb5ee_9c72;

/// Upper bound on the number of cells accepted from a single BoC.
pub const MAX_BOC_CELLS: usize = 1 << 16;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Nanotons per whole coin. Nine decimals, fixed by the ledger.
pub const NANOS_PER_COIN: u128 = 1_000_000_000;

/// Decimal places of the native coin.
pub const COIN_DECIMALS: u32 = 9;

// ---------------------------------------------------------------------------
// Versioning & Node Defaults
// ---------------------------------------------------------------------------

/// Crate-level protocol version, reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Default HTTP port for the node emulator API.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns a friendly name for a workchain, mainly for logging.
pub fn workchain_name(workchain: i8) -> String {
    match workchain {
        BASECHAIN => "basechain".to_string(),
        MASTERCHAIN => "masterchain".to_string(),
        other => format!("workchain({})", other),
    }
}

/// Parses a decimal coin amount (`"0.05"`, `"10"`) into nanotons.
///
/// Returns `None` for malformed input or more than nine fractional digits.
pub fn parse_coins(s: &str) -> Option<u128> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > COIN_DECIMALS as usize {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_nanos: u128 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    for _ in frac.len()..COIN_DECIMALS as usize {
        frac_nanos *= 10;
    }

    whole.checked_mul(NANOS_PER_COIN)?.checked_add(frac_nanos)
}

/// Formats nanotons as a decimal coin amount, trimming trailing zeros.
pub fn format_coins(nanos: u128) -> String {
    let whole = nanos / NANOS_PER_COIN;
    let frac = nanos % NANOS_PER_COIN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:09}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
