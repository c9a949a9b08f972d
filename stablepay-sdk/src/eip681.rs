//! EIP-681 transfer request URIs for ERC-20 stablecoin payments.
//!
//! A payment screen renders one of these URIs as a QR code so that a wallet
//! can prefill the token transfer.  The wire format is:
//!
//! ```text
//! ethereum:{token_contract}@{chain_id}/transfer?address={recipient}&uint256={base_units}
//! ```
//!
//! `base_units` is the token amount scaled by the token's decimals, as a
//! decimal digit string.  Amounts are handled entirely in integer digit
//! arithmetic; no floating point is involved at any step.

use std::fmt;

/// Chain id of Base mainnet, the default settlement chain.
pub const BASE_CHAIN_ID: u64 = 8453;

/// Decimals of USDC, the default settlement token.
pub const USDC_DECIMALS: u32 = 6;

/// Errors produced while building a transfer request URI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Eip681Error {
    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount {
        amount: String,
        reason: &'static str,
    },
    #[error("invalid {field} address: {value:?}")]
    InvalidAddress {
        field: &'static str,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Amount encoding
// ---------------------------------------------------------------------------

/// A token amount in base units, kept as a decimal digit string so that
/// amounts beyond the range of machine integers survive unharmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUnits(String);

impl BaseUnits {
    /// The digit string, without leading zeros (`"0"` for zero).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a human-entered decimal amount into token base units.
///
/// The amount is split on the decimal point.  The fractional part is
/// right-padded with zeros to `decimals` digits; extra fractional digits
/// beyond `decimals` are truncated, not rounded, so the encoded amount never
/// exceeds what the customer typed.
///
/// Returns [`Eip681Error::InvalidAmount`] when the trimmed input is empty or
/// when either part contains anything but ASCII digits.  Signs, exponents,
/// and a second decimal point are all rejected.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<BaseUnits, Eip681Error> {
    let invalid = |reason| Eip681Error::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty after trimming"));
    }

    let (whole_raw, frac_raw) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    let whole = if whole_raw.is_empty() { "0" } else { whole_raw };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("whole part has non-digit characters"));
    }
    if !frac_raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("fractional part has non-digit characters"));
    }

    // whole * 10^decimals + frac is exactly the concatenation of the whole
    // part with the fractional part padded to `decimals` digits.
    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.extend(frac_raw.chars().take(decimals as usize));
    let padding = (decimals as usize).saturating_sub(frac_raw.len());
    for _ in 0..padding {
        digits.push('0');
    }

    let normalized = digits.trim_start_matches('0');
    if normalized.is_empty() {
        return Ok(BaseUnits("0".to_string()));
    }
    Ok(BaseUnits(normalized.to_string()))
}

// ---------------------------------------------------------------------------
// Transfer requests
// ---------------------------------------------------------------------------

/// A validated ERC-20 transfer request, ready to be rendered as an EIP-681
/// URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token_contract: String,
    pub recipient: String,
    pub amount_base_units: BaseUnits,
    pub chain_id: u64,
}

impl TransferRequest {
    /// Build a transfer request for `amount` tokens of an ERC-20 contract.
    ///
    /// Addresses are validated before the amount is touched: both must be
    /// non-empty and carry the `0x` prefix.  No checksum validation is
    /// performed; the addresses are embedded verbatim.
    pub fn erc20_transfer(
        token_contract: &str,
        recipient: &str,
        amount: &str,
        chain_id: u64,
        token_decimals: u32,
    ) -> Result<Self, Eip681Error> {
        validate_address("token contract", token_contract)?;
        validate_address("recipient", recipient)?;
        let amount_base_units = to_base_units(amount, token_decimals)?;
        Ok(Self {
            token_contract: token_contract.to_string(),
            recipient: recipient.to_string(),
            amount_base_units,
            chain_id,
        })
    }

    /// Render the `ethereum:` URI.  Pure formatting; equal requests always
    /// produce byte-identical URIs.
    pub fn to_uri(&self) -> String {
        format!(
            "ethereum:{}@{}/transfer?address={}&uint256={}",
            self.token_contract, self.chain_id, self.recipient, self.amount_base_units
        )
    }
}

/// Shorthand for [`TransferRequest::erc20_transfer`] followed by
/// [`TransferRequest::to_uri`].
pub fn build_erc20_transfer_uri(
    token_contract: &str,
    recipient: &str,
    amount: &str,
    chain_id: u64,
    token_decimals: u32,
) -> Result<String, Eip681Error> {
    Ok(TransferRequest::erc20_transfer(token_contract, recipient, amount, chain_id, token_decimals)?
        .to_uri())
}

fn validate_address(field: &'static str, value: &str) -> Result<(), Eip681Error> {
    if value.is_empty() || !value.starts_with("0x") {
        return Err(Eip681Error::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
