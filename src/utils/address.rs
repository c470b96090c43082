// src/utils/address.rs
//! Chain address validation and canonicalization.
//!
//! Addresses are compared case-insensitively everywhere in the authority, so
//! every address is reduced to one canonical spelling (`0x` + 40 lowercase
//! hex digits) before it is stored or looked up.

use ethers_core::types::Address;
use ethers_core::utils::hex;
use std::str::FromStr;

/// Parses a `0x`-prefixed, 20-byte hex address. Mixed case is accepted.
pub fn parse_address(raw: &str) -> Option<Address> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Address::from_str(digits).ok()
}

/// Formats an address as lowercase hex with the `0x` prefix.
pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_bytes()))
}

/// Canonical form of a holder address, or `None` if it is malformed or the zero address.
pub fn canonical_holder(raw: &str) -> Option<String> {
    parse_address(raw)
        .filter(|addr| !addr.is_zero())
        .map(|addr| format_address(&addr))
}

/// Canonical form of an issuer or administrator identity.
///
/// Identities are usually addresses but the registry does not require it.
pub fn canonical_identity(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
