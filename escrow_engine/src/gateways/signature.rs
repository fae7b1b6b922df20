//! Canonical strings and digests for the gateway signature schemes.
//!
//! Everything in here is pure and infallible. A missing field contributes nothing to the canonical string, so a
//! payload with missing fields simply produces a digest that does not match.
use md5::{Digest, Md5};
use sha2::Sha512;

use crate::gateways::GatewayPayload;

/// `key=value&key=value…` over the non-empty fields in `field_order`, with values trimmed and encoded the way
/// PayFast expects, followed by `&passphrase=…` when a passphrase is configured.
pub fn payfast_canonical_string(payload: &GatewayPayload, field_order: &[&str], passphrase: Option<&str>) -> String {
    let mut parts = field_order
        .iter()
        .filter_map(|&key| {
            let value = payload.value(key).trim();
            (!value.is_empty()).then(|| format!("{key}={}", payfast_encode(value)))
        })
        .collect::<Vec<String>>();
    if let Some(passphrase) = passphrase.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(format!("passphrase={}", payfast_encode(passphrase)));
    }
    parts.join("&")
}

pub fn payfast_signature(payload: &GatewayPayload, field_order: &[&str], passphrase: Option<&str>) -> String {
    md5_hex(&payfast_canonical_string(payload, field_order, passphrase))
}

/// The non-empty values in `field_order`, concatenated without separators, followed by the private key.
pub fn values_canonical_string(payload: &GatewayPayload, field_order: &[&str], key: &str) -> String {
    let mut result = field_order.iter().map(|&k| payload.value(k)).filter(|v| !v.is_empty()).collect::<String>();
    result.push_str(key);
    result
}

pub fn ozow_hash(payload: &GatewayPayload, field_order: &[&str], private_key: &str) -> String {
    sha512_hex(&values_canonical_string(payload, field_order, private_key))
}

pub fn paygate_checksum(payload: &GatewayPayload, field_order: &[&str], encryption_key: &str) -> String {
    md5_hex(&values_canonical_string(payload, field_order, encryption_key))
}

pub fn md5_hex(data: &str) -> String {
    hex::encode(Md5::digest(data.as_bytes()))
}

pub fn sha512_hex(data: &str) -> String {
    hex::encode(Sha512::digest(data.as_bytes()))
}

/// Compares two hex digests, ignoring case, in time that depends only on their length.
pub fn digests_match(expected: &str, supplied: &str) -> bool {
    let expected = expected.trim().as_bytes();
    let supplied = supplied.trim().as_bytes();
    if expected.is_empty() || expected.len() != supplied.len() {
        return false;
    }
    expected
        .iter()
        .zip(supplied.iter())
        .fold(0u8, |acc, (a, b)| acc | (a.to_ascii_lowercase() ^ b.to_ascii_lowercase()))
        == 0
}

/// Percent-encoding as produced by JavaScript's `encodeURIComponent`, with spaces written as `+`.
fn payfast_encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%20", "+")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}
