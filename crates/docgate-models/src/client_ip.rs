//! Registration IP values.

use std::fmt;
use std::net::IpAddr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Loopback address stored when a registration carries no usable IP.
pub const DEFAULT_FALLBACK_IP: &str = "127.0.0.1";

/// Maximum stored length for addresses that do not parse as an IP.
const MAX_OPAQUE_LEN: usize = 64;

/// Values that browsers and upstream collaborators send in place of a missing address.
const PLACEHOLDERS: [&str; 4] = ["undefined", "null", "none", "unknown"];

/// A client network address as recorded on an account.
///
/// Never empty: construction substitutes the configured fallback for missing,
/// blank or placeholder values so that every registration is counted by the
/// reputation signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClientIp(String);

impl ClientIp {
    /// Normalize a raw address, substituting `fallback` when it is missing.
    ///
    /// Parseable addresses are canonicalized (IPv4-mapped IPv6 becomes IPv4,
    /// IPv6 is compressed). Anything else is kept trimmed and lowercased.
    pub fn from_raw(raw: Option<&str>, fallback: &str) -> Self {
        match raw.map(str::trim).filter(|s| !is_placeholder(s)) {
            Some(value) => Self::normalize(value),
            None => {
                let fallback = fallback.trim();
                if is_placeholder(fallback) {
                    Self(DEFAULT_FALLBACK_IP.to_string())
                } else {
                    Self::normalize(fallback)
                }
            }
        }
    }

    /// Wrap a value already stored by the ledger.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn normalize(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(ip) => Self(ip.to_canonical().to_string()),
            Err(_) => Self(value.to_lowercase().chars().take(MAX_OPAQUE_LEN).collect()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key usable as a single path segment in document stores.
    ///
    /// Canonical IPs pass through unchanged. Every other byte, including `_`,
    /// is written as `_xx` hex, so distinct addresses never share a key and
    /// the result needs no URL escaping.
    pub fn storage_key(&self) -> String {
        let all_dots = self.0.bytes().all(|b| b == b'.');
        let mut key = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            let plain = matches!(byte, b'0'..=b'9' | b'a'..=b'z' | b':') || (byte == b'.' && !all_dots);
            if plain {
                key.push(char::from(byte));
            } else {
                key.push_str(&format!("_{:02x}", byte));
            }
        }
        key
    }

    pub fn is_loopback(&self) -> bool {
        self.0
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty() || PLACEHOLDERS.iter().any(|p| value.eq_ignore_ascii_case(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ip_uses_fallback() {
        assert_eq!(ClientIp::from_raw(None, DEFAULT_FALLBACK_IP).as_str(), "127.0.0.1");
        assert_eq!(ClientIp::from_raw(Some(""), DEFAULT_FALLBACK_IP).as_str(), "127.0.0.1");
        assert_eq!(ClientIp::from_raw(Some("   "), DEFAULT_FALLBACK_IP).as_str(), "127.0.0.1");
    }

    #[test]
    fn test_placeholder_strings_use_fallback() {
        assert_eq!(ClientIp::from_raw(Some("undefined"), "::1").as_str(), "::1");
        assert_eq!(ClientIp::from_raw(Some("NULL"), "::1").as_str(), "::1");
    }

    #[test]
    fn test_blank_fallback_uses_default() {
        assert_eq!(ClientIp::from_raw(None, "").as_str(), DEFAULT_FALLBACK_IP);
        assert_eq!(ClientIp::from_raw(None, "undefined").as_str(), DEFAULT_FALLBACK_IP);
    }

    #[test]
    fn test_canonicalizes_addresses() {
        assert_eq!(ClientIp::from_raw(Some(" 1.2.3.4 "), DEFAULT_FALLBACK_IP).as_str(), "1.2.3.4");
        assert_eq!(
            ClientIp::from_raw(Some("::ffff:1.2.3.4"), DEFAULT_FALLBACK_IP).as_str(),
            "1.2.3.4"
        );
        assert_eq!(
            ClientIp::from_raw(Some("2001:0db8:0000:0000:0000:0000:0000:0001"), DEFAULT_FALLBACK_IP).as_str(),
            "2001:db8::1"
        );
    }

    #[test]
    fn test_opaque_values_are_kept() {
        let ip = ClientIp::from_raw(Some("Proxy-Host"), DEFAULT_FALLBACK_IP);
        assert_eq!(ip.as_str(), "proxy-host");
        let long = "x".repeat(200);
        assert_eq!(ClientIp::from_raw(Some(&long), DEFAULT_FALLBACK_IP).as_str().len(), 64);
    }

    #[test]
    fn test_storage_key_keeps_addresses_readable() {
        assert_eq!(ClientIp::from_raw(Some("1.2.3.4"), DEFAULT_FALLBACK_IP).storage_key(), "1.2.3.4");
        assert_eq!(ClientIp::from_raw(Some("2001:db8::1"), DEFAULT_FALLBACK_IP).storage_key(), "2001:db8::1");
    }

    #[test]
    fn test_storage_key_escapes_path_and_query_characters() {
        let key = |raw: &str| ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP).storage_key();
        assert_eq!(key("10.0.0.0/8"), "10.0.0.0_2f8");
        assert_eq!(key("proxy#a"), "proxy_23a");
        assert_eq!(key("host?x=1"), "host_3fx_3d1");
        assert_eq!(key(".."), "_2e_2e");
    }

    #[test]
    fn test_storage_key_is_injective() {
        let key = |raw: &str| ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP).storage_key();
        assert_ne!(key("10.0.0.0/8"), key("10.0.0.0_8"));
        assert_ne!(key("a_2fb"), key("a/b"));
        assert_eq!(key("10.0.0.0_8"), "10.0.0.0_5f8");
    }

    #[test]
    fn test_is_loopback() {
        assert!(ClientIp::from_raw(None, DEFAULT_FALLBACK_IP).is_loopback());
        assert!(!ClientIp::from_raw(Some("8.8.8.8"), DEFAULT_FALLBACK_IP).is_loopback());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let ip = ClientIp::from_raw(Some("1.2.3.4"), DEFAULT_FALLBACK_IP);
        assert_eq!(serde_json::to_string(&ip).unwrap(), "\"1.2.3.4\"");
    }
}
