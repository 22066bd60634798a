//! Rate key validation and handling.

use std::fmt;
use std::net::IpAddr;

use crate::error::{GatekeeperError, Result};

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Identifies the caller an admission decision is scoped to.
///
/// Typically a client address, but any stable credential string works.
/// A `RateKey` is always non-empty, free of control characters, and at most
/// [`MAX_KEY_LEN`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey(String);

impl RateKey {
    /// Validate and wrap a raw key.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        if raw.trim().is_empty() {
            return Err(GatekeeperError::InvalidArgument(
                "rate key must not be empty".into(),
            ));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(GatekeeperError::InvalidArgument(format!(
                "rate key is {} bytes, limit is {}",
                raw.len(),
                MAX_KEY_LEN
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(GatekeeperError::InvalidArgument(
                "rate key contains control characters".into(),
            ));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for RateKey {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

impl TryFrom<&str> for RateKey {
    type Error = GatekeeperError;

    fn try_from(raw: &str) -> Result<Self> {
        Self::new(raw)
    }
}

impl AsRef<str> for RateKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        let key = RateKey::new("1.2.3.4").unwrap();
        assert_eq!(key.as_str(), "1.2.3.4");
        assert_eq!(key.to_string(), "1.2.3.4");
    }

    #[test]
    fn test_empty_and_blank_keys_rejected() {
        for raw in ["", "   ", "\t"] {
            let err = RateKey::new(raw).unwrap_err();
            assert!(matches!(err, GatekeeperError::InvalidArgument(_)), "{:?}", raw);
        }
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(RateKey::new("10.0.0.1\r\nX-Injected: 1").is_err());
        assert!(RateKey::new("key\0").is_err());
    }

    #[test]
    fn test_length_limit() {
        assert!(RateKey::new("a".repeat(MAX_KEY_LEN)).is_ok());
        assert!(RateKey::new("a".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_from_ip_addr() {
        let v4: IpAddr = "192.168.1.1".parse().unwrap();
        let v6: IpAddr = "::1".parse().unwrap();
        assert_eq!(RateKey::from(v4).as_str(), "192.168.1.1");
        assert_eq!(RateKey::from(v6).as_str(), "::1");
    }

    #[test]
    fn test_equal_keys_hash_equal() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(RateKey::try_from("client_a").unwrap());
        set.insert(RateKey::try_from("client_a").unwrap());
        set.insert(RateKey::try_from("client_b").unwrap());
        assert_eq!(set.len(), 2);
    }
}
