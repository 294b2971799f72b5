//! Wallet identifiers: 20-byte addresses, canonicalized lowercase hex (spec §3).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Wallet(String);

impl Wallet {
    /// Canonicalizes an address string: lowercases it and validates it decodes as hex
    /// (with or without a leading `0x`). Returns `None` on malformed input rather than
    /// silently truncating or coercing it (spec §9's "explicit parsers" idiom).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_part.len() != 40 {
            return None;
        }
        hex::decode(hex_part).ok()?;
        Some(Wallet(format!("0x{}", hex_part.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_mixed_case_and_prefix() {
        let w = Wallet::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(w.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn accepts_missing_prefix() {
        let w = Wallet::parse("abcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(w.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Wallet::parse("0xabcd").is_none());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Wallet::parse("0xzzzzef0123456789abcdef0123456789abcdef01").is_none());
    }
}
