//! Currency keys and the tracked asset catalogue
//!
//! Contracts identify assets by a bytes32 currency key: the ASCII symbol,
//! right-padded with zero bytes. `CurrencyKey` keeps the symbol form and
//! converts losslessly in both directions.

use alloy_primitives::B256;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A validated asset symbol (1..=32 printable ASCII bytes)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyKey(String);

impl CurrencyKey {
    pub fn new(symbol: &str) -> Result<Self> {
        if symbol.is_empty() || symbol.len() > 32 {
            return Err(eyre!("currency key {:?} must be 1-32 bytes", symbol));
        }
        if !symbol.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(eyre!("currency key {:?} must be printable ASCII", symbol));
        }
        Ok(Self(symbol.to_string()))
    }

    pub fn snx() -> Self {
        Self(SNX.to_string())
    }

    pub fn susd() -> Self {
        Self(SUSD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Right-padded bytes32 form used as a contract argument
    pub fn to_bytes32(&self) -> B256 {
        B256::right_padding_from(self.0.as_bytes())
    }

    /// Decode a bytes32 key returned by a contract
    pub fn from_bytes32(raw: B256) -> Result<Self> {
        let bytes = raw.as_slice();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());

        if bytes[end..].iter().any(|b| *b != 0) {
            return Err(eyre!("bytes32 key 0x{} has data after padding", hex::encode(bytes)));
        }

        let symbol = std::str::from_utf8(&bytes[..end])
            .map_err(|_| eyre!("bytes32 key 0x{} is not UTF-8", hex::encode(bytes)))?;
        Self::new(symbol)
    }

    /// sUSD-denominated synths are 1:1 with the dollar
    pub fn is_usd(&self) -> bool {
        self.0 == SUSD
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyKey {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyKey {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<CurrencyKey> for String {
    fn from(key: CurrencyKey) -> Self {
        key.0
    }
}

/// One entry per base-asset symbol.
pub type AssetMap<V> = BTreeMap<CurrencyKey, V>;

// ============================================
// ASSET CATALOGUE
// ============================================

pub const SNX: &str = "SNX";
pub const SUSD: &str = "sUSD";
pub const ETH: &str = "ETH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetCategory {
    /// Staked to mint synths
    Collateral,
    /// Dollar-pegged synth
    Stable,
    Crypto,
    Forex,
    Commodity,
    Index,
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub symbol: &'static str,
    pub category: AssetCategory,
}

pub fn all_assets() -> Vec<Asset> {
    vec![
        Asset { symbol: SNX, category: AssetCategory::Collateral },
        Asset { symbol: ETH, category: AssetCategory::Collateral },
        Asset { symbol: SUSD, category: AssetCategory::Stable },
        Asset { symbol: "sETH", category: AssetCategory::Crypto },
        Asset { symbol: "sBTC", category: AssetCategory::Crypto },
        Asset { symbol: "sLINK", category: AssetCategory::Crypto },
        Asset { symbol: "sDEFI", category: AssetCategory::Index },
        Asset { symbol: "sEUR", category: AssetCategory::Forex },
        Asset { symbol: "sJPY", category: AssetCategory::Forex },
        Asset { symbol: "sGBP", category: AssetCategory::Forex },
        Asset { symbol: "sXAU", category: AssetCategory::Commodity },
        Asset { symbol: "sXAG", category: AssetCategory::Commodity },
    ]
}

pub fn get_asset(symbol: &str) -> Option<Asset> {
    all_assets().into_iter().find(|a| a.symbol == symbol)
}

impl CurrencyKey {
    /// Catalogue category; `None` for symbols not tracked
    pub fn category(&self) -> Option<AssetCategory> {
        get_asset(self.as_str()).map(|a| a.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes32_round_trip() {
        let key = CurrencyKey::new(SNX).unwrap();
        let raw = key.to_bytes32();
        assert_eq!(&raw.as_slice()[..3], b"SNX");
        assert!(raw.as_slice()[3..].iter().all(|b| *b == 0));
        assert_eq!(CurrencyKey::from_bytes32(raw).unwrap(), key);
    }

    #[test]
    fn test_from_bytes32_rejects_garbage() {
        assert!(CurrencyKey::from_bytes32(B256::ZERO).is_err());

        let mut raw = [0u8; 32];
        raw[0] = b'A';
        raw[5] = b'B';
        assert!(CurrencyKey::from_bytes32(B256::from(raw)).is_err());
    }

    #[test]
    fn test_key_validation() {
        assert!(CurrencyKey::new("").is_err());
        assert!(CurrencyKey::new("s USD").is_err());
        assert!(CurrencyKey::new(&"X".repeat(33)).is_err());
        assert!(CurrencyKey::new("sUSD").unwrap().is_usd());
    }

    #[test]
    fn test_catalogue_categories() {
        assert_eq!(get_asset("sEUR").unwrap().category, AssetCategory::Forex);
        assert_eq!(CurrencyKey::snx().category(), Some(AssetCategory::Collateral));
        assert_eq!(CurrencyKey::new("sFOO").unwrap().category(), None);
    }
}
