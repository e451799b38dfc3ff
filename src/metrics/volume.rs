//! Trading volume per asset

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use crate::currency::{AssetCategory, AssetMap, CurrencyKey};

/// One synth exchange, amounts already in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthTrade {
    pub from: CurrencyKey,
    pub to: CurrencyKey,
    pub from_amount_usd: f64,
    pub to_amount_usd: f64,
}

/// Sums traded value per base asset. Each trade counts on both legs, but the
/// sUSD leg is skipped because it is the quote side of nearly every trade.
pub fn volume_by_asset(trades: &[SynthTrade]) -> AssetMap<f64> {
    let mut volume = AssetMap::new();

    for trade in trades {
        for (key, amount) in [(&trade.from, trade.from_amount_usd), (&trade.to, trade.to_amount_usd)] {
            if key.is_usd() || !amount.is_finite() || amount < 0.0 {
                continue;
            }
            *volume.entry(key.clone()).or_insert(0.0) += amount;
        }
    }

    volume
}

/// Rolls per-asset volume up by catalogue category. Untracked synths are
/// left out.
pub fn volume_by_category(by_asset: &AssetMap<f64>) -> BTreeMap<AssetCategory, f64> {
    let mut volume = BTreeMap::new();
    for (key, amount) in by_asset {
        if let Some(category) = key.category() {
            *volume.entry(category).or_insert(0.0) += amount;
        }
    }
    volume
}

/// Total traded value, counted once per trade on the source leg
pub fn total_volume(trades: &[SynthTrade]) -> f64 {
    trades
        .iter()
        .map(|t| t.from_amount_usd)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(from: &str, to: &str, usd: f64) -> SynthTrade {
        SynthTrade {
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            from_amount_usd: usd,
            to_amount_usd: usd * 0.997,
        }
    }

    #[test]
    fn test_one_entry_per_asset() {
        let trades = vec![
            trade("sUSD", "sBTC", 1000.0),
            trade("sBTC", "sUSD", 500.0),
            trade("sETH", "sBTC", 200.0),
        ];

        let volume = volume_by_asset(&trades);

        assert_eq!(volume.len(), 2);
        let btc = volume[&"sBTC".parse::<CurrencyKey>().unwrap()];
        assert!((btc - (997.0 + 500.0 + 199.4)).abs() < 1e-9);
        assert!(!volume.contains_key(&"sUSD".parse::<CurrencyKey>().unwrap()));
        assert_eq!(total_volume(&trades), 1700.0);
    }

    #[test]
    fn test_category_rollup_skips_untracked() {
        let trades = vec![
            trade("sBTC", "sETH", 100.0),
            trade("sEUR", "sFOO", 40.0),
        ];

        let by_category = volume_by_category(&volume_by_asset(&trades));

        assert_eq!(by_category.len(), 2);
        assert!((by_category[&AssetCategory::Crypto] - (100.0 + 99.7)).abs() < 1e-9);
        assert_eq!(by_category[&AssetCategory::Forex], 40.0);
    }
}
