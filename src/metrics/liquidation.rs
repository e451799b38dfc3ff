//! Liquidation risk summary
//!
//! Filters accounts flagged for liquidation down to the ones worth showing
//! and totals what would need to be covered.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::formulas::amount_to_cover;

/// Shortfalls below this many dollars are noise
pub const MIN_AMOUNT_TO_COVER: f64 = 10.0;

/// Accounts with less collateral than this are ignored
pub const MIN_COLLATERAL: f64 = 1.0;

/// An account flagged for liquidation, already normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationCandidate {
    pub account: String,
    /// Unix seconds after which the account can be liquidated
    pub deadline: i64,
    /// Collateral held, in SNX
    pub collateral: f64,
    /// Debt divided by collateral value
    pub current_ratio: f64,
    /// Collateral not locked in escrow, in SNX
    pub liquidatable_non_escrow: f64,
}

/// A candidate that passed the thresholds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liquidation {
    pub account: String,
    pub deadline: i64,
    pub collateral: f64,
    pub current_ratio: f64,
    /// Non-escrowed SNX a liquidator can claim
    pub liquidatable_snx: f64,
    pub amount_to_cover: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct LiquidationThresholds {
    pub min_amount_to_cover: f64,
    pub min_collateral: f64,
}

impl Default for LiquidationThresholds {
    fn default() -> Self {
        Self {
            min_amount_to_cover: MIN_AMOUNT_TO_COVER,
            min_collateral: MIN_COLLATERAL,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LiquidationSummary {
    pub liquidations: Vec<Liquidation>,
    /// Sum of amount_to_cover over the surfaced liquidations
    pub amount_to_cover: f64,
    /// Sum of non-escrowed collateral over the surfaced liquidations
    pub total_liquidatable_snx: f64,
}

impl LiquidationSummary {
    pub fn from_candidates(
        candidates: &[LiquidationCandidate],
        issuance_ratio: f64,
        snx_price: f64,
        thresholds: LiquidationThresholds,
    ) -> Self {
        let mut summary = Self::default();

        for candidate in candidates {
            summary.push(candidate, issuance_ratio, snx_price, thresholds);
        }

        summary
            .liquidations
            .sort_by(|a, b| a.deadline.cmp(&b.deadline));
        summary
    }

    /// Add one candidate if it qualifies. Totals never decrease.
    pub fn push(
        &mut self,
        candidate: &LiquidationCandidate,
        issuance_ratio: f64,
        snx_price: f64,
        thresholds: LiquidationThresholds,
    ) -> bool {
        if candidate.collateral.is_nan() || candidate.collateral < thresholds.min_collateral {
            debug!("Skipping {}: collateral {:.4} below minimum", candidate.account, candidate.collateral);
            return false;
        }

        let Some(amount) = amount_to_cover(
            candidate.current_ratio,
            issuance_ratio,
            candidate.collateral,
            snx_price,
        ) else {
            return false;
        };

        if amount < thresholds.min_amount_to_cover {
            debug!("Skipping {}: amount to cover ${:.2} below minimum", candidate.account, amount);
            return false;
        }

        self.amount_to_cover += amount;
        self.total_liquidatable_snx += candidate.liquidatable_non_escrow;
        self.liquidations.push(Liquidation {
            account: candidate.account.clone(),
            deadline: candidate.deadline,
            collateral: candidate.collateral,
            current_ratio: candidate.current_ratio,
            liquidatable_snx: candidate.liquidatable_non_escrow,
            amount_to_cover: amount,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.liquidations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liquidations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(account: &str, collateral: f64, current_ratio: f64, deadline: i64) -> LiquidationCandidate {
        LiquidationCandidate {
            account: account.to_string(),
            deadline,
            collateral,
            current_ratio,
            liquidatable_non_escrow: collateral,
        }
    }

    #[test]
    fn test_thresholds_filter_candidates() {
        let candidates = vec![
            candidate("0xaaa", 1000.0, 0.25, 20), // $100 shortfall
            candidate("0xbbb", 0.5, 0.9, 10),     // dust collateral
            candidate("0xccc", 1000.0, 0.202, 5), // $4 shortfall
            candidate("0xddd", 1000.0, 0.1, 1),   // healthy
        ];

        let summary = LiquidationSummary::from_candidates(&candidates, 0.2, 2.0, LiquidationThresholds::default());

        assert_eq!(summary.len(), 1);
        assert_eq!(summary.liquidations[0].account, "0xaaa");
        assert!((summary.amount_to_cover - 100.0).abs() < 1e-9);
        assert_eq!(summary.total_liquidatable_snx, 1000.0);
    }

    #[test]
    fn test_totals_monotonic_as_candidates_added() {
        let pool = vec![
            candidate("0x1", 500.0, 0.5, 3),
            candidate("0x2", 0.1, 0.5, 2),
            candidate("0x3", 2000.0, 0.3, 1),
            candidate("0x4", 100.0, 0.05, 4),
            candidate("0x5", 50.0, 1.2, 5),
        ];

        let mut summary = LiquidationSummary::default();
        let (mut last_amount, mut last_snx) = (0.0, 0.0);

        for c in &pool {
            summary.push(c, 0.2, 2.0, LiquidationThresholds::default());
            assert!(summary.amount_to_cover >= last_amount);
            assert!(summary.total_liquidatable_snx >= last_snx);
            last_amount = summary.amount_to_cover;
            last_snx = summary.total_liquidatable_snx;
        }

        assert_eq!(summary.len(), 3);
    }

    #[test]
    fn test_escrowed_collateral_not_liquidatable() {
        let mut escrowed = candidate("0xesc", 1000.0, 0.25, 20);
        escrowed.liquidatable_non_escrow = 100.0;

        let summary = LiquidationSummary::from_candidates(&[escrowed], 0.2, 2.0, LiquidationThresholds::default());

        assert_eq!(summary.len(), 1);
        // shortfall still priced on the full collateral
        assert!((summary.amount_to_cover - 100.0).abs() < 1e-9);
        assert_eq!(summary.liquidations[0].liquidatable_snx, 100.0);
        assert_eq!(summary.total_liquidatable_snx, 100.0);
    }

    #[test]
    fn test_sorted_by_deadline() {
        let candidates = vec![
            candidate("late", 1000.0, 0.5, 300),
            candidate("early", 1000.0, 0.5, 100),
        ];
        let summary = LiquidationSummary::from_candidates(&candidates, 0.2, 2.0, LiquidationThresholds::default());
        assert_eq!(summary.liquidations[0].account, "early");
    }

    #[test]
    fn test_nan_collateral_skipped() {
        let mut summary = LiquidationSummary::default();
        assert!(!summary.push(&candidate("0xnan", f64::NAN, 0.5, 1), 0.2, 2.0, LiquidationThresholds::default()));
        assert!(summary.is_empty());
    }
}
