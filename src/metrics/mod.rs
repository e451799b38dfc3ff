//! Derived Metric Calculator
//!
//! Responsible for:
//! - Ratio and yield formulas over normalized inputs
//! - Liquidation shortfall thresholds and totals
//! - Per-asset volume accumulation

mod formulas;
mod liquidation;
mod staking;
mod volume;

pub use formulas::{
    amount_to_cover, apy, collateral_ratio, network_c_ratio, percent_change, target_c_ratio,
    to_percent, weekly_distribution, SECONDS_PER_WEEK, SECONDS_PER_YEAR,
};
pub use liquidation::{
    Liquidation, LiquidationCandidate, LiquidationSummary, LiquidationThresholds,
    MIN_AMOUNT_TO_COVER, MIN_COLLATERAL,
};
pub use staking::{StakingPoolSnapshot, StakingPoolStats};
pub use volume::{total_volume, volume_by_asset, volume_by_category, SynthTrade};
