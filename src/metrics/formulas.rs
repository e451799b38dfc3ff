//! Derived metric formulas
//!
//! Pure functions over already-normalized numbers. Any zero, negative or
//! non-finite divisor yields `None`; a NaN or infinity never reaches the
//! caller.

/// 365 days
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Seconds in a week, the unit reward distributions are quoted in
pub const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Keep a computed value only when it is finite
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Strictly positive and finite
pub(crate) fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Finite and not negative
pub(crate) fn non_negative(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Value of all collateral divided by all issued debt.
///
/// `total_supply * price / total_issued_synths`
pub fn network_c_ratio(total_supply: f64, price: f64, total_issued_synths: f64) -> Option<f64> {
    let supply = non_negative(total_supply)?;
    let price = non_negative(price)?;
    let issued = positive(total_issued_synths)?;
    finite(supply * price / issued)
}

/// Debt held by one staker relative to the value of their collateral.
///
/// `debt_balance / (collateral * price)`
pub fn collateral_ratio(debt_balance: f64, collateral: f64, price: f64) -> Option<f64> {
    let debt = non_negative(debt_balance)?;
    let value = positive(positive(collateral)? * positive(price)?)?;
    finite(debt / value)
}

/// Target c-ratio implied by the issuance ratio (0.2 → 5.0, i.e. 500%)
pub fn target_c_ratio(issuance_ratio: f64) -> Option<f64> {
    finite(1.0 / positive(issuance_ratio)?)
}

/// Ratio as a percentage for display
pub fn to_percent(ratio: f64) -> Option<f64> {
    finite(ratio * 100.0)
}

/// Annualized yield of a reward stream.
///
/// `reward_rate * SECONDS_PER_YEAR * reward_price / (total_supply_staked * stake_price)`
pub fn apy(
    reward_rate: f64,
    total_supply_staked: f64,
    reward_price: f64,
    stake_price: f64,
) -> Option<f64> {
    let rate = non_negative(reward_rate)?;
    let reward_price = non_negative(reward_price)?;
    let staked_value = positive(positive(total_supply_staked)? * positive(stake_price)?)?;
    finite(rate * SECONDS_PER_YEAR * reward_price / staked_value)
}

/// Rewards paid per week over a reward period.
///
/// `duration * rate / (duration / SECONDS_PER_WEEK)`. A period that already
/// finished distributes nothing.
pub fn weekly_distribution(duration_secs: f64, reward_rate: f64, period_finished: bool) -> Option<f64> {
    let duration = positive(duration_secs)?;
    let rate = non_negative(reward_rate)?;
    if period_finished {
        return Some(0.0);
    }
    let weeks = positive(duration / SECONDS_PER_WEEK)?;
    finite(duration * rate / weeks)
}

/// Dollar value of debt above what the issuance ratio allows.
///
/// `(current_ratio - issuance_ratio) * collateral * price`, where
/// `current_ratio` is the account's debt-to-collateral-value ratio. The result
/// may be zero or negative for healthy accounts; callers apply thresholds.
pub fn amount_to_cover(
    current_ratio: f64,
    issuance_ratio: f64,
    collateral: f64,
    price: f64,
) -> Option<f64> {
    let current = non_negative(current_ratio)?;
    let target = positive(issuance_ratio)?;
    let collateral = non_negative(collateral)?;
    let price = non_negative(price)?;
    finite((current - target) * collateral * price)
}

/// Relative change from `first` to `last`
pub fn percent_change(first: f64, last: f64) -> Option<f64> {
    let base = positive(first)?;
    finite((finite(last)? - base) / base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_c_ratio() {
        // 100M SNX at $2 backing 40M sUSD of debt = 500%
        assert_eq!(network_c_ratio(100_000_000.0, 2.0, 40_000_000.0), Some(5.0));
        assert_eq!(network_c_ratio(100.0, 2.0, 0.0), None);
        assert_eq!(network_c_ratio(f64::NAN, 2.0, 1.0), None);
    }

    #[test]
    fn test_collateral_ratio_zero_collateral() {
        assert_eq!(collateral_ratio(100.0, 0.0, 2.0), None);
        assert_eq!(collateral_ratio(100.0, 10.0, 0.0), None);
        assert_eq!(collateral_ratio(100.0, 250.0, 2.0), Some(0.2));
    }

    #[test]
    fn test_target_c_ratio() {
        assert_eq!(target_c_ratio(0.125), Some(8.0));
        assert_eq!(target_c_ratio(0.0), None);
        assert_eq!(to_percent(8.0), Some(800.0));
    }

    #[test]
    fn test_apy() {
        // 1 token/sec, 1M staked, equal prices
        let yearly = apy(1.0, 1_000_000.0, 1.0, 1.0).unwrap();
        assert!((yearly - 31.536).abs() < 1e-9);

        assert_eq!(apy(1.0, 0.0, 1.0, 1.0), None);
        assert_eq!(apy(1.0, 1000.0, 1.0, 0.0), None);
    }

    #[test]
    fn test_weekly_distribution() {
        assert_eq!(weekly_distribution(604_800.0, 10.0, false), Some(6_048_000.0));
        // Two-week period still reports a per-week figure
        assert_eq!(weekly_distribution(1_209_600.0, 10.0, false), Some(6_048_000.0));
        assert_eq!(weekly_distribution(604_800.0, 10.0, true), Some(0.0));
        assert_eq!(weekly_distribution(0.0, 10.0, false), None);
    }

    #[test]
    fn test_amount_to_cover() {
        // 0.25 debt ratio vs 0.2 allowed on 1000 SNX at $2 = $100 over
        let amount = amount_to_cover(0.25, 0.2, 1000.0, 2.0).unwrap();
        assert!((amount - 100.0).abs() < 1e-9);

        // Healthy account yields a negative shortfall
        assert!(amount_to_cover(0.1, 0.2, 1000.0, 2.0).unwrap() < 0.0);
        assert_eq!(amount_to_cover(0.25, 0.0, 1000.0, 2.0), None);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(2.0, 3.0), Some(0.5));
        assert_eq!(percent_change(0.0, 3.0), None);
    }
}
