//! Staking reward pools
//!
//! A reward pool streams `reward_rate` tokens per second to everyone staked
//! in it until `period_finish`.

use serde::Serialize;

use super::formulas::{apy, weekly_distribution};

/// Normalized on-chain state of one reward contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingPoolSnapshot {
    pub name: String,
    /// Reward period length in seconds
    pub duration: f64,
    /// Reward tokens per second
    pub reward_rate: f64,
    /// Tokens staked
    pub total_supply: f64,
    /// Unix seconds
    pub period_finish: i64,
}

/// What the staking section shows per pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingPoolStats {
    pub name: String,
    pub weekly_rewards: Option<f64>,
    pub apy: Option<f64>,
    pub total_staked: f64,
    pub active: bool,
}

impl StakingPoolSnapshot {
    pub fn is_finished(&self, now: i64) -> bool {
        self.period_finish <= now
    }

    /// Rewards handed out per week of the current period
    pub fn distribution(&self, now: i64) -> Option<f64> {
        weekly_distribution(self.duration, self.reward_rate, self.is_finished(now))
    }

    pub fn stats(&self, now: i64, reward_price: f64, stake_price: f64) -> StakingPoolStats {
        let active = !self.is_finished(now);
        let yearly = if active {
            apy(self.reward_rate, self.total_supply, reward_price, stake_price)
        } else {
            Some(0.0)
        };

        StakingPoolStats {
            name: self.name.clone(),
            weekly_rewards: self.distribution(now),
            apy: yearly,
            total_staked: self.total_supply,
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(period_finish: i64) -> StakingPoolSnapshot {
        StakingPoolSnapshot {
            name: "sUSD Curve".to_string(),
            duration: 604_800.0,
            reward_rate: 10.0,
            total_supply: 1000.0,
            period_finish,
        }
    }

    #[test]
    fn test_distribution_for_one_week_period() {
        let now = 1_600_000_000;
        assert_eq!(pool(now + 3600).distribution(now), Some(6_048_000.0));
    }

    #[test]
    fn test_finished_pool_pays_nothing() {
        let now = 1_600_000_000;
        let stats = pool(now - 1).stats(now, 2.0, 1.0);
        assert!(!stats.active);
        assert_eq!(stats.weekly_rewards, Some(0.0));
        assert_eq!(stats.apy, Some(0.0));
    }

    #[test]
    fn test_active_pool_apy() {
        let now = 1_600_000_000;
        let stats = pool(now + 1).stats(now, 2.0, 1.0);
        // 10/s * 1 year * $2 / ($1000 staked)
        let expected = 10.0 * 31_536_000.0 * 2.0 / 1000.0;
        assert_eq!(stats.apy, Some(expected));
    }
}
