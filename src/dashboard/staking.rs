//! Staking rewards: weekly distribution and APY per pool

use alloy_primitives::Address;
use eyre::eyre;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::str::FromStr;

use super::DashboardContext;
use crate::config::StakingPoolConfig;
use crate::currency::{AssetMap, CurrencyKey};
use crate::metrics::{StakingPoolSnapshot, StakingPoolStats};
use crate::query::{aggregate, aggregate_all, AggregateQueryResult, Query, QueryKey, QueryResult};
use crate::sources::RawStakingPool;
use crate::units::{from_wei, normalize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingOverview {
    pub pools: Vec<StakingPoolStats>,
    pub prices: AssetMap<f64>,
}

impl StakingOverview {
    /// Every active pool has an APY
    pub fn is_complete(&self) -> bool {
        self.pools.iter().all(|p| !p.active || p.apy.is_some())
    }
}

fn snapshot(name: &str, raw: &RawStakingPool) -> eyre::Result<StakingPoolSnapshot> {
    let period_finish = normalize(raw.period_finish, 0)?;
    Ok(StakingPoolSnapshot {
        name: name.to_string(),
        duration: normalize(raw.rewards_duration, 0)?,
        reward_rate: from_wei(raw.reward_rate),
        total_supply: from_wei(raw.total_supply),
        period_finish: period_finish as i64,
    })
}

fn pool_query(ctx: &DashboardContext, pool: &StakingPoolConfig) -> Query<StakingPoolSnapshot> {
    let contracts = ctx.contracts.clone();
    let name = pool.name.clone();
    let address = pool.address.clone();

    ctx.query(
        QueryKey::new(["contract", "StakingRewards", pool.address.as_str()]),
        move || {
            let contracts = contracts.clone();
            let name = name.clone();
            let address = address.clone();
            async move {
                let address = Address::from_str(&address)
                    .map_err(|e| eyre!("staking pool {} address: {}", name, e))?;
                snapshot(&name, &contracts.staking_pool(address).await?)
            }
        },
    )
}

/// Pool reads and the prices they are valued in, combined once all arrive
pub async fn staking_pools(ctx: &DashboardContext) -> AggregateQueryResult<Option<StakingOverview>> {
    let pools = &ctx.config.staking_pools;

    // Symbols are checked by `Config::validate`
    let symbols: BTreeSet<CurrencyKey> = pools
        .iter()
        .flat_map(|p| [p.reward_symbol.as_str(), p.stake_symbol.as_str()])
        .filter_map(|s| CurrencyKey::new(s).ok())
        .collect();

    let pool_queries: Vec<_> = pools.iter().map(|pool| pool_query(ctx, pool)).collect();
    let price_queries: Vec<_> = symbols.iter().map(|k| ctx.price_query(k.clone())).collect();

    let (pool_results, price_results) = tokio::join!(
        join_all(pool_queries.iter().map(|q| q.fetch())),
        join_all(price_queries.iter().map(|q| q.fetch())),
    );

    let snapshots: QueryResult<Vec<StakingPoolSnapshot>> = aggregate_all(&pool_results).into();
    let prices: QueryResult<Vec<f64>> = aggregate_all(&price_results).into();
    let now = ctx.now();

    aggregate(
        (&snapshots, &prices),
        |(snapshots, prices)| {
            let prices: AssetMap<f64> = symbols.into_iter().zip(prices).collect();
            let price_of = |s: &str| CurrencyKey::new(s).ok().and_then(|k| prices.get(&k).copied());

            let stats = pools
                .iter()
                .zip(&snapshots)
                .map(|(pool, snapshot)| {
                    let reward_price = price_of(&pool.reward_symbol).unwrap_or(f64::NAN);
                    let stake_price = price_of(&pool.stake_symbol).unwrap_or(f64::NAN);
                    snapshot.stats(now, reward_price, stake_price)
                })
                .collect();

            Some(StakingOverview { pools: stats, prices })
        },
        None,
    )
}
