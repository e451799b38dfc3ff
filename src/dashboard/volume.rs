//! Synth exchange volume per asset over a display window

use alloy_primitives::B256;
use eyre::eyre;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use super::DashboardContext;
use crate::currency::{AssetCategory, AssetMap, CurrencyKey};
use crate::metrics::{total_volume, volume_by_asset, volume_by_category, SynthTrade};
use crate::query::{aggregate, AggregateQueryResult, QueryKey};
use crate::sources::{number_field, string_field, EntityQuery, OrderDirection};
use crate::timeseries::Period;

const EXCHANGE_ENTITY: &str = "synthExchanges";

const EXCHANGE_FIELDS: &[&str] = &[
    "id",
    "fromCurrencyKey",
    "toCurrencyKey",
    "fromAmountInUSD",
    "toAmountInUSD",
    "timestamp",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingVolume {
    pub period: Period,
    /// Unix seconds; trades strictly after this are counted
    pub since: i64,
    pub trades: usize,
    pub total: f64,
    pub by_asset: AssetMap<f64>,
    pub by_category: BTreeMap<AssetCategory, f64>,
}

/// Currency keys arrive as bytes32 hex (`0x73555344…`)
fn key_field(entity: &Value, field: &str) -> eyre::Result<CurrencyKey> {
    let raw = string_field(entity, field)?;
    let bytes = B256::from_str(raw).map_err(|e| eyre!("{} is not bytes32: {}", field, e))?;
    CurrencyKey::from_bytes32(bytes)
}

pub fn parse_trade(entity: &Value) -> eyre::Result<SynthTrade> {
    Ok(SynthTrade {
        from: key_field(entity, "fromCurrencyKey")?,
        to: key_field(entity, "toCurrencyKey")?,
        from_amount_usd: number_field(entity, "fromAmountInUSD")?,
        to_amount_usd: number_field(entity, "toAmountInUSD")?,
    })
}

/// Window length in seconds: bucket size times bucket count
fn window_secs(period: Period) -> i64 {
    let (interval, count) = period.sampling();
    interval.seconds() * count as i64
}

pub async fn trading_volume(ctx: &DashboardContext, period: Period) -> AggregateQueryResult<Option<TradingVolume>> {
    let since = ctx.now() - window_secs(period);

    let subgraph = ctx.subgraph.clone();
    let query = EntityQuery::new(
        &ctx.config.subgraph_url,
        EXCHANGE_ENTITY,
        EXCHANGE_FIELDS,
        ctx.config.subgraph_max_entities,
    )
    .filter("timestamp_gt", since)
    .order_by("timestamp", OrderDirection::Desc);

    let trades = ctx.query(
        QueryKey::new(["subgraph", EXCHANGE_ENTITY]).with(period.to_string()),
        move || {
            let subgraph = subgraph.clone();
            let query = query.clone();
            async move {
                let entities = subgraph.query_entities(&query).await?;
                let trades: Vec<SynthTrade> = entities
                    .iter()
                    .filter_map(|entity| match parse_trade(entity) {
                        Ok(trade) => Some(trade),
                        Err(e) => {
                            // Unreadable exchanges are dropped, not fatal
                            let id = entity.get("id").map(ToString::to_string).unwrap_or_default();
                            warn!("Skipping exchange {}: {}", id, e);
                            None
                        }
                    })
                    .collect();
                Ok(trades)
            }
        },
    );

    let trades = trades.fetch().await;

    aggregate(
        (&trades,),
        |(trades,)| {
            let by_asset = volume_by_asset(&trades);
            Some(TradingVolume {
                period,
                since,
                trades: trades.len(),
                total: total_volume(&trades),
                by_category: volume_by_category(&by_asset),
                by_asset,
            })
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testing::{context, NOW};
    use crate::sources::chain::fake::FakeChain;
    use crate::sources::price_feed::fake::FakePriceFeed;
    use crate::sources::subgraph::fake::FakeSubgraph;
    use serde_json::json;

    fn key_hex(symbol: &str) -> String {
        format!("0x{}", hex::encode(CurrencyKey::new(symbol).unwrap().to_bytes32()))
    }

    fn exchange(id: &str, from: &str, to: &str, usd: f64) -> Value {
        json!({
            "id": id,
            "fromCurrencyKey": key_hex(from),
            "toCurrencyKey": key_hex(to),
            "fromAmountInUSD": usd.to_string(),
            "toAmountInUSD": usd.to_string(),
            "timestamp": (NOW - 60).to_string(),
        })
    }

    #[test]
    fn test_parse_trade_decodes_bytes32_keys() {
        let trade = parse_trade(&exchange("1", "sUSD", "sETH", 100.0)).unwrap();
        assert_eq!(trade.from.as_str(), "sUSD");
        assert_eq!(trade.to.as_str(), "sETH");
        assert_eq!(trade.to_amount_usd, 100.0);
    }

    #[tokio::test]
    async fn test_volume_by_asset() {
        let subgraph = FakeSubgraph::default().with(
            EXCHANGE_ENTITY,
            vec![
                exchange("1", "sUSD", "sETH", 100.0),
                exchange("2", "sETH", "sBTC", 50.0),
                exchange("3", "sBTC", "sUSD", 25.0),
                json!({"id": "4", "fromCurrencyKey": "garbage"}),
            ],
        );
        let ctx = context(FakeChain::default(), subgraph, FakePriceFeed::default());

        let result = trading_volume(&ctx, Period::Day).await;
        assert!(result.is_success);

        let volume = result.data.unwrap();
        assert_eq!(volume.trades, 3);
        assert_eq!(volume.total, 175.0);
        assert_eq!(volume.since, NOW - 86_400);
        assert_eq!(volume.by_asset[&CurrencyKey::new("sETH").unwrap()], 150.0);
        assert_eq!(volume.by_asset[&CurrencyKey::new("sBTC").unwrap()], 75.0);
        assert!(!volume.by_asset.contains_key(&CurrencyKey::susd()));
        assert_eq!(volume.by_category[&AssetCategory::Crypto], 225.0);
    }

    #[tokio::test]
    async fn test_window_filter_is_sent_to_subgraph() {
        let subgraph = std::sync::Arc::new(FakeSubgraph::default().with(EXCHANGE_ENTITY, vec![]));
        let mut ctx = context(FakeChain::default(), FakeSubgraph::default(), FakePriceFeed::default());
        ctx.subgraph = subgraph.clone();

        let volume = trading_volume(&ctx, Period::Week).await.data.unwrap();
        assert_eq!(volume.total, 0.0);
        assert!(volume.by_asset.is_empty());

        let queries = subgraph.queries.lock().unwrap();
        assert_eq!(queries[0].selection.filter["timestamp_gt"], json!(NOW - 7 * 86_400));
    }
}
