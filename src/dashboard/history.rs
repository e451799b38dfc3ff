//! SNX price history over a display window

use serde::Serialize;
use serde_json::Value;

use super::DashboardContext;
use crate::metrics::percent_change;
use crate::query::{aggregate, AggregateQueryResult, QueryKey};
use crate::sources::{int_field, number_field, EntityQuery, OrderDirection};
use crate::timeseries::{format_series, Interval, Period, RawSample, TimeSeriesPoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    pub period: Period,
    pub interval: Interval,
    pub points: Vec<TimeSeriesPoint>,
    /// Fractional change from the first point to the last
    pub change: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

impl PriceHistory {
    fn from_points(period: Period, interval: Interval, points: Vec<TimeSeriesPoint>) -> Self {
        let change = match (points.first(), points.last()) {
            (Some(first), Some(last)) => percent_change(first.value, last.value),
            _ => None,
        };
        let high = points.iter().map(|p| p.value).reduce(f64::max);
        let low = points.iter().map(|p| p.value).reduce(f64::min);

        Self {
            period,
            interval,
            points,
            change,
            high,
            low,
        }
    }
}

fn parse_sample(entity: &Value) -> eyre::Result<RawSample> {
    Ok(RawSample {
        id: int_field(entity, "id")?,
        value: number_field(entity, "averagePrice")?,
    })
}

/// Newest `count` buckets of the interval the period maps to, oldest first
pub async fn price_history(ctx: &DashboardContext, period: Period) -> AggregateQueryResult<Option<PriceHistory>> {
    let (interval, count) = period.sampling();
    let entity = interval.price_entity();

    let subgraph = ctx.subgraph.clone();
    let query = EntityQuery::new(&ctx.config.rates_subgraph_url, entity, &["id", "averagePrice"], count)
        .order_by("id", OrderDirection::Desc);

    let series = ctx.query(
        QueryKey::new(["subgraph", entity]).with(count.to_string()),
        move || {
            let subgraph = subgraph.clone();
            let query = query.clone();
            async move {
                let samples = subgraph
                    .query_entities(&query)
                    .await?
                    .iter()
                    .map(parse_sample)
                    .collect::<eyre::Result<Vec<_>>>()?;
                format_series(&samples, interval)
            }
        },
    );

    let series = series.fetch().await;

    aggregate(
        (&series,),
        |(points,)| Some(PriceHistory::from_points(period, interval, points)),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testing::context;
    use crate::sources::chain::fake::FakeChain;
    use crate::sources::price_feed::fake::FakePriceFeed;
    use crate::sources::subgraph::fake::FakeSubgraph;
    use serde_json::json;

    #[tokio::test]
    async fn test_month_history_is_daily_and_ascending() {
        let subgraph = FakeSubgraph::default().with(
            "dailySNXPrices",
            vec![
                json!({"id": "100", "averagePrice": "2.5"}),
                json!({"id": 99, "averagePrice": 2.0}),
            ],
        );
        let ctx = context(FakeChain::default(), subgraph, FakePriceFeed::default());

        let result = price_history(&ctx, Period::Month).await;
        assert!(result.is_success);

        let history = result.data.unwrap();
        assert_eq!(history.interval, Interval::OneDay);
        assert_eq!(history.points.len(), 2);
        assert_eq!(history.points[0].created, "1970-04-10T00:00:00.000Z");
        assert_eq!(history.points[0].value, 2.0);
        assert_eq!(history.points[1].value, 2.5);
        assert_eq!(history.change, Some(0.25));
        assert_eq!(history.high, Some(2.5));
        assert_eq!(history.low, Some(2.0));
    }

    #[tokio::test]
    async fn test_day_history_reads_fifteen_minute_buckets() {
        let subgraph = FakeSubgraph::default().with("fifteenMinuteSNXPrices", vec![]);
        let subgraph = std::sync::Arc::new(subgraph);
        let mut ctx = context(FakeChain::default(), FakeSubgraph::default(), FakePriceFeed::default());
        ctx.subgraph = subgraph.clone();

        let history = price_history(&ctx, Period::Day).await.data.unwrap();
        assert!(history.points.is_empty());
        assert_eq!(history.change, None);

        let queries = subgraph.queries.lock().unwrap();
        assert_eq!(queries[0].entity, "fifteenMinuteSNXPrices");
        assert_eq!(queries[0].max, 96);
    }

    #[tokio::test]
    async fn test_malformed_sample_is_an_error() {
        let subgraph = FakeSubgraph::default().with(
            "dailySNXPrices",
            vec![json!({"id": "100", "averagePrice": null})],
        );
        let ctx = context(FakeChain::default(), subgraph, FakePriceFeed::default());

        let result = price_history(&ctx, Period::Year).await;
        assert!(result.is_error);
        assert!(result.data.is_none());
    }
}
