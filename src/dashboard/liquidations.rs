//! Accounts flagged for liquidation and the debt needed to fix them

use serde_json::Value;
use tracing::debug;

use super::DashboardContext;
use crate::currency::{CurrencyKey, SNX};
use crate::metrics::{LiquidationCandidate, LiquidationSummary};
use crate::query::{aggregate, AggregateQueryResult, QueryKey};
use crate::sources::{int_field, number_field, string_field, EntityQuery, OrderDirection};
use crate::units::from_wei;

const FLAGGED_ENTITY: &str = "accountFlaggedForLiquidations";

const FLAGGED_FIELDS: &[&str] = &[
    "id",
    "account",
    "deadline",
    "collateral",
    "collateralRatio",
    "liquidatableNonEscrowSNX",
];

/// One subgraph entity → candidate. Decimals arrive already scaled.
pub fn parse_candidate(entity: &Value) -> eyre::Result<LiquidationCandidate> {
    Ok(LiquidationCandidate {
        account: string_field(entity, "account")?.to_string(),
        deadline: int_field(entity, "deadline")?,
        collateral: number_field(entity, "collateral")?,
        current_ratio: number_field(entity, "collateralRatio")?,
        liquidatable_non_escrow: number_field(entity, "liquidatableNonEscrowSNX")?,
    })
}

/// Flagged accounts, issuance ratio and SNX price; the summary is built only
/// once all three have arrived.
pub async fn liquidations(ctx: &DashboardContext) -> AggregateQueryResult<Option<LiquidationSummary>> {
    let subgraph = ctx.subgraph.clone();
    let query = EntityQuery::new(
        &ctx.config.subgraph_url,
        FLAGGED_ENTITY,
        FLAGGED_FIELDS,
        ctx.config.subgraph_max_entities,
    )
    .order_by("deadline", OrderDirection::Asc);

    let candidates = ctx.query(QueryKey::new(["subgraph", FLAGGED_ENTITY]), move || {
        let subgraph = subgraph.clone();
        let query = query.clone();
        async move {
            subgraph
                .query_entities(&query)
                .await?
                .iter()
                .map(parse_candidate)
                .collect::<eyre::Result<Vec<_>>>()
        }
    });

    let contracts = ctx.contracts.clone();
    let issuance_ratio = ctx.query(QueryKey::new(["contract", "SystemSettings", "issuanceRatio"]), move || {
        let contracts = contracts.clone();
        async move { Ok(from_wei(contracts.issuance_ratio().await?)) }
    });

    let snx_price = ctx.price_query(CurrencyKey::snx());

    let (candidates, issuance_ratio, snx_price) =
        tokio::join!(candidates.fetch(), issuance_ratio.fetch(), snx_price.fetch());

    let thresholds = ctx.config.liquidation_thresholds();

    aggregate(
        (&candidates, &issuance_ratio, &snx_price),
        |(candidates, issuance_ratio, price)| {
            debug!("{} flagged accounts, {} at ${:.4}", candidates.len(), SNX, price);
            Some(LiquidationSummary::from_candidates(
                &candidates,
                issuance_ratio,
                price,
                thresholds,
            ))
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testing::context;
    use crate::sources::chain::fake::{addresses, FakeChain};
    use crate::sources::chain::ISystemSettings;
    use crate::sources::price_feed::fake::FakePriceFeed;
    use crate::sources::subgraph::fake::FakeSubgraph;
    use crate::units::to_fixed;
    use serde_json::json;

    fn chain() -> FakeChain {
        let mut chain = FakeChain::default();
        chain.answer(
            addresses().system_settings,
            ISystemSettings::issuanceRatioCall {},
            to_fixed(0.125, 18).unwrap(),
        );
        chain
    }

    fn flagged(account: &str, deadline: i64, collateral: &str, non_escrow: &str, ratio: &str) -> Value {
        json!({
            "id": account,
            "account": account,
            "deadline": deadline.to_string(),
            "collateral": collateral,
            "collateralRatio": ratio,
            "liquidatableNonEscrowSNX": non_escrow,
        })
    }

    #[test]
    fn test_parse_candidate_accepts_numbers_and_strings() {
        let entity = json!({
            "account": "0xabc",
            "deadline": 1_700_000_000,
            "collateral": "1500.5",
            "collateralRatio": 0.25,
            "liquidatableNonEscrowSNX": "1000",
        });
        let candidate = parse_candidate(&entity).unwrap();
        assert_eq!(candidate.deadline, 1_700_000_000);
        assert_eq!(candidate.collateral, 1500.5);
        assert_eq!(candidate.current_ratio, 0.25);
        assert_eq!(candidate.liquidatable_non_escrow, 1000.0);
    }

    #[tokio::test]
    async fn test_summary_filters_and_sorts() {
        let subgraph = FakeSubgraph::default().with(
            FLAGGED_ENTITY,
            vec![
                // (0.25 - 0.125) * 1000 * $2 = $250
                flagged("0xb", 200, "1000", "500", "0.25"),
                // $2.50, under the $10 minimum
                flagged("0xc", 100, "10", "10", "0.25"),
                // collateral under 1 SNX
                flagged("0xd", 50, "0.5", "0.5", "0.9"),
                // (0.5 - 0.125) * 100 * $2 = $75
                flagged("0xa", 150, "100", "50", "0.5"),
            ],
        );
        let ctx = context(chain(), subgraph, FakePriceFeed::default().with("SNX", 2.0));

        let result = liquidations(&ctx).await;
        assert!(result.is_success);

        let summary = result.data.unwrap();
        let accounts: Vec<_> = summary.liquidations.iter().map(|l| l.account.as_str()).collect();
        assert_eq!(accounts, vec!["0xa", "0xb"]);
        assert_eq!(summary.amount_to_cover, 325.0);
        // escrowed SNX is not counted
        assert_eq!(summary.total_liquidatable_snx, 550.0);
    }

    #[tokio::test]
    async fn test_subgraph_outage_fails_section() {
        let ctx = context(chain(), FakeSubgraph::default(), FakePriceFeed::default().with("SNX", 2.0));

        let result = liquidations(&ctx).await;
        assert!(result.is_error);
        assert!(result.error.unwrap().to_string().contains("subgraph unavailable"));
    }

    #[tokio::test]
    async fn test_query_is_paged_by_configured_max() {
        let subgraph = std::sync::Arc::new(FakeSubgraph::default().with(FLAGGED_ENTITY, vec![]));
        let mut ctx = context(chain(), FakeSubgraph::default(), FakePriceFeed::default().with("SNX", 2.0));
        ctx.subgraph = subgraph.clone();
        ctx.config.subgraph_max_entities = 250;

        assert!(liquidations(&ctx).await.is_success);

        let queries = subgraph.queries.lock().unwrap();
        assert_eq!(queries[0].max, 250);
        assert_eq!(queries[0].selection.order_by.as_deref(), Some("deadline"));
    }
}
