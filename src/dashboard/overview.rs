//! Network overview: supply, debt, and collateralization

use alloy_primitives::Address;
use serde::Serialize;

use super::DashboardContext;
use crate::currency::{CurrencyKey, SNX, SUSD};
use crate::metrics::{collateral_ratio, network_c_ratio, target_c_ratio, to_percent};
use crate::query::{aggregate, AggregateQueryResult, QueryKey};
use crate::units::{from_precise, from_wei};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkOverview {
    pub snx_price: f64,
    pub snx_total_supply: f64,
    pub snx_market_cap: f64,
    pub snx_volume_24h: Option<f64>,
    /// All issued synths valued in sUSD
    pub total_issued_synths: f64,
    pub issuance_ratio: f64,
    /// Percent; `None` when any input is unusable
    pub network_c_ratio: Option<f64>,
    /// Percent
    pub target_c_ratio: Option<f64>,
    pub last_debt_ledger_entry: f64,
}

impl NetworkOverview {
    /// Every headline figure is finite
    pub fn is_complete(&self) -> bool {
        self.snx_price.is_finite()
            && self.snx_total_supply.is_finite()
            && self.total_issued_synths.is_finite()
            && self.network_c_ratio.is_some()
            && self.target_c_ratio.is_some()
    }
}

fn contract_key(contract: &str, method: &str) -> QueryKey {
    QueryKey::new(["contract", contract, method])
}

/// Six independent reads, combined only once all have arrived
pub async fn network_overview(ctx: &DashboardContext) -> AggregateQueryResult<Option<NetworkOverview>> {
    let snx = CurrencyKey::snx();
    let susd = CurrencyKey::susd();

    let contracts = ctx.contracts.clone();
    let total_supply = ctx.query(contract_key("Synthetix", "totalSupply"), move || {
        let contracts = contracts.clone();
        async move { Ok(from_wei(contracts.total_supply().await?)) }
    });

    let contracts = ctx.contracts.clone();
    let issued_key = susd.clone();
    let issued = ctx.query(contract_key("Synthetix", "totalIssuedSynths").with(SUSD), move || {
        let contracts = contracts.clone();
        let key = issued_key.clone();
        async move { Ok(from_wei(contracts.total_issued_synths(&key).await?)) }
    });

    let contracts = ctx.contracts.clone();
    let issuance_ratio = ctx.query(contract_key("SystemSettings", "issuanceRatio"), move || {
        let contracts = contracts.clone();
        async move { Ok(from_wei(contracts.issuance_ratio().await?)) }
    });

    let contracts = ctx.contracts.clone();
    let rate_key = snx.clone();
    let snx_rate = ctx.query(contract_key("ExchangeRates", "rateForCurrency").with(SNX), move || {
        let contracts = contracts.clone();
        let key = rate_key.clone();
        async move { Ok(from_wei(contracts.rate_for_currency(&key).await?)) }
    });

    let contracts = ctx.contracts.clone();
    let debt_ledger = ctx.query(contract_key("SynthetixState", "lastDebtLedgerEntry"), move || {
        let contracts = contracts.clone();
        async move { Ok(from_precise(contracts.last_debt_ledger_entry().await?)) }
    });

    let prices = ctx.prices.clone();
    let quote = ctx.query(QueryKey::new(["quote", SNX]), move || {
        let prices = prices.clone();
        let symbol = snx.clone();
        async move { prices.quote(&symbol).await }
    });

    let (total_supply, issued, issuance_ratio, snx_rate, debt_ledger, quote) = tokio::join!(
        total_supply.fetch(),
        issued.fetch(),
        issuance_ratio.fetch(),
        snx_rate.fetch(),
        debt_ledger.fetch(),
        quote.fetch(),
    );

    aggregate(
        (&total_supply, &issued, &issuance_ratio, &snx_rate, &debt_ledger, &quote),
        |(supply, issued, issuance_ratio, rate, ledger, quote)| {
            Some(NetworkOverview {
                snx_price: rate,
                snx_total_supply: supply,
                snx_market_cap: supply * rate,
                snx_volume_24h: quote.volume_24h,
                total_issued_synths: issued,
                issuance_ratio,
                network_c_ratio: network_c_ratio(supply, rate, issued).and_then(to_percent),
                target_c_ratio: target_c_ratio(issuance_ratio).and_then(to_percent),
                last_debt_ledger_entry: ledger,
            })
        },
        None,
    )
}

/// Debt / collateral value for one account, as a percentage
pub async fn account_collateral_ratio(ctx: &DashboardContext, account: Address) -> AggregateQueryResult<Option<f64>> {
    let account_id = account.to_string();

    let contracts = ctx.contracts.clone();
    let debt = ctx.query(
        QueryKey::new(["contract", "Synthetix", "debtBalanceOf", account_id.as_str()]),
        move || {
            let contracts = contracts.clone();
            async move {
                let susd = CurrencyKey::susd();
                Ok(from_wei(contracts.debt_balance_of(account, &susd).await?))
            }
        },
    );

    let contracts = ctx.contracts.clone();
    let collateral = ctx.query(
        QueryKey::new(["contract", "Synthetix", "collateral", account_id.as_str()]),
        move || {
            let contracts = contracts.clone();
            async move { Ok(from_wei(contracts.collateral(account).await?)) }
        },
    );

    let contracts = ctx.contracts.clone();
    let snx_rate = ctx.query(contract_key("ExchangeRates", "rateForCurrency").with(SNX), move || {
        let contracts = contracts.clone();
        async move {
            let snx = CurrencyKey::snx();
            Ok(from_wei(contracts.rate_for_currency(&snx).await?))
        }
    });

    let (debt, collateral, snx_rate) = tokio::join!(debt.fetch(), collateral.fetch(), snx_rate.fetch());

    aggregate(
        (&debt, &collateral, &snx_rate),
        |(debt, collateral, rate)| collateral_ratio(debt, collateral, rate).and_then(to_percent),
        None,
    )
}
