//! Contract reads
//!
//! Every read is a plain `eth_call` against one of the protocol contracts.
//! The `ContractReader` trait is the seam: production goes over JSON-RPC,
//! tests answer calldata from a table.

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace;

use crate::config::Config;
use crate::currency::CurrencyKey;

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    interface ISynthetix {
        function totalSupply() external view returns (uint256);
        function totalIssuedSynths(bytes32 currencyKey) external view returns (uint256);
        function debtBalanceOf(address account, bytes32 currencyKey) external view returns (uint256);
        function collateral(address account) external view returns (uint256);
    }

    interface ISystemSettings {
        // Max debt / collateral value before an account can be flagged
        function issuanceRatio() external view returns (uint256);
    }

    interface IExchangeRates {
        function rateForCurrency(bytes32 currencyKey) external view returns (uint256);
    }

    interface ISynthetixState {
        // 27-decimal precise unit
        function lastDebtLedgerEntry() external view returns (uint256);
    }

    interface IStakingRewards {
        function rewardRate() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function periodFinish() external view returns (uint256);
        function rewardsDuration() external view returns (uint256);
    }
}

// ============================================
// READER
// ============================================

#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Raw `eth_call`: calldata in, return data out
    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>>;
}

/// JSON-RPC reader
pub struct RpcContractReader {
    rpc_url: String,
}

impl RpcContractReader {
    pub fn new(rpc_url: String) -> Self {
        Self { rpc_url }
    }
}

#[async_trait]
impl ContractReader for RpcContractReader {
    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(calldata).into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| eyre!("eth_call to {} failed: {}", to, e))?;

        Ok(result.to_vec())
    }
}

// ============================================
// PROTOCOL CONTRACTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub synthetix: Address,
    pub system_settings: Address,
    pub exchange_rates: Address,
    pub synthetix_state: Address,
}

impl ContractAddresses {
    pub fn from_config(config: &Config) -> Result<Self> {
        let parse = |name: &str, value: &str| {
            Address::from_str(value).map_err(|e| eyre!("invalid {} address {:?}: {}", name, value, e))
        };

        Ok(Self {
            synthetix: parse("synthetix", &config.synthetix_address)?,
            system_settings: parse("system_settings", &config.system_settings_address)?,
            exchange_rates: parse("exchange_rates", &config.exchange_rates_address)?,
            synthetix_state: parse("synthetix_state", &config.synthetix_state_address)?,
        })
    }
}

/// Raw staking-rewards contract state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStakingPool {
    pub reward_rate: U256,
    pub total_supply: U256,
    pub period_finish: U256,
    pub rewards_duration: U256,
}

/// Typed reads over a [`ContractReader`]. Values come back raw; normalizing
/// them is the caller's job because only the caller knows the exponent.
#[derive(Clone)]
pub struct SynthetixContracts {
    reader: Arc<dyn ContractReader>,
    addresses: ContractAddresses,
}

impl SynthetixContracts {
    pub fn new(reader: Arc<dyn ContractReader>, addresses: ContractAddresses) -> Self {
        Self { reader, addresses }
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    async fn read<C: SolCall<Return = U256>>(&self, to: Address, call: C) -> Result<U256> {
        trace!("eth_call {} on {}", C::SIGNATURE, to);
        let output = self.reader.call(to, call.abi_encode()).await?;
        C::abi_decode_returns(&output).map_err(|e| eyre!("failed to decode {}: {}", C::SIGNATURE, e))
    }

    /// Total SNX supply, 18 decimals
    pub async fn total_supply(&self) -> Result<U256> {
        self.read(self.addresses.synthetix, ISynthetix::totalSupplyCall {}).await
    }

    /// All issued synths valued in `currency`, 18 decimals
    pub async fn total_issued_synths(&self, currency: &CurrencyKey) -> Result<U256> {
        let call = ISynthetix::totalIssuedSynthsCall {
            currencyKey: currency.to_bytes32(),
        };
        self.read(self.addresses.synthetix, call).await
    }

    /// Account debt valued in `currency`, 18 decimals
    pub async fn debt_balance_of(&self, account: Address, currency: &CurrencyKey) -> Result<U256> {
        let call = ISynthetix::debtBalanceOfCall {
            account,
            currencyKey: currency.to_bytes32(),
        };
        self.read(self.addresses.synthetix, call).await
    }

    /// Account SNX collateral, escrow included, 18 decimals
    pub async fn collateral(&self, account: Address) -> Result<U256> {
        self.read(self.addresses.synthetix, ISynthetix::collateralCall { account })
            .await
    }

    /// 18 decimals
    pub async fn issuance_ratio(&self) -> Result<U256> {
        self.read(self.addresses.system_settings, ISystemSettings::issuanceRatioCall {})
            .await
    }

    /// USD rate, 18 decimals
    pub async fn rate_for_currency(&self, currency: &CurrencyKey) -> Result<U256> {
        let call = IExchangeRates::rateForCurrencyCall {
            currencyKey: currency.to_bytes32(),
        };
        self.read(self.addresses.exchange_rates, call).await
    }

    /// 27 decimals
    pub async fn last_debt_ledger_entry(&self) -> Result<U256> {
        self.read(self.addresses.synthetix_state, ISynthetixState::lastDebtLedgerEntryCall {})
            .await
    }

    /// All four reward-contract reads, issued concurrently
    pub async fn staking_pool(&self, pool: Address) -> Result<RawStakingPool> {
        let (reward_rate, total_supply, period_finish, rewards_duration) = tokio::try_join!(
            self.read(pool, IStakingRewards::rewardRateCall {}),
            self.read(pool, IStakingRewards::totalSupplyCall {}),
            self.read(pool, IStakingRewards::periodFinishCall {}),
            self.read(pool, IStakingRewards::rewardsDurationCall {}),
        )?;

        Ok(RawStakingPool {
            reward_rate,
            total_supply,
            period_finish,
            rewards_duration,
        })
    }
}

// ============================================
// TEST SUPPORT
// ============================================

#[cfg(test)]
pub mod fake {
    use super::*;
    use alloy_sol_types::SolValue;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers `eth_call`s from a (contract, calldata) table
    #[derive(Default)]
    pub struct FakeChain {
        answers: HashMap<(Address, Vec<u8>), U256>,
        pub calls: AtomicU32,
    }

    impl FakeChain {
        pub fn answer<C: SolCall>(&mut self, to: Address, call: C, value: U256) {
            self.answers.insert((to, call.abi_encode()), value);
        }
    }

    #[async_trait]
    impl ContractReader for FakeChain {
        async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(&(to, calldata))
                .map(|v| v.abi_encode())
                .ok_or_else(|| eyre!("execution reverted"))
        }
    }

    pub fn addresses() -> ContractAddresses {
        ContractAddresses {
            synthetix: Address::repeat_byte(0x01),
            system_settings: Address::repeat_byte(0x02),
            exchange_rates: Address::repeat_byte(0x03),
            synthetix_state: Address::repeat_byte(0x04),
        }
    }
}
