use std::fmt;

use alloy_primitives::Address;
use alloy_sol_types::sol;
use candid::{CandidType, Nat};
use serde::{Deserialize, Serialize};

use crate::{
    strategy::weights::WeightEntry,
    utils::{
        common::{nat_to_u32, string_to_address},
        error::ManagerError,
    },
};

/// Supported stablecoin managed by the vault
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedAsset {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Strategy used by `quick_allocate` when no quick deposit strategy accepts the asset
    pub default_strategy: Option<Address>,
}

/// Integrations a strategy adapter can wrap
#[derive(Clone, Copy, CandidType, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StrategyKind {
    Aave,
    Am3Curve,
    Dystopia,
    MeshSwap,
    MeshSwapDual,
    QuickSwap,
    Stargate,
    Synapse,
    Dodo,
    Tetu,
    Gains,
    Balancer,
    Clearpool,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(CandidType, Clone, Debug, Deserialize)]
pub struct StrategyWithWeightInput {
    pub strategy: String,
    pub min_weight: Nat,
    pub target_weight: Nat,
    pub max_weight: Nat,
    pub enabled: bool,
    pub enabled_reward: bool,
}

impl TryFrom<StrategyWithWeightInput> for WeightEntry {
    type Error = ManagerError;

    fn try_from(value: StrategyWithWeightInput) -> Result<Self, Self::Error> {
        Ok(Self {
            strategy: string_to_address(&value.strategy)?,
            min_weight: nat_to_u32(&value.min_weight)?,
            target_weight: nat_to_u32(&value.target_weight)?,
            max_weight: nat_to_u32(&value.max_weight)?,
            enabled: value.enabled,
            enabled_reward: value.enabled_reward,
        })
    }
}

#[derive(CandidType, Debug)]
pub struct StrategyWithWeightQuery {
    pub strategy: String,
    pub position: u32,
    pub min_weight: u32,
    pub target_weight: u32,
    pub max_weight: u32,
    pub enabled: bool,
    pub enabled_reward: bool,
    /// `checkBalance()` of the strategy in primary stable units
    pub balance: Nat,
}

#[derive(CandidType, Debug)]
pub struct VaultStatusQuery {
    pub total_value: Nat,
    pub cash_supply: Nat,
    pub capital_paused: bool,
    pub strategies: u32,
    pub next_payout_time: u64,
}

sol!(
    // Strategy getters
    function checkBalance() external view returns (uint256);
    function netAssetValue() external view returns (uint256);
    function lpBalance() external view returns (uint256);
    function getRewardTokenAddresses() external view returns (address[] memory);

    // Strategy externals
    function deposit(address _asset, uint256 _amount) external;
    function withdraw(address _recipient, address _asset, uint256 _amount) external;
    function withdrawAll() external;
    function collectRewardTokens() external;

    // ERC20
    function balanceOf(address account) external view returns (uint256);
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_input_is_parsed() {
        let input = StrategyWithWeightInput {
            strategy: "0x569A03632dBDE3b9f108b0552Ea80De00e5A810a".to_string(),
            min_weight: Nat::from(0u32),
            target_weight: Nat::from(70_000u32),
            max_weight: Nat::from(100_000u32),
            enabled: true,
            enabled_reward: false,
        };

        let entry = WeightEntry::try_from(input).unwrap();
        assert_eq!(entry.target_weight, 70_000);
        assert_eq!(entry.max_weight, 100_000);
        assert!(!entry.enabled_reward);
    }

    #[test]
    fn weight_input_rejects_bad_address() {
        let input = StrategyWithWeightInput {
            strategy: "aave".to_string(),
            min_weight: Nat::from(0u32),
            target_weight: Nat::from(0u32),
            max_weight: Nat::from(0u32),
            enabled: true,
            enabled_reward: true,
        };

        assert!(matches!(
            WeightEntry::try_from(input),
            Err(ManagerError::DecodingError(_))
        ));
    }
}
