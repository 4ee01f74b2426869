//! Strategy adapters and the vault's view over them

pub mod evm;
pub mod registry;
pub mod simulated;
pub mod weights;

use alloy_primitives::{Address, U256};

use crate::{types::StrategyKind, utils::error::ManagerResult};

/// Tokens paid out by a strategy to a recipient
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub token: Address,
    pub amount: U256,
}

impl Transfer {
    pub fn new(token: Address, amount: U256) -> Self {
        Self { token, amount }
    }
}

/// Surface of an external yield integration, as consumed by the vault.
///
/// Balances reported by `check_balance` and `net_asset_value` are denominated in
/// primary stable units. Deposit and withdrawal amounts are in the native units
/// of the given asset.
#[cfg_attr(test, mockall::automock)]
pub trait StrategyAdapter {
    fn kind(&self) -> StrategyKind;

    /// Returns `true` if the strategy accepts deposits of `asset`.
    fn supports_asset(&self, asset: Address) -> bool;

    fn check_balance(&self) -> ManagerResult<U256>;

    fn net_asset_value(&self) -> ManagerResult<U256>;

    fn lp_balance(&self) -> ManagerResult<U256>;

    fn deposit(&mut self, asset: Address, amount: U256) -> ManagerResult<()>;

    /// Partial withdrawal. Must fail when `amount` exceeds the holdings.
    fn withdraw(
        &mut self,
        recipient: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<Vec<Transfer>>;

    /// Pays out every holding, possibly in several constituent tokens.
    fn withdraw_all(&mut self, recipient: Address) -> ManagerResult<Vec<Transfer>>;

    /// Claims the pending reward tokens to `recipient`.
    fn collect_reward_tokens(&mut self, recipient: Address) -> ManagerResult<Vec<Transfer>>;
}
