//! ABI-backed strategy adapter
//!
//! Talks to a deployed strategy contract through a [`ContractTransport`]. Payouts
//! of `withdrawAll` and `collectRewardTokens` are not returned by the contracts,
//! so they are measured as the recipient's balance difference around the call.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::{
    types::*,
    utils::{common::decode_abi_response, error::ManagerResult},
};

use super::{StrategyAdapter, Transfer};

/// Raw contract access, hex encoded the way `eth_call` returns it.
#[cfg_attr(test, mockall::automock)]
pub trait ContractTransport {
    /// Read-only call. Returns the hex encoded return data.
    fn call(&self, to: Address, data: Vec<u8>) -> ManagerResult<String>;
    /// State changing call.
    fn send(&mut self, to: Address, data: Vec<u8>) -> ManagerResult<()>;
}

pub struct EvmStrategy<T: ContractTransport> {
    address: Address,
    kind: StrategyKind,
    /// Assets accepted by `deposit`
    assets: Vec<Address>,
    transport: T,
}

impl<T: ContractTransport> EvmStrategy<T> {
    pub fn new(address: Address, kind: StrategyKind, assets: Vec<Address>, transport: T) -> Self {
        Self {
            address,
            kind,
            assets,
            transport,
        }
    }

    fn call_view<F: SolCall>(&self, call: F) -> ManagerResult<String> {
        self.transport.call(self.address, call.abi_encode())
    }

    fn token_balance(&self, token: Address, account: Address) -> ManagerResult<U256> {
        let response = self
            .transport
            .call(token, balanceOfCall { account }.abi_encode())?;
        Ok(decode_abi_response::<balanceOfReturn, balanceOfCall>(response)?._0)
    }

    fn balances(&self, tokens: &[Address], account: Address) -> ManagerResult<Vec<U256>> {
        tokens
            .iter()
            .map(|token| self.token_balance(*token, account))
            .collect()
    }

    fn reward_tokens(&self) -> ManagerResult<Vec<Address>> {
        let response = self.call_view(getRewardTokenAddressesCall {})?;
        Ok(decode_abi_response::<getRewardTokenAddressesReturn, getRewardTokenAddressesCall>(
            response,
        )?
        ._0)
    }

    /// Sends `data` and reports how much of each token `recipient` gained.
    fn send_measured(
        &mut self,
        tokens: &[Address],
        recipient: Address,
        data: Vec<u8>,
    ) -> ManagerResult<Vec<Transfer>> {
        let before = self.balances(tokens, recipient)?;
        self.transport.send(self.address, data)?;
        let after = self.balances(tokens, recipient)?;

        Ok(tokens
            .iter()
            .zip(before.iter().zip(after.iter()))
            .filter(|(_, (before, after))| after > before)
            .map(|(token, (before, after))| Transfer::new(*token, *after - *before))
            .collect())
    }
}

impl<T: ContractTransport> StrategyAdapter for EvmStrategy<T> {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn supports_asset(&self, asset: Address) -> bool {
        self.assets.contains(&asset)
    }

    fn check_balance(&self) -> ManagerResult<U256> {
        let response = self.call_view(checkBalanceCall {})?;
        Ok(decode_abi_response::<checkBalanceReturn, checkBalanceCall>(response)?._0)
    }

    fn net_asset_value(&self) -> ManagerResult<U256> {
        let response = self.call_view(netAssetValueCall {})?;
        Ok(decode_abi_response::<netAssetValueReturn, netAssetValueCall>(response)?._0)
    }

    fn lp_balance(&self) -> ManagerResult<U256> {
        let response = self.call_view(lpBalanceCall {})?;
        Ok(decode_abi_response::<lpBalanceReturn, lpBalanceCall>(response)?._0)
    }

    fn deposit(&mut self, asset: Address, amount: U256) -> ManagerResult<()> {
        let data = depositCall {
            _asset: asset,
            _amount: amount,
        }
        .abi_encode();
        self.transport.send(self.address, data)
    }

    fn withdraw(
        &mut self,
        recipient: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<Vec<Transfer>> {
        let data = withdrawCall {
            _recipient: recipient,
            _asset: asset,
            _amount: amount,
        }
        .abi_encode();
        self.transport.send(self.address, data)?;
        Ok(vec![Transfer::new(asset, amount)])
    }

    fn withdraw_all(&mut self, recipient: Address) -> ManagerResult<Vec<Transfer>> {
        let assets = self.assets.clone();
        self.send_measured(&assets, recipient, withdrawAllCall {}.abi_encode())
    }

    fn collect_reward_tokens(&mut self, recipient: Address) -> ManagerResult<Vec<Transfer>> {
        let tokens = self.reward_tokens()?;
        self.send_measured(&tokens, recipient, collectRewardTokensCall {}.abi_encode())
    }
}
