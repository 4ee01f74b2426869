//! In-memory strategy adapter
//!
//! Models a single-asset lending or LP position of any supported integration.
//! Handles are cheap clones sharing the same position, so a test or a local
//! run can accrue yield on a strategy that is already owned by the vault.

use std::{cell::RefCell, rc::Rc};

use alloy_primitives::{Address, U256};

use crate::{
    types::StrategyKind,
    utils::{
        common::scale_decimals,
        error::{adapter_err, arithmetic_err, insufficient_liquidity, ManagerResult},
    },
};

use super::{StrategyAdapter, Transfer};

#[derive(Clone, Copy, Debug)]
struct Token {
    address: Address,
    decimals: u8,
}

#[derive(Debug)]
struct Position {
    address: Address,
    kind: StrategyKind,
    deposit: Token,
    primary: Token,
    /// Second constituent of an LP position, paid out by `withdraw_all`
    pair: Option<Token>,
    /// Holdings in deposit asset units
    balance: U256,
    pending_rewards: Vec<Transfer>,
    liquidity_cap: Option<U256>,
    fail_deposits: bool,
    fail_withdrawals: bool,
}

#[derive(Clone, Debug)]
pub struct SimulatedStrategy {
    position: Rc<RefCell<Position>>,
}

impl SimulatedStrategy {
    pub fn new(
        address: Address,
        kind: StrategyKind,
        deposit_asset: Address,
        deposit_decimals: u8,
        primary_asset: Address,
        primary_decimals: u8,
    ) -> Self {
        Self {
            position: Rc::new(RefCell::new(Position {
                address,
                kind,
                deposit: Token {
                    address: deposit_asset,
                    decimals: deposit_decimals,
                },
                primary: Token {
                    address: primary_asset,
                    decimals: primary_decimals,
                },
                pair: None,
                balance: U256::ZERO,
                pending_rewards: vec![],
                liquidity_cap: None,
                fail_deposits: false,
                fail_withdrawals: false,
            })),
        }
    }

    /// Makes `withdraw_all` pay half of the position in `pair_asset`.
    pub fn with_pair(self, pair_asset: Address, pair_decimals: u8) -> Self {
        self.position.borrow_mut().pair = Some(Token {
            address: pair_asset,
            decimals: pair_decimals,
        });
        self
    }

    /// Caps the holdings, in deposit asset units.
    pub fn with_liquidity_cap(self, cap: U256) -> Self {
        self.position.borrow_mut().liquidity_cap = Some(cap);
        self
    }

    pub fn address(&self) -> Address {
        self.position.borrow().address
    }

    /// Holdings in deposit asset units
    pub fn balance(&self) -> U256 {
        self.position.borrow().balance
    }

    /// Adds yield to the position, in deposit asset units.
    pub fn accrue(&self, amount: U256) {
        let mut position = self.position.borrow_mut();
        position.balance = position.balance.saturating_add(amount);
    }

    /// Marks `amount` of `token` as claimable reward.
    pub fn add_reward(&self, token: Address, amount: U256) {
        self.position
            .borrow_mut()
            .pending_rewards
            .push(Transfer::new(token, amount));
    }

    pub fn fail_deposits(&self, fail: bool) {
        self.position.borrow_mut().fail_deposits = fail;
    }

    pub fn fail_withdrawals(&self, fail: bool) {
        self.position.borrow_mut().fail_withdrawals = fail;
    }
}

impl Position {
    /// Converts an amount of `asset` into deposit asset units.
    fn to_deposit_units(&self, asset: Address, amount: U256) -> ManagerResult<U256> {
        if asset == self.deposit.address {
            return Ok(amount);
        }
        if asset == self.primary.address {
            return scale_decimals(amount, self.primary.decimals, self.deposit.decimals);
        }
        Err(adapter_err(self.address, format!("Unsupported asset {}", asset)))
    }
}

impl StrategyAdapter for SimulatedStrategy {
    fn kind(&self) -> StrategyKind {
        self.position.borrow().kind
    }

    fn supports_asset(&self, asset: Address) -> bool {
        self.position.borrow().deposit.address == asset
    }

    fn check_balance(&self) -> ManagerResult<U256> {
        let position = self.position.borrow();
        scale_decimals(
            position.balance,
            position.deposit.decimals,
            position.primary.decimals,
        )
    }

    fn net_asset_value(&self) -> ManagerResult<U256> {
        self.check_balance()
    }

    fn lp_balance(&self) -> ManagerResult<U256> {
        Ok(self.balance())
    }

    fn deposit(&mut self, asset: Address, amount: U256) -> ManagerResult<()> {
        let mut position = self.position.borrow_mut();
        if position.fail_deposits {
            return Err(adapter_err(position.address, "Deposit reverted"));
        }
        if asset != position.deposit.address {
            return Err(adapter_err(position.address, format!("Unsupported asset {}", asset)));
        }
        let balance = position
            .balance
            .checked_add(amount)
            .ok_or_else(|| arithmetic_err("Strategy balance overflowed."))?;
        if let Some(cap) = position.liquidity_cap {
            if balance > cap {
                return Err(adapter_err(position.address, "Liquidity cap reached"));
            }
        }
        position.balance = balance;
        Ok(())
    }

    fn withdraw(
        &mut self,
        _recipient: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<Vec<Transfer>> {
        let mut position = self.position.borrow_mut();
        if position.fail_withdrawals {
            return Err(adapter_err(position.address, "Withdraw reverted"));
        }
        let needed = position.to_deposit_units(asset, amount)?;
        if needed > position.balance {
            return Err(insufficient_liquidity(needed, position.balance));
        }
        position.balance -= needed;
        Ok(vec![Transfer::new(asset, amount)])
    }

    fn withdraw_all(&mut self, _recipient: Address) -> ManagerResult<Vec<Transfer>> {
        let mut position = self.position.borrow_mut();
        if position.fail_withdrawals {
            return Err(adapter_err(position.address, "Withdraw reverted"));
        }
        let balance = std::mem::take(&mut position.balance);
        let transfers = match position.pair {
            Some(pair) => {
                let pair_share = balance / U256::from(2);
                vec![
                    Transfer::new(position.deposit.address, balance - pair_share),
                    Transfer::new(
                        pair.address,
                        scale_decimals(pair_share, position.deposit.decimals, pair.decimals)?,
                    ),
                ]
            }
            None => vec![Transfer::new(position.deposit.address, balance)],
        };
        Ok(transfers
            .into_iter()
            .filter(|transfer| transfer.amount > U256::ZERO)
            .collect())
    }

    fn collect_reward_tokens(&mut self, _recipient: Address) -> ManagerResult<Vec<Transfer>> {
        Ok(std::mem::take(&mut self.position.borrow_mut().pending_rewards))
    }
}
