//! CASH boundary
//!
//! The vault only needs mint, burn and supply changes from the rebasing token.
//! [`CashToken`] is a minimal credits based implementation where every account
//! rebases.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::{
    constants::scale,
    utils::{
        common::mul_div,
        error::{arithmetic_err, insufficient_liquidity, ManagerError, ManagerResult},
    },
};

#[cfg_attr(test, mockall::automock)]
pub trait RebasingToken {
    fn mint(&mut self, to: Address, amount: U256) -> ManagerResult<()>;
    fn burn(&mut self, from: Address, amount: U256) -> ManagerResult<()>;
    fn balance_of(&self, account: Address) -> U256;
    fn total_supply(&self) -> U256;
    /// Rebases every holder so that the supply matches `new_total_supply`
    fn change_supply(&mut self, new_total_supply: U256) -> ManagerResult<()>;
}

#[derive(Clone, Debug)]
pub struct CashToken {
    credits: HashMap<Address, U256>,
    total_credits: U256,
    /// Credits per token, scaled by 1e18
    rebasing_credits_per_token: U256,
    total_supply: U256,
}

impl Default for CashToken {
    fn default() -> Self {
        Self {
            credits: HashMap::new(),
            total_credits: U256::ZERO,
            rebasing_credits_per_token: scale(),
            total_supply: U256::ZERO,
        }
    }
}

impl CashToken {
    pub fn rebasing_credits_per_token(&self) -> U256 {
        self.rebasing_credits_per_token
    }

    fn credits_for(&self, amount: U256) -> ManagerResult<U256> {
        mul_div(amount, self.rebasing_credits_per_token, scale())
    }
}

impl RebasingToken for CashToken {
    fn mint(&mut self, to: Address, amount: U256) -> ManagerResult<()> {
        let credits = self.credits_for(amount)?;
        let balance = self.credits.entry(to).or_insert(U256::ZERO);
        *balance = balance
            .checked_add(credits)
            .ok_or_else(|| arithmetic_err("Credits overflowed."))?;
        self.total_credits = self
            .total_credits
            .checked_add(credits)
            .ok_or_else(|| arithmetic_err("Total credits overflowed."))?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| arithmetic_err("Total supply overflowed."))?;
        Ok(())
    }

    fn burn(&mut self, from: Address, amount: U256) -> ManagerResult<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(insufficient_liquidity(amount, balance));
        }
        let held = self.credits.get(&from).copied().unwrap_or(U256::ZERO);
        // Burning the full balance clears any rounding residue
        let credits = if balance == amount {
            held
        } else {
            self.credits_for(amount)?.min(held)
        };
        self.credits.insert(from, held - credits);
        self.total_credits = self.total_credits.saturating_sub(credits);
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn balance_of(&self, account: Address) -> U256 {
        let credits = self.credits.get(&account).copied().unwrap_or(U256::ZERO);
        mul_div(credits, scale(), self.rebasing_credits_per_token).unwrap_or(U256::ZERO)
    }

    fn total_supply(&self) -> U256 {
        self.total_supply
    }

    fn change_supply(&mut self, new_total_supply: U256) -> ManagerResult<()> {
        if self.total_supply == U256::ZERO {
            return Err(ManagerError::Custom("Cannot increase 0 supply".to_string()));
        }
        if new_total_supply == self.total_supply {
            return Ok(());
        }
        let credits_per_token = mul_div(self.total_credits, scale(), new_total_supply)?;
        if credits_per_token == U256::ZERO {
            return Err(arithmetic_err("Invalid change in supply."));
        }
        self.rebasing_credits_per_token = credits_per_token;
        self.total_supply = new_total_supply;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cash(amount: u64) -> U256 {
        U256::from(amount) * scale()
    }

    #[test]
    fn mint_and_burn() {
        let matt = Address::repeat_byte(0x01);
        let mut token = CashToken::default();
        token.mint(matt, cash(100)).unwrap();
        assert_eq!(token.balance_of(matt), cash(100));

        token.burn(matt, cash(40)).unwrap();
        assert_eq!(token.balance_of(matt), cash(60));
        assert_eq!(token.total_supply(), cash(60));

        assert!(token.burn(matt, cash(61)).is_err());
    }

    #[test]
    fn rebase_spreads_yield_proportionally() {
        let matt = Address::repeat_byte(0x01);
        let josh = Address::repeat_byte(0x02);
        let mut token = CashToken::default();
        token.mint(matt, cash(100)).unwrap();
        token.mint(josh, cash(300)).unwrap();
        let before = token.rebasing_credits_per_token();

        token.change_supply(cash(440)).unwrap();

        assert!(token.rebasing_credits_per_token() < before);
        assert_eq!(token.total_supply(), cash(440));
        let matt_balance = token.balance_of(matt);
        let josh_balance = token.balance_of(josh);
        assert!(cash(110) - matt_balance <= U256::from(1));
        assert!(cash(330) - josh_balance <= U256::from(1));
    }

    #[test]
    fn zero_supply_cannot_rebase() {
        let mut token = CashToken::default();
        assert!(token.change_supply(cash(1)).is_err());
    }
}
