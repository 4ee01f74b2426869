//! In-process token ledger
//!
//! Tracks the balances of every in-process holder (vault, harvester, dripper, fee
//! collectors, depositors). Strategy holdings are external and only visible
//! through the adapters.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::utils::error::{arithmetic_err, insufficient_liquidity, ManagerResult};

#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    /// (token, holder) => balance
    balances: HashMap<(Address, Address), U256>,
}

impl TokenLedger {
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Credits `holder` with tokens entering from outside the ledger.
    pub fn mint(&mut self, token: Address, holder: Address, amount: U256) -> ManagerResult<()> {
        let balance = self.balances.entry((token, holder)).or_insert(U256::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| arithmetic_err("Ledger balance overflowed."))?;
        Ok(())
    }

    /// Debits `holder` for tokens leaving the ledger.
    pub fn burn(&mut self, token: Address, holder: Address, amount: U256) -> ManagerResult<()> {
        let available = self.balance_of(token, holder);
        if available < amount {
            return Err(insufficient_liquidity(amount, available));
        }
        self.balances.insert((token, holder), available - amount);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ManagerResult<()> {
        if amount == U256::ZERO || from == to {
            return Ok(());
        }
        self.burn(token, from, amount)?;
        self.mint(token, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ManagerError;

    #[test]
    fn transfer_moves_balance() {
        let token = Address::repeat_byte(0xaa);
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);
        let mut ledger = TokenLedger::default();

        ledger.mint(token, alice, U256::from(100)).unwrap();
        ledger.transfer(token, alice, bob, U256::from(40)).unwrap();

        assert_eq!(ledger.balance_of(token, alice), U256::from(60));
        assert_eq!(ledger.balance_of(token, bob), U256::from(40));
    }

    #[test]
    fn overdraft_is_rejected_without_effect() {
        let token = Address::repeat_byte(0xaa);
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);
        let mut ledger = TokenLedger::default();
        ledger.mint(token, alice, U256::from(10)).unwrap();

        let result = ledger.transfer(token, alice, bob, U256::from(11));

        assert!(matches!(
            result,
            Err(ManagerError::InsufficientLiquidity { .. })
        ));
        assert_eq!(ledger.balance_of(token, alice), U256::from(10));
        assert_eq!(ledger.balance_of(token, bob), U256::ZERO);
    }
}
