//! Mint, redeem, rebase and payout

use alloy_primitives::{Address, U256};

use crate::{
    access::Role,
    constants::{CASH_DECIMALS, FEE_SCALE, MAX_MINT_SWAP_SLIPPAGE_BPS},
    journal::{JournalCollection, LogType},
    utils::{
        common::{portion, scale_decimals},
        error::{arithmetic_err, insufficient_liquidity, ManagerError, ManagerResult},
    },
};

use super::Vault;

impl Vault {
    /// Deposits `amount` of `asset` for CASH, then quick allocates the idle funds.
    /// Returns the CASH minted.
    pub fn mint(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        min_cash: U256,
    ) -> ManagerResult<U256> {
        self.journaled("mint", |vault, journal| {
            let minted = vault.deposit(caller, asset, amount, min_cash, journal)?;
            // Funds that cannot be deployed stay idle
            vault.quick_allocate_idle(journal)?;
            Ok(minted)
        })
    }

    /// Same as [`Vault::mint`] without the allocation.
    pub fn just_mint(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        min_cash: U256,
    ) -> ManagerResult<U256> {
        self.journaled("just_mint", |vault, journal| {
            vault.deposit(caller, asset, amount, min_cash, journal)
        })
    }

    fn deposit(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        min_cash: U256,
        journal: &mut JournalCollection,
    ) -> ManagerResult<U256> {
        self.ensure_capital_not_paused()?;
        let managed = self.managed_asset(asset)?.clone();
        if amount == U256::ZERO {
            return Err(ManagerError::ZeroAmount);
        }
        let held = self.ledger.balance_of(asset, caller);
        if held < amount {
            return Err(insufficient_liquidity(amount, held));
        }

        let fee = portion(amount, self.settings.mint_fee_bps as u32, FEE_SCALE as u32)?;
        let net = amount - fee;
        let primary = self.settings.primary_stable;

        let swap_output = if asset != primary && self.swapper.is_some() {
            let expected = self.to_primary(&managed, net)?;
            let min_out = portion(
                expected,
                (FEE_SCALE - MAX_MINT_SWAP_SLIPPAGE_BPS) as u32,
                FEE_SCALE as u32,
            )?;
            let swapper = self
                .swapper
                .as_mut()
                .ok_or_else(|| ManagerError::Custom("No swapper configured".to_string()))?;
            Some(swapper.swap(asset, net, primary, min_out)?)
        } else {
            None
        };

        let value = match swap_output {
            Some(out) => out,
            None => self.to_primary(&managed, net)?,
        };
        let cash = scale_decimals(value, self.primary_decimals(), CASH_DECIMALS)?;
        if cash < min_cash {
            return Err(ManagerError::MintBelowMinimum);
        }

        let vault = self.settings.vault;
        self.ledger.transfer(asset, caller, vault, amount)?;
        self.ledger
            .transfer(asset, vault, self.settings.treasury, fee)?;
        if let Some(out) = swap_output {
            self.ledger.burn(asset, vault, net)?;
            self.ledger.mint(primary, vault, out)?;
        }
        self.cash.mint(caller, cash)?;

        journal.append_note(
            Ok(()),
            LogType::Info,
            format!(
                "Minted {} CASH for {} {} (fee {})",
                cash, amount, managed.symbol, fee
            ),
        );
        Ok(cash)
    }

    /// Burns `cash_amount` of CASH and pays the primary stable minus the redeem fee.
    /// Returns the amount paid.
    pub fn redeem(&mut self, caller: Address, cash_amount: U256, min_out: U256) -> ManagerResult<U256> {
        self.journaled("redeem", |vault, journal| {
            if cash_amount == U256::ZERO {
                return Err(ManagerError::ZeroAmount);
            }
            let held = vault.cash.balance_of(caller);
            if held < cash_amount {
                return Err(insufficient_liquidity(cash_amount, held));
            }

            let value = scale_decimals(cash_amount, CASH_DECIMALS, vault.primary_decimals())?;
            let fee = portion(value, vault.settings.redeem_fee_bps as u32, FEE_SCALE as u32)?;
            let out = value - fee;
            if out < min_out {
                return Err(ManagerError::RedeemBelowMinimum);
            }

            vault.ensure_liquidity(value, journal)?;
            vault.cash.burn(caller, cash_amount)?;
            let primary = vault.settings.primary_stable;
            let address = vault.settings.vault;
            vault.ledger.transfer(primary, address, caller, out)?;
            vault
                .ledger
                .transfer(primary, address, vault.settings.treasury, fee)?;

            journal.append_note(
                Ok(()),
                LogType::Withdrawal,
                format!("Redeemed {} CASH for {} (fee {})", cash_amount, out, fee),
            );
            Ok(out)
        })
    }

    /// Raises the CASH supply to the vault's value. Returns the supply afterwards.
    pub fn rebase(&mut self, caller: Address) -> ManagerResult<U256> {
        self.journaled("rebase", |vault, journal| {
            vault.access.only(caller, Role::RebaseManager)?;
            vault.rebase_supply(journal)
        })
    }

    /// The supply never goes down.
    pub(super) fn rebase_supply(&mut self, journal: &mut JournalCollection) -> ManagerResult<U256> {
        let supply = self.cash.total_supply();
        if supply == U256::ZERO {
            return Ok(supply);
        }
        for strategy in self.registry.all_strategies() {
            if let Err(err) = self.strategy_balance(*strategy) {
                journal.append_strategy_note(
                    *strategy,
                    Err(err),
                    LogType::Rebase,
                    "Balance could not be read, valued at zero",
                );
            }
        }
        let value = scale_decimals(self.total_value()?, self.primary_decimals(), CASH_DECIMALS)?;
        if value <= supply {
            return Ok(supply);
        }
        self.cash.change_supply(value)?;
        journal.append_note(
            Ok(()),
            LogType::Rebase,
            format!("Supply raised from {} to {}", supply, value),
        );
        Ok(value)
    }

    /// Periodic payout: harvest and distribute, collect from the dripper, rebase.
    /// Anyone can call it once `now + payout_time_range` reaches the payout time.
    pub fn payout(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("payout", |vault, journal| {
            let now = vault.timestamp;
            let interval = vault.settings.payout_interval;
            if interval == 0 {
                return Err(ManagerError::InvalidDuration);
            }
            if now.saturating_add(vault.settings.payout_time_range) < vault.next_payout_time {
                return Err(ManagerError::Custom("Payout is not due yet".to_string()));
            }

            if let Err(err) = vault.harvest_and_distribute_all(Some(caller), journal) {
                journal.append_note(Err(err), LogType::Harvest, "Payout harvest failed");
            }
            vault.collect_dripper(journal)?;
            vault.rebase_supply(journal)?;

            let mut next = vault.next_payout_time;
            if now >= next {
                let missed = (now - next) / interval + 1;
                next = missed
                    .checked_mul(interval)
                    .and_then(|advance| next.checked_add(advance))
                    .ok_or_else(|| arithmetic_err("Payout time overflowed."))?;
            } else {
                next = next
                    .checked_add(interval)
                    .ok_or_else(|| arithmetic_err("Payout time overflowed."))?;
            }
            vault.next_payout_time = next;
            journal.append_note(
                Ok(()),
                LogType::Distribution,
                format!("Next payout at {}", next),
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::scale,
        strategy::weights::WeightEntry,
        swapper::{MockSwapper, OracleSwapper},
        vault::tests::*,
    };

    fn cash(amount: u64) -> U256 {
        U256::from(amount) * scale()
    }

    #[test]
    fn mint_takes_the_fee_and_quick_allocates() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        vault
            .set_quick_deposit_strategies(GOVERNOR, vec![strategy.address()])
            .unwrap();
        vault.set_mint_fee_bps(GOVERNOR, 25).unwrap();
        vault.ledger_mut().mint(USDC, USER, usdc(1_000)).unwrap();

        let minted = vault.mint(USER, USDC, usdc(1_000), U256::ZERO).unwrap();

        assert_eq!(minted, U256::from(9_975u64) * scale() / U256::from(10u64));
        assert_eq!(vault.cash().balance_of(USER), minted);
        assert_eq!(vault.ledger().balance_of(USDC, TREASURY), U256::from(2_500_000u64));
        assert_eq!(strategy.balance(), U256::from(997_500_000u64));
    }

    #[test]
    fn mint_below_minimum_has_no_effect() {
        let mut vault = vault();
        vault.ledger_mut().mint(USDC, USER, usdc(10)).unwrap();

        let result = vault.mint(USER, USDC, usdc(10), cash(11));

        assert_eq!(result, Err(ManagerError::MintBelowMinimum));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Mint amount lower than minimum"
        );
        assert_eq!(vault.ledger().balance_of(USDC, USER), usdc(10));
        assert_eq!(vault.cash().total_supply(), U256::ZERO);
    }

    #[test]
    fn mint_rejects_unsupported_assets_and_pauses() {
        let mut vault = vault();
        assert_eq!(
            vault.mint(USER, TEAM, U256::from(1u64), U256::ZERO),
            Err(ManagerError::AssetNotSupported)
        );
        vault.pause_capital(GOVERNOR).unwrap();
        assert_eq!(
            vault.just_mint(USER, USDC, U256::from(1u64), U256::ZERO),
            Err(ManagerError::CapitalPaused)
        );
    }

    #[test]
    fn mint_with_swapping_credits_the_primary_stable() {
        let mut vault = vault();
        let mut oracle = OracleSwapper::default();
        oracle.stable(USDC, 6).stable(DAI, 18);
        vault
            .set_swapper(GOVERNOR, Some(Box::new(oracle)))
            .unwrap();
        vault.ledger_mut().mint(DAI, USER, dai(50)).unwrap();

        let minted = vault.just_mint(USER, DAI, dai(50), cash(50)).unwrap();

        assert_eq!(minted, cash(50));
        assert_eq!(vault.idle_balance(USDC), usdc(50));
        assert_eq!(vault.idle_balance(DAI), U256::ZERO);
    }

    #[test]
    fn failed_swap_leaves_the_ledger_untouched() {
        let mut vault = vault();
        let mut swapper = MockSwapper::new();
        swapper
            .expect_swap()
            .returning(|_, _, _, _| Err(ManagerError::Custom("Slippage exceeded".to_string())));
        vault
            .set_swapper(GOVERNOR, Some(Box::new(swapper)))
            .unwrap();
        vault.ledger_mut().mint(DAI, USER, dai(5)).unwrap();

        assert!(vault.just_mint(USER, DAI, dai(5), U256::ZERO).is_err());
        assert_eq!(vault.ledger().balance_of(DAI, USER), dai(5));
        assert_eq!(vault.cash().total_supply(), U256::ZERO);
    }

    #[test]
    fn mint_without_swapper_keeps_the_asset() {
        let mut vault = vault();
        vault.ledger_mut().mint(DAI, USER, dai(5)).unwrap();

        vault.just_mint(USER, DAI, dai(5), cash(5)).unwrap();

        assert_eq!(vault.idle_balance(DAI), dai(5));
        assert_eq!(vault.total_value().unwrap(), usdc(5));
    }

    #[test]
    fn redeem_pulls_from_strategies() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        vault
            .set_strategy_with_weights(
                GOVERNOR,
                vec![WeightEntry::new(strategy.address(), 0, 100_000, 100_000)],
            )
            .unwrap();
        vault.set_redeem_fee_bps(GOVERNOR, 100).unwrap();
        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        vault.mint(USER, USDC, usdc(100), U256::ZERO).unwrap();
        vault.allocate().unwrap();
        assert_eq!(vault.idle_balance(USDC), U256::ZERO);

        let out = vault.redeem(USER, cash(50), usdc(49)).unwrap();

        assert_eq!(out, U256::from(49_500_000u64));
        assert_eq!(vault.ledger().balance_of(USDC, USER), out);
        assert_eq!(vault.ledger().balance_of(USDC, TREASURY), U256::from(500_000u64));
        assert_eq!(strategy.balance(), usdc(50));
        assert_eq!(vault.cash().total_supply(), cash(50));
    }

    #[test]
    fn redeem_below_minimum_and_overdraft() {
        let mut vault = vault();
        vault.ledger_mut().mint(USDC, USER, usdc(10)).unwrap();
        vault.just_mint(USER, USDC, usdc(10), U256::ZERO).unwrap();
        vault.set_redeem_fee_bps(GOVERNOR, 100).unwrap();

        assert_eq!(
            vault.redeem(USER, cash(10), usdc(10)),
            Err(ManagerError::RedeemBelowMinimum)
        );
        assert!(matches!(
            vault.redeem(USER, cash(11), U256::ZERO),
            Err(ManagerError::InsufficientLiquidity { .. })
        ));
        assert_eq!(vault.cash().balance_of(USER), cash(10));
    }

    #[test]
    fn rebase_only_raises_the_supply() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        vault.just_mint(USER, USDC, usdc(100), U256::ZERO).unwrap();
        strategy.accrue(usdc(10));

        assert_eq!(
            vault.rebase(USER),
            Err(ManagerError::Unauthorized(Role::RebaseManager))
        );
        assert_eq!(vault.rebase(REBASE_MANAGER).unwrap(), cash(110));

        vault.ledger_mut().burn(USDC, VAULT, usdc(20)).unwrap();
        assert_eq!(vault.rebase(GOVERNOR).unwrap(), cash(110));
    }

    #[test]
    fn payout_waits_for_the_window_and_advances_the_schedule() {
        let mut vault = vault();
        let due = vault.next_payout_time();
        let interval = vault.settings().payout_interval;

        vault.set_timestamp(due - 901);
        assert!(vault.payout(USER).is_err());

        vault.set_timestamp(due - 900);
        vault.payout(USER).unwrap();
        assert_eq!(vault.next_payout_time(), due + interval);

        vault.set_timestamp(due + 3 * interval + 5);
        vault.payout(USER).unwrap();
        assert_eq!(vault.next_payout_time(), due + 4 * interval);
    }

    #[test]
    fn rebase_journals_unreadable_strategies() {
        let mut vault = vault();
        let broken = Address::repeat_byte(0xbb);
        let mut adapter = crate::strategy::MockStrategyAdapter::new();
        adapter
            .expect_kind()
            .return_const(crate::types::StrategyKind::Tetu);
        adapter
            .expect_check_balance()
            .returning(move || Err(crate::utils::error::adapter_err(broken, "Call reverted")));
        vault
            .register_strategy(GOVERNOR, broken, Box::new(adapter))
            .unwrap();
        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        vault.just_mint(USER, USDC, usdc(100), U256::ZERO).unwrap();

        assert_eq!(vault.rebase(GOVERNOR).unwrap(), cash(100));
        assert!(vault
            .journal()
            .entries_of(LogType::Rebase)
            .iter()
            .any(|entry| entry.is_err()));
    }
}
