//! Withdrawal coordinator

use alloy_primitives::{Address, U256};

use crate::{
    access::Role,
    journal::{JournalCollection, LogType},
    utils::error::{insufficient_liquidity, ManagerError, ManagerResult},
};

use super::Vault;

impl Vault {
    /// Pulls every holding of `strategy` back into the vault.
    pub fn withdraw_all_from_strategy(&mut self, caller: Address, strategy: Address) -> ManagerResult<()> {
        self.journaled("withdraw_all_from_strategy", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.drain_strategy(strategy, journal)
        })
    }

    /// Drains every registered strategy. A strategy that fails is journaled and skipped.
    pub fn withdraw_all_from_strategies(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("withdraw_all_from_strategies", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            for strategy in vault.registry.all_strategies().to_vec() {
                if let Err(err) = vault.drain_strategy(strategy, journal) {
                    journal.append_strategy_note(
                        strategy,
                        Err(err),
                        LogType::Withdrawal,
                        "Withdraw all failed",
                    );
                }
            }
            Ok(())
        })
    }

    /// Partial withdrawal of `amount` of `asset` from `strategy` into the vault.
    /// Requests above the strategy's holdings are rejected before the adapter is called.
    pub fn withdraw_from_strategy(
        &mut self,
        caller: Address,
        strategy: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<()> {
        self.journaled("withdraw_from_strategy", |vault, journal| {
            vault.access.only(caller, Role::Strategist)?;
            if amount == U256::ZERO {
                return Err(ManagerError::ZeroAmount);
            }
            let managed = vault.managed_asset(asset)?.clone();
            if !vault.registry.is_registered(strategy) {
                return Err(ManagerError::StrategyNotApproved);
            }
            if !vault.registry.adapter(strategy)?.supports_asset(asset) {
                return Err(ManagerError::AssetNotSupported);
            }
            let held = vault.strategy_balance(strategy)?;
            let requested = vault.to_primary(&managed, amount)?;
            if requested > held {
                return Err(insufficient_liquidity(requested, held));
            }
            vault.withdraw_to_vault(strategy, asset, amount)?;
            journal.append_strategy_note(
                strategy,
                Ok(()),
                LogType::Withdrawal,
                format!("Withdrew {} {}", amount, managed.symbol),
            );
            Ok(())
        })
    }

    fn withdraw_to_vault(
        &mut self,
        strategy: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<()> {
        let vault = self.settings.vault;
        let transfers = self
            .registry
            .adapter_mut(strategy)?
            .withdraw(vault, asset, amount)?;
        self.credit(vault, &transfers)
    }

    /// Withdraws `amount` worth of primary stable units from `strategy`, in the asset
    /// the strategy is withdrawn in.
    pub(super) fn withdraw_value(&mut self, strategy: Address, amount: U256) -> ManagerResult<()> {
        let asset = self.withdrawal_asset(strategy)?;
        let native = self.from_primary(&asset, amount)?;
        self.withdraw_to_vault(strategy, asset.address, native)
    }

    /// Withdraws everything from `strategy`. Its balance must read zero afterwards.
    pub(super) fn drain_strategy(
        &mut self,
        strategy: Address,
        journal: &mut JournalCollection,
    ) -> ManagerResult<()> {
        if !self.registry.is_registered(strategy) {
            return Err(ManagerError::StrategyNotApproved);
        }
        let vault = self.settings.vault;
        let transfers = self.registry.adapter_mut(strategy)?.withdraw_all(vault)?;
        self.credit(vault, &transfers)?;

        let remaining = self.strategy_balance(strategy)?;
        if remaining != U256::ZERO {
            return Err(ManagerError::InvariantViolation(format!(
                "Strategy {} still holds {} after withdrawing all",
                strategy, remaining
            )));
        }
        for transfer in transfers {
            journal.append_strategy_note(
                strategy,
                Ok(()),
                LogType::Withdrawal,
                format!("Received {} of {}", transfer.amount, transfer.token),
            );
        }
        Ok(())
    }

    /// Strategies that pay out the primary stable, in weight table order followed by
    /// the other registered ones
    fn liquidity_sources(&self) -> Vec<Address> {
        let primary = self.settings.primary_stable;
        let mut order: Vec<Address> = self
            .weights
            .entries()
            .iter()
            .map(|entry| entry.strategy)
            .collect();
        for strategy in self.registry.all_strategies() {
            if !order.contains(strategy) {
                order.push(*strategy);
            }
        }
        order.retain(|strategy| {
            self.registry
                .adapter(*strategy)
                .map(|adapter| adapter.supports_asset(primary))
                .unwrap_or(false)
        });
        order
    }

    /// Makes sure the vault holds `amount` of the primary stable, pulling the shortfall
    /// from the liquidity sources in order. A source whose withdrawal fails is skipped.
    /// When the shortfall cannot be covered, whatever was pulled goes back to where it
    /// came from and nothing is left moved.
    pub(super) fn ensure_liquidity(
        &mut self,
        amount: U256,
        journal: &mut JournalCollection,
    ) -> ManagerResult<()> {
        let primary = self.settings.primary_stable;
        let idle = self.idle_balance(primary);
        if idle >= amount {
            return Ok(());
        }

        let mut sources: Vec<(Address, U256)> = vec![];
        let mut available = U256::ZERO;
        for strategy in self.liquidity_sources() {
            let Ok(balance) = self.strategy_balance(strategy) else {
                continue;
            };
            if balance > U256::ZERO {
                sources.push((strategy, balance));
                available = available.saturating_add(balance);
            }
        }
        let mut shortfall = amount - idle;
        if available < shortfall {
            return Err(insufficient_liquidity(amount, idle.saturating_add(available)));
        }

        let mut pulled: Vec<(Address, U256)> = vec![];
        for (strategy, balance) in sources {
            if shortfall == U256::ZERO {
                break;
            }
            let take = balance.min(shortfall);
            let before = self.idle_balance(primary);
            match self.withdraw_to_vault(strategy, primary, take) {
                Ok(()) => {
                    let received = self.idle_balance(primary).saturating_sub(before);
                    shortfall = shortfall.saturating_sub(received);
                    pulled.push((strategy, received));
                    journal.append_strategy_note(
                        strategy,
                        Ok(()),
                        LogType::Withdrawal,
                        format!("Pulled {} for liquidity", received),
                    );
                }
                Err(err) => {
                    journal.append_strategy_note(
                        strategy,
                        Err(err),
                        LogType::Withdrawal,
                        format!("Pull of {} for liquidity failed", take),
                    );
                }
            }
        }

        if shortfall > U256::ZERO {
            self.restore_pulled(pulled, journal);
            return Err(insufficient_liquidity(amount, amount - shortfall));
        }
        Ok(())
    }

    /// Deposits pulled liquidity back into the strategies it came from.
    fn restore_pulled(&mut self, pulled: Vec<(Address, U256)>, journal: &mut JournalCollection) {
        let primary = self.settings.primary_stable;
        for (strategy, amount) in pulled.into_iter().rev() {
            if amount == U256::ZERO {
                continue;
            }
            let result = self.deposit_to_strategy(strategy, primary, amount);
            journal.append_strategy_note(
                strategy,
                result,
                LogType::Withdrawal,
                format!("Returned {} after an uncovered liquidity pull", amount),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        strategy::{
            simulated::SimulatedStrategy, weights::WeightEntry, MockStrategyAdapter,
            StrategyAdapter,
        },
        types::StrategyKind,
        vault::tests::*,
    };

    #[test]
    fn withdraw_all_converges_to_zero() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        strategy.accrue(usdc(42));

        vault
            .withdraw_all_from_strategy(GOVERNOR, strategy.address())
            .unwrap();

        assert_eq!(strategy.check_balance().unwrap(), U256::ZERO);
        assert_eq!(vault.idle_balance(USDC), usdc(42));
        assert_eq!(
            vault.withdraw_all_from_strategy(STRATEGIST, strategy.address()),
            Err(ManagerError::Unauthorized(Role::Governor))
        );
    }

    #[test]
    fn withdraw_all_from_lp_strategy_returns_both_assets() {
        let mut vault = vault();
        let address = Address::repeat_byte(0x61);
        let lp = crate::strategy::simulated::SimulatedStrategy::new(
            address,
            crate::types::StrategyKind::Dystopia,
            DAI,
            18,
            USDC,
            6,
        )
        .with_pair(USDC, 6);
        vault
            .register_strategy(GOVERNOR, address, Box::new(lp.clone()))
            .unwrap();
        lp.accrue(dai(10));

        vault.withdraw_all_from_strategy(GOVERNOR, address).unwrap();

        assert_eq!(vault.idle_balance(DAI), dai(5));
        assert_eq!(vault.idle_balance(USDC), usdc(5));
    }

    #[test]
    fn over_withdrawal_is_rejected_before_the_adapter() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        strategy.accrue(usdc(10));

        let result = vault.withdraw_from_strategy(STRATEGIST, strategy.address(), USDC, usdc(11));

        assert_eq!(
            result,
            Err(insufficient_liquidity(usdc(11), usdc(10)))
        );
        assert_eq!(strategy.balance(), usdc(10));

        vault
            .withdraw_from_strategy(STRATEGIST, strategy.address(), USDC, usdc(4))
            .unwrap();
        assert_eq!(strategy.balance(), usdc(6));
        assert_eq!(vault.idle_balance(USDC), usdc(4));
    }

    #[test]
    fn withdraw_all_from_strategies_is_best_effort() {
        let mut vault = vault();
        let healthy = add_strategy(&mut vault, 1, USDC, 6);
        let stuck = add_strategy(&mut vault, 2, USDC, 6);
        healthy.accrue(usdc(3));
        stuck.accrue(usdc(4));
        stuck.fail_withdrawals(true);

        vault.withdraw_all_from_strategies(GOVERNOR).unwrap();

        assert_eq!(vault.idle_balance(USDC), usdc(3));
        assert_eq!(stuck.balance(), usdc(4));
    }

    #[test]
    fn liquidity_cascades_in_position_order() {
        let mut vault = vault();
        let first = add_strategy(&mut vault, 1, USDC, 6);
        let second = add_strategy(&mut vault, 2, USDC, 6);
        vault
            .set_strategy_with_weights(
                GOVERNOR,
                vec![
                    WeightEntry::new(second.address(), 0, 50_000, 100_000),
                    WeightEntry::new(first.address(), 0, 50_000, 100_000),
                ],
            )
            .unwrap();
        first.accrue(usdc(30));
        second.accrue(usdc(20));
        vault.ledger_mut().mint(USDC, VAULT, usdc(5)).unwrap();

        let mut journal = JournalCollection::open(0);
        vault.ensure_liquidity(usdc(40), &mut journal).unwrap();

        assert_eq!(vault.idle_balance(USDC), usdc(40));
        assert_eq!(second.balance(), U256::ZERO);
        assert_eq!(first.balance(), usdc(15));
    }

    #[test]
    fn insufficient_total_liquidity_moves_nothing() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        strategy.accrue(usdc(10));

        let mut journal = JournalCollection::open(0);
        let result = vault.ensure_liquidity(usdc(11), &mut journal);

        assert!(matches!(
            result,
            Err(ManagerError::InsufficientLiquidity { .. })
        ));
        assert_eq!(strategy.balance(), usdc(10));
        assert_eq!(vault.idle_balance(USDC), U256::ZERO);
    }

    fn weighted_pair(vault: &mut Vault) -> (SimulatedStrategy, SimulatedStrategy) {
        let first = add_strategy(vault, 1, USDC, 6);
        let second = add_strategy(vault, 2, USDC, 6);
        vault
            .set_strategy_with_weights(
                GOVERNOR,
                vec![
                    WeightEntry::new(first.address(), 0, 50_000, 100_000),
                    WeightEntry::new(second.address(), 0, 50_000, 100_000),
                ],
            )
            .unwrap();
        (first, second)
    }

    #[test]
    fn uncovered_redeem_returns_what_was_pulled() {
        let mut vault = vault();
        let (first, second) = weighted_pair(&mut vault);
        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        let cash = vault.just_mint(USER, USDC, usdc(100), U256::ZERO).unwrap();
        vault.allocate().unwrap();
        second.fail_withdrawals(true);

        let result = vault.redeem(USER, cash, U256::ZERO);

        assert_eq!(result, Err(insufficient_liquidity(usdc(100), usdc(50))));
        assert_eq!(first.balance(), usdc(50));
        assert_eq!(second.balance(), usdc(50));
        assert_eq!(vault.idle_balance(USDC), U256::ZERO);
        assert_eq!(vault.cash().balance_of(USER), cash);
    }

    #[test]
    fn failing_source_is_skipped_when_others_cover() {
        let mut vault = vault();
        let (first, second) = weighted_pair(&mut vault);
        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        let cash = vault.just_mint(USER, USDC, usdc(100), U256::ZERO).unwrap();
        vault.allocate().unwrap();
        first.fail_withdrawals(true);

        let out = vault
            .redeem(USER, cash / U256::from(2u64), U256::ZERO)
            .unwrap();

        assert_eq!(out, usdc(50));
        assert_eq!(first.balance(), usdc(50));
        assert_eq!(second.balance(), U256::ZERO);
    }

    #[test]
    fn liquidity_comes_only_from_strategies_paying_the_primary_stable() {
        let mut vault = vault();
        let usdc_strategy = add_strategy(&mut vault, 1, USDC, 6);
        let dai_only = Address::repeat_byte(0xd5);
        let mut adapter = MockStrategyAdapter::new();
        adapter.expect_kind().return_const(StrategyKind::Synapse);
        adapter
            .expect_supports_asset()
            .returning(|asset| asset == DAI);
        adapter.expect_check_balance().returning(|| Ok(usdc(100)));
        adapter.expect_withdraw().never();
        vault
            .register_strategy(GOVERNOR, dai_only, Box::new(adapter))
            .unwrap();
        vault.approve_strategy(GOVERNOR, dai_only).unwrap();

        vault.ledger_mut().mint(USDC, USER, usdc(100)).unwrap();
        let cash = vault.just_mint(USER, USDC, usdc(100), U256::ZERO).unwrap();
        vault.ledger_mut().burn(USDC, VAULT, usdc(100)).unwrap();
        usdc_strategy.accrue(usdc(60));

        let result = vault.redeem(USER, cash, U256::ZERO);

        assert_eq!(result, Err(insufficient_liquidity(usdc(100), usdc(60))));
        assert_eq!(usdc_strategy.balance(), usdc(60));
    }

    #[test]
    fn partial_withdrawal_needs_an_accepted_asset() {
        let mut vault = vault();
        let strategy = add_strategy(&mut vault, 1, USDC, 6);
        strategy.accrue(usdc(10));

        let result = vault.withdraw_from_strategy(STRATEGIST, strategy.address(), DAI, dai(1));

        assert_eq!(result, Err(ManagerError::AssetNotSupported));
        assert_eq!(strategy.balance(), usdc(10));
    }
}
