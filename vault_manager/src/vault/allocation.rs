//! Allocation engine
//!
//! `allocate` and `balance` are best-effort per strategy: a failing adapter is
//! journaled and left out for the rest of the call while the other strategies
//! still get served.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, U256};

use crate::{
    access::Role,
    constants::MAX_WEIGHT,
    journal::{JournalCollection, LogType},
    strategy::weights::WeightEntry,
    types::ManagedAsset,
    utils::{
        common::{mul_div, portion},
        error::{insufficient_liquidity, ManagerResult},
    },
};

use super::Vault;

impl Vault {
    /// Deploys the idle funds of every asset across the weighted strategies.
    pub fn allocate(&mut self) -> ManagerResult<()> {
        self.journaled("allocate", |vault, journal| {
            vault.ensure_capital_not_paused()?;
            vault.allocate_idle(journal)
        })
    }

    /// Deploys the idle funds of every asset into a single strategy: the first quick
    /// deposit strategy accepting the asset, or else the asset's default strategy.
    pub fn quick_allocate(&mut self) -> ManagerResult<()> {
        self.journaled("quick_allocate", |vault, journal| {
            vault.ensure_capital_not_paused()?;
            vault.quick_allocate_idle(journal)
        })
    }

    /// Moves deployed capital so each strategy approaches its target weight.
    pub fn balance(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("balance", |vault, journal| {
            vault.access.only(caller, Role::Strategist)?;
            vault.ensure_capital_not_paused()?;
            vault.rebalance(journal)
        })
    }

    pub(super) fn deposit_to_strategy(
        &mut self,
        strategy: Address,
        asset: Address,
        amount: U256,
    ) -> ManagerResult<()> {
        let available = self.idle_balance(asset);
        if available < amount {
            return Err(insufficient_liquidity(amount, available));
        }
        self.registry.adapter_mut(strategy)?.deposit(asset, amount)?;
        self.ledger.burn(asset, self.settings.vault, amount)
    }

    /// Approved and enabled rows with a non-zero target, with their current balance.
    /// Rows whose balance cannot be read are journaled and left out.
    fn allocatable_balances(&self, journal: &mut JournalCollection) -> HashMap<Address, U256> {
        let mut balances = HashMap::new();
        for entry in self.weights.entries() {
            if !entry.enabled
                || entry.target_weight == 0
                || !self.registry.is_approved(entry.strategy)
            {
                continue;
            }
            match self.strategy_balance(entry.strategy) {
                Ok(balance) => {
                    balances.insert(entry.strategy, balance);
                }
                Err(err) => {
                    journal.append_strategy_note(
                        entry.strategy,
                        Err(err),
                        LogType::Allocation,
                        "Balance could not be read",
                    );
                }
            }
        }
        balances
    }

    fn allocate_idle(&mut self, journal: &mut JournalCollection) -> ManagerResult<()> {
        let total = self.total_value()?;
        let mut balances = self.allocatable_balances(journal);
        let mut failed = HashSet::new();

        for asset in self.assets.clone() {
            self.allocate_asset(&asset, total, &mut balances, &mut failed, journal)?;
        }
        Ok(())
    }

    /// Water-fills the idle balance of `asset` proportionally to the target weights of
    /// the strategies accepting it. No strategy is filled beyond `total * max_weight`.
    fn allocate_asset(
        &mut self,
        asset: &ManagedAsset,
        total: U256,
        balances: &mut HashMap<Address, U256>,
        failed: &mut HashSet<Address>,
        journal: &mut JournalCollection,
    ) -> ManagerResult<()> {
        let entries: Vec<WeightEntry> = self.weights.entries().to_vec();

        for round in 0..=entries.len() {
            let idle = self.idle_balance(asset.address);
            if idle == U256::ZERO {
                break;
            }

            // (strategy, target weight, headroom in native units)
            let mut candidates: Vec<(Address, u32, U256)> = vec![];
            let mut accepted = false;
            for entry in entries.iter() {
                let Some(balance) = balances.get(&entry.strategy) else {
                    continue;
                };
                if failed.contains(&entry.strategy)
                    || !self
                        .registry
                        .adapter(entry.strategy)?
                        .supports_asset(asset.address)
                {
                    continue;
                }
                accepted = true;
                let cap = portion(total, entry.max_weight, MAX_WEIGHT)?;
                let headroom = self.from_primary(asset, cap.saturating_sub(*balance))?;
                if headroom > U256::ZERO {
                    candidates.push((entry.strategy, entry.target_weight, headroom));
                }
            }

            // Capped rows keep their dust idle; the default only serves unweighted assets
            if candidates.is_empty() {
                if round == 0 && !accepted {
                    self.deposit_to_default(asset, total, journal)?;
                }
                break;
            }

            let weight_sum: u64 = candidates.iter().map(|(_, weight, _)| *weight as u64).sum();
            let last = candidates.len() - 1;
            let failures = failed.len();
            let mut remaining = idle;
            let mut moved = false;

            for (index, (strategy, weight, headroom)) in candidates.into_iter().enumerate() {
                let share = if index == last {
                    remaining
                } else {
                    mul_div(idle, U256::from(weight), U256::from(weight_sum))?
                };
                let amount = share.min(headroom).min(remaining);
                if amount == U256::ZERO {
                    continue;
                }
                match self.deposit_to_strategy(strategy, asset.address, amount) {
                    Ok(()) => {
                        remaining -= amount;
                        moved = true;
                        let deposited = self.to_primary(asset, amount)?;
                        let balance = balances.entry(strategy).or_insert(U256::ZERO);
                        *balance = balance.saturating_add(deposited);
                        journal.append_strategy_note(
                            strategy,
                            Ok(()),
                            LogType::Allocation,
                            format!("Deposited {} {}", amount, asset.symbol),
                        );
                    }
                    Err(err) => {
                        failed.insert(strategy);
                        journal.append_strategy_note(
                            strategy,
                            Err(err),
                            LogType::Allocation,
                            format!("Deposit of {} {} failed", amount, asset.symbol),
                        );
                    }
                }
            }

            if !moved && failed.len() == failures {
                break;
            }
        }
        Ok(())
    }

    fn quick_deposit_target(&self, asset: &ManagedAsset) -> Option<Address> {
        self.quick_deposit
            .iter()
            .copied()
            .chain(asset.default_strategy)
            .find(|strategy| {
                self.registry.is_approved(*strategy)
                    && self
                        .registry
                        .adapter(*strategy)
                        .map(|adapter| adapter.supports_asset(asset.address))
                        .unwrap_or(false)
            })
    }

    /// Sends the idle balance of `asset` to its default strategy. A default strategy
    /// that also has a weight row is not filled beyond its `max_weight`.
    fn deposit_to_default(
        &mut self,
        asset: &ManagedAsset,
        total: U256,
        journal: &mut JournalCollection,
    ) -> ManagerResult<()> {
        let Some(strategy) = asset
            .default_strategy
            .filter(|strategy| self.registry.is_approved(*strategy))
        else {
            return Ok(());
        };
        let mut amount = self.idle_balance(asset.address);
        if let Some(entry) = self.weights.get(strategy) {
            let cap = portion(total, entry.max_weight, MAX_WEIGHT)?;
            let balance = match self.strategy_balance(strategy) {
                Ok(balance) => balance,
                Err(err) => {
                    journal.append_strategy_note(
                        strategy,
                        Err(err),
                        LogType::Allocation,
                        "Balance could not be read",
                    );
                    return Ok(());
                }
            };
            amount = amount.min(self.from_primary(asset, cap.saturating_sub(balance))?);
        }
        if amount == U256::ZERO {
            return Ok(());
        }
        let result = self.deposit_to_strategy(strategy, asset.address, amount);
        journal.append_strategy_note(
            strategy,
            result,
            LogType::Allocation,
            format!("Default deposit of {} {}", amount, asset.symbol),
        );
        Ok(())
    }

    pub(super) fn quick_allocate_idle(&mut self, journal: &mut JournalCollection) -> ManagerResult<()> {
        for asset in self.assets.clone() {
            let idle = self.idle_balance(asset.address);
            if idle == U256::ZERO {
                continue;
            }
            let Some(strategy) = self.quick_deposit_target(&asset) else {
                continue;
            };
            let result = self.deposit_to_strategy(strategy, asset.address, idle);
            journal.append_strategy_note(
                strategy,
                result,
                LogType::Allocation,
                format!("Quick deposit of {} {}", idle, asset.symbol),
            );
        }
        Ok(())
    }

    fn rebalance(&mut self, journal: &mut JournalCollection) -> ManagerResult<()> {
        let total = self.total_value()?;
        let tolerance = U256::from(self.settings.rebalance_tolerance);
        let primary = self.settings.primary_stable;

        let mut rows: Vec<(WeightEntry, U256)> = vec![];
        for entry in self.weights.entries().to_vec() {
            if !self.registry.is_approved(entry.strategy) {
                continue;
            }
            match self.strategy_balance(entry.strategy) {
                Ok(balance) => rows.push((entry, balance)),
                Err(err) => {
                    journal.append_strategy_note(
                        entry.strategy,
                        Err(err),
                        LogType::Rebalance,
                        "Balance could not be read",
                    );
                }
            }
        }

        // Surplus goes back to the vault first so it can fund the deficits
        for (entry, balance) in rows.iter_mut() {
            let target = portion(total, entry.effective_target(), MAX_WEIGHT)?;
            if *balance <= target.saturating_add(tolerance) {
                continue;
            }
            let surplus = *balance - target;
            match self.withdraw_value(entry.strategy, surplus) {
                Ok(()) => {
                    *balance = target;
                    journal.append_strategy_note(
                        entry.strategy,
                        Ok(()),
                        LogType::Rebalance,
                        format!("Withdrew surplus of {}", surplus),
                    );
                }
                Err(err) => {
                    journal.append_strategy_note(
                        entry.strategy,
                        Err(err),
                        LogType::Rebalance,
                        format!("Withdrawal of {} failed", surplus),
                    );
                }
            }
        }

        // Primary stable first, then the other assets in their managed order
        let mut assets = self.assets.clone();
        assets.sort_by_key(|asset| asset.address != primary);

        for (entry, balance) in rows.iter_mut() {
            if !entry.enabled {
                continue;
            }
            let target = portion(total, entry.target_weight, MAX_WEIGHT)?;
            for asset in assets.iter() {
                let deficit = target.saturating_sub(*balance);
                if deficit <= tolerance {
                    break;
                }
                if !self
                    .registry
                    .adapter(entry.strategy)?
                    .supports_asset(asset.address)
                {
                    continue;
                }
                let amount = self
                    .from_primary(asset, deficit)?
                    .min(self.idle_balance(asset.address));
                if amount == U256::ZERO {
                    continue;
                }
                match self.deposit_to_strategy(entry.strategy, asset.address, amount) {
                    Ok(()) => {
                        *balance = balance.saturating_add(self.to_primary(asset, amount)?);
                        journal.append_strategy_note(
                            entry.strategy,
                            Ok(()),
                            LogType::Rebalance,
                            format!("Deposited {} {}", amount, asset.symbol),
                        );
                    }
                    Err(err) => {
                        journal.append_strategy_note(
                            entry.strategy,
                            Err(err),
                            LogType::Rebalance,
                            format!("Deposit of {} {} failed", amount, asset.symbol),
                        );
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
