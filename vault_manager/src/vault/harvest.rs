//! Harvesting, fee distribution and the dripper

use alloy_primitives::{Address, U256};

use crate::{
    access::Role,
    harvester::FeeSplit,
    journal::{JournalCollection, LogType},
    utils::error::{ManagerError, ManagerResult},
};

use super::Vault;

impl Vault {
    /// Claims the reward tokens of `strategy` into the harvester and swaps the
    /// swap-enabled ones into the primary stable.
    pub fn harvest(&mut self, caller: Address, strategy: Address) -> ManagerResult<()> {
        self.journaled("harvest", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvest_strategy(strategy, journal)
        })
    }

    /// Harvests every supported strategy with rewards enabled.
    pub fn harvest_all(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("harvest_all", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvest_reward_strategies(journal);
            Ok(())
        })
    }

    /// Pays Labs and Team their share of the harvester's primary stable balance.
    pub fn distribute_fees(&mut self, caller: Address) -> ManagerResult<FeeSplit> {
        self.journaled("distribute_fees", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            let split = vault.harvested_split(false)?;
            vault.pay_fees(&split, journal)?;
            Ok(split)
        })
    }

    /// Sends the harvester's remaining primary stable to the rewards proceeds address.
    pub fn distribute_proceeds(&mut self, caller: Address) -> ManagerResult<U256> {
        self.journaled("distribute_proceeds", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.pay_proceeds(journal)
        })
    }

    /// Harvests `strategy`, or every reward-enabled strategy when `None`, and
    /// distributes the proceeds. The caller receives the incentive share.
    pub fn harvest_and_distribute(
        &mut self,
        caller: Address,
        strategy: Option<Address>,
    ) -> ManagerResult<FeeSplit> {
        self.journaled("harvest_and_distribute", |vault, journal| match strategy {
            Some(strategy) => {
                vault.harvest_strategy(strategy, journal)?;
                vault.distribute(Some(caller), journal)
            }
            None => vault.harvest_and_distribute_all(Some(caller), journal),
        })
    }

    pub(super) fn harvest_and_distribute_all(
        &mut self,
        caller: Option<Address>,
        journal: &mut JournalCollection,
    ) -> ManagerResult<FeeSplit> {
        self.harvest_reward_strategies(journal);
        self.distribute(caller, journal)
    }

    /// Approved rows of the weight table with rewards enabled, in position order
    fn reward_strategies(&self) -> Vec<Address> {
        self.weights
            .entries()
            .iter()
            .filter(|entry| entry.enabled_reward && self.registry.is_approved(entry.strategy))
            .map(|entry| entry.strategy)
            .collect()
    }

    fn harvest_reward_strategies(&mut self, journal: &mut JournalCollection) {
        for strategy in self.reward_strategies() {
            if let Err(err) = self.harvest_strategy(strategy, journal) {
                journal.append_strategy_note(strategy, Err(err), LogType::Harvest, "Harvest failed");
            }
        }
    }

    fn harvest_strategy(&mut self, strategy: Address, journal: &mut JournalCollection) -> ManagerResult<()> {
        if !self.registry.is_approved(strategy) {
            return Err(ManagerError::StrategyNotApproved);
        }
        if let Some(entry) = self.weights.get(strategy) {
            if !entry.enabled_reward {
                journal.append_strategy_note(
                    strategy,
                    Ok(()),
                    LogType::Harvest,
                    "Rewards disabled, skipped",
                );
                return Ok(());
            }
        }

        let harvester = self.harvester.address();
        let transfers = self
            .registry
            .adapter_mut(strategy)?
            .collect_reward_tokens(harvester)?;
        self.credit(harvester, &transfers)?;

        for transfer in transfers {
            journal.append_strategy_note(
                strategy,
                Ok(()),
                LogType::Harvest,
                format!("Collected {} of {}", transfer.amount, transfer.token),
            );
            // An illiquid reward token must not block the others
            if let Err(err) = self.swap_reward(transfer.token) {
                journal.append_strategy_note(
                    strategy,
                    Err(err),
                    LogType::Harvest,
                    format!("Swap of {} failed", transfer.token),
                );
            }
        }
        Ok(())
    }

    /// Swaps the harvester's whole balance of `token` into the primary stable.
    /// Tokens without a swap-enabled config are held.
    fn swap_reward(&mut self, token: Address) -> ManagerResult<()> {
        let primary = self.settings.primary_stable;
        let enabled = self
            .harvester
            .reward_token_config(token)
            .map(|config| config.swap_enabled)
            .unwrap_or(false);
        if token == primary || !enabled {
            return Ok(());
        }
        let harvester = self.harvester.address();
        let balance = self.ledger.balance_of(token, harvester);
        if balance == U256::ZERO {
            return Ok(());
        }
        let swapper = self
            .swapper
            .as_mut()
            .ok_or_else(|| ManagerError::Custom("No swapper configured".to_string()))?;
        let out = swapper.swap(token, balance, primary, U256::ZERO)?;
        self.ledger.burn(token, harvester, balance)?;
        self.ledger.mint(primary, harvester, out)
    }

    fn harvested_split(&self, pay_caller: bool) -> ManagerResult<FeeSplit> {
        let harvested = self
            .ledger
            .balance_of(self.settings.primary_stable, self.harvester.address());
        self.harvester.split(harvested, pay_caller)
    }

    fn pay_fees(&mut self, split: &FeeSplit, journal: &mut JournalCollection) -> ManagerResult<()> {
        let primary = self.settings.primary_stable;
        let harvester = self.harvester.address();
        let labs = self.harvester.labs().address;
        let team = self.harvester.team().address;
        self.ledger.transfer(primary, harvester, labs, split.labs)?;
        self.ledger.transfer(primary, harvester, team, split.team)?;
        journal.append_note(
            Ok(()),
            LogType::Distribution,
            format!("Labs received {}, Team received {}", split.labs, split.team),
        );
        Ok(())
    }

    fn pay_proceeds(&mut self, journal: &mut JournalCollection) -> ManagerResult<U256> {
        let primary = self.settings.primary_stable;
        let harvester = self.harvester.address();
        let proceeds = self.ledger.balance_of(primary, harvester);
        self.ledger.transfer(
            primary,
            harvester,
            self.harvester.rewards_proceeds_address(),
            proceeds,
        )?;
        journal.append_note(
            Ok(()),
            LogType::Distribution,
            format!("Proceeds of {} sent", proceeds),
        );
        Ok(proceeds)
    }

    fn distribute(
        &mut self,
        caller: Option<Address>,
        journal: &mut JournalCollection,
    ) -> ManagerResult<FeeSplit> {
        let split = self.harvested_split(caller.is_some())?;
        if let Some(caller) = caller {
            let primary = self.settings.primary_stable;
            let harvester = self.harvester.address();
            self.ledger.transfer(primary, harvester, caller, split.caller)?;
        }
        self.pay_fees(&split, journal)?;
        self.pay_proceeds(journal)?;
        Ok(split)
    }

    pub fn dripper_available_funds(&self) -> U256 {
        let balance = self
            .ledger
            .balance_of(self.dripper.token(), self.dripper.address());
        self.dripper.available_funds(balance, self.timestamp)
    }

    /// Moves the dripped funds into the vault. Returns the amount collected.
    pub fn collect(&mut self) -> ManagerResult<U256> {
        self.journaled("collect", |vault, journal| vault.collect_dripper(journal))
    }

    pub fn collect_and_rebase(&mut self) -> ManagerResult<U256> {
        self.journaled("collect_and_rebase", |vault, journal| {
            vault.collect_dripper(journal)?;
            vault.rebase_supply(journal)
        })
    }

    /// Applies the new duration, then collects so the rate is reset over it right away.
    /// Funds already dripped at the old rate are released by that collect.
    pub fn set_drip_duration(&mut self, caller: Address, drip_duration: u64) -> ManagerResult<()> {
        self.journaled("set_drip_duration", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.dripper.set_drip_duration(drip_duration)?;
            vault.collect_dripper(journal)?;
            Ok(())
        })
    }

    /// Sends tokens held by the dripper to the governor.
    pub fn dripper_transfer_token(
        &mut self,
        caller: Address,
        token: Address,
        amount: U256,
    ) -> ManagerResult<()> {
        self.journaled("dripper_transfer_token", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            let governor = vault.access.governor();
            vault
                .ledger
                .transfer(token, vault.dripper.address(), governor, amount)
        })
    }

    pub(super) fn collect_dripper(&mut self, journal: &mut JournalCollection) -> ManagerResult<U256> {
        let token = self.dripper.token();
        let dripper = self.dripper.address();
        let balance = self.ledger.balance_of(token, dripper);
        let amount = self.dripper.collect(balance, self.timestamp)?;
        self.ledger
            .transfer(token, dripper, self.settings.vault, amount)?;
        journal.append_note(
            Ok(()),
            LogType::Distribution,
            format!("Dripper released {}", amount),
        );
        Ok(amount)
    }
}
