//! Governance setters of the vault

use alloy_primitives::{Address, U256};

use crate::{
    access::Role,
    constants::FEE_SCALE,
    harvester::RewardTokenConfig,
    journal::LogType,
    strategy::{weights::WeightEntry, weights::WeightTable, StrategyAdapter},
    swapper::Swapper,
    types::{ManagedAsset, StrategyWithWeightInput},
    utils::error::{ManagerError, ManagerResult},
};

use super::Vault;

fn check_fee(bps: u16) -> ManagerResult<()> {
    if bps > FEE_SCALE {
        return Err(ManagerError::InvariantViolation(format!(
            "Fee cannot exceed {} bps",
            FEE_SCALE
        )));
    }
    Ok(())
}

impl Vault {
    pub fn support_asset(
        &mut self,
        caller: Address,
        asset: Address,
        symbol: &str,
        decimals: u8,
    ) -> ManagerResult<()> {
        self.journaled("support_asset", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            if vault.is_supported_asset(asset) {
                return Err(ManagerError::AssetAlreadySupported);
            }
            vault.assets.push(ManagedAsset {
                address: asset,
                symbol: symbol.to_string(),
                decimals,
                default_strategy: None,
            });
            journal.append_note(Ok(()), LogType::Governance, format!("{} supported", symbol));
            Ok(())
        })
    }

    /// Makes an adapter known to the vault. It has to be approved before it can be weighted.
    pub fn register_strategy(
        &mut self,
        caller: Address,
        strategy: Address,
        adapter: Box<dyn StrategyAdapter>,
    ) -> ManagerResult<()> {
        self.journaled("register_strategy", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            let kind = adapter.kind();
            vault.registry.insert(strategy, adapter)?;
            journal.append_strategy_note(
                strategy,
                Ok(()),
                LogType::Governance,
                format!("{} strategy registered", kind),
            );
            Ok(())
        })
    }

    pub fn approve_strategy(&mut self, caller: Address, strategy: Address) -> ManagerResult<()> {
        self.journaled("approve_strategy", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            vault.registry.approve(strategy)?;
            journal.append_strategy_note(strategy, Ok(()), LogType::Governance, "Approved");
            Ok(())
        })
    }

    /// Pulls everything out of `strategy`, unapproves it and compacts the weight table.
    pub fn remove_strategy(&mut self, caller: Address, strategy: Address) -> ManagerResult<()> {
        self.journaled("remove_strategy", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;
            if !vault.registry.is_approved(strategy) {
                return Err(ManagerError::StrategyNotApproved);
            }
            vault.drain_strategy(strategy, journal)?;
            vault.registry.unapprove(strategy)?;
            vault.weights.remove(strategy);
            vault.quick_deposit.retain(|quick| *quick != strategy);
            for asset in vault.assets.iter_mut() {
                if asset.default_strategy == Some(strategy) {
                    asset.default_strategy = None;
                }
            }
            journal.append_strategy_note(strategy, Ok(()), LogType::Governance, "Removed");
            Ok(())
        })
    }

    /// Replaces the weight table.
    ///
    /// Rows of strategies that are not approved are skipped one by one. What is left
    /// must hold `min <= target <= max`, unique strategies and enabled targets
    /// summing to `MAX_WEIGHT`, otherwise nothing changes.
    pub fn set_strategy_with_weights(
        &mut self,
        caller: Address,
        entries: Vec<WeightEntry>,
    ) -> ManagerResult<()> {
        self.journaled("set_strategy_with_weights", |vault, journal| {
            vault.access.only(caller, Role::Governor)?;

            let (approved, skipped): (Vec<WeightEntry>, Vec<WeightEntry>) = entries
                .into_iter()
                .partition(|entry| vault.registry.is_approved(entry.strategy));
            for entry in skipped {
                journal.append_strategy_note(
                    entry.strategy,
                    Err(ManagerError::StrategyNotApproved),
                    LogType::Governance,
                    "Weight row skipped",
                );
            }

            WeightTable::validate(&approved)?;
            let dropped = vault.weights.replace(approved)?;
            for strategy in dropped {
                journal.append_strategy_note(
                    strategy,
                    Ok(()),
                    LogType::Governance,
                    "No longer supported",
                );
            }
            Ok(())
        })
    }

    /// Candid facing variant of [`Vault::set_strategy_with_weights`]
    pub fn set_strategy_with_weights_input(
        &mut self,
        caller: Address,
        inputs: Vec<StrategyWithWeightInput>,
    ) -> ManagerResult<()> {
        let entries = inputs
            .into_iter()
            .map(WeightEntry::try_from)
            .collect::<ManagerResult<Vec<_>>>()?;
        self.set_strategy_with_weights(caller, entries)
    }

    /// `None` clears the default strategy of `asset`.
    pub fn set_asset_default_strategy(
        &mut self,
        caller: Address,
        asset: Address,
        strategy: Option<Address>,
    ) -> ManagerResult<()> {
        self.journaled("set_asset_default_strategy", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.managed_asset(asset)?;
            if let Some(strategy) = strategy {
                if !vault.registry.is_approved(strategy) {
                    return Err(ManagerError::StrategyNotApproved);
                }
                if !vault.registry.adapter(strategy)?.supports_asset(asset) {
                    return Err(ManagerError::Custom(
                        "Asset not supported by Strategy".to_string(),
                    ));
                }
            }
            if let Some(managed) = vault.assets.iter_mut().find(|a| a.address == asset) {
                managed.default_strategy = strategy;
            }
            Ok(())
        })
    }

    pub fn set_quick_deposit_strategies(
        &mut self,
        caller: Address,
        strategies: Vec<Address>,
    ) -> ManagerResult<()> {
        self.journaled("set_quick_deposit_strategies", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            if strategies
                .iter()
                .any(|strategy| !vault.registry.is_approved(*strategy))
            {
                return Err(ManagerError::StrategyNotApproved);
            }
            vault.quick_deposit = strategies;
            Ok(())
        })
    }

    pub fn quick_deposit_strategies(&self) -> &[Address] {
        &self.quick_deposit
    }

    pub fn set_swapper(
        &mut self,
        caller: Address,
        swapper: Option<Box<dyn Swapper>>,
    ) -> ManagerResult<()> {
        self.journaled("set_swapper", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.swapper = swapper;
            Ok(())
        })
    }

    pub fn set_mint_fee_bps(&mut self, caller: Address, bps: u16) -> ManagerResult<()> {
        self.journaled("set_mint_fee_bps", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            check_fee(bps)?;
            vault.settings.mint_fee_bps = bps;
            Ok(())
        })
    }

    pub fn set_redeem_fee_bps(&mut self, caller: Address, bps: u16) -> ManagerResult<()> {
        self.journaled("set_redeem_fee_bps", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            check_fee(bps)?;
            vault.settings.redeem_fee_bps = bps;
            Ok(())
        })
    }

    /// Replaces the Labs, Team and treasury addresses. The harvest fee shares stay as they are.
    pub fn set_fee_params(
        &mut self,
        caller: Address,
        labs: Address,
        team: Address,
        treasury: Address,
    ) -> ManagerResult<()> {
        self.journaled("set_fee_params", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            let labs_bps = vault.harvester.labs().fee_bps;
            let team_bps = vault.harvester.team().fee_bps;
            vault.harvester.set_labs(labs, labs_bps)?;
            vault.harvester.set_team(team, team_bps)?;
            vault.settings.labs = labs;
            vault.settings.team = team;
            vault.settings.treasury = treasury;
            Ok(())
        })
    }

    pub fn pause_capital(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("pause_capital", |vault, _| {
            vault.access.only(caller, Role::Strategist)?;
            vault.capital_paused = true;
            Ok(())
        })
    }

    pub fn unpause_capital(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("unpause_capital", |vault, _| {
            vault.access.only(caller, Role::Strategist)?;
            vault.capital_paused = false;
            Ok(())
        })
    }

    /// Sends tokens the vault does not manage to the governor.
    pub fn transfer_token(&mut self, caller: Address, token: Address, amount: U256) -> ManagerResult<()> {
        self.journaled("transfer_token", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            if vault.is_supported_asset(token) {
                return Err(ManagerError::OnlyUnsupportedAssets);
            }
            let governor = vault.access.governor();
            vault
                .ledger
                .transfer(token, vault.settings.vault, governor, amount)
        })
    }

    pub fn set_next_payout_time(&mut self, caller: Address, next_payout_time: u64) -> ManagerResult<()> {
        self.journaled("set_next_payout_time", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.next_payout_time = next_payout_time;
            Ok(())
        })
    }

    pub fn set_payout_intervals(
        &mut self,
        caller: Address,
        payout_interval: u64,
        payout_time_range: u64,
    ) -> ManagerResult<()> {
        self.journaled("set_payout_intervals", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            if payout_interval == 0 {
                return Err(ManagerError::InvalidDuration);
            }
            if payout_time_range > payout_interval {
                return Err(ManagerError::Custom(
                    "Time range must be shorter than the interval".to_string(),
                ));
            }
            vault.settings.payout_interval = payout_interval;
            vault.settings.payout_time_range = payout_time_range;
            Ok(())
        })
    }

    pub fn set_labs(&mut self, caller: Address, labs: Address, fee_bps: u16) -> ManagerResult<()> {
        self.journaled("set_labs", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvester.set_labs(labs, fee_bps)?;
            vault.settings.labs = labs;
            vault.settings.labs_fee_bps = fee_bps;
            Ok(())
        })
    }

    pub fn set_team(&mut self, caller: Address, team: Address, fee_bps: u16) -> ManagerResult<()> {
        self.journaled("set_team", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvester.set_team(team, fee_bps)?;
            vault.settings.team = team;
            vault.settings.team_fee_bps = fee_bps;
            Ok(())
        })
    }

    pub fn set_caller_incentive_bps(&mut self, caller: Address, fee_bps: u16) -> ManagerResult<()> {
        self.journaled("set_caller_incentive_bps", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvester.set_caller_incentive_bps(fee_bps)
        })
    }

    pub fn set_rewards_proceeds_address(&mut self, caller: Address, proceeds: Address) -> ManagerResult<()> {
        self.journaled("set_rewards_proceeds_address", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault.harvester.set_rewards_proceeds_address(proceeds);
            Ok(())
        })
    }

    pub fn set_reward_token_config(
        &mut self,
        caller: Address,
        token: Address,
        swap_enabled: bool,
    ) -> ManagerResult<()> {
        self.journaled("set_reward_token_config", |vault, _| {
            vault.access.only(caller, Role::Governor)?;
            vault
                .harvester
                .set_reward_token_config(token, RewardTokenConfig { swap_enabled });
            Ok(())
        })
    }

    pub fn transfer_governance(&mut self, caller: Address, new_governor: Address) -> ManagerResult<()> {
        self.journaled("transfer_governance", |vault, _| {
            vault.access.transfer_governance(caller, new_governor)
        })
    }

    pub fn claim_governance(&mut self, caller: Address) -> ManagerResult<()> {
        self.journaled("claim_governance", |vault, _| vault.access.claim_governance(caller))
    }

    pub fn set_strategist(&mut self, caller: Address, strategist: Address) -> ManagerResult<()> {
        self.journaled("set_strategist", |vault, _| {
            vault.access.set_strategist(caller, strategist)
        })
    }

    pub fn set_rebase_manager(&mut self, caller: Address, rebase_manager: Address) -> ManagerResult<()> {
        self.journaled("set_rebase_manager", |vault, _| {
            vault.access.set_rebase_manager(caller, rebase_manager)
        })
    }
}
