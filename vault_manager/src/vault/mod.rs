//! The vault context
//!
//! [`Vault`] owns every piece of state the engine touches: the ledger, the
//! strategy registry, the weight table, the CASH token and the journal. Public
//! operations take the caller explicitly and run to completion before the next
//! one starts, so there is no locking.
//!
//! The operations are spread over:
//! - `admin`: governance setters
//! - `allocation`: `allocate`, `quick_allocate` and `balance`
//! - `withdrawal`: strategy withdrawals and the cascading liquidity pull
//! - `core`: mint, redeem, rebase and payout
//! - `harvest`: reward harvesting, fee distribution and the dripper

mod admin;
mod allocation;
mod core;
mod harvest;
mod withdrawal;

use alloy_primitives::{Address, U256};

use crate::{
    access::AccessControl,
    cash::RebasingToken,
    config::VaultSettings,
    constants::MAX_JOURNAL_ENTRIES,
    dripper::Dripper,
    harvester::Harvester,
    journal::{Journal, JournalCollection, LogType},
    ledger::TokenLedger,
    strategy::{registry::StrategyRegistry, weights::WeightTable, weights::WeightEntry, Transfer},
    swapper::Swapper,
    types::{ManagedAsset, StrategyWithWeightQuery, VaultStatusQuery},
    utils::{
        common::{scale_decimals, u256_to_nat},
        error::{adapter_err, arithmetic_err, ManagerError, ManagerResult},
    },
};

pub struct Vault {
    settings: VaultSettings,
    access: AccessControl,
    assets: Vec<ManagedAsset>,
    ledger: TokenLedger,
    registry: StrategyRegistry,
    weights: WeightTable,
    /// Strategies tried in order by `quick_allocate`
    quick_deposit: Vec<Address>,
    cash: Box<dyn RebasingToken>,
    swapper: Option<Box<dyn Swapper>>,
    harvester: Harvester,
    dripper: Dripper,
    next_payout_time: u64,
    journal: Journal,
    capital_paused: bool,
    /// Block time in seconds
    timestamp: u64,
}

impl Vault {
    pub fn new(
        settings: VaultSettings,
        cash: Box<dyn RebasingToken>,
        timestamp: u64,
    ) -> ManagerResult<Self> {
        let mut harvester = Harvester::new(settings.harvester, settings.dripper);
        harvester.set_labs(settings.labs, settings.labs_fee_bps)?;
        harvester.set_team(settings.team, settings.team_fee_bps)?;
        harvester.set_caller_incentive_bps(settings.caller_incentive_bps)?;
        let dripper = Dripper::new(
            settings.dripper,
            settings.primary_stable,
            settings.drip_duration,
            timestamp,
        )?;
        let next_payout_time = timestamp
            .checked_add(settings.payout_interval)
            .ok_or_else(|| arithmetic_err("Payout time overflowed."))?;

        let mut journal = Journal::new(MAX_JOURNAL_ENTRIES);
        let mut collection = JournalCollection::open(timestamp);
        collection.append_note(
            Ok(()),
            LogType::Info,
            format!("Vault initialized with {} assets", settings.assets.len()),
        );
        journal.commit(collection);

        Ok(Self {
            access: AccessControl::new(
                settings.governor,
                settings.strategist,
                settings.rebase_manager,
            ),
            assets: settings.assets.clone(),
            ledger: TokenLedger::default(),
            registry: StrategyRegistry::default(),
            weights: WeightTable::default(),
            quick_deposit: vec![],
            cash,
            swapper: None,
            harvester,
            dripper,
            next_payout_time,
            journal,
            capital_paused: false,
            timestamp,
            settings,
        })
    }

    /// Runs `op` inside a journal collection and records its outcome.
    fn journaled<T, F>(&mut self, operation: &str, op: F) -> ManagerResult<T>
    where
        F: FnOnce(&mut Self, &mut JournalCollection) -> ManagerResult<T>,
    {
        let mut collection = JournalCollection::open(self.timestamp);
        let result = op(self, &mut collection);
        collection.append_note(
            result.as_ref().map(|_| ()).map_err(Clone::clone),
            LogType::ExecutionResult,
            operation,
        );
        self.journal.commit(collection);
        result
    }

    pub fn address(&self) -> Address {
        self.settings.vault
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Direct ledger access, used to fund accounts from outside the vault.
    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    pub fn cash(&self) -> &dyn RebasingToken {
        self.cash.as_ref()
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    pub fn dripper(&self) -> &Dripper {
        &self.dripper
    }

    pub fn capital_paused(&self) -> bool {
        self.capital_paused
    }

    pub fn next_payout_time(&self) -> u64 {
        self.next_payout_time
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    fn ensure_capital_not_paused(&self) -> ManagerResult<()> {
        if self.capital_paused {
            return Err(ManagerError::CapitalPaused);
        }
        Ok(())
    }

    fn managed_asset(&self, asset: Address) -> ManagerResult<&ManagedAsset> {
        self.assets
            .iter()
            .find(|managed| managed.address == asset)
            .ok_or(ManagerError::AssetNotSupported)
    }

    fn primary_decimals(&self) -> u8 {
        self.settings.primary_decimals()
    }

    /// Converts a native amount of `asset` into primary stable units. Stables are valued at peg.
    fn to_primary(&self, asset: &ManagedAsset, amount: U256) -> ManagerResult<U256> {
        scale_decimals(amount, asset.decimals, self.primary_decimals())
    }

    fn from_primary(&self, asset: &ManagedAsset, amount: U256) -> ManagerResult<U256> {
        scale_decimals(amount, self.primary_decimals(), asset.decimals)
    }

    /// Credits the ledger with tokens paid out by a strategy.
    fn credit(&mut self, recipient: Address, transfers: &[Transfer]) -> ManagerResult<()> {
        for transfer in transfers {
            self.ledger.mint(transfer.token, recipient, transfer.amount)?;
        }
        Ok(())
    }

    /// Asset `strategy` is withdrawn in: the primary stable when it accepts it,
    /// otherwise the first managed asset it accepts.
    fn withdrawal_asset(&self, strategy: Address) -> ManagerResult<ManagedAsset> {
        let adapter = self.registry.adapter(strategy)?;
        let primary = self.settings.primary_stable;
        self.assets
            .iter()
            .filter(|asset| adapter.supports_asset(asset.address))
            .min_by_key(|asset| asset.address != primary)
            .cloned()
            .ok_or_else(|| adapter_err(strategy, "Strategy accepts none of the managed assets"))
    }

    pub fn is_supported_asset(&self, asset: Address) -> bool {
        self.managed_asset(asset).is_ok()
    }

    pub fn get_all_assets(&self) -> Vec<Address> {
        self.assets.iter().map(|asset| asset.address).collect()
    }

    pub fn get_asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn get_all_strategies(&self) -> Vec<Address> {
        self.registry.all_strategies().to_vec()
    }

    /// Approved and present in the weight table
    pub fn is_strategy_supported(&self, strategy: Address) -> bool {
        self.registry.is_approved(strategy) && self.weights.contains(strategy)
    }

    pub fn is_strategy_approved(&self, strategy: Address) -> bool {
        self.registry.is_approved(strategy)
    }

    pub fn get_all_strategy_with_weights(&self) -> Vec<WeightEntry> {
        self.weights.entries().to_vec()
    }

    pub fn strategy_with_weight_positions(&self, strategy: Address) -> ManagerResult<u32> {
        self.weights
            .position(strategy)
            .map(|position| position as u32)
            .ok_or(ManagerError::NonExistentValue)
    }

    /// `checkBalance()` of a strategy, in primary stable units
    pub fn strategy_balance(&self, strategy: Address) -> ManagerResult<U256> {
        self.registry.adapter(strategy)?.check_balance()
    }

    /// Native balance of `asset` held idle by the vault
    pub fn idle_balance(&self, asset: Address) -> U256 {
        self.ledger.balance_of(asset, self.settings.vault)
    }

    /// Holdings backing `asset`: idle funds plus the strategies accepting it, in native units
    pub fn check_balance(&self, asset: Address) -> ManagerResult<U256> {
        let managed = self.managed_asset(asset)?;
        let mut deployed = U256::ZERO;
        for strategy in self.registry.all_strategies() {
            let adapter = self.registry.adapter(*strategy)?;
            if adapter.supports_asset(asset) {
                deployed = deployed.saturating_add(adapter.check_balance()?);
            }
        }
        Ok(self
            .idle_balance(asset)
            .saturating_add(self.from_primary(managed, deployed)?))
    }

    /// Idle funds plus every strategy balance, in primary stable units.
    ///
    /// A strategy whose balance cannot be read is valued at zero, so the total is a
    /// lower bound while an adapter is failing. `rebase` journals such strategies, and
    /// `allocate` and `balance` journal them and leave them out.
    pub fn total_value(&self) -> ManagerResult<U256> {
        let mut total = U256::ZERO;
        for asset in self.assets.iter() {
            total = total
                .checked_add(self.to_primary(asset, self.idle_balance(asset.address))?)
                .ok_or_else(|| arithmetic_err("Total value overflowed."))?;
        }
        for strategy in self.registry.all_strategies() {
            if let Ok(balance) = self.strategy_balance(*strategy) {
                total = total
                    .checked_add(balance)
                    .ok_or_else(|| arithmetic_err("Total value overflowed."))?;
            }
        }
        Ok(total)
    }

    /// Weight rows with their current balance. An unreadable balance is reported as zero.
    pub fn strategy_with_weights_query(&self) -> Vec<StrategyWithWeightQuery> {
        self.weights
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| StrategyWithWeightQuery {
                strategy: entry.strategy.to_string(),
                position: position as u32,
                min_weight: entry.min_weight,
                target_weight: entry.target_weight,
                max_weight: entry.max_weight,
                enabled: entry.enabled,
                enabled_reward: entry.enabled_reward,
                balance: u256_to_nat(&self.strategy_balance(entry.strategy).unwrap_or(U256::ZERO)),
            })
            .collect()
    }

    pub fn status(&self) -> ManagerResult<VaultStatusQuery> {
        Ok(VaultStatusQuery {
            total_value: u256_to_nat(&self.total_value()?),
            cash_supply: u256_to_nat(&self.cash.total_supply()),
            capital_paused: self.capital_paused,
            strategies: self.registry.all_strategies().len() as u32,
            next_payout_time: self.next_payout_time,
        })
    }
}
