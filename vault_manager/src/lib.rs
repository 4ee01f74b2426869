//! Multi-strategy stablecoin vault manager
//!
//! The [`Vault`] holds stable assets on behalf of CASH holders, allocates them
//! over approved yield strategies by target weight, pays redemptions out of the
//! strategies and distributes harvested rewards through the [`Harvester`] and
//! the [`Dripper`].

pub mod access;
pub mod cash;
pub mod config;
pub mod constants;
pub mod dripper;
pub mod harvester;
pub mod journal;
pub mod ledger;
pub mod strategy;
pub mod swapper;
pub mod types;
pub mod utils;
pub mod vault;

pub use access::{AccessControl, Role};
pub use cash::{CashToken, RebasingToken};
pub use config::{VaultConfig, VaultSettings};
pub use dripper::Dripper;
pub use harvester::{FeeSplit, Harvester};
pub use strategy::{
    evm::{ContractTransport, EvmStrategy},
    simulated::SimulatedStrategy,
    weights::WeightEntry,
    StrategyAdapter, Transfer,
};
pub use swapper::{OracleSwapper, Swapper};
pub use utils::error::{ManagerError, ManagerResult};
pub use vault::Vault;
