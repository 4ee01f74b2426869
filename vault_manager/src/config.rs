//! Vault configuration
//!
//! [`VaultConfig`] is the JSON facing shape, with addresses as strings and optional
//! fields falling back to the defaults in [`crate::constants`]. It is validated
//! into [`VaultSettings`] before a vault is built.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    types::ManagedAsset,
    utils::{
        common::string_to_address,
        error::{ManagerError, ManagerResult},
    },
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssetConfig {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VaultConfig {
    pub vault: String,
    pub harvester: String,
    pub dripper: String,
    pub governor: String,
    pub strategist: String,
    pub rebase_manager: String,
    pub primary_stable: String,
    pub assets: Vec<AssetConfig>,
    pub labs: String,
    pub team: String,
    pub treasury: String,
    #[serde(default = "default_mint_fee_bps")]
    pub mint_fee_bps: u16,
    #[serde(default = "default_redeem_fee_bps")]
    pub redeem_fee_bps: u16,
    #[serde(default = "default_labs_fee_bps")]
    pub labs_fee_bps: u16,
    #[serde(default = "default_team_fee_bps")]
    pub team_fee_bps: u16,
    #[serde(default)]
    pub caller_incentive_bps: u16,
    /// Seconds over which the dripper releases its balance
    pub drip_duration: u64,
    #[serde(default = "default_payout_interval")]
    pub payout_interval: u64,
    #[serde(default = "default_payout_time_range")]
    pub payout_time_range: u64,
    #[serde(default = "default_rebalance_tolerance")]
    pub rebalance_tolerance: u64,
}

fn default_mint_fee_bps() -> u16 {
    DEFAULT_MINT_FEE_BPS
}

fn default_redeem_fee_bps() -> u16 {
    DEFAULT_REDEEM_FEE_BPS
}

fn default_labs_fee_bps() -> u16 {
    DEFAULT_LABS_FEE_BPS
}

fn default_team_fee_bps() -> u16 {
    DEFAULT_TEAM_FEE_BPS
}

fn default_rebalance_tolerance() -> u64 {
    DEFAULT_REBALANCE_TOLERANCE
}

impl VaultConfig {
    pub fn from_json(json: &str) -> ManagerResult<Self> {
        serde_json::from_str(json).map_err(|err| ManagerError::DecodingError(err.to_string()))
    }
}

/// Typed and validated configuration
#[derive(Clone, Debug)]
pub struct VaultSettings {
    pub vault: Address,
    pub harvester: Address,
    pub dripper: Address,
    pub governor: Address,
    pub strategist: Address,
    pub rebase_manager: Address,
    pub primary_stable: Address,
    pub assets: Vec<ManagedAsset>,
    pub labs: Address,
    pub team: Address,
    pub treasury: Address,
    pub mint_fee_bps: u16,
    pub redeem_fee_bps: u16,
    pub labs_fee_bps: u16,
    pub team_fee_bps: u16,
    pub caller_incentive_bps: u16,
    pub drip_duration: u64,
    pub payout_interval: u64,
    pub payout_time_range: u64,
    /// Smallest rebalancing move, in primary stable units
    pub rebalance_tolerance: u64,
}

impl VaultSettings {
    pub fn primary_decimals(&self) -> u8 {
        self.assets
            .iter()
            .find(|asset| asset.address == self.primary_stable)
            .map(|asset| asset.decimals)
            .unwrap_or(CASH_DECIMALS)
    }
}

fn check_bps(name: &str, bps: u16) -> ManagerResult<()> {
    if bps > FEE_SCALE {
        return Err(ManagerError::InvariantViolation(format!(
            "{} cannot exceed {} bps",
            name, FEE_SCALE
        )));
    }
    Ok(())
}

impl TryFrom<VaultConfig> for VaultSettings {
    type Error = ManagerError;

    fn try_from(value: VaultConfig) -> Result<Self, Self::Error> {
        let assets = value
            .assets
            .iter()
            .map(|asset| {
                Ok(ManagedAsset {
                    address: string_to_address(&asset.address)?,
                    symbol: asset.symbol.clone(),
                    decimals: asset.decimals,
                    default_strategy: None,
                })
            })
            .collect::<ManagerResult<Vec<_>>>()?;

        let primary_stable = string_to_address(&value.primary_stable)?;
        if !assets.iter().any(|asset| asset.address == primary_stable) {
            return Err(ManagerError::Custom(
                "Primary stable must be one of the assets".to_string(),
            ));
        }
        for (index, asset) in assets.iter().enumerate() {
            if assets[..index].iter().any(|a| a.address == asset.address) {
                return Err(ManagerError::AssetAlreadySupported);
            }
        }

        check_bps("Mint fee", value.mint_fee_bps)?;
        check_bps("Redeem fee", value.redeem_fee_bps)?;
        check_bps(
            "Harvest fees",
            value
                .labs_fee_bps
                .saturating_add(value.team_fee_bps)
                .saturating_add(value.caller_incentive_bps),
        )?;
        if value.drip_duration == 0 || value.payout_interval == 0 {
            return Err(ManagerError::InvalidDuration);
        }

        Ok(Self {
            vault: string_to_address(&value.vault)?,
            harvester: string_to_address(&value.harvester)?,
            dripper: string_to_address(&value.dripper)?,
            governor: string_to_address(&value.governor)?,
            strategist: string_to_address(&value.strategist)?,
            rebase_manager: string_to_address(&value.rebase_manager)?,
            primary_stable,
            assets,
            labs: string_to_address(&value.labs)?,
            team: string_to_address(&value.team)?,
            treasury: string_to_address(&value.treasury)?,
            mint_fee_bps: value.mint_fee_bps,
            redeem_fee_bps: value.redeem_fee_bps,
            labs_fee_bps: value.labs_fee_bps,
            team_fee_bps: value.team_fee_bps,
            caller_incentive_bps: value.caller_incentive_bps,
            drip_duration: value.drip_duration,
            payout_interval: value.payout_interval,
            payout_time_range: value.payout_time_range,
            rebalance_tolerance: value.rebalance_tolerance,
        })
    }
}
