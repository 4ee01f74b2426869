//! Harvester configuration and fee split
//!
//! Reward tokens are claimed into the harvester's own ledger account, swapped to
//! the primary stable when configured, then split between Labs, Team, the caller
//! and the rewards proceeds address (normally the dripper). The orchestration
//! lives on the vault, see `vault::harvest`.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::{
    constants::FEE_SCALE,
    utils::{
        common::portion,
        error::{ManagerError, ManagerResult},
    },
};

/// Receiver of a share of the harvested yield
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeCollector {
    pub address: Address,
    pub fee_bps: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewardTokenConfig {
    /// Swap the token into the primary stable once harvested
    pub swap_enabled: bool,
}

/// How a harvested amount is shared
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeSplit {
    pub labs: U256,
    pub team: U256,
    pub caller: U256,
    pub proceeds: U256,
}

#[derive(Clone, Debug)]
pub struct Harvester {
    address: Address,
    labs: FeeCollector,
    team: FeeCollector,
    caller_incentive_bps: u16,
    rewards_proceeds_address: Address,
    reward_tokens: HashMap<Address, RewardTokenConfig>,
}

impl Harvester {
    pub fn new(address: Address, rewards_proceeds_address: Address) -> Self {
        Self {
            address,
            labs: FeeCollector::default(),
            team: FeeCollector::default(),
            caller_incentive_bps: 0,
            rewards_proceeds_address,
            reward_tokens: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn labs(&self) -> FeeCollector {
        self.labs
    }

    pub fn team(&self) -> FeeCollector {
        self.team
    }

    pub fn caller_incentive_bps(&self) -> u16 {
        self.caller_incentive_bps
    }

    pub fn rewards_proceeds_address(&self) -> Address {
        self.rewards_proceeds_address
    }

    fn check_total(labs: u16, team: u16, caller: u16) -> ManagerResult<()> {
        if labs as u32 + team as u32 + caller as u32 > FEE_SCALE as u32 {
            return Err(ManagerError::InvariantViolation(format!(
                "Fees cannot exceed {} bps",
                FEE_SCALE
            )));
        }
        Ok(())
    }

    pub fn set_labs(&mut self, address: Address, fee_bps: u16) -> ManagerResult<()> {
        Self::check_total(fee_bps, self.team.fee_bps, self.caller_incentive_bps)?;
        self.labs = FeeCollector { address, fee_bps };
        Ok(())
    }

    pub fn set_team(&mut self, address: Address, fee_bps: u16) -> ManagerResult<()> {
        Self::check_total(self.labs.fee_bps, fee_bps, self.caller_incentive_bps)?;
        self.team = FeeCollector { address, fee_bps };
        Ok(())
    }

    pub fn set_caller_incentive_bps(&mut self, fee_bps: u16) -> ManagerResult<()> {
        Self::check_total(self.labs.fee_bps, self.team.fee_bps, fee_bps)?;
        self.caller_incentive_bps = fee_bps;
        Ok(())
    }

    pub fn set_rewards_proceeds_address(&mut self, address: Address) {
        self.rewards_proceeds_address = address;
    }

    pub fn set_reward_token_config(&mut self, token: Address, config: RewardTokenConfig) {
        self.reward_tokens.insert(token, config);
    }

    pub fn reward_token_config(&self, token: Address) -> Option<RewardTokenConfig> {
        self.reward_tokens.get(&token).copied()
    }

    /// Splits `amount`. The proceeds get whatever the fees leave, rounding included.
    pub fn split(&self, amount: U256, pay_caller: bool) -> ManagerResult<FeeSplit> {
        let scale = FEE_SCALE as u32;
        let labs = portion(amount, self.labs.fee_bps as u32, scale)?;
        let team = portion(amount, self.team.fee_bps as u32, scale)?;
        let caller = if pay_caller {
            portion(amount, self.caller_incentive_bps as u32, scale)?
        } else {
            U256::ZERO
        };
        let proceeds = amount.saturating_sub(labs + team + caller);
        Ok(FeeSplit {
            labs,
            team,
            caller,
            proceeds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harvester() -> Harvester {
        Harvester::new(Address::repeat_byte(0x4a), Address::repeat_byte(0xd1))
    }

    #[test]
    fn fees_cannot_exceed_the_scale() {
        let mut harvester = harvester();
        harvester.set_labs(Address::repeat_byte(0x1a), 6_000).unwrap();
        harvester.set_caller_incentive_bps(1_000).unwrap();

        let result = harvester.set_team(Address::repeat_byte(0x7e), 3_001);

        assert!(matches!(result, Err(ManagerError::InvariantViolation(_))));
        assert_eq!(harvester.team(), FeeCollector::default());
        harvester.set_team(Address::repeat_byte(0x7e), 3_000).unwrap();
    }

    #[test]
    fn split_sums_to_the_amount() {
        let mut harvester = harvester();
        harvester.set_labs(Address::repeat_byte(0x1a), 1_000).unwrap();
        harvester.set_team(Address::repeat_byte(0x7e), 1_000).unwrap();
        harvester.set_caller_incentive_bps(10).unwrap();

        let amount = U256::from(1_000_003u64);
        let split = harvester.split(amount, true).unwrap();

        assert_eq!(split.labs, U256::from(100_000u64));
        assert_eq!(split.team, U256::from(100_000u64));
        assert_eq!(split.caller, U256::from(1_000u64));
        assert_eq!(split.labs + split.team + split.caller + split.proceeds, amount);

        let without_caller = harvester.split(amount, false).unwrap();
        assert_eq!(without_caller.caller, U256::ZERO);
    }

    #[test]
    fn unknown_reward_tokens_have_no_config() {
        let mut harvester = harvester();
        let crv = Address::repeat_byte(0xcc);
        assert_eq!(harvester.reward_token_config(crv), None);

        harvester.set_reward_token_config(crv, RewardTokenConfig { swap_enabled: true });
        assert!(harvester.reward_token_config(crv).unwrap().swap_enabled);
    }
}
