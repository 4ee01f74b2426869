//! Role based access control
//!
//! Every mutating vault operation passes through [`AccessControl::only`].
//! The governor implicitly holds every role.

use std::fmt;

use alloy_primitives::Address;
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::utils::error::{ManagerError, ManagerResult};

/// Caller tiers recognised by the vault
#[derive(Clone, Copy, CandidType, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Role {
    Public,
    Strategist,
    Governor,
    RebaseManager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Public => write!(f, "Public"),
            Role::Strategist => write!(f, "Strategist"),
            Role::Governor => write!(f, "Governor"),
            Role::RebaseManager => write!(f, "Rebase Manager"),
        }
    }
}

/// Holders of the privileged roles
#[derive(Clone, Debug, Default)]
pub struct AccessControl {
    governor: Address,
    /// Set by `transfer_governance`, becomes governor on `claim_governance`
    pending_governor: Option<Address>,
    strategist: Address,
    rebase_manager: Address,
}

impl AccessControl {
    pub fn new(governor: Address, strategist: Address, rebase_manager: Address) -> Self {
        Self {
            governor,
            pending_governor: None,
            strategist,
            rebase_manager,
        }
    }

    pub fn governor(&self) -> Address {
        self.governor
    }

    pub fn strategist(&self) -> Address {
        self.strategist
    }

    pub fn rebase_manager(&self) -> Address {
        self.rebase_manager
    }

    /// Returns `true` if `caller` holds `role`.
    pub fn has_role(&self, caller: Address, role: Role) -> bool {
        if caller == self.governor {
            return true;
        }
        match role {
            Role::Public => true,
            Role::Governor => false,
            Role::Strategist => caller == self.strategist,
            Role::RebaseManager => caller == self.rebase_manager,
        }
    }

    /// Returns Err if the `caller` does not hold `role`
    pub fn only(&self, caller: Address, role: Role) -> ManagerResult<()> {
        if !self.has_role(caller, role) {
            return Err(ManagerError::Unauthorized(role));
        }
        Ok(())
    }

    /// First step of the two-step governance handover.
    pub fn transfer_governance(&mut self, caller: Address, new_governor: Address) -> ManagerResult<()> {
        self.only(caller, Role::Governor)?;
        self.pending_governor = Some(new_governor);
        Ok(())
    }

    /// Second step, called by the pending governor.
    pub fn claim_governance(&mut self, caller: Address) -> ManagerResult<()> {
        match self.pending_governor {
            Some(pending) if pending == caller => {
                self.governor = pending;
                self.pending_governor = None;
                Ok(())
            }
            _ => Err(ManagerError::Custom(
                "Only the pending Governor can complete the claim".to_string(),
            )),
        }
    }

    pub fn set_strategist(&mut self, caller: Address, strategist: Address) -> ManagerResult<()> {
        self.only(caller, Role::Governor)?;
        self.strategist = strategist;
        Ok(())
    }

    pub fn set_rebase_manager(&mut self, caller: Address, rebase_manager: Address) -> ManagerResult<()> {
        self.only(caller, Role::Governor)?;
        self.rebase_manager = rebase_manager;
        Ok(())
    }
}
