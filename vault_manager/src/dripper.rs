//! Dripper
//!
//! Releases its balance to the vault linearly. The rate is fixed at each collect
//! to `remaining / drip_duration`, so funds arriving between two collects do not
//! speed up the current drip.

use alloy_primitives::{Address, U256};

use crate::utils::error::{arithmetic_err, ManagerError, ManagerResult};

#[derive(Clone, Debug)]
pub struct Dripper {
    address: Address,
    /// Token being dripped
    token: Address,
    /// Seconds over which the balance is released
    drip_duration: u64,
    /// Token units released per second
    per_second: U256,
    /// Timestamp of the last collect
    last_collect: u64,
}

impl Dripper {
    pub fn new(address: Address, token: Address, drip_duration: u64, now: u64) -> ManagerResult<Self> {
        if drip_duration == 0 {
            return Err(ManagerError::InvalidDuration);
        }
        Ok(Self {
            address,
            token,
            drip_duration,
            per_second: U256::ZERO,
            last_collect: now,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn drip_duration(&self) -> u64 {
        self.drip_duration
    }

    pub fn per_second(&self) -> U256 {
        self.per_second
    }

    pub fn last_collect(&self) -> u64 {
        self.last_collect
    }

    /// Amount that can be collected at `now` out of `balance`
    pub fn available_funds(&self, balance: U256, now: u64) -> U256 {
        let elapsed = U256::from(now.saturating_sub(self.last_collect));
        self.per_second.saturating_mul(elapsed).min(balance)
    }

    /// Computes the collectable amount and resets the drip rate on what remains.
    /// The caller moves the returned amount to the vault.
    pub fn collect(&mut self, balance: U256, now: u64) -> ManagerResult<U256> {
        let amount = self.available_funds(balance, now);
        let remaining = balance - amount;
        self.per_second = remaining
            .checked_div(U256::from(self.drip_duration))
            .ok_or_else(|| arithmetic_err("Drip duration was zero."))?;
        self.last_collect = now;
        Ok(amount)
    }

    pub fn set_drip_duration(&mut self, drip_duration: u64) -> ManagerResult<()> {
        if drip_duration == 0 {
            return Err(ManagerError::InvalidDuration);
        }
        self.drip_duration = drip_duration;
        Ok(())
    }
}
