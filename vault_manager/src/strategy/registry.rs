//! Registry of the strategy adapters known to the vault

use std::collections::HashMap;

use alloy_primitives::Address;

use crate::utils::error::{ManagerError, ManagerResult};

use super::StrategyAdapter;

struct RegisteredStrategy {
    adapter: Box<dyn StrategyAdapter>,
    approved: bool,
}

/// Adapters are never dropped from the registry, only unapproved.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<Address, RegisteredStrategy>,
    /// Registration order
    order: Vec<Address>,
}

impl StrategyRegistry {
    /// Registers an adapter without approving it.
    pub fn insert(&mut self, address: Address, adapter: Box<dyn StrategyAdapter>) -> ManagerResult<()> {
        if self.strategies.contains_key(&address) {
            return Err(ManagerError::Custom(format!(
                "Strategy {} already registered",
                address
            )));
        }
        self.strategies.insert(
            address,
            RegisteredStrategy {
                adapter,
                approved: false,
            },
        );
        self.order.push(address);
        Ok(())
    }

    pub fn approve(&mut self, address: Address) -> ManagerResult<()> {
        let strategy = self
            .strategies
            .get_mut(&address)
            .ok_or(ManagerError::NonExistentValue)?;
        if strategy.approved {
            return Err(ManagerError::StrategyAlreadyApproved);
        }
        strategy.approved = true;
        Ok(())
    }

    pub fn unapprove(&mut self, address: Address) -> ManagerResult<()> {
        match self.strategies.get_mut(&address) {
            Some(strategy) if strategy.approved => {
                strategy.approved = false;
                Ok(())
            }
            _ => Err(ManagerError::StrategyNotApproved),
        }
    }

    pub fn is_registered(&self, address: Address) -> bool {
        self.strategies.contains_key(&address)
    }

    pub fn is_approved(&self, address: Address) -> bool {
        self.strategies
            .get(&address)
            .map(|strategy| strategy.approved)
            .unwrap_or(false)
    }

    pub fn adapter(&self, address: Address) -> ManagerResult<&dyn StrategyAdapter> {
        self.strategies
            .get(&address)
            .map(|strategy| strategy.adapter.as_ref())
            .ok_or(ManagerError::NonExistentValue)
    }

    pub fn adapter_mut(&mut self, address: Address) -> ManagerResult<&mut (dyn StrategyAdapter + 'static)> {
        self.strategies
            .get_mut(&address)
            .map(|strategy| strategy.adapter.as_mut())
            .ok_or(ManagerError::NonExistentValue)
    }

    /// Every registered strategy, in registration order
    pub fn all_strategies(&self) -> &[Address] {
        &self.order
    }

    /// Approved strategies, in registration order
    pub fn approved_strategies(&self) -> Vec<Address> {
        self.order
            .iter()
            .copied()
            .filter(|address| self.is_approved(*address))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::MockStrategyAdapter;

    #[test]
    fn approval_lifecycle() {
        let address = Address::repeat_byte(0x01);
        let mut registry = StrategyRegistry::default();
        registry
            .insert(address, Box::new(MockStrategyAdapter::new()))
            .unwrap();
        assert!(!registry.is_approved(address));

        registry.approve(address).unwrap();
        assert_eq!(
            registry.approve(address),
            Err(ManagerError::StrategyAlreadyApproved)
        );

        registry.unapprove(address).unwrap();
        assert_eq!(
            registry.unapprove(address),
            Err(ManagerError::StrategyNotApproved)
        );
        assert!(registry.is_registered(address));
        assert_eq!(registry.all_strategies(), &[address]);
    }

    #[test]
    fn unknown_strategy_cannot_be_approved() {
        let mut registry = StrategyRegistry::default();
        assert_eq!(
            registry.approve(Address::repeat_byte(0x09)),
            Err(ManagerError::NonExistentValue)
        );
        assert!(registry.adapter(Address::repeat_byte(0x09)).is_err());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let address = Address::repeat_byte(0x01);
        let mut registry = StrategyRegistry::default();
        registry
            .insert(address, Box::new(MockStrategyAdapter::new()))
            .unwrap();
        assert!(registry
            .insert(address, Box::new(MockStrategyAdapter::new()))
            .is_err());
    }
}
