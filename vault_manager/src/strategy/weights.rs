//! Weight table of the vault
//!
//! Ordered rows of `{strategy, min, target, max, enabled, enabled_reward}`. The
//! table is only ever replaced wholesale after a validation pass, or compacted
//! when a strategy is removed.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;

use crate::{
    constants::MAX_WEIGHT,
    utils::error::{ManagerError, ManagerResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightEntry {
    pub strategy: Address,
    pub min_weight: u32,
    pub target_weight: u32,
    pub max_weight: u32,
    pub enabled: bool,
    pub enabled_reward: bool,
}

impl WeightEntry {
    pub fn new(strategy: Address, min_weight: u32, target_weight: u32, max_weight: u32) -> Self {
        Self {
            strategy,
            min_weight,
            target_weight,
            max_weight,
            enabled: true,
            enabled_reward: true,
        }
    }

    /// Sets the `enabled` flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the `enabled_reward` flag.
    pub fn enabled_reward(mut self, enabled_reward: bool) -> Self {
        self.enabled_reward = enabled_reward;
        self
    }

    /// Target weight the allocation engine aims for. Disabled rows aim for nothing.
    pub fn effective_target(&self) -> u32 {
        if self.enabled {
            self.target_weight
        } else {
            0
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WeightTable {
    entries: Vec<WeightEntry>,
    /// strategy => index in `entries`
    positions: HashMap<Address, usize>,
}

impl WeightTable {
    /// Checks a candidate batch without touching the table.
    pub fn validate(entries: &[WeightEntry]) -> ManagerResult<()> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut total: u64 = 0;

        for entry in entries {
            if !seen.insert(entry.strategy) {
                return Err(ManagerError::InvariantViolation(format!(
                    "Duplicate strategy {}",
                    entry.strategy
                )));
            }
            if entry.min_weight > entry.target_weight
                || entry.target_weight > entry.max_weight
                || entry.max_weight > MAX_WEIGHT
            {
                return Err(ManagerError::InvariantViolation(format!(
                    "Weights of {} must satisfy min <= target <= max <= {}",
                    entry.strategy, MAX_WEIGHT
                )));
            }
            if entry.enabled {
                total += entry.target_weight as u64;
            }
        }

        if total != MAX_WEIGHT as u64 {
            return Err(ManagerError::InvariantViolation(format!(
                "Total target weight must be {}, got {}",
                MAX_WEIGHT, total
            )));
        }
        Ok(())
    }

    /// Validates and installs `entries` in their input order.
    /// Returns the strategies that were present before and are not anymore.
    pub fn replace(&mut self, entries: Vec<WeightEntry>) -> ManagerResult<Vec<Address>> {
        Self::validate(&entries)?;

        let positions: HashMap<Address, usize> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.strategy, index))
            .collect();
        let dropped = self
            .entries
            .iter()
            .map(|entry| entry.strategy)
            .filter(|strategy| !positions.contains_key(strategy))
            .collect();

        self.entries = entries;
        self.positions = positions;
        Ok(dropped)
    }

    /// Removes the row of `strategy` by moving the last row into its slot.
    pub fn remove(&mut self, strategy: Address) -> Option<WeightEntry> {
        let index = self.positions.remove(&strategy)?;
        let removed = self.entries.swap_remove(index);
        if let Some(moved) = self.entries.get(index) {
            self.positions.insert(moved.strategy, index);
        }
        Some(removed)
    }

    pub fn position(&self, strategy: Address) -> Option<usize> {
        self.positions.get(&strategy).copied()
    }

    pub fn get(&self, strategy: Address) -> Option<&WeightEntry> {
        self.position(strategy).map(|index| &self.entries[index])
    }

    pub fn contains(&self, strategy: Address) -> bool {
        self.positions.contains_key(&strategy)
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_target_weight(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.effective_target() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strategy(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn assert_positions(table: &WeightTable) {
        for (index, entry) in table.entries().iter().enumerate() {
            assert_eq!(table.position(entry.strategy), Some(index));
        }
        assert_eq!(table.positions.len(), table.len());
    }

    #[test]
    fn replace_drops_omitted_strategies() {
        let mut table = WeightTable::default();
        table
            .replace(vec![
                WeightEntry::new(strategy(1), 0, 50_000, 100_000),
                WeightEntry::new(strategy(2), 0, 50_000, 100_000),
            ])
            .unwrap();

        let dropped = table
            .replace(vec![
                WeightEntry::new(strategy(2), 0, 60_000, 100_000),
                WeightEntry::new(strategy(3), 0, 40_000, 100_000),
            ])
            .unwrap();

        assert_eq!(dropped, vec![strategy(1)]);
        assert_eq!(table.position(strategy(2)), Some(0));
        assert_eq!(table.position(strategy(3)), Some(1));
        assert!(!table.contains(strategy(1)));
    }

    #[test]
    fn invalid_batch_leaves_table_untouched() {
        let mut table = WeightTable::default();
        table
            .replace(vec![WeightEntry::new(strategy(1), 0, 100_000, 100_000)])
            .unwrap();

        let bounds = table.replace(vec![WeightEntry::new(strategy(2), 0, 100_000, 90_000)]);
        let duplicate = table.replace(vec![
            WeightEntry::new(strategy(2), 0, 50_000, 100_000),
            WeightEntry::new(strategy(2), 0, 50_000, 100_000),
        ]);
        let sum = table.replace(vec![WeightEntry::new(strategy(2), 0, 99_999, 100_000)]);

        for result in [bounds, duplicate, sum] {
            assert!(matches!(result, Err(ManagerError::InvariantViolation(_))));
        }
        assert_eq!(table.entries(), &[WeightEntry::new(strategy(1), 0, 100_000, 100_000)]);
    }

    #[test]
    fn disabled_rows_do_not_count_towards_the_sum() {
        let entries = vec![
            WeightEntry::new(strategy(1), 0, 100_000, 100_000),
            WeightEntry::new(strategy(2), 0, 30_000, 100_000).enabled(false),
        ];
        assert!(WeightTable::validate(&entries).is_ok());
    }

    #[test]
    fn remove_moves_last_row_into_the_gap() {
        let mut table = WeightTable::default();
        table
            .replace(vec![
                WeightEntry::new(strategy(1), 0, 25_000, 100_000),
                WeightEntry::new(strategy(2), 0, 25_000, 100_000),
                WeightEntry::new(strategy(3), 0, 25_000, 100_000),
                WeightEntry::new(strategy(4), 0, 25_000, 100_000),
            ])
            .unwrap();

        let removed = table.remove(strategy(2)).unwrap();

        assert_eq!(removed.strategy, strategy(2));
        assert_eq!(table.position(strategy(4)), Some(1));
        assert_positions(&table);
        assert!(table.remove(strategy(2)).is_none());

        table.remove(strategy(3)).unwrap();
        assert_positions(&table);
        assert_eq!(table.len(), 2);
    }

    fn weights_summing_to_max() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(1u32..1_000, 1..12).prop_map(|raw| {
            let total: u32 = raw.iter().sum();
            let mut weights: Vec<u32> = raw.iter().map(|w| w * MAX_WEIGHT / total).collect();
            let assigned: u32 = weights.iter().sum();
            weights[0] += MAX_WEIGHT - assigned;
            weights
        })
    }

    proptest! {
        #[test]
        fn valid_sums_are_accepted(weights in weights_summing_to_max()) {
            let entries: Vec<WeightEntry> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| WeightEntry::new(strategy(i as u8 + 1), 0, *w, MAX_WEIGHT))
                .collect();
            prop_assert!(WeightTable::validate(&entries).is_ok());
        }

        #[test]
        fn other_sums_are_rejected(weights in prop::collection::vec(0u32..50_000, 1..8)) {
            let total: u32 = weights.iter().sum();
            prop_assume!(total != MAX_WEIGHT);
            let entries: Vec<WeightEntry> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| WeightEntry::new(strategy(i as u8 + 1), 0, *w, MAX_WEIGHT))
                .collect();
            prop_assert!(WeightTable::validate(&entries).is_err());
        }

        #[test]
        fn positions_survive_removals(removals in prop::collection::vec(1u8..=10, 0..10)) {
            let mut table = WeightTable::default();
            table
                .replace(
                    (1..=10u8)
                        .map(|n| WeightEntry::new(strategy(n), 0, 10_000, MAX_WEIGHT))
                        .collect(),
                )
                .unwrap();
            for n in removals {
                table.remove(strategy(n));
                for (index, entry) in table.entries().iter().enumerate() {
                    prop_assert_eq!(table.position(entry.strategy), Some(index));
                }
            }
        }
    }
}
