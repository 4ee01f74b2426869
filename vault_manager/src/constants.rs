//! Vault Manager's Constants

use alloy_primitives::U256;
use chrono::Duration;

/// Weight resolution. 100_000 represents 100%.
pub const MAX_WEIGHT: u32 = 100_000;

/// Fee resolution. 10_000 represents 100%.
pub const FEE_SCALE: u16 = 10_000;
pub fn fee_scale() -> U256 {
    U256::from(FEE_SCALE)
}

/// Scale used for fixed point arithmetic
pub const SCALE: u128 = 1_000_000_000_000_000_000; // e18
pub fn scale() -> U256 {
    U256::from(SCALE)
}

/// CASH token decimals
pub const CASH_DECIMALS: u8 = 18;

/// Default mint fee
pub const DEFAULT_MINT_FEE_BPS: u16 = 25; // 0.25%

/// Default redeem fee
pub const DEFAULT_REDEEM_FEE_BPS: u16 = 25; // 0.25%

/// Default share of harvested yield sent to Labs
pub const DEFAULT_LABS_FEE_BPS: u16 = 750; // 7.5%

/// Default share of harvested yield sent to the Team
pub const DEFAULT_TEAM_FEE_BPS: u16 = 250; // 2.5%

/// Maximum slippage tolerated when the vault swaps a deposit into the primary stable
pub const MAX_MINT_SWAP_SLIPPAGE_BPS: u16 = 50; // 0.5%

/// Default payout interval, denominated in seconds
pub fn default_payout_interval() -> u64 {
    Duration::hours(24).num_seconds() as u64
}

/// Default window before the payout time in which a payout is accepted, denominated in seconds
pub fn default_payout_time_range() -> u64 {
    Duration::minutes(15).num_seconds() as u64
}

/// Max number of journal entries kept by the vault
pub const MAX_JOURNAL_ENTRIES: usize = 300;

/// Default dust threshold for rebalancing moves, in primary stable units
pub const DEFAULT_REBALANCE_TOLERANCE: u64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_e18() {
        assert_eq!(SCALE, 10_u128.pow(18));
    }

    #[test]
    fn payout_timings() {
        assert_eq!(default_payout_interval(), 86_400);
        assert_eq!(default_payout_time_range(), 900);
    }

    #[test]
    fn default_fees_fit_in_scale() {
        assert!(DEFAULT_LABS_FEE_BPS + DEFAULT_TEAM_FEE_BPS <= FEE_SCALE);
    }
}
