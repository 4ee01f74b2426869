use alloy_primitives::{Address, U256};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Role;

/// Vault Manager Result
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Vault Manager Errors
#[derive(Clone, CandidType, Debug, Deserialize, Error, PartialEq, Serialize)]
pub enum ManagerError {
    /// The caller does not hold the required role
    #[error("Caller is not the {0}")]
    Unauthorized(Role),
    /// A weight table or fee invariant would be broken
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// A strategy or the vault cannot supply the requested amount
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: String, available: String },
    /// The underlying strategy adapter failed
    #[error("Strategy adapter failure: {0}")]
    Adapter(String),
    /// Strategy is not approved on the vault
    #[error("Strategy not approved")]
    StrategyNotApproved,
    /// Strategy is already approved on the vault
    #[error("Strategy already approved")]
    StrategyAlreadyApproved,
    /// Asset is not managed by the vault
    #[error("Asset is not supported")]
    AssetNotSupported,
    /// Asset is already managed by the vault
    #[error("Asset already supported")]
    AssetAlreadySupported,
    /// Only tokens the vault does not manage can be rescued
    #[error("Only unsupported assets")]
    OnlyUnsupportedAssets,
    /// Capital movements are paused
    #[error("Capital paused")]
    CapitalPaused,
    #[error("Mint amount lower than minimum")]
    MintBelowMinimum,
    #[error("Redeem amount lower than minimum")]
    RedeemBelowMinimum,
    #[error("Amount must be greater than 0")]
    ZeroAmount,
    #[error("duration must be non-zero")]
    InvalidDuration,
    /// A requested value does not exist
    #[error("Requested value does not exist")]
    NonExistentValue,
    /// Decoding issue
    #[error("Decoding error: {0}")]
    DecodingError(String),
    /// Arithmetic error
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
    /// Unknown/Custom error
    #[error("{0}")]
    Custom(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> ManagerError {
    ManagerError::Arithmetic(format!("{:#?}", s.as_ref()))
}

pub fn insufficient_liquidity(requested: U256, available: U256) -> ManagerError {
    ManagerError::InsufficientLiquidity {
        requested: requested.to_string(),
        available: available.to_string(),
    }
}

pub fn adapter_err<S: AsRef<str>>(strategy: Address, s: S) -> ManagerError {
    ManagerError::Adapter(format!("{}: {}", strategy, s.as_ref()))
}
