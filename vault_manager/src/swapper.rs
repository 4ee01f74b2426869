//! Swapper boundary
//!
//! Used to turn non-primary deposits and harvested reward tokens into the
//! primary stable. The vault applies the resulting balance changes to its own
//! ledger.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::{
    constants::{scale, CASH_DECIMALS},
    utils::{
        common::{mul_div, scale_decimals},
        error::{ManagerError, ManagerResult},
    },
};

#[cfg_attr(test, mockall::automock)]
pub trait Swapper {
    /// Swaps `amount_in` of `token_in` and returns the amount of `token_out` received.
    /// Fails when the output is lower than `min_amount_out`.
    fn swap(
        &mut self,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
        min_amount_out: U256,
    ) -> ManagerResult<U256>;
}

/// Token metadata known to the [`OracleSwapper`]
#[derive(Clone, Debug)]
struct PricedToken {
    decimals: u8,
    /// USD price scaled by 1e18
    price: U256,
}

/// Swaps at fixed oracle prices. Tokens without a price have no route.
#[derive(Clone, Debug, Default)]
pub struct OracleSwapper {
    tokens: HashMap<Address, PricedToken>,
}

impl OracleSwapper {
    /// Sets the USD price (scaled by 1e18) of a token
    pub fn price(&mut self, token: Address, decimals: u8, price: U256) -> &mut Self {
        self.tokens.insert(token, PricedToken { decimals, price });
        self
    }

    /// Registers a stable trading at exactly one dollar
    pub fn stable(&mut self, token: Address, decimals: u8) -> &mut Self {
        self.price(token, decimals, scale())
    }

    fn token(&self, token: Address) -> ManagerResult<&PricedToken> {
        self.tokens
            .get(&token)
            .ok_or_else(|| ManagerError::Custom(format!("No swap route for {}", token)))
    }
}

impl Swapper for OracleSwapper {
    fn swap(
        &mut self,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
        min_amount_out: U256,
    ) -> ManagerResult<U256> {
        let input = self.token(token_in)?;
        let output = self.token(token_out)?;
        if output.price == U256::ZERO {
            return Err(ManagerError::Custom(format!("No price for {}", token_out)));
        }
        let usd_value = mul_div(
            scale_decimals(amount_in, input.decimals, CASH_DECIMALS)?,
            input.price,
            scale(),
        )?;
        let amount_out = scale_decimals(
            mul_div(usd_value, scale(), output.price)?,
            CASH_DECIMALS,
            output.decimals,
        )?;
        if amount_out < min_amount_out {
            return Err(ManagerError::Custom("Slippage exceeded".to_string()));
        }
        Ok(amount_out)
    }
}
