//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use candid::Nat;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use super::error::*;

/// Converts String to Address and returns ManagerError on failure
pub fn string_to_address(input: &str) -> ManagerResult<Address> {
    Address::from_str(input).map_err(|err| ManagerError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat::from(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// Converts values of type `Nat` to `u32`
pub fn nat_to_u32(n: &Nat) -> ManagerResult<u32> {
    n.0.to_u32()
        .ok_or_else(|| ManagerError::DecodingError(format!("{} does not fit in u32", n)))
}

/// Returns `T` from Solidity struct.
pub fn decode_abi_response<T, F: SolCall<Return = T>>(hex_data: String) -> ManagerResult<T> {
    let stripped_hex = if hex_data.starts_with("0x") {
        hex_data[2..].to_string()
    } else {
        hex_data
    };
    let hex_bytes =
        hex::decode(stripped_hex).map_err(|err| ManagerError::DecodingError(err.to_string()))?;
    F::abi_decode_returns(&hex_bytes, false)
        .map_err(|err| ManagerError::DecodingError(err.to_string()))
}

/// Moves `amount` from a token with `from` decimals into a token with `to` decimals.
/// Scaling down rounds towards zero.
pub fn scale_decimals(amount: U256, from: u8, to: u8) -> ManagerResult<U256> {
    if from == to {
        return Ok(amount);
    }
    if to > from {
        let factor = U256::from(10)
            .checked_pow(U256::from(to - from))
            .ok_or_else(|| arithmetic_err("Decimals factor overflowed."))?;
        amount
            .checked_mul(factor)
            .ok_or_else(|| arithmetic_err("Scaled amount overflowed."))
    } else {
        let factor = U256::from(10)
            .checked_pow(U256::from(from - to))
            .ok_or_else(|| arithmetic_err("Decimals factor overflowed."))?;
        Ok(amount / factor)
    }
}

/// `amount * numerator / denominator`, rounded down
pub fn mul_div(amount: U256, numerator: U256, denominator: U256) -> ManagerResult<U256> {
    if denominator == U256::ZERO {
        return Err(arithmetic_err("Denominator was zero."));
    }
    amount
        .checked_mul(numerator)
        .map(|product| product / denominator)
        .ok_or_else(|| arithmetic_err("Multiplication overflowed."))
}

/// `amount * bps / scale`, rounded down
pub fn portion(amount: U256, bps: u32, scale: u32) -> ManagerResult<U256> {
    mul_div(amount, U256::from(bps), U256::from(scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_string_to_address() {
        let address = string_to_address("0x569A03632dBDE3b9f108b0552Ea80De00e5A810a").unwrap();
        assert_eq!(
            address.to_string().to_lowercase(),
            "0x569a03632dbde3b9f108b0552ea80de00e5a810a"
        );
        assert!(matches!(
            string_to_address("not an address"),
            Err(ManagerError::DecodingError(_))
        ));
    }

    #[test]
    fn test_scale_decimals() {
        // 1 USDC to DAI units and back
        let one_usdc = U256::from(1_000_000u64);
        let one_dai = scale_decimals(one_usdc, 6, 18).unwrap();
        assert_eq!(one_dai, U256::from(10u64).pow(U256::from(18)));
        assert_eq!(scale_decimals(one_dai, 18, 6).unwrap(), one_usdc);
        // Dust below the smaller unit is dropped
        assert_eq!(
            scale_decimals(U256::from(999_999_999_999u64), 18, 6).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert!(mul_div(U256::from(1), U256::from(1), U256::ZERO).is_err());
    }

    #[test]
    fn test_portion() {
        assert_eq!(
            portion(U256::from(1_000_000u64), 750, 10_000).unwrap(),
            U256::from(75_000u64)
        );
    }

    proptest! {
        #[test]
        fn test_u256_to_nat(value in any::<u128>()) {
            prop_assert_eq!(u256_to_nat(&U256::from(value)), Nat::from(value));
        }

        #[test]
        fn test_scale_up_then_down_is_identity(value in any::<u64>(), from in 0u8..18, extra in 0u8..18) {
            let amount = U256::from(value);
            let up = scale_decimals(amount, from, from + extra).unwrap();
            prop_assert_eq!(scale_decimals(up, from + extra, from).unwrap(), amount);
        }
    }
}
