//! Utility and helper functions needed for:
//! - Error handling
//! - ABI decoding of strategy responses
//! - Type casting and decimal scaling

pub(crate) mod common;
pub mod error;
