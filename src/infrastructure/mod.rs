//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based Ethereum provider implementations
//! - Local key handling and transaction signing

pub mod ethereum;
pub mod signer;
