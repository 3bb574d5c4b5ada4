//! Local key handling and legacy (EIP-155) transaction signing

use std::fmt;

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("private key is empty")]
    Empty,
    #[error("invalid private key: {0}")]
    Invalid(String),
}

/// A process-local private key. Never persisted, never printed.
pub struct LocalKey {
    signer: PrivateKeySigner,
    generated: bool,
}

impl LocalKey {
    /// Fresh random key, used once and thrown away
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
            generated: true,
        }
    }

    /// Parse a hex private key, with or without `0x`
    pub fn from_hex(key: &str) -> Result<Self, KeyError> {
        let key = key.trim();
        let payload = key.strip_prefix("0x").unwrap_or(key);
        if payload.is_empty() {
            return Err(KeyError::Empty);
        }
        let signer = payload
            .parse::<PrivateKeySigner>()
            .map_err(|e| KeyError::Invalid(e.to_string()))?;
        Ok(Self {
            signer,
            generated: false,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Sign a legacy transaction and encode it for `eth_sendRawTransaction`
    pub fn sign_legacy(&self, mut tx: TxLegacy) -> Result<SignedTx, alloy::signers::Error> {
        let signature = self.signer.sign_transaction_sync(&mut tx)?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTx::new(envelope))
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKey")
            .field("address", &self.address())
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

/// Build an EIP-155 legacy transaction
pub fn legacy_transaction(
    chain_id: u64,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    input: Bytes,
) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit,
        to: TxKind::Call(to),
        value,
        input,
    }
}

/// A signed transaction together with the exact bytes that get broadcast
#[derive(Debug, Clone)]
pub struct SignedTx {
    envelope: TxEnvelope,
    raw: Bytes,
}

impl SignedTx {
    fn new(envelope: TxEnvelope) -> Self {
        let raw = Bytes::from(envelope.encoded_2718());
        Self { envelope, raw }
    }

    pub fn hash(&self) -> B256 {
        *self.envelope.tx_hash()
    }

    /// EIP-2718 encoding of the signed envelope
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Address recovered from the signature
    pub fn recover_signer(&self) -> anyhow::Result<Address> {
        self.envelope
            .recover_signer()
            .map_err(|e| anyhow::anyhow!("signature recovery failed: {e}"))
    }
}
