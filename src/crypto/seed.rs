/// Identity seeds
///
/// A seed is 256 bits of entropy, exchanged as base58 and also renderable as a
/// 24-word BIP-39 mnemonic. Every identity key is derived from it.

use crate::error::{IdentityError, IdentityResult};
use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use std::fmt;

/// Seed length in bytes
pub const SEED_LEN: usize = 32;

/// Root secret for deterministic key derivation
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Generate a fresh seed from the OS random number generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a base58-encoded seed
    pub fn parse(encoded: &str) -> IdentityResult<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| IdentityError::InvalidSeed(format!("seed is not base58: {}", e)))?;

        Self::from_slice(&bytes)
    }

    /// Recover a seed from its BIP-39 mnemonic
    pub fn from_mnemonic(phrase: &str) -> IdentityResult<Self> {
        let mnemonic = Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| IdentityError::InvalidSeed(format!("invalid mnemonic: {}", e)))?;

        Self::from_slice(&mnemonic.to_entropy())
    }

    fn from_slice(bytes: &[u8]) -> IdentityResult<Self> {
        let seed: [u8; SEED_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidSeed(format!(
                "seed must be {} bytes, got {}",
                SEED_LEN,
                bytes.len()
            ))
        })?;

        Ok(Self(seed))
    }

    /// Base58 form handed back to callers
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Raw seed bytes
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// BIP-39 English mnemonic for this seed
    pub fn mnemonic(&self) -> IdentityResult<String> {
        Ok(self.to_mnemonic()?.to_string())
    }

    /// 64-byte BIP-39 master seed, optionally salted with a password
    pub fn master_key(&self, password: Option<&str>) -> IdentityResult<[u8; 64]> {
        Ok(self.to_mnemonic()?.to_seed_normalized(password.unwrap_or("")))
    }

    fn to_mnemonic(&self) -> IdentityResult<Mnemonic> {
        Mnemonic::from_entropy(&self.0)
            .map_err(|e| IdentityError::Internal(format!("mnemonic encoding failed: {}", e)))
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}
