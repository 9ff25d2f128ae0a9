/// Deterministic identity keys
///
/// Key pairs are secp256k1 keys derived from a seed and a key identifier:
/// the seed's BIP-39 master key (optionally salted with a password) keys an
/// HMAC-SHA256 over the key identifier, and the output becomes the secret
/// scalar. Same inputs, same key pair.

use crate::crypto::seed::Seed;
use crate::error::{IdentityError, IdentityResult};
use hmac::{Hmac, Mac};
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Every DID minted by this engine starts with this prefix
pub const DID_PREFIX: &str = "did:iotics:iot";

/// Domain separator for the key derivation MAC
const DERIVATION_DOMAIN: &[u8] = b"identity-key:";

/// Upper bound on scalar retries; a retry is needed with probability ~2^-128
const MAX_DERIVATION_ATTEMPTS: u32 = 8;

/// Maximum length of a fragment after the leading `#`
const MAX_FRAGMENT_LEN: usize = 64;

/// Validate a `#fragment` style key identifier
pub fn validate_key_id(key_id: &str) -> IdentityResult<()> {
    validate_fragment("key identifier", key_id)
}

/// Validate a `#fragment` style identity or delegation name
pub fn validate_name(name: &str) -> IdentityResult<()> {
    validate_fragment("name", name)
}

fn validate_fragment(what: &str, value: &str) -> IdentityResult<()> {
    let body = value.strip_prefix('#').ok_or_else(|| {
        IdentityError::InvalidKeyId(format!("{} '{}' must start with '#'", what, value))
    })?;

    if body.is_empty() || body.len() > MAX_FRAGMENT_LEN {
        return Err(IdentityError::InvalidKeyId(format!(
            "{} '{}' must have 1 to {} characters after '#'",
            what, value, MAX_FRAGMENT_LEN
        )));
    }

    if !body
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(IdentityError::InvalidKeyId(format!(
            "{} '{}' may only contain letters, digits, '-' and '_'",
            what, value
        )));
    }

    Ok(())
}

/// Secp256k1 key pair belonging to one identity
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Derive the key pair for `key_id` under `seed`
    pub fn derive(seed: &Seed, key_id: &str) -> IdentityResult<Self> {
        Self::derive_with_password(seed, key_id, None)
    }

    /// Derive the key pair for `key_id` under `seed`, salted with an optional password
    pub fn derive_with_password(
        seed: &Seed,
        key_id: &str,
        password: Option<&str>,
    ) -> IdentityResult<Self> {
        validate_key_id(key_id)?;

        let master = seed.master_key(password)?;

        for attempt in 0..MAX_DERIVATION_ATTEMPTS {
            let mut mac = HmacSha256::new_from_slice(&master)
                .map_err(|e| IdentityError::Internal(format!("HMAC init failed: {}", e)))?;
            mac.update(DERIVATION_DOMAIN);
            mac.update(key_id.as_bytes());
            if attempt > 0 {
                mac.update(&attempt.to_be_bytes());
            }
            let okm = mac.finalize().into_bytes();

            // Zero or out-of-range scalars are rejected; try the next counter
            if let Ok(signing_key) = SigningKey::from_slice(&okm) {
                return Ok(Self { signing_key });
            }
        }

        Err(IdentityError::Internal(format!(
            "no valid secret scalar for key '{}'",
            key_id
        )))
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Public key in base58, as published in DID documents
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// DID derived from the public key
    pub fn did(&self) -> String {
        did_from_public_key(&self.public_key_bytes())
    }

    /// Sign raw bytes, returning a hex-encoded 64-byte ECDSA signature
    ///
    /// Signatures are deterministic (RFC 6979).
    pub fn sign(&self, data: &[u8]) -> String {
        hex::encode(self.sign_bytes(data))
    }

    /// Sign raw bytes, returning the 64-byte signature
    pub fn sign_bytes(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(data);
        signature.to_bytes().to_vec()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_base58())
            .finish()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key_bytes() == other.public_key_bytes()
    }
}

impl Eq for KeyPair {}

/// Compute the DID for a compressed public key
pub fn did_from_public_key(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    format!("{}{}", DID_PREFIX, bs58::encode(&digest[..20]).into_string())
}

/// Verify a signature produced by [`KeyPair::sign_bytes`]
pub fn verify_signature_bytes(public_key_base58: &str, data: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = bs58::decode(public_key_base58).into_vec() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    verifying_key.verify(data, &signature).is_ok()
}

/// Verify a hex signature produced by [`KeyPair::sign`]
pub fn verify_signature(public_key_base58: &str, data: &[u8], signature_hex: &str) -> bool {
    match hex::decode(signature_hex) {
        Ok(signature) => verify_signature_bytes(public_key_base58, data, &signature),
        Err(_) => false,
    }
}

/// Digest of the secret inputs behind an identity
///
/// Lets the cache tell whether a caller really holds the secrets for a cached
/// DID without re-running the key derivation.
pub fn secret_fingerprint(seed: &Seed, key_id: &str, password: Option<&str>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update([0u8]);
    hasher.update(key_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.unwrap_or("").as_bytes());
    hasher.finalize().into()
}
