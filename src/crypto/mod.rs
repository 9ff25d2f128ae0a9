/// Cryptography module for identity key material
///
/// Handles seeds, deterministic secp256k1 key derivation and signing

pub mod keys;
pub mod seed;

pub use keys::{did_from_public_key, verify_signature, KeyPair};
pub use seed::Seed;
