/// Identity System
///
/// Identities, their DID documents, the resolver contract and the identity
/// cache used to avoid re-deriving and re-resolving hot identities.

pub mod cache;
pub mod document;
pub mod locks;
pub mod memory;
pub mod resolver;

pub use cache::{CachePolicy, IdentityCache};
pub use document::{Delegation, DelegationKind, DelegationProof, DidDocument, DocumentBuilder};
pub use locks::DidLocks;
pub use memory::InMemoryResolver;
pub use resolver::{parse_resolver_address, ResolverClient, RestResolverClient, RestResolverConfig};

use crate::{
    crypto::{
        keys::{secret_fingerprint, validate_name},
        KeyPair, Seed,
    },
    error::IdentityResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entity an identity stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    User,
    Agent,
    Twin,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Agent => "agent",
            SubjectType::Twin => "twin",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived identity together with its key pair
#[derive(Debug, Clone)]
pub struct Identity {
    did: String,
    name: String,
    key_id: String,
    subject_type: SubjectType,
    keys: KeyPair,
    fingerprint: [u8; 32],
}

impl Identity {
    /// Derive an identity from its secret inputs
    pub fn derive(
        subject_type: SubjectType,
        seed: &Seed,
        key_id: &str,
        name: &str,
        password: Option<&str>,
    ) -> IdentityResult<Self> {
        validate_name(name)?;
        let keys = KeyPair::derive_with_password(seed, key_id, password)?;

        Ok(Self {
            did: keys.did(),
            name: name.to_string(),
            key_id: key_id.to_string(),
            subject_type,
            keys,
            fingerprint: secret_fingerprint(seed, key_id, password),
        })
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    /// Fragment naming the identity's public key in its document
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn subject_type(&self) -> SubjectType {
        self.subject_type
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// `<did><name>`, e.g. `did:iotics:iotXYZ#agent-0`
    pub fn key_reference(&self) -> String {
        format!("{}{}", self.did, self.name)
    }

    /// Same keys, subject type as recorded by the resolver
    pub(crate) fn with_subject_type(mut self, subject_type: SubjectType) -> Self {
        self.subject_type = subject_type;
        self
    }

    /// True when this identity was derived from the given secrets and name
    pub(crate) fn matches_secrets(&self, fingerprint: &[u8; 32], name: &str) -> bool {
        &self.fingerprint == fingerprint && self.name == name
    }

    pub(crate) fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }
}

/// Options for creating (registering) an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityOptions {
    /// Base58 seed
    pub seed: String,
    /// Key identifier, e.g. `#agent-key-0`
    pub key: String,
    /// Identity name, e.g. `#agent-0`
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Replace an existing resolver record
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}

impl CreateIdentityOptions {
    /// Derive the identity these options describe
    pub fn derive(&self, subject_type: SubjectType) -> IdentityResult<Identity> {
        let seed = Seed::parse(&self.seed)?;
        Identity::derive(
            subject_type,
            &seed,
            &self.key,
            &self.name,
            normalize_password(self.password.as_deref()),
        )
    }
}

/// Options for loading an already registered identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIdentityOptions {
    pub seed: String,
    pub key: String,
    pub did: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl GetIdentityOptions {
    pub(crate) fn password(&self) -> Option<&str> {
        normalize_password(self.password.as_deref())
    }
}

/// Absent and empty passwords are the same password
fn normalize_password(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

/// Result of a delegation: `did` grants `agent_did` the named capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRecord {
    pub did: String,
    pub subject_type: SubjectType,
    pub agent_did: String,
    pub delegation_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "EcnwYkUvCwZUrX4QbChrLXBuEc5qsVxMr5upX3VSsmgo";

    #[test]
    fn test_subject_type_serialization() {
        assert_eq!(serde_json::to_string(&SubjectType::Twin).unwrap(), "\"twin\"");
        let parsed: SubjectType = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(parsed, SubjectType::Agent);
    }

    #[test]
    fn test_create_options_json_shape() {
        let opts: CreateIdentityOptions = serde_json::from_value(serde_json::json!({
            "seed": SEED,
            "key": "#agent-key-0",
            "name": "#agent-0",
            "password": null,
            "override": true
        }))
        .unwrap();

        assert!(opts.override_existing);
        assert!(opts.password.is_none());
    }

    #[test]
    fn test_override_defaults_to_false() {
        let opts: CreateIdentityOptions = serde_json::from_value(serde_json::json!({
            "seed": SEED,
            "key": "#agent-key-0",
            "name": "#agent-0"
        }))
        .unwrap();

        assert!(!opts.override_existing);
    }

    #[test]
    fn test_empty_password_is_no_password() {
        let with_empty = CreateIdentityOptions {
            seed: SEED.to_string(),
            key: "#user-key-0".to_string(),
            name: "#user-0".to_string(),
            password: Some(String::new()),
            override_existing: false,
        };
        let without = CreateIdentityOptions {
            password: None,
            ..with_empty.clone()
        };

        let a = with_empty.derive(SubjectType::User).unwrap();
        let b = without.derive(SubjectType::User).unwrap();
        assert_eq!(a.did(), b.did());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_identity_key_reference() {
        let seed = Seed::parse(SEED).unwrap();
        let identity =
            Identity::derive(SubjectType::Agent, &seed, "#agent-key-0", "#agent-0", None).unwrap();
        assert_eq!(identity.key_reference(), format!("{}#agent-0", identity.did()));
    }

    #[test]
    fn test_identity_name_must_be_fragment() {
        let seed = Seed::parse(SEED).unwrap();
        let err = Identity::derive(SubjectType::Agent, &seed, "#agent-key-0", "agent-0", None)
            .unwrap_err();
        assert!(matches!(err, crate::error::IdentityError::InvalidKeyId(_)));
    }

    #[test]
    fn test_delegation_record_json_shape() {
        let record = DelegationRecord {
            did: "did:iotics:iotTwin".to_string(),
            subject_type: SubjectType::Twin,
            agent_did: "did:iotics:iotAgent".to_string(),
            delegation_name: "#c-deleg-0".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["subjectType"], "twin");
        assert_eq!(json["agentDid"], "did:iotics:iotAgent");
        assert_eq!(json["delegationName"], "#c-deleg-0");
    }
}
