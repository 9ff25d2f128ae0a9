/// DID documents and delegation proofs
use crate::{
    crypto::{did_from_public_key, verify_signature},
    error::{IdentityError, IdentityResult},
    identity::{Identity, SubjectType},
};
use serde::{Deserialize, Serialize};

/// JSON-LD context stamped on every document
pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";

/// Verification key type published for secp256k1 keys
pub const KEY_TYPE: &str = "Secp256k1VerificationKey2018";

/// Public key published in a DID document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    /// Key name fragment, e.g. `#agent-0`
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub public_key_base58: String,
}

/// Capability granted by a delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DelegationKind {
    /// Agent may act as (control) a twin
    Control,
    /// Agent may authenticate on behalf of a user
    Authentication,
}

impl DelegationKind {
    /// Subject type allowed to grant this capability
    pub fn subject_type(&self) -> SubjectType {
        match self {
            DelegationKind::Control => SubjectType::Twin,
            DelegationKind::Authentication => SubjectType::User,
        }
    }
}

/// Delegation entry held in the subject's document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationProof {
    /// Delegation name, unique within the subject document
    pub id: String,
    /// `<agentDid><agentName>` of the delegated agent
    pub controller: String,
    /// Agent's hex signature over the subject DID
    pub proof: String,
    #[serde(default)]
    pub revoked: bool,
}

impl DelegationProof {
    /// DID half of the controller reference
    pub fn controller_did(&self) -> &str {
        self.controller
            .split_once('#')
            .map(|(did, _)| did)
            .unwrap_or(&self.controller)
    }

    /// `#name` half of the controller reference, if any
    pub fn controller_key_name(&self) -> Option<&str> {
        self.controller.find('#').map(|idx| &self.controller[idx..])
    }
}

/// A delegation to place in a document under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub kind: DelegationKind,
    pub proof: DelegationProof,
}

/// Resolver-held record for one DID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: String,
    pub id: String,
    pub subject_type: SubjectType,
    pub public_keys: Vec<PublicKeyEntry>,
    #[serde(default)]
    pub delegate_control: Vec<DelegationProof>,
    #[serde(default)]
    pub delegate_authentication: Vec<DelegationProof>,
    /// Hex signature by the document's own key over the unsigned document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

impl DidDocument {
    /// Delegations of one kind
    pub fn delegations(&self, kind: DelegationKind) -> &[DelegationProof] {
        match kind {
            DelegationKind::Control => &self.delegate_control,
            DelegationKind::Authentication => &self.delegate_authentication,
        }
    }

    /// All delegations, tagged with their kind
    pub fn all_delegations(&self) -> Vec<Delegation> {
        let control = self.delegate_control.iter().map(|proof| Delegation {
            kind: DelegationKind::Control,
            proof: proof.clone(),
        });
        let auth = self.delegate_authentication.iter().map(|proof| Delegation {
            kind: DelegationKind::Authentication,
            proof: proof.clone(),
        });
        control.chain(auth).collect()
    }

    /// Public key by name
    pub fn public_key(&self, name: &str) -> Option<&PublicKeyEntry> {
        self.public_keys.iter().find(|key| key.id == name)
    }

    /// Canonical bytes covered by the document proof
    pub fn signing_payload(&self) -> IdentityResult<Vec<u8>> {
        let unsigned = DidDocument {
            proof: None,
            ..self.clone()
        };
        Ok(serde_json::to_vec(&unsigned)?)
    }
}

/// Builds, signs and checks DID documents
pub struct DocumentBuilder;

impl DocumentBuilder {
    /// Build the signed document for `identity` holding `delegations`
    ///
    /// Deterministic: later delegations replace earlier ones with the same name.
    pub fn build(identity: &Identity, delegations: &[Delegation]) -> IdentityResult<DidDocument> {
        let mut delegate_control: Vec<DelegationProof> = Vec::new();
        let mut delegate_authentication: Vec<DelegationProof> = Vec::new();

        for delegation in delegations {
            delegate_control.retain(|p| p.id != delegation.proof.id);
            delegate_authentication.retain(|p| p.id != delegation.proof.id);

            match delegation.kind {
                DelegationKind::Control => delegate_control.push(delegation.proof.clone()),
                DelegationKind::Authentication => {
                    delegate_authentication.push(delegation.proof.clone())
                }
            }
        }

        let mut document = DidDocument {
            context: DID_CONTEXT.to_string(),
            id: identity.did().to_string(),
            subject_type: identity.subject_type(),
            public_keys: vec![PublicKeyEntry {
                id: identity.name().to_string(),
                key_type: KEY_TYPE.to_string(),
                public_key_base58: identity.keys().public_key_base58(),
            }],
            delegate_control,
            delegate_authentication,
            proof: None,
        };

        let payload = document.signing_payload()?;
        document.proof = Some(identity.keys().sign(&payload));

        Ok(document)
    }

    /// Check that the document is signed by a key that owns its DID
    pub fn verify(document: &DidDocument) -> IdentityResult<()> {
        let proof = document.proof.as_deref().ok_or_else(|| {
            IdentityError::Unauthorized(format!("document {} is not signed", document.id))
        })?;
        let payload = document.signing_payload()?;

        let signed_by_owner = document.public_keys.iter().any(|key| {
            owns_did(&key.public_key_base58, &document.id)
                && verify_signature(&key.public_key_base58, &payload, proof)
        });

        if signed_by_owner {
            Ok(())
        } else {
            Err(IdentityError::Unauthorized(format!(
                "document proof for {} does not verify",
                document.id
            )))
        }
    }

    /// Agent-side proof that it accepts a delegation from `subject_did`
    pub fn delegation_proof(agent: &Identity, subject_did: &str, name: &str) -> DelegationProof {
        DelegationProof {
            id: name.to_string(),
            controller: agent.key_reference(),
            proof: agent.keys().sign(subject_did.as_bytes()),
            revoked: false,
        }
    }

    /// Check a delegation proof against the agent's published key
    pub fn verify_delegation(
        proof: &DelegationProof,
        subject_did: &str,
        agent_public_key_base58: &str,
    ) -> bool {
        !proof.revoked
            && owns_did(agent_public_key_base58, proof.controller_did())
            && verify_signature(agent_public_key_base58, subject_did.as_bytes(), &proof.proof)
    }
}

fn owns_did(public_key_base58: &str, did: &str) -> bool {
    bs58::decode(public_key_base58)
        .into_vec()
        .map(|key| did_from_public_key(&key) == did)
        .unwrap_or(false)
}
