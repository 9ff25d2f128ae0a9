/// Delegations between identities
///
/// A subject (twin or user) grants an agent a named capability by carrying the
/// agent's signed proof in its own DID document. Control delegations live on
/// twins, authentication delegations on users.
use crate::{
    crypto::keys::validate_name,
    error::{IdentityError, IdentityResult},
    identity::{
        Delegation, DelegationKind, DelegationRecord, DidDocument, DocumentBuilder, Identity,
        ResolverClient, SubjectType,
    },
};
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DelegationEngine {
    resolver: Arc<dyn ResolverClient>,
}

impl DelegationEngine {
    pub fn new(resolver: Arc<dyn ResolverClient>) -> Self {
        Self { resolver }
    }

    /// Grant `agent` the `kind` capability over `subject` under `name`
    ///
    /// The subject document is re-read, the grant added (replacing any grant
    /// of the same name) and the re-signed document written back. Callers
    /// serialize this per subject DID.
    pub async fn delegate(
        &self,
        resolver: &Url,
        kind: DelegationKind,
        subject: &Identity,
        agent: &Identity,
        name: &str,
    ) -> IdentityResult<DelegationRecord> {
        validate_name(name)?;
        check_subject_type(subject, kind.subject_type())?;
        check_subject_type(agent, SubjectType::Agent)?;

        let current = self.resolver.fetch(resolver, subject.did()).await?;

        let mut delegations = current.all_delegations();
        if delegations.iter().any(|d| d.proof.id == name) {
            debug!("Replacing delegation {} on {}", name, subject.did());
        }
        delegations.push(Delegation {
            kind,
            proof: DocumentBuilder::delegation_proof(agent, subject.did(), name),
        });

        let document = DocumentBuilder::build(subject, &delegations)?;
        self.resolver
            .update(resolver, subject.did(), &document)
            .await?;

        info!(
            "Delegated {:?} on {} to {} as {}",
            kind,
            subject.did(),
            agent.did(),
            name
        );

        Ok(DelegationRecord {
            did: subject.did().to_string(),
            subject_type: subject.subject_type(),
            agent_did: agent.did().to_string(),
            delegation_name: name.to_string(),
        })
    }

    pub async fn delegate_control(
        &self,
        resolver: &Url,
        twin: &Identity,
        agent: &Identity,
        name: &str,
    ) -> IdentityResult<DelegationRecord> {
        self.delegate(resolver, DelegationKind::Control, twin, agent, name)
            .await
    }

    pub async fn delegate_authentication(
        &self,
        resolver: &Url,
        user: &Identity,
        agent: &Identity,
        name: &str,
    ) -> IdentityResult<DelegationRecord> {
        self.delegate(resolver, DelegationKind::Authentication, user, agent, name)
            .await
    }

    /// Require a live authentication delegation from `user_did` to `agent`
    pub async fn verify_authentication(
        &self,
        resolver: &Url,
        user_did: &str,
        agent: &Identity,
    ) -> IdentityResult<()> {
        self.verify_authentication_for(
            resolver,
            user_did,
            agent.did(),
            &agent.keys().public_key_base58(),
        )
        .await
    }

    /// Same check, for an agent known only by DID and published key
    pub async fn verify_authentication_for(
        &self,
        resolver: &Url,
        user_did: &str,
        agent_did: &str,
        agent_public_key_base58: &str,
    ) -> IdentityResult<()> {
        let document = match self.resolver.fetch(resolver, user_did).await {
            Ok(document) => document,
            Err(IdentityError::NotFound(_)) => {
                return Err(IdentityError::Unauthorized(format!(
                    "user {} is not registered",
                    user_did
                )))
            }
            Err(e) => return Err(e),
        };

        if document.subject_type != SubjectType::User {
            return Err(IdentityError::Unauthorized(format!(
                "{} is a {}, not a user",
                user_did, document.subject_type
            )));
        }
        DocumentBuilder::verify(&document)?;

        if holds_authentication(&document, agent_did, agent_public_key_base58) {
            Ok(())
        } else {
            Err(IdentityError::Unauthorized(format!(
                "agent {} has no authentication delegation from {}",
                agent_did, user_did
            )))
        }
    }
}

fn holds_authentication(document: &DidDocument, agent_did: &str, agent_key: &str) -> bool {
    document
        .delegations(DelegationKind::Authentication)
        .iter()
        .filter(|proof| proof.controller_did() == agent_did)
        .any(|proof| DocumentBuilder::verify_delegation(proof, &document.id, agent_key))
}

fn check_subject_type(identity: &Identity, expected: SubjectType) -> IdentityResult<()> {
    if identity.subject_type() == expected {
        Ok(())
    } else {
        Err(IdentityError::TypeMismatch(format!(
            "{} is a {}, expected a {}",
            identity.did(),
            identity.subject_type(),
            expected
        )))
    }
}
