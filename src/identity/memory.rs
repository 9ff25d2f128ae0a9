/// In-process resolver backend
///
/// Holds documents per resolver address. Used by tests and by the
/// `memory` resolver backend for local development.
use crate::{
    error::{IdentityError, IdentityResult},
    identity::{DidDocument, ResolverClient},
};
use async_trait::async_trait;
use reqwest::Url;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryResolver {
    documents: RwLock<HashMap<String, HashMap<String, DidDocument>>>,
    registrations: AtomicUsize,
    updates: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a network outage: every call fails with `Unreachable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of registrations that actually wrote a document
    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of documents held for one resolver address
    pub async fn document_count(&self, resolver: &Url) -> usize {
        self.documents
            .read()
            .await
            .get(&address_key(resolver))
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn check_online(&self, resolver: &Url) -> IdentityResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityError::Unreachable(format!(
                "{}: connection refused",
                resolver
            )));
        }
        Ok(())
    }
}

/// Trailing slashes do not make a different resolver
fn address_key(resolver: &Url) -> String {
    resolver.as_str().trim_end_matches('/').to_string()
}

#[async_trait]
impl ResolverClient for InMemoryResolver {
    async fn register(
        &self,
        resolver: &Url,
        document: &DidDocument,
        override_existing: bool,
    ) -> IdentityResult<String> {
        self.check_online(resolver)?;

        let mut documents = self.documents.write().await;
        let docs = documents.entry(address_key(resolver)).or_default();

        match docs.get(&document.id) {
            Some(existing) if existing == document && !override_existing => {
                debug!("Register {}: identical document, nothing to do", document.id);
                return Ok(document.id.clone());
            }
            Some(_) if !override_existing => {
                return Err(IdentityError::Conflict(format!(
                    "DID {} already registered with a different document",
                    document.id
                )));
            }
            _ => {}
        }

        docs.insert(document.id.clone(), document.clone());
        self.registrations.fetch_add(1, Ordering::SeqCst);

        Ok(document.id.clone())
    }

    async fn fetch(&self, resolver: &Url, did: &str) -> IdentityResult<DidDocument> {
        self.check_online(resolver)?;

        self.documents
            .read()
            .await
            .get(&address_key(resolver))
            .and_then(|docs| docs.get(did))
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("DID {} not registered", did)))
    }

    async fn update(
        &self,
        resolver: &Url,
        did: &str,
        document: &DidDocument,
    ) -> IdentityResult<()> {
        self.check_online(resolver)?;

        let mut documents = self.documents.write().await;
        let slot = documents
            .get_mut(&address_key(resolver))
            .and_then(|docs| docs.get_mut(did))
            .ok_or_else(|| IdentityError::NotFound(format!("DID {} not registered", did)))?;

        *slot = document.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::Seed,
        identity::{DocumentBuilder, Identity, SubjectType},
    };

    fn resolver_url() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }

    fn document(seed: &Seed, name: &str) -> DidDocument {
        let identity =
            Identity::derive(SubjectType::Agent, seed, "#agent-key-0", name, None).unwrap();
        DocumentBuilder::build(&identity, &[]).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_fetch() {
        let resolver = InMemoryResolver::new();
        let doc = document(&Seed::generate(), "#agent-0");

        let did = resolver.register(&resolver_url(), &doc, false).await.unwrap();
        assert_eq!(did, doc.id);

        let fetched = resolver.fetch(&resolver_url(), &did).await.unwrap();
        assert_eq!(fetched, doc);
        assert_eq!(resolver.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_identical_registration_is_noop() {
        let resolver = InMemoryResolver::new();
        let doc = document(&Seed::generate(), "#agent-0");

        resolver.register(&resolver_url(), &doc, false).await.unwrap();
        resolver.register(&resolver_url(), &doc, false).await.unwrap();

        assert_eq!(resolver.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_override_rewrites_identical_document() {
        let resolver = InMemoryResolver::new();
        let doc = document(&Seed::generate(), "#agent-0");

        resolver.register(&resolver_url(), &doc, false).await.unwrap();
        resolver.register(&resolver_url(), &doc, true).await.unwrap();

        assert_eq!(resolver.registration_count(), 2);
        assert_eq!(resolver.document_count(&resolver_url()).await, 1);
    }

    #[tokio::test]
    async fn test_different_document_conflicts_without_override() {
        let resolver = InMemoryResolver::new();
        let seed = Seed::generate();
        let first = document(&seed, "#agent-0");
        let second = document(&seed, "#agent-renamed");
        assert_eq!(first.id, second.id);

        resolver.register(&resolver_url(), &first, false).await.unwrap();
        let err = resolver
            .register(&resolver_url(), &second, false)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));

        resolver.register(&resolver_url(), &second, true).await.unwrap();
        let fetched = resolver.fetch(&resolver_url(), &first.id).await.unwrap();
        assert_eq!(fetched, second);
        assert_eq!(resolver.registration_count(), 2);
    }

    #[tokio::test]
    async fn test_resolvers_are_isolated_by_address() {
        let resolver = InMemoryResolver::new();
        let doc = document(&Seed::generate(), "#agent-0");
        resolver.register(&resolver_url(), &doc, false).await.unwrap();

        let other = Url::parse("http://other-resolver:5000").unwrap();
        assert!(matches!(
            resolver.fetch(&other, &doc.id).await,
            Err(IdentityError::NotFound(_))
        ));

        let with_slash = Url::parse("http://localhost:5000/").unwrap();
        assert!(resolver.fetch(&with_slash, &doc.id).await.is_ok());
        assert_eq!(resolver.document_count(&resolver_url()).await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let resolver = InMemoryResolver::new();
        let doc = document(&Seed::generate(), "#agent-0");

        let err = resolver
            .update(&resolver_url(), &doc.id, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotFound(_)));
        assert_eq!(resolver.update_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_resolver_is_unreachable() {
        let resolver = InMemoryResolver::new();
        resolver.set_offline(true);

        let err = resolver
            .fetch(&resolver_url(), "did:iotics:iotABC")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Unreachable(_)));

        resolver.set_offline(false);
        assert!(matches!(
            resolver.fetch(&resolver_url(), "did:iotics:iotABC").await,
            Err(IdentityError::NotFound(_))
        ));
    }
}
