//! In-memory collaborator implementations.
//!
//! Backing store for the test suite and the demo binary. Not intended for
//! production hosts — a real deployment implements the traits in
//! [`crate::services`] against its own storage and crypto backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{CreationError, VerificationError};
use crate::services::{
    AccessDecision, ContentRepository, Directory, Entity, EntityRegistry, Identity, KeyInfo,
    NewEntity, SignatureVerifier, Verification,
};

// ── Directory ───────────────────────────────────────────────────────

/// Fixed list of identities; first registration wins on lookup.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    identities: Vec<Identity>,
}

impl MemoryDirectory {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_identity_by_email(&self, address: &str) -> Option<Identity> {
        self.identities
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(address))
            .cloned()
    }
}

// ── Entity registry ─────────────────────────────────────────────────

/// Entity types mapped to their bundle sets.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    types: HashMap<String, Vec<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type with its bundles (may be empty).
    pub fn register(mut self, entity_type: &str, bundles: &[&str]) -> Self {
        self.types.insert(
            entity_type.to_string(),
            bundles.iter().map(|b| b.to_string()).collect(),
        );
        self
    }
}

impl EntityRegistry for MemoryRegistry {
    fn has_entity_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    fn has_bundle(&self, entity_type: &str, bundle: &str) -> bool {
        self.types
            .get(entity_type)
            .is_some_and(|bundles| bundles.iter().any(|b| b == bundle))
    }
}

// ── Content repository ──────────────────────────────────────────────

/// Entity store with a deny-list access policy (allow by default).
#[derive(Default)]
pub struct MemoryRepository {
    entities: Mutex<Vec<Entity>>,
    denied: Vec<(String, String)>,
    /// When set, anonymous creation is denied with this reason.
    deny_anonymous: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing entity (e.g. a post comments can attach to).
    pub fn seed(self, entity: Entity) -> Self {
        self.entities
            .lock()
            .expect("repository lock poisoned")
            .push(entity);
        self
    }

    /// Denies creation of the given type/bundle for everyone.
    pub fn deny(mut self, entity_type: &str, bundle: &str) -> Self {
        self.denied
            .push((entity_type.to_string(), bundle.to_string()));
        self
    }

    /// Denies creation for the anonymous identity.
    pub fn deny_anonymous(mut self) -> Self {
        self.deny_anonymous = true;
        self
    }

    /// Snapshot of all stored entities, creation order preserved.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .lock()
            .expect("repository lock poisoned")
            .clone()
    }
}

#[async_trait]
impl ContentRepository for MemoryRepository {
    async fn check_create_access(
        &self,
        entity_type: &str,
        bundle: &str,
        identity: Option<&Identity>,
    ) -> AccessDecision {
        if identity.is_none() && self.deny_anonymous {
            return AccessDecision::denied("anonymous creation is not permitted");
        }
        if self
            .denied
            .iter()
            .any(|(t, b)| t == entity_type && b == bundle)
        {
            return AccessDecision::denied("creation denied by policy");
        }
        AccessDecision::allowed()
    }

    async fn create(&self, entity: NewEntity) -> Result<Entity, CreationError> {
        let created = Entity {
            id: Uuid::new_v4().to_string(),
            entity_type: entity.entity_type,
            bundle: entity.bundle,
            label: entity.title,
            sub_entity_kinds: Vec::new(),
        };
        self.entities
            .lock()
            .map_err(|_| CreationError::Storage("repository lock poisoned".into()))?
            .push(created.clone());
        Ok(created)
    }

    async fn load(&self, entity_type: &str, id: &str) -> Option<Entity> {
        self.entities
            .lock()
            .ok()?
            .iter()
            .find(|e| e.entity_type == entity_type && e.id == id)
            .cloned()
    }
}

// ── Signature verifier ──────────────────────────────────────────────

/// Canned verification backend: returns a configured report for any
/// signed text, with per-fingerprint key status.
#[derive(Debug, Default)]
pub struct MemoryVerifier {
    report: Option<Verification>,
    keys: HashMap<String, KeyInfo>,
}

impl MemoryVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the report returned for every verification call.
    pub fn report(mut self, verification: Verification) -> Self {
        self.report = Some(verification);
        self
    }

    pub fn key(mut self, fingerprint: &str, info: KeyInfo) -> Self {
        self.keys.insert(fingerprint.to_string(), info);
        self
    }
}

impl SignatureVerifier for MemoryVerifier {
    fn verify(
        &self,
        _signed_text: &str,
        _signature: Option<&str>,
    ) -> Result<Verification, VerificationError> {
        self.report.clone().ok_or(VerificationError::Unverified)
    }

    fn key_info(&self, fingerprint: &str) -> Result<KeyInfo, VerificationError> {
        Ok(self.keys.get(fingerprint).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TrustLevel;

    fn make_identity(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4().to_string(),
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            fingerprint: None,
        }
    }

    #[tokio::test]
    async fn directory_lookup_is_case_insensitive() {
        let directory = MemoryDirectory::new(vec![make_identity("alice@example.com")]);
        assert!(
            directory
                .find_identity_by_email("Alice@Example.COM")
                .await
                .is_some()
        );
        assert!(
            directory
                .find_identity_by_email("bob@example.com")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn directory_first_match_wins() {
        let mut first = make_identity("shared@example.com");
        first.name = "first".into();
        let mut second = make_identity("shared@example.com");
        second.name = "second".into();

        let directory = MemoryDirectory::new(vec![first, second]);
        let found = directory
            .find_identity_by_email("shared@example.com")
            .await
            .unwrap();
        assert_eq!(found.name, "first");
    }

    #[test]
    fn registry_bundle_membership() {
        let registry = MemoryRegistry::new()
            .register("node", &["blog", "page"])
            .register("comment", &[]);
        assert!(registry.has_entity_type("node"));
        assert!(registry.has_bundle("node", "blog"));
        assert!(!registry.has_bundle("node", "article"));
        assert!(!registry.has_bundle("user", "blog"));
    }

    #[tokio::test]
    async fn repository_create_and_load() {
        let repository = MemoryRepository::new();
        let created = repository
            .create(NewEntity {
                entity_type: "node".into(),
                bundle: "blog".into(),
                title: "Hello".into(),
                body: "Body".into(),
                owner: None,
                fields: serde_json::json!({}),
            })
            .await
            .unwrap();

        let loaded = repository.load("node", &created.id).await.unwrap();
        assert_eq!(loaded.label, "Hello");
        assert!(repository.load("comment", &created.id).await.is_none());
    }

    #[tokio::test]
    async fn repository_deny_policy() {
        let repository = MemoryRepository::new().deny("node", "blog");
        let identity = make_identity("alice@example.com");

        let decision = repository
            .check_create_access("node", "blog", Some(&identity))
            .await;
        assert!(!decision.allowed);

        let decision = repository
            .check_create_access("node", "page", Some(&identity))
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn repository_anonymous_policy() {
        let repository = MemoryRepository::new().deny_anonymous();
        assert!(
            !repository
                .check_create_access("comment", "comment", None)
                .await
                .allowed
        );
    }

    #[test]
    fn verifier_without_report_fails() {
        let verifier = MemoryVerifier::new();
        assert!(matches!(
            verifier.verify("text", None),
            Err(VerificationError::Unverified)
        ));
    }

    #[test]
    fn verifier_returns_configured_report() {
        let verifier = MemoryVerifier::new().report(Verification {
            fingerprint: "ABCD".into(),
            trust: TrustLevel::Full,
        });
        let report = verifier.verify("text", None).unwrap();
        assert_eq!(report.fingerprint, "ABCD");
        assert_eq!(report.trust, TrustLevel::Full);
    }
}
