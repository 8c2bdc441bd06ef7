//! External collaborator interfaces.
//!
//! The pipeline never reaches into the host directly: the directory,
//! entity-type registry, content repository and signature backend are all
//! injected as trait objects at construction time. The [`memory`] module
//! provides in-memory implementations for tests and the demo binary.
//! Implementations must be safe for concurrent use; the pipeline itself
//! never mutates them.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{CreationError, VerificationError};

// ── Directory ───────────────────────────────────────────────────────

/// A directory identity a sender address can resolve to.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Registered PGP key fingerprint, when the identity has one.
    pub fingerprint: Option<String>,
}

/// Identity lookup by email address.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Exact-match lookup. When multiple identities share an address,
    /// returning any single one of them is acceptable.
    async fn find_identity_by_email(&self, address: &str) -> Option<Identity>;
}

// ── Entity registry ─────────────────────────────────────────────────

/// The host's registry of entity types and their bundles.
pub trait EntityRegistry: Send + Sync {
    fn has_entity_type(&self, name: &str) -> bool;

    /// Whether `bundle` belongs to `entity_type`'s registered bundle set.
    fn has_bundle(&self, entity_type: &str, bundle: &str) -> bool;
}

// ── Content repository ──────────────────────────────────────────────

/// An entity stored in the host content repository.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: String,
    pub bundle: String,
    pub label: String,
    /// Sub-entity kinds (e.g. "comment") this entity accepts.
    pub sub_entity_kinds: Vec<String>,
}

impl Entity {
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    pub fn supports_sub_entity(&self, kind: &str) -> bool {
        self.sub_entity_kinds.iter().any(|k| k == kind)
    }
}

/// Creation request sent to the repository on handler success.
#[derive(Debug, Clone, Serialize)]
pub struct NewEntity {
    pub entity_type: String,
    pub bundle: String,
    /// Residual subject.
    pub title: String,
    /// Canonical, post-extraction body.
    pub body: String,
    /// Owning identity; `None` for explicitly permitted anonymous posts.
    pub owner: Option<Identity>,
    /// Handler-specific fields (e.g. parent entity reference).
    pub fields: serde_json::Value,
}

/// Access-control answer for a creation request.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

/// The host content repository: access checks, creation, loading.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Whether `identity` (or the anonymous identity, for `None`) may
    /// create an entity of the given type and bundle.
    async fn check_create_access(
        &self,
        entity_type: &str,
        bundle: &str,
        identity: Option<&Identity>,
    ) -> AccessDecision;

    async fn create(&self, entity: NewEntity) -> Result<Entity, CreationError>;

    async fn load(&self, entity_type: &str, id: &str) -> Option<Entity>;
}

// ── Signature verifier ──────────────────────────────────────────────

/// Trust the verification backend reports for a matched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Unknown,
    Never,
    Marginal,
    Full,
    Ultimate,
}

impl TrustLevel {
    /// Only "full" and "ultimate" trust are accepted.
    pub fn is_sufficient(self) -> bool {
        self >= Self::Full
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Never => "never",
            Self::Marginal => "marginal",
            Self::Full => "full",
            Self::Ultimate => "ultimate",
        }
    }
}

/// Successful verification report.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Fingerprint of the key that produced the signature.
    pub fingerprint: String,
    pub trust: TrustLevel,
}

/// Status of a key known to the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyInfo {
    pub disabled: bool,
    pub expired: bool,
    pub revoked: bool,
}

impl KeyInfo {
    /// The first reason this key must not be accepted, if any.
    pub fn unusable_status(&self) -> Option<&'static str> {
        if self.disabled {
            Some("disabled")
        } else if self.expired {
            Some("expired")
        } else if self.revoked {
            Some("revoked")
        } else {
            None
        }
    }
}

/// External cryptographic verification backend.
///
/// For MIME signatures `signature` carries the detached blob; for inline
/// signatures it is `None` and the signature is embedded in `signed_text`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        signed_text: &str,
        signature: Option<&str>,
    ) -> Result<Verification, VerificationError>;

    fn key_info(&self, fingerprint: &str) -> Result<KeyInfo, VerificationError>;
}
