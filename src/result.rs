//! Per-message analysis state and the overall processing record.
//!
//! One [`AnalyzerResult`] is created per inbound message, threaded by
//! mutable reference through every analyzer, then read by every handler.
//! `sender`, `user` and `footer` are write-once: a later analyzer cannot
//! silently replace a value another analyzer established. The body is the
//! deliberate exception — footer extraction and markup normalization
//! re-derive it through [`AnalyzerResult::rederive_body`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::MailMessage;
use crate::services::{Entity, Identity};

// ── Signature context ───────────────────────────────────────────────

/// Which PGP protocol the message was signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PgpType {
    /// RFC 4880 §7 cleartext signature embedded in the body.
    Inline,
    /// RFC 3156 multipart/signed with a detached signature part.
    Mime,
}

/// Signature state carried from detection through verification.
#[derive(Debug, Clone)]
pub struct SignatureContext {
    pub pgp_type: PgpType,
    /// Detached signature blob. `None` for inline signatures, where the
    /// signature is embedded in the signed text itself.
    pub signature: Option<String>,
    /// CRLF-normalized text the signature was computed over.
    pub signed_text: String,
    /// Index of the signed part within the message, for `Mime` type.
    pub signed_part_index: Option<usize>,
    /// Set only after the external backend verified the signature at
    /// full trust against the sender's registered fingerprint.
    pub verified: bool,
}

impl SignatureContext {
    pub fn inline(signed_text: String) -> Self {
        Self {
            pgp_type: PgpType::Inline,
            signature: None,
            signed_text,
            signed_part_index: None,
            verified: false,
        }
    }

    pub fn mime(signed_text: String, signature: String, signed_part_index: usize) -> Self {
        Self {
            pgp_type: PgpType::Mime,
            signature: Some(signature),
            signed_text,
            signed_part_index: Some(signed_part_index),
            verified: false,
        }
    }
}

// ── Analyzer result ─────────────────────────────────────────────────

/// Accumulated analysis of a single message.
#[derive(Debug, Default)]
pub struct AnalyzerResult {
    sender: Option<String>,
    user: Option<Identity>,
    body: Option<String>,
    footer: Option<String>,
    subject: String,
    entity_type: Option<String>,
    bundle: Option<String>,
    reference_id: Option<String>,
    signature: Option<SignatureContext>,
}

impl AnalyzerResult {
    /// Fresh result for a message, seeded with its envelope subject.
    pub fn for_message(message: &MailMessage) -> Self {
        Self {
            subject: message.subject.clone(),
            ..Self::default()
        }
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Sets the sender address unless one is already established.
    /// Returns whether the write took effect.
    pub fn set_sender(&mut self, sender: String) -> bool {
        if self.sender.is_some() {
            return false;
        }
        self.sender = Some(sender);
        true
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    /// Sets the resolved identity unless one is already established.
    pub fn set_user(&mut self, user: Identity) -> bool {
        if self.user.is_some() {
            return false;
        }
        self.user = Some(user);
        true
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// First write of the analyzed body. No-op when a body is already set.
    pub fn set_body(&mut self, body: String) -> bool {
        if self.body.is_some() {
            return false;
        }
        self.body = Some(body);
        true
    }

    /// Deliberate second write: footer extraction and markup
    /// normalization replace the body they started from.
    pub fn rederive_body(&mut self, body: String) {
        self.body = Some(body);
    }

    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    pub fn set_footer(&mut self, footer: String) -> bool {
        if self.footer.is_some() {
            return false;
        }
        self.footer = Some(footer);
        true
    }

    /// Residual subject after prefix stripping.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Rewrites the full residual subject. Cumulative: each parsing stage
    /// strips its recognized prefix and stores what remains.
    pub fn set_subject(&mut self, subject: String) {
        self.subject = subject;
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn set_entity_type(&mut self, entity_type: String) -> bool {
        if self.entity_type.is_some() {
            return false;
        }
        self.entity_type = Some(entity_type);
        true
    }

    pub fn bundle(&self) -> Option<&str> {
        self.bundle.as_deref()
    }

    pub fn set_bundle(&mut self, bundle: String) -> bool {
        if self.bundle.is_some() {
            return false;
        }
        self.bundle = Some(bundle);
        true
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.reference_id.as_deref()
    }

    pub fn set_reference_id(&mut self, id: String) -> bool {
        if self.reference_id.is_some() {
            return false;
        }
        self.reference_id = Some(id);
        true
    }

    pub fn signature(&self) -> Option<&SignatureContext> {
        self.signature.as_ref()
    }

    pub fn set_signature(&mut self, context: SignatureContext) -> bool {
        if self.signature.is_some() {
            return false;
        }
        self.signature = Some(context);
        true
    }

    /// Flips the verification flag after the external backend succeeded.
    pub fn mark_signature_verified(&mut self) {
        if let Some(context) = &mut self.signature {
            context.verified = true;
        }
    }
}

// ── Processor result ────────────────────────────────────────────────

/// Log severity for pipeline events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Debug,
    Notice,
    Warning,
}

/// A structured log entry produced at an analyzer or handler boundary.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Analyzer or handler name that produced the entry.
    pub component: String,
    pub severity: LogSeverity,
    pub message: String,
    /// Interpolation context (error kind, entity ids, ...).
    pub context: serde_json::Value,
}

/// Record of an entity the pipeline created.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedEntity {
    pub entity_type: String,
    pub bundle: String,
    pub id: String,
    pub label: String,
}

impl From<&Entity> for CreatedEntity {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_type: entity.entity_type.clone(),
            bundle: entity.bundle.clone(),
            id: entity.id.clone(),
            label: entity.label.clone(),
        }
    }
}

/// Outcome of processing one message: log entries plus created entities.
#[derive(Debug, Serialize)]
pub struct ProcessorResult {
    /// Deliverer/configuration id the message arrived through.
    pub deliverer: String,
    pub log: Vec<LogEntry>,
    pub created: Vec<CreatedEntity>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessorResult {
    pub fn new(deliverer: String) -> Self {
        Self {
            deliverer,
            log: Vec::new(),
            created: Vec::new(),
            processed_at: Utc::now(),
        }
    }

    /// Appends a structured log entry.
    pub fn log(
        &mut self,
        component: &str,
        severity: LogSeverity,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        self.log.push(LogEntry {
            component: component.to_string(),
            severity,
            message: message.into(),
            context,
        });
    }

    /// Entries at warning severity (rejections).
    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.log
            .iter()
            .filter(|e| e.severity == LogSeverity::Warning)
    }
}
