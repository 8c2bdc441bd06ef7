//! Error types for the mail intake pipeline.
//!
//! Every analyzer and handler step returns one of these at its boundary;
//! the processor converts them into structured log entries and moves on.
//! Nothing here is fatal to the host process.

/// Top-level error type, one variant per pipeline failure class.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Creation error: {0}")]
    Creation(#[from] CreationError),
}

impl Error {
    /// Short kind label for structured log context.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Verification(_) => "verification",
            Self::Authentication(_) => "authentication",
            Self::Authorization(_) => "authorization",
            Self::Reference(_) => "reference",
            Self::Creation(_) => "creation",
        }
    }
}

/// Malformed or unexpected message shape. Non-fatal; the affected
/// result field stays unset.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Message could not be parsed as MIME")]
    UnparseableMessage,

    #[error("Multipart message carries a pgp-signature part but no signed part")]
    MissingSignedPart,

    #[error("No bundle could be resolved for entity type {entity_type:?}")]
    UnresolvedBundle { entity_type: String },
}

/// Signature trust could not be established for this message.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("No signature verification backend is available")]
    MissingBackend,

    #[error("Signature does not match the signed text")]
    Unverified,

    #[error("Signature trust level {level} is below \"full\"")]
    TrustTooLow { level: String },

    #[error("Signer fingerprint {reported} does not match the registered fingerprint {expected}")]
    FingerprintMismatch { reported: String, expected: String },

    #[error("Identity {email} has no registered key fingerprint")]
    NoRegisteredKey { email: String },

    #[error("Signing key {fingerprint} is {status}")]
    KeyUnusable {
        fingerprint: String,
        status: &'static str,
    },
}

/// No identity could be established under the authentication rule.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Sender did not resolve to a directory identity")]
    UnresolvedSender,

    #[error("Message carries a signature that has not been verified")]
    UnverifiedSignature,
}

/// The established identity lacks permission for the requested creation.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Not authorized to create {entity_type}/{bundle}: {reason}")]
    CreateDenied {
        entity_type: String,
        bundle: String,
        reason: String,
    },
}

/// A required parent/reference entity is missing or incompatible.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("No referenced entity id was found in the subject")]
    MissingReferenceId,

    #[error("Referenced entity {entity_type}:{id} does not exist")]
    NotFound { entity_type: String, id: String },

    #[error("Referenced entity {entity_type}:{id} (bundle {bundle}) does not support {kind}")]
    Unsupported {
        entity_type: String,
        id: String,
        bundle: String,
        kind: String,
    },
}

/// The content repository refused or failed the creation request.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error("Repository rejected the entity: {0}")]
    Rejected(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels() {
        let err: Error = ParseError::UnparseableMessage.into();
        assert_eq!(err.kind(), "parse");

        let err: Error = AuthenticationError::UnresolvedSender.into();
        assert_eq!(err.kind(), "authentication");

        let err: Error = VerificationError::MissingBackend.into();
        assert_eq!(err.kind(), "verification");
    }

    #[test]
    fn fingerprint_mismatch_display_names_both_prints() {
        let err = VerificationError::FingerprintMismatch {
            reported: "AAAA".into(),
            expected: "BBBB".into(),
        };
        let text = err.to_string();
        assert!(text.contains("AAAA"));
        assert!(text.contains("BBBB"));
    }
}
