//! Handler stages: authorization and content creation.
//!
//! Handlers run after all analyzers, each against the same analysis
//! result. A handler first decides whether the message targets it at
//! all; a mismatch is a silent skip so that several handlers can share
//! a pipeline without logging noise about each other's messages. Only
//! once a handler claims a message do authentication and authorization
//! failures become rejections.

pub mod comment;
pub mod content;

use async_trait::async_trait;

use crate::error::{AuthenticationError, Result};
use crate::message::MailMessage;
use crate::result::AnalyzerResult;
use crate::services::{Entity, Identity};

pub use comment::CommentHandler;
pub use content::ContentHandler;

/// What a handler did with a message.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The message does not target this handler.
    Skipped,
    Created(Entity),
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Handler name used as the log component.
    fn name(&self) -> &'static str;

    async fn invoke(
        &self,
        message: &MailMessage,
        result: &AnalyzerResult,
    ) -> Result<HandlerOutcome>;
}

/// Shared authentication rule.
///
/// A signed message authenticates only through a verified signature; an
/// unverified signature is always rejected, even when the sender address
/// alone would have resolved. Unsigned messages authenticate through the
/// resolved identity, or anonymously when the handler permits it.
pub(crate) fn authenticate(
    result: &AnalyzerResult,
    allow_anonymous: bool,
) -> Result<Option<&Identity>> {
    match result.signature() {
        Some(context) if !context.verified => {
            Err(AuthenticationError::UnverifiedSignature.into())
        }
        Some(_) => match result.user() {
            Some(user) => Ok(Some(user)),
            None => Err(AuthenticationError::UnresolvedSender.into()),
        },
        None => match result.user() {
            Some(user) => Ok(Some(user)),
            None if allow_anonymous => Ok(None),
            None => Err(AuthenticationError::UnresolvedSender.into()),
        },
    }
}
