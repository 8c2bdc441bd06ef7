//! Sender address extraction and identity resolution.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::message::MailMessage;
use crate::result::AnalyzerResult;
use crate::services::Directory;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^@<\s]+@[^@\s>]+").unwrap());

/// First email-shaped substring of a `From`-style header value.
/// Handles bare addresses, `Name <addr>` and comment-laden forms alike.
pub fn extract_address(from: &str) -> Option<&str> {
    ADDRESS_RE.find(from).map(|m| m.as_str())
}

/// Fallback sender resolution from the envelope `From` header.
///
/// Runs after the signature stage, which claims the sender for signed
/// messages; the write-once result fields make this stage a no-op then.
pub struct SenderAnalyzer {
    directory: Arc<dyn Directory>,
}

impl SenderAnalyzer {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Analyzer for SenderAnalyzer {
    fn name(&self) -> &'static str {
        "sender"
    }

    async fn analyze(&self, message: &MailMessage, result: &mut AnalyzerResult) -> Result<()> {
        let Some(address) = extract_address(&message.from) else {
            debug!(from = %message.from, "No address found in From header");
            return Ok(());
        };
        let address = address.to_string();
        result.set_sender(address.clone());

        // An unresolved sender is not an error here: handlers decide
        // whether anonymous submission is acceptable.
        if result.user().is_none()
            && let Some(identity) = self.directory.find_identity_by_email(&address).await
        {
            result.set_user(identity);
        }
        Ok(())
    }
}
