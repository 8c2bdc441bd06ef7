//! Subject-prefix parsing for content targeting.
//!
//! Two bracketed grammars share the front of the subject line. The
//! generic form `[type][bundle] Title` names the entity type to create
//! and optionally its bundle; the reference form `[#id] Title` points at
//! an existing entity to attach to. A partial generic match consumes
//! only what it recognizes, so `[comment][#42] Re: post` parses the type
//! and then the reference from the residual.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::message::MailMessage;
use crate::result::AnalyzerResult;
use crate::services::EntityRegistry;

pub struct SubjectAnalyzer {
    registry: Arc<dyn EntityRegistry>,
    entity_type_re: Regex,
    bundle_re: Regex,
    reference_re: Regex,
}

impl SubjectAnalyzer {
    pub fn new(registry: Arc<dyn EntityRegistry>) -> Self {
        Self {
            registry,
            entity_type_re: Regex::new(r"^\[(\w+)\]").unwrap(),
            bundle_re: Regex::new(r"^\[(\w+)\]\s+").unwrap(),
            reference_re: Regex::new(r"^\[#(\d+)\]\s+").unwrap(),
        }
    }

    /// Strips the `[type][bundle]` prefix, validating each token against
    /// the registry. A matched bracket is consumed even when its token
    /// fails validation; only the result field stays unset then.
    fn parse_generic(&self, subject: &str, result: &mut AnalyzerResult) -> String {
        let mut rest = subject;

        if let Some(captures) = self.entity_type_re.captures(rest) {
            let token = &captures[1];
            let registered = self.registry.has_entity_type(token);
            if registered {
                result.set_entity_type(token.to_string());
            }
            rest = &rest[captures[0].len()..];

            // The bundle position is only meaningful under a recognized
            // entity type.
            if registered && let Some(captures) = self.bundle_re.captures(rest) {
                let bundle = &captures[1];
                if self.registry.has_bundle(token, bundle) {
                    result.set_bundle(bundle.to_string());
                }
                rest = &rest[captures[0].len()..];
            }
        }
        rest.trim_start().to_string()
    }

    fn parse_reference(&self, subject: &str, result: &mut AnalyzerResult) -> String {
        if let Some(captures) = self.reference_re.captures(subject) {
            result.set_reference_id(captures[1].to_string());
            return subject[captures[0].len()..].to_string();
        }
        subject.to_string()
    }
}

#[async_trait]
impl Analyzer for SubjectAnalyzer {
    fn name(&self) -> &'static str {
        "subject"
    }

    async fn analyze(&self, _message: &MailMessage, result: &mut AnalyzerResult) -> Result<()> {
        let subject = result.subject().to_string();
        let residual = self.parse_generic(&subject, result);
        let residual = self.parse_reference(&residual, result);
        debug!(
            entity_type = result.entity_type().unwrap_or("-"),
            bundle = result.bundle().unwrap_or("-"),
            reference = result.reference_id().unwrap_or("-"),
            "Parsed subject prefixes"
        );
        result.set_subject(residual);
        Ok(())
    }
}
