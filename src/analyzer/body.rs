//! Body normalization: trimming and plain-text line-break conversion.
//!
//! Runs after footer extraction so the conversion sees the final body.
//! Bodies that already carry markup pass through untouched, which also
//! makes the stage idempotent.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::message::MailMessage;
use crate::result::AnalyzerResult;

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

static NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

#[derive(Debug, Default)]
pub struct BodyAnalyzer;

impl BodyAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for BodyAnalyzer {
    fn name(&self) -> &'static str {
        "body"
    }

    async fn analyze(&self, message: &MailMessage, result: &mut AnalyzerResult) -> Result<()> {
        let body = result.body().unwrap_or(&message.body).trim().to_string();
        let body = if MARKUP_RE.is_match(&body) {
            body
        } else {
            NEWLINE_RE.replace_all(&body, "<br />${0}").into_owned()
        };
        result.rederive_body(body);
        Ok(())
    }
}
