//! Signature-footer and quoted-reply detection.
//!
//! Two heuristics run in order. The canonical `-- ` delimiter (RFC 3676
//! signature separator) splits off a footer; failing that, a Gmail-style
//! "On <date> ... wrote:" attribution line truncates the body. Signed
//! messages are left untouched: stripping content from a signed body
//! would invalidate what the signature attests to.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::message::MailMessage;
use crate::result::AnalyzerResult;

static SIGNATURE_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\r\n]--\s+").unwrap());

static QUOTED_REPLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"On [A-Za-z]{3}, [A-Za-z]{3} [0-9]{1,2}, 20[0-9]{2} at [0-9]{1,2}:[0-9]{2} (?:AM|PM).+",
    )
    .unwrap()
});

#[derive(Debug, Default)]
pub struct FooterAnalyzer;

impl FooterAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for FooterAnalyzer {
    fn name(&self) -> &'static str {
        "footer"
    }

    async fn analyze(&self, message: &MailMessage, result: &mut AnalyzerResult) -> Result<()> {
        if result.signature().is_some() {
            debug!("Skipping footer extraction for signed message");
            return Ok(());
        }
        // A footer has already been split off; re-splitting the body
        // would truncate it without anywhere to put the new footer.
        if result.footer().is_some() {
            return Ok(());
        }

        let body = result
            .body()
            .map(str::to_string)
            .unwrap_or_else(|| message.body.clone());

        let mut segments: Vec<&str> = SIGNATURE_SEPARATOR_RE.split(&body).collect();
        if segments.len() > 1 {
            let footer = segments
                .pop()
                .unwrap_or_default()
                .trim()
                .to_string();
            let remaining = segments.join("\n-- \n");
            result.rederive_body(remaining);
            result.set_footer(footer);
            return Ok(());
        }

        if let Some(found) = QUOTED_REPLY_RE.find(&body) {
            let footer = body[found.start()..].trim().to_string();
            let remaining = body[..found.start()].to_string();
            result.rederive_body(remaining);
            result.set_footer(footer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SignatureContext;

    async fn run(body: &str) -> AnalyzerResult {
        let message = MailMessage::plain("a@x.com", "Subject", body);
        let mut result = AnalyzerResult::for_message(&message);
        FooterAnalyzer::new()
            .analyze(&message, &mut result)
            .await
            .unwrap();
        result
    }

    #[tokio::test]
    async fn splits_on_signature_separator() {
        let result = run("Hi\n-- \nJohn\njohn@example.com").await;
        assert_eq!(result.body(), Some("Hi"));
        assert_eq!(result.footer(), Some("John\njohn@example.com"));
    }

    #[tokio::test]
    async fn last_separator_wins_and_earlier_ones_are_restored() {
        let result = run("First\n-- \nMiddle\n-- \nFooter text").await;
        assert_eq!(result.body(), Some("First\n-- \nMiddle"));
        assert_eq!(result.footer(), Some("Footer text"));
    }

    #[tokio::test]
    async fn detects_gmail_quoted_reply() {
        let body = "Thanks!\n\nOn Mon, Jun 6, 2016 at 10:37 AM, Alice <a@x.com> wrote:\n> Original";
        let result = run(body).await;
        assert_eq!(result.body(), Some("Thanks!\n\n"));
        assert!(result.footer().unwrap().starts_with("On Mon, Jun 6, 2016"));
    }

    #[tokio::test]
    async fn plain_body_is_untouched() {
        let result = run("No footer in here").await;
        assert!(result.body().is_none());
        assert!(result.footer().is_none());
    }

    #[tokio::test]
    async fn signed_message_is_skipped() {
        let message = MailMessage::plain("a@x.com", "Subject", "Hi\n-- \nFooter");
        let mut result = AnalyzerResult::for_message(&message);
        result.set_signature(SignatureContext::inline("Hi\r\n-- \r\nFooter".into()));
        result.set_body("Hi\n-- \nFooter".into());

        FooterAnalyzer::new()
            .analyze(&message, &mut result)
            .await
            .unwrap();
        assert_eq!(result.body(), Some("Hi\n-- \nFooter"));
        assert!(result.footer().is_none());
    }

    #[tokio::test]
    async fn second_pass_is_a_noop() {
        let message = MailMessage::plain("a@x.com", "Subject", "Hi\n-- \nFooter");
        let mut result = AnalyzerResult::for_message(&message);
        let analyzer = FooterAnalyzer::new();

        analyzer.analyze(&message, &mut result).await.unwrap();
        analyzer.analyze(&message, &mut result).await.unwrap();
        assert_eq!(result.body(), Some("Hi"));
        assert_eq!(result.footer(), Some("Footer"));
    }

    #[tokio::test]
    async fn second_pass_leaves_rejoined_delimiters_alone() {
        // The extracted body still contains a rejoined delimiter; a
        // second pass must not split it again.
        let message = MailMessage::plain("a@x.com", "Subject", "First\n-- \nMiddle\n-- \nFooter text");
        let mut result = AnalyzerResult::for_message(&message);
        let analyzer = FooterAnalyzer::new();

        analyzer.analyze(&message, &mut result).await.unwrap();
        analyzer.analyze(&message, &mut result).await.unwrap();
        assert_eq!(result.body(), Some("First\n-- \nMiddle"));
        assert_eq!(result.footer(), Some("Footer text"));
    }
}
