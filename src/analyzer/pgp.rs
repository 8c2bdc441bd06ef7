//! PGP signature detection, verification and signed-body extraction.
//!
//! Two mutually exclusive protocols are supported: RFC 3156
//! multipart/signed (detached signature part) and RFC 4880 §7 cleartext
//! signatures embedded in the body. Detection populates the signature
//! context; the sender is then resolved from the signed headers where
//! available, the signature is verified against the sender's registered
//! fingerprint, and the canonical body is extracted from the signed text.
//!
//! Verification failure aborts the remaining steps of this stage only:
//! the context stays attached with `verified = false`, which makes every
//! handler reject the message at authentication.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::analyzer::sender::extract_address;
use crate::error::{AuthenticationError, ParseError, Result, VerificationError};
use crate::message::{MailMessage, MimePart};
use crate::result::{AnalyzerResult, PgpType, SignatureContext};
use crate::services::{Directory, SignatureVerifier};

const PGP_SIGNED_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const PGP_SIGNATURE_BEGIN: &str = "-----BEGIN PGP SIGNATURE-----";
const PGP_SIGNATURE_END: &str = "-----END PGP SIGNATURE-----";

/// Signature detector and verifier stage.
pub struct PgpAnalyzer {
    directory: Arc<dyn Directory>,
    /// External crypto backend; `None` means verification always fails
    /// with a missing-backend error.
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl PgpAnalyzer {
    pub fn new(
        directory: Arc<dyn Directory>,
        verifier: Option<Arc<dyn SignatureVerifier>>,
    ) -> Self {
        Self {
            directory,
            verifier,
        }
    }

    /// Resolves the sender, preferring the `From` header of the signed
    /// part over the unsigned envelope header for MIME signatures.
    async fn find_sender(
        &self,
        message: &MailMessage,
        result: &mut AnalyzerResult,
    ) -> Result<()> {
        let from = {
            let signed_from = result
                .signature()
                .filter(|ctx| ctx.pgp_type == PgpType::Mime)
                .and_then(|ctx| ctx.signed_part_index)
                .and_then(|index| message.part(index))
                .and_then(|part| part.header("From"));
            signed_from.unwrap_or(&message.from).to_string()
        };

        if let Some(address) = extract_address(&from) {
            let address = address.to_string();
            result.set_sender(address.clone());
            if result.user().is_none()
                && let Some(identity) = self.directory.find_identity_by_email(&address).await
            {
                result.set_user(identity);
            }
        }

        if result.user().is_none() {
            return Err(AuthenticationError::UnresolvedSender.into());
        }
        Ok(())
    }

    /// Verifies the signature context against the resolved identity's
    /// registered fingerprint. Mutates nothing but the `verified` flag.
    fn verify_signature(&self, result: &mut AnalyzerResult) -> Result<()> {
        let Some(verifier) = &self.verifier else {
            return Err(VerificationError::MissingBackend.into());
        };

        let (reported, expected) = {
            let Some(ctx) = result.signature() else {
                return Ok(());
            };
            let report = verifier.verify(&ctx.signed_text, ctx.signature.as_deref())?;
            if !report.trust.is_sufficient() {
                return Err(VerificationError::TrustTooLow {
                    level: report.trust.label().to_string(),
                }
                .into());
            }

            let user = result
                .user()
                .ok_or(AuthenticationError::UnresolvedSender)?;
            let expected =
                user.fingerprint
                    .clone()
                    .ok_or_else(|| VerificationError::NoRegisteredKey {
                        email: user.email.clone(),
                    })?;
            (report.fingerprint, expected)
        };

        if reported != expected {
            return Err(VerificationError::FingerprintMismatch { reported, expected }.into());
        }

        let key = verifier.key_info(&reported)?;
        if let Some(status) = key.unusable_status() {
            return Err(VerificationError::KeyUnusable {
                fingerprint: reported,
                status,
            }
            .into());
        }

        result.mark_signature_verified();
        Ok(())
    }

    /// Derives the canonical body from the signed text.
    fn find_body(&self, message: &MailMessage, result: &mut AnalyzerResult) {
        let Some(ctx) = result.signature() else {
            return;
        };
        let body = match ctx.pgp_type {
            PgpType::Mime => ctx
                .signed_part_index
                .and_then(|index| message.part(index))
                .map(collect_signed_body)
                .unwrap_or_else(|| message.body.clone()),
            PgpType::Inline => inline_digest(&ctx.signed_text),
        };
        result.set_body(body);
    }
}

#[async_trait]
impl Analyzer for PgpAnalyzer {
    fn name(&self) -> &'static str {
        "pgp"
    }

    async fn analyze(&self, message: &MailMessage, result: &mut AnalyzerResult) -> Result<()> {
        let Some(context) = detect(message)? else {
            return Ok(());
        };
        debug!(pgp_type = ?context.pgp_type, "Detected PGP-signed message");

        // For MIME signatures the signed part's Subject supersedes the
        // envelope subject, which is outside the signed envelope.
        if let Some(subject) = context
            .signed_part_index
            .and_then(|index| message.part(index))
            .and_then(|part| part.header("Subject"))
        {
            result.set_subject(subject.to_string());
        }
        result.set_signature(context);

        self.find_sender(message, result).await?;
        self.verify_signature(result)?;
        self.find_body(message, result);
        Ok(())
    }
}

/// Identifies whether the message is signed and builds the context.
///
/// Returns `Ok(None)` for unsigned messages; body, footer and sender
/// extraction then operate on the original content.
fn detect(message: &MailMessage) -> std::result::Result<Option<SignatureContext>, ParseError> {
    if message.is_multipart() {
        // RFC 3156: the content type must carry a protocol parameter
        // with the value "application/pgp-signature".
        if message.content_type.parameter("protocol") != Some("application/pgp-signature") {
            return Ok(None);
        }
        let Some(signature_index) = message
            .parts
            .iter()
            .position(|part| part.content_type.subtype == "pgp-signature")
        else {
            return Ok(None);
        };
        let signed_index = (0..message.parts.len())
            .find(|index| *index != signature_index)
            .ok_or(ParseError::MissingSignedPart)?;

        let signature = message.parts[signature_index].body.trim().to_string();
        // The signature covers exact bytes: headers included, CRLF line
        // endings (RFC 3156 §5).
        let signed_text = normalize_crlf(&message.parts[signed_index].serialize());
        return Ok(Some(SignatureContext::mime(
            signed_text,
            signature,
            signed_index,
        )));
    }

    // RFC 4880 §7 cleartext signature framing.
    let body = normalize_lf(&message.body);
    let starts_with_pgp_header = body.starts_with(&format!("{PGP_SIGNED_HEADER}\nHash:"));
    if !starts_with_pgp_header {
        return Ok(None);
    }
    let has_signature = body.contains(&format!("\n{PGP_SIGNATURE_BEGIN}\n"));
    let ends_with_signature = body
        .find(&format!("\n{PGP_SIGNATURE_END}"))
        .is_some_and(|pos| body[pos..].trim() == PGP_SIGNATURE_END);
    if has_signature && ends_with_signature {
        return Ok(Some(SignatureContext::inline(normalize_crlf(&body))));
    }
    Ok(None)
}

/// Concatenates the leaf bodies under the signed part. A nested
/// multipart child (e.g. alternative plain/HTML) contributes its HTML
/// child's body specifically.
fn collect_signed_body(part: &MimePart) -> String {
    if part.parts.is_empty() {
        return part.body.clone();
    }
    let mut body = String::new();
    for child in &part.parts {
        if child.is_multipart() {
            for nested in &child.parts {
                if nested.content_type.subtype == "html" {
                    body.push_str(&nested.body);
                }
            }
        } else {
            body.push_str(&child.body);
        }
    }
    body
}

/// Extracts the message digest from a cleartext-signed body: everything
/// before the signature block, minus the armor header line, an optional
/// `Hash:` line and the following blank line.
fn inline_digest(signed_text: &str) -> String {
    let before_signature = signed_text
        .split(PGP_SIGNATURE_BEGIN)
        .next()
        .unwrap_or_default();

    let mut lines = before_signature.lines();
    // Armor header line.
    lines.next();
    let mut rest: Vec<&str> = lines.collect();
    if rest
        .first()
        .is_some_and(|line| line.to_ascii_lowercase().starts_with("hash:"))
    {
        rest.remove(0);
    }
    if rest.first().is_some_and(|line| line.trim().is_empty()) {
        rest.remove(0);
    }
    rest.join("\n")
}

fn normalize_lf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Normalizes all line endings to CRLF, the form signatures are
/// computed over.
pub(crate) fn normalize_crlf(text: &str) -> String {
    normalize_lf(text).replace('\n', "\r\n")
}
