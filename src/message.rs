//! Read-only view of an inbound email message.
//!
//! The pipeline operates on an owned [`MailMessage`] tree rather than on
//! `mail_parser` types directly — analyzers need stable indexing into the
//! MIME part list, case-insensitive header access, and the exact serialized
//! form of a part for signature verification. [`MailMessage::parse`] adapts
//! a raw RFC 5322 message via `mail_parser`; tests construct the tree
//! directly.

use std::collections::HashMap;

use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::error::ParseError;

/// Parsed `Content-Type` of a message or part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type, lowercased (e.g. "multipart").
    pub ctype: String,
    /// Subtype, lowercased (e.g. "signed", "pgp-signature").
    pub subtype: String,
    /// Content-type parameters (protocol, boundary, ...).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    pub fn new(ctype: &str, subtype: &str) -> Self {
        Self {
            ctype: ctype.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// A single MIME part: headers, decoded body, and nested parts.
#[derive(Debug, Clone)]
pub struct MimePart {
    /// Header fields in original order.
    pub headers: Vec<(String, String)>,
    pub content_type: ContentType,
    /// Decoded body text. Empty for multipart containers.
    pub body: String,
    /// Child parts, in original order.
    pub parts: Vec<MimePart>,
    /// Exact wire form (headers + body) when parsed from raw bytes.
    raw: Option<String>,
}

impl MimePart {
    pub fn new(content_type: ContentType, body: &str) -> Self {
        Self {
            headers: Vec::new(),
            content_type,
            body: body.to_string(),
            parts: Vec::new(),
            raw: None,
        }
    }

    /// Plain-text part.
    pub fn text(body: &str) -> Self {
        Self::new(ContentType::new("text", "plain"), body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_parts(mut self, parts: Vec<MimePart>) -> Self {
        self.parts = parts;
        self
    }

    /// First header value matching `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type.ctype == "multipart" || !self.parts.is_empty()
    }

    /// Full serialized form (headers + body) of this part.
    ///
    /// When the part came off the wire this is the exact byte span it was
    /// parsed from; signature verification depends on that exactness.
    pub fn serialize(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }
}

/// An inbound email message: envelope headers, canonical body, MIME parts.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Raw `From` header value (display name + address form).
    pub from: String,
    /// Decoded `Subject` header.
    pub subject: String,
    /// Decoded top-level body text.
    pub body: String,
    pub content_type: ContentType,
    /// Top-level MIME parts; empty for single-part messages.
    pub parts: Vec<MimePart>,
}

impl MailMessage {
    /// Single-part plain-text message (test and demo construction).
    pub fn plain(from: &str, subject: &str, body: &str) -> Self {
        Self {
            from: from.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            content_type: ContentType::new("text", "plain"),
            parts: Vec::new(),
        }
    }

    /// Multipart message with an explicit content type.
    pub fn multipart(
        from: &str,
        subject: &str,
        content_type: ContentType,
        parts: Vec<MimePart>,
    ) -> Self {
        Self {
            from: from.to_string(),
            subject: subject.to_string(),
            body: String::new(),
            content_type,
            parts,
        }
    }

    /// Parse a raw RFC 5322 message.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or(ParseError::UnparseableMessage)?;

        let from = parsed
            .from()
            .and_then(|addr| addr.first())
            .map(|a| match (a.name(), a.address()) {
                (Some(name), Some(address)) => format!("{name} <{address}>"),
                (_, Some(address)) => address.to_string(),
                _ => String::new(),
            })
            .unwrap_or_default();

        let subject = parsed.subject().unwrap_or_default().to_string();

        let body = parsed
            .body_text(0)
            .map(|t| t.to_string())
            .or_else(|| parsed.body_html(0).map(|t| t.to_string()))
            .unwrap_or_default();

        let root = parsed.root_part();
        let content_type = convert_content_type(root.content_type());
        let parts = root
            .sub_parts()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| convert_part(&parsed, *id))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            from,
            subject,
            body,
            content_type,
            parts,
        })
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type.ctype == "multipart" || !self.parts.is_empty()
    }

    pub fn part(&self, index: usize) -> Option<&MimePart> {
        self.parts.get(index)
    }
}

fn convert_part(msg: &mail_parser::Message<'_>, id: u32) -> Option<MimePart> {
    let part = msg.part(id)?;

    // Part and header offsets are u32 byte positions into the raw message.
    let raw = msg
        .raw_message
        .get(part.offset_header as usize..part.offset_end as usize)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

    let headers = part
        .headers
        .iter()
        .filter_map(|h| {
            let value = msg
                .raw_message
                .get(h.offset_start as usize..h.offset_end as usize)?;
            Some((
                h.name.as_str().to_string(),
                String::from_utf8_lossy(value).trim().to_string(),
            ))
        })
        .collect();

    let body = match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    };

    let parts = part
        .sub_parts()
        .map(|ids| ids.iter().filter_map(|id| convert_part(msg, *id)).collect())
        .unwrap_or_default();

    Some(MimePart {
        headers,
        content_type: convert_content_type(part.content_type()),
        body,
        parts,
        raw,
    })
}

/// Parameters the pipeline consults; `mail_parser` exposes attributes by
/// name, so only these are carried over.
const KNOWN_PARAMETERS: [&str; 5] = ["protocol", "boundary", "charset", "micalg", "name"];

fn convert_content_type(ct: Option<&mail_parser::ContentType<'_>>) -> ContentType {
    match ct {
        Some(ct) => {
            let mut converted = ContentType::new(ct.ctype(), ct.subtype().unwrap_or(""));
            for name in KNOWN_PARAMETERS {
                if let Some(value) = ct.attribute(name) {
                    converted
                        .parameters
                        .insert(name.to_string(), value.to_string());
                }
            }
            converted
        }
        None => ContentType::new("text", "plain"),
    }
}
