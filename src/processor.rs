//! The intake pipeline runner.
//!
//! Runs every analyzer, then every handler, against one message. A
//! failing stage never aborts the message: the error becomes a warning
//! in the processing record and the remaining stages still run, so one
//! misconfigured handler cannot black-hole mail meant for another.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzer::{
    Analyzer, BodyAnalyzer, FooterAnalyzer, PgpAnalyzer, SenderAnalyzer, SubjectAnalyzer,
};
use crate::config::{CommentHandlerConfig, ContentHandlerConfig};
use crate::error::Result;
use crate::handler::{CommentHandler, ContentHandler, Handler, HandlerOutcome};
use crate::message::MailMessage;
use crate::result::{AnalyzerResult, LogSeverity, ProcessorResult};
use crate::services::{ContentRepository, Directory, EntityRegistry, SignatureVerifier};

/// Where a message came in; carried into the processing record.
#[derive(Debug, Clone)]
pub struct DelivererContext {
    pub id: String,
}

impl DelivererContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// External collaborators the standard pipeline is wired against.
#[derive(Clone)]
pub struct PipelineServices {
    pub directory: Arc<dyn Directory>,
    pub registry: Arc<dyn EntityRegistry>,
    pub repository: Arc<dyn ContentRepository>,
    pub verifier: Option<Arc<dyn SignatureVerifier>>,
}

pub struct Processor {
    analyzers: Vec<Arc<dyn Analyzer>>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Processor {
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>, handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            analyzers,
            handlers,
        }
    }

    /// The standard pipeline: signature handling first (it claims the
    /// sender and body for signed mail), then subject parsing, footer
    /// stripping, body normalization and fallback sender resolution,
    /// feeding the content and comment handlers.
    pub fn standard(
        services: PipelineServices,
        content: ContentHandlerConfig,
        comment: CommentHandlerConfig,
    ) -> Self {
        Self::new(
            vec![
                Arc::new(PgpAnalyzer::new(
                    Arc::clone(&services.directory),
                    services.verifier.clone(),
                )),
                Arc::new(SubjectAnalyzer::new(Arc::clone(&services.registry))),
                Arc::new(FooterAnalyzer::new()),
                Arc::new(BodyAnalyzer::new()),
                Arc::new(SenderAnalyzer::new(Arc::clone(&services.directory))),
            ],
            vec![
                Arc::new(ContentHandler::new(
                    content,
                    Arc::clone(&services.repository),
                )),
                Arc::new(CommentHandler::new(
                    comment,
                    Arc::clone(&services.repository),
                )),
            ],
        )
    }

    /// Processes one parsed message to completion.
    pub async fn process(
        &self,
        message: &MailMessage,
        deliverer: &DelivererContext,
    ) -> ProcessorResult {
        let mut outcome = ProcessorResult::new(deliverer.id.clone());
        let mut result = AnalyzerResult::for_message(message);

        for analyzer in &self.analyzers {
            if let Err(error) = analyzer.analyze(message, &mut result).await {
                warn!(component = analyzer.name(), %error, "Analyzer failed");
                outcome.log(
                    analyzer.name(),
                    LogSeverity::Warning,
                    error.to_string(),
                    serde_json::json!({ "kind": error.kind() }),
                );
            }
        }

        for handler in &self.handlers {
            match handler.invoke(message, &result).await {
                Ok(HandlerOutcome::Skipped) => {
                    debug!(component = handler.name(), "Handler skipped message");
                }
                Ok(HandlerOutcome::Created(entity)) => {
                    info!(
                        component = handler.name(),
                        entity_type = %entity.entity_type,
                        id = %entity.id,
                        "Created entity from message"
                    );
                    outcome.log(
                        handler.name(),
                        LogSeverity::Notice,
                        format!("Created {} \"{}\"", entity.entity_type, entity.label),
                        serde_json::json!({
                            "entity_type": entity.entity_type,
                            "bundle": entity.bundle,
                            "id": entity.id,
                        }),
                    );
                    outcome.created.push((&entity).into());
                }
                Err(error) => {
                    warn!(component = handler.name(), %error, "Handler rejected message");
                    outcome.log(
                        handler.name(),
                        LogSeverity::Warning,
                        error.to_string(),
                        serde_json::json!({ "kind": error.kind() }),
                    );
                }
            }
        }
        outcome
    }

    /// Parses raw RFC 5322 bytes and processes the message.
    pub async fn process_raw(
        &self,
        raw: &[u8],
        deliverer: &DelivererContext,
    ) -> Result<ProcessorResult> {
        let message = MailMessage::parse(raw)?;
        Ok(self.process(&message, deliverer).await)
    }
}
