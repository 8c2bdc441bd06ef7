//! Standalone-content creation from `[type][bundle]`-prefixed messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{BundleTarget, ContentHandlerConfig};
use crate::error::{AuthorizationError, ParseError, Result};
use crate::handler::{Handler, HandlerOutcome, authenticate};
use crate::message::MailMessage;
use crate::result::AnalyzerResult;
use crate::services::{ContentRepository, NewEntity};

pub struct ContentHandler {
    config: ContentHandlerConfig,
    repository: Arc<dyn ContentRepository>,
}

impl ContentHandler {
    pub fn new(config: ContentHandlerConfig, repository: Arc<dyn ContentRepository>) -> Self {
        Self { config, repository }
    }

    fn resolve_bundle(&self, result: &AnalyzerResult) -> Result<String> {
        match &self.config.bundle {
            BundleTarget::Fixed(bundle) => Ok(bundle.clone()),
            BundleTarget::Detect => result
                .bundle()
                .map(str::to_string)
                .ok_or_else(|| {
                    ParseError::UnresolvedBundle {
                        entity_type: self.config.entity_type.clone(),
                    }
                    .into()
                }),
        }
    }
}

#[async_trait]
impl Handler for ContentHandler {
    fn name(&self) -> &'static str {
        "content"
    }

    async fn invoke(
        &self,
        message: &MailMessage,
        result: &AnalyzerResult,
    ) -> Result<HandlerOutcome> {
        if result.entity_type() != Some(self.config.entity_type.as_str()) {
            debug!(
                target_type = %self.config.entity_type,
                "Message does not target this handler"
            );
            return Ok(HandlerOutcome::Skipped);
        }

        let user = authenticate(result, false)?;
        let bundle = self.resolve_bundle(result)?;

        let access = self
            .repository
            .check_create_access(&self.config.entity_type, &bundle, user)
            .await;
        if !access.allowed {
            return Err(AuthorizationError::CreateDenied {
                entity_type: self.config.entity_type.clone(),
                bundle,
                reason: access.reason,
            }
            .into());
        }

        let entity = self
            .repository
            .create(NewEntity {
                entity_type: self.config.entity_type.clone(),
                bundle,
                title: result.subject().to_string(),
                body: result
                    .body()
                    .map(str::to_string)
                    .unwrap_or_else(|| message.body.clone()),
                owner: user.cloned(),
                fields: serde_json::json!({}),
            })
            .await?;
        Ok(HandlerOutcome::Created(entity))
    }
}
