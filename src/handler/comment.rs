//! Comment creation from `[#id]`-referenced messages.
//!
//! Claims a message when the subject explicitly names the comment entity
//! type, or when it carries only a reference prefix; a bare `[#42]`
//! subject is a reply and nothing else.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::CommentHandlerConfig;
use crate::error::{AuthorizationError, ReferenceError, Result};
use crate::handler::{Handler, HandlerOutcome, authenticate};
use crate::message::MailMessage;
use crate::result::AnalyzerResult;
use crate::services::{ContentRepository, NewEntity};

pub struct CommentHandler {
    config: CommentHandlerConfig,
    repository: Arc<dyn ContentRepository>,
}

impl CommentHandler {
    pub fn new(config: CommentHandlerConfig, repository: Arc<dyn ContentRepository>) -> Self {
        Self { config, repository }
    }

    fn targets_this_handler(&self, result: &AnalyzerResult) -> bool {
        match result.entity_type() {
            Some(entity_type) => entity_type == self.config.entity_type,
            None => result.reference_id().is_some(),
        }
    }
}

#[async_trait]
impl Handler for CommentHandler {
    fn name(&self) -> &'static str {
        "comment"
    }

    async fn invoke(
        &self,
        message: &MailMessage,
        result: &AnalyzerResult,
    ) -> Result<HandlerOutcome> {
        if !self.targets_this_handler(result) {
            debug!(
                target_type = %self.config.entity_type,
                "Message does not target this handler"
            );
            return Ok(HandlerOutcome::Skipped);
        }

        let user = authenticate(result, self.config.allow_anonymous)?;

        let reference_id = result
            .reference_id()
            .ok_or(ReferenceError::MissingReferenceId)?;
        let parent = self
            .repository
            .load(&self.config.parent_entity_type, reference_id)
            .await
            .ok_or_else(|| ReferenceError::NotFound {
                entity_type: self.config.parent_entity_type.clone(),
                id: reference_id.to_string(),
            })?;
        if !parent.supports_sub_entity(&self.config.entity_type) {
            return Err(ReferenceError::Unsupported {
                entity_type: parent.entity_type.clone(),
                id: parent.id.clone(),
                bundle: parent.bundle.clone(),
                kind: self.config.entity_type.clone(),
            }
            .into());
        }

        let access = self
            .repository
            .check_create_access(&self.config.entity_type, &self.config.comment_type, user)
            .await;
        if !access.allowed {
            return Err(AuthorizationError::CreateDenied {
                entity_type: self.config.entity_type.clone(),
                bundle: self.config.comment_type.clone(),
                reason: access.reason,
            }
            .into());
        }

        let entity = self
            .repository
            .create(NewEntity {
                entity_type: self.config.entity_type.clone(),
                bundle: self.config.comment_type.clone(),
                title: result.subject().to_string(),
                body: result
                    .body()
                    .map(str::to_string)
                    .unwrap_or_else(|| message.body.clone()),
                owner: user.cloned(),
                fields: serde_json::json!({
                    "parent_entity_type": self.config.parent_entity_type,
                    "parent_entity_id": parent.id,
                }),
            })
            .await?;
        Ok(HandlerOutcome::Created(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Entity, Identity};
    use crate::services::memory::MemoryRepository;

    fn parent_post() -> Entity {
        Entity {
            id: "42".into(),
            entity_type: "node".into(),
            bundle: "blog".into(),
            label: "First post".into(),
            sub_entity_kinds: vec!["comment".into()],
        }
    }

    fn make_result(reference_id: Option<&str>) -> AnalyzerResult {
        let mut result = AnalyzerResult::default();
        result.set_subject("Nice post!".into());
        if let Some(id) = reference_id {
            result.set_reference_id(id.into());
        }
        result.set_user(Identity {
            id: "1".into(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            fingerprint: None,
        });
        result.set_body("Great read.".into());
        result
    }

    fn handler(repository: Arc<MemoryRepository>) -> CommentHandler {
        CommentHandler::new(CommentHandlerConfig::default(), repository)
    }

    #[tokio::test]
    async fn creates_comment_on_referenced_post() {
        let repository = Arc::new(MemoryRepository::new().seed(parent_post()));
        let message = MailMessage::plain("alice@example.com", "[#42] Nice post!", "Great read.");
        let result = make_result(Some("42"));

        let outcome = handler(Arc::clone(&repository))
            .invoke(&message, &result)
            .await
            .unwrap();
        let HandlerOutcome::Created(entity) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(entity.entity_type, "comment");
        assert_eq!(entity.label, "Nice post!");
        assert_eq!(repository.entities().len(), 2);
    }

    #[tokio::test]
    async fn explicit_comment_type_targets_handler() {
        let repository = Arc::new(MemoryRepository::new().seed(parent_post()));
        let message = MailMessage::plain("alice@example.com", "[comment][#42] Re", "text");
        let mut result = make_result(Some("42"));
        result.set_entity_type("comment".into());

        let outcome = handler(repository).invoke(&message, &result).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Created(_)));
    }

    #[tokio::test]
    async fn skips_message_targeting_other_type() {
        let repository = Arc::new(MemoryRepository::new().seed(parent_post()));
        let message = MailMessage::plain("alice@example.com", "[node][blog] Post", "text");
        let mut result = make_result(None);
        result.set_entity_type("node".into());

        let outcome = handler(Arc::clone(&repository))
            .invoke(&message, &result)
            .await
            .unwrap();
        assert!(matches!(outcome, HandlerOutcome::Skipped));
        assert_eq!(repository.entities().len(), 1);
    }

    #[tokio::test]
    async fn skips_plain_message_without_reference() {
        let repository = Arc::new(MemoryRepository::new());
        let message = MailMessage::plain("alice@example.com", "Hello", "text");
        let result = make_result(None);

        let outcome = handler(repository).invoke(&message, &result).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Skipped));
    }

    #[tokio::test]
    async fn explicit_type_without_reference_is_rejected() {
        let repository = Arc::new(MemoryRepository::new());
        let message = MailMessage::plain("alice@example.com", "[comment] Hello", "text");
        let mut result = make_result(None);
        result.set_entity_type("comment".into());

        let err = handler(repository).invoke(&message, &result).await.unwrap_err();
        assert_eq!(err.kind(), "reference");
    }

    #[tokio::test]
    async fn unknown_parent_is_rejected() {
        let repository = Arc::new(MemoryRepository::new());
        let message = MailMessage::plain("alice@example.com", "[#7] Hello", "text");
        let result = make_result(Some("7"));

        let err = handler(repository).invoke(&message, &result).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Reference(ReferenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn parent_without_comment_support_is_rejected() {
        let mut parent = parent_post();
        parent.sub_entity_kinds.clear();
        let repository = Arc::new(MemoryRepository::new().seed(parent));
        let message = MailMessage::plain("alice@example.com", "[#42] Hello", "text");
        let result = make_result(Some("42"));

        let err = handler(repository).invoke(&message, &result).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Reference(ReferenceError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn anonymous_allowed_when_configured() {
        let repository = Arc::new(MemoryRepository::new().seed(parent_post()));
        let handler = CommentHandler::new(
            CommentHandlerConfig {
                allow_anonymous: true,
                ..Default::default()
            },
            Arc::clone(&repository) as Arc<dyn ContentRepository>,
        );
        let message = MailMessage::plain("stranger@example.com", "[#42] Hello", "text");
        let mut result = AnalyzerResult::default();
        result.set_subject("Hello".into());
        result.set_reference_id("42".into());

        let outcome = handler.invoke(&message, &result).await.unwrap();
        let HandlerOutcome::Created(entity) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(entity.entity_type, "comment");
    }

    #[tokio::test]
    async fn anonymous_rejected_by_default() {
        let repository = Arc::new(MemoryRepository::new().seed(parent_post()));
        let message = MailMessage::plain("stranger@example.com", "[#42] Hello", "text");
        let mut result = AnalyzerResult::default();
        result.set_reference_id("42".into());

        let err = handler(repository).invoke(&message, &result).await.unwrap_err();
        assert_eq!(err.kind(), "authentication");
    }
}
