//! Handler configuration.

use serde::{Deserialize, Serialize};

/// How a content handler picks the bundle for new entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleTarget {
    /// Every message creates an entity of this bundle.
    Fixed(String),
    /// Take the bundle from the subject prefix; messages without a
    /// recognized bundle prefix are rejected.
    Detect,
}

impl Default for BundleTarget {
    fn default() -> Self {
        Self::Detect
    }
}

/// Configuration for the standalone-content handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentHandlerConfig {
    /// Entity type this handler creates.
    pub entity_type: String,
    pub bundle: BundleTarget,
}

impl Default for ContentHandlerConfig {
    fn default() -> Self {
        Self {
            entity_type: "node".to_string(),
            bundle: BundleTarget::Detect,
        }
    }
}

/// Configuration for the reply/comment handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentHandlerConfig {
    /// Entity type this handler creates.
    pub entity_type: String,
    /// Entity type referenced subjects point into.
    pub parent_entity_type: String,
    /// Bundle of the created comments.
    pub comment_type: String,
    /// Accept messages from senders with no directory identity.
    pub allow_anonymous: bool,
}

impl Default for CommentHandlerConfig {
    fn default() -> Self {
        Self {
            entity_type: "comment".to_string(),
            parent_entity_type: "node".to_string(),
            comment_type: "comment".to_string(),
            allow_anonymous: false,
        }
    }
}
