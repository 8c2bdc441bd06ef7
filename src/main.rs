//! Demo binary: runs the standard pipeline over an .eml file against
//! in-memory services and prints the processing record as JSON.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mailintake::config::{CommentHandlerConfig, ContentHandlerConfig};
use mailintake::processor::{DelivererContext, PipelineServices, Processor};
use mailintake::services::memory::{MemoryDirectory, MemoryRegistry, MemoryRepository};
use mailintake::services::{Entity, Identity};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: mailintake <message.eml>")?;
    let raw = std::fs::read(&path).with_context(|| format!("reading {path}"))?;

    let services = PipelineServices {
        directory: Arc::new(MemoryDirectory::new(vec![Identity {
            id: "1".into(),
            name: "Demo User".into(),
            email: "demo@example.com".into(),
            fingerprint: None,
        }])),
        registry: Arc::new(
            MemoryRegistry::new()
                .register("node", &["blog", "page"])
                .register("comment", &[]),
        ),
        repository: Arc::new(MemoryRepository::new().seed(Entity {
            id: "1".into(),
            entity_type: "node".into(),
            bundle: "blog".into(),
            label: "Seeded post".into(),
            sub_entity_kinds: vec!["comment".into()],
        })),
        verifier: None,
    };

    let processor = Processor::standard(
        services,
        ContentHandlerConfig::default(),
        CommentHandlerConfig::default(),
    );
    let outcome = processor
        .process_raw(&raw, &DelivererContext::new("demo"))
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
