//! Analyzer stages of the intake pipeline.
//!
//! An analyzer inspects a message and augments the shared
//! [`AnalyzerResult`](crate::result::AnalyzerResult) — it never creates
//! content. Analyzers run sequentially in configured order; an error from
//! one stage is logged by the runner and the next stage still runs.

pub mod body;
pub mod footer;
pub mod pgp;
pub mod sender;
pub mod subject;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::MailMessage;
use crate::result::AnalyzerResult;

pub use body::BodyAnalyzer;
pub use footer::FooterAnalyzer;
pub use pgp::PgpAnalyzer;
pub use sender::SenderAnalyzer;
pub use subject::SubjectAnalyzer;

/// A single pipeline stage.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stage name used as the log component.
    fn name(&self) -> &'static str;

    /// Inspect `message` and augment `result`. Errors are contained to
    /// this stage by the pipeline runner.
    async fn analyze(&self, message: &MailMessage, result: &mut AnalyzerResult) -> Result<()>;
}
