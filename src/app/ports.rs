use async_trait::async_trait;

use crate::conversion::orchestrator::ConversionOutcome;

/// Receives the conversion results of one source, successes and failures alike
#[async_trait]
pub trait ConversionOutputPort: Send + Sync {
    async fn write_outcomes(&self, source_id: &str, outcomes: &[ConversionOutcome]) -> anyhow::Result<()>;
}
