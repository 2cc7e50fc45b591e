use anyhow::{Context, Result};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{info, info_span};

use crate::app::ports::ConversionOutputPort;
use crate::conversion::orchestrator::{BatchSummary, ConversionOutcome, Converter};

/// One extraction payload and the source it was scraped from
#[derive(Debug, Clone)]
pub struct SourcePayload {
    pub source_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_id: String,
    pub summary: BatchSummary,
}

/// Use case for converting extraction payloads and handing the results to an output port
pub struct ConvertUseCase {
    converter: Converter,
    output: Box<dyn ConversionOutputPort>,
}

impl ConvertUseCase {
    pub fn new(converter: Converter, output: Box<dyn ConversionOutputPort>) -> Self {
        Self { converter, output }
    }

    /// Convert a single source's payload and write the results
    pub async fn convert_source(&self, source: SourcePayload) -> Result<SourceReport> {
        let span = info_span!("convert_source", source = %source.source_id);
        let converter = self.converter.clone();
        let SourcePayload { source_id, payload } = source;

        let outcomes = tokio::task::spawn_blocking(move || {
            let _entered = span.entered();
            converter.convert_all(&payload)
        })
        .await
        .with_context(|| format!("conversion task for {} panicked", source_id))?;

        self.write(&source_id, outcomes).await
    }

    /// Convert many sources concurrently. Results are written as each source
    /// finishes, so ordering between sources is not preserved.
    pub async fn convert_sources(&self, sources: Vec<SourcePayload>) -> Result<Vec<SourceReport>> {
        let mut tasks = JoinSet::new();
        for source in sources {
            let converter = self.converter.clone();
            tasks.spawn_blocking(move || {
                let outcomes = converter.convert_all(&source.payload);
                (source.source_id, outcomes)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (source_id, outcomes) = joined.context("conversion task panicked")?;
            reports.push(self.write(&source_id, outcomes).await?);
        }

        info!(sources = reports.len(), "all sources converted");
        Ok(reports)
    }

    async fn write(&self, source_id: &str, outcomes: Vec<ConversionOutcome>) -> Result<SourceReport> {
        let summary = BatchSummary::from_outcomes(&outcomes);
        self.output
            .write_outcomes(source_id, &outcomes)
            .await
            .with_context(|| format!("writing results for {}", source_id))?;

        info!(
            source = source_id,
            converted = summary.converted,
            failed = summary.failed,
            "source converted"
        );
        Ok(SourceReport {
            source_id: source_id.to_string(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MockConversionOutput {
        pub written: Arc<tokio::sync::Mutex<HashMap<String, Vec<ConversionOutcome>>>>,
    }

    impl MockConversionOutput {
        pub fn new() -> Self {
            Self {
                written: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            }
        }
    }

    #[async_trait]
    impl ConversionOutputPort for MockConversionOutput {
        async fn write_outcomes(&self, source_id: &str, outcomes: &[ConversionOutcome]) -> Result<()> {
            self.written
                .lock()
                .await
                .insert(source_id.to_string(), outcomes.to_vec());
            Ok(())
        }
    }

    struct FailingOutput;

    #[async_trait]
    impl ConversionOutputPort for FailingOutput {
        async fn write_outcomes(&self, _source_id: &str, _outcomes: &[ConversionOutcome]) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn use_case(output: Box<dyn ConversionOutputPort>) -> ConvertUseCase {
        ConvertUseCase::new(Converter::new(ConverterConfig::default()), output)
    }

    #[tokio::test]
    async fn test_convert_source() {
        let output = Box::new(MockConversionOutput::new());
        let written = output.written.clone();
        let use_case = use_case(output);

        let report = use_case
            .convert_source(SourcePayload {
                source_id: "seattle_parks".to_string(),
                payload: json!({"events": [
                    {"title": "Toddler Tumble", "location": "Rainier Community Center"},
                    {"description": "missing title"}
                ]}),
            })
            .await
            .unwrap();

        assert_eq!(report.summary.converted, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(written.lock().await["seattle_parks"].len(), 2);
    }

    #[tokio::test]
    async fn test_convert_sources_concurrently() {
        let output = Box::new(MockConversionOutput::new());
        let written = output.written.clone();
        let use_case = use_case(output);

        let sources: Vec<SourcePayload> = (0..4)
            .map(|i| SourcePayload {
                source_id: format!("source_{}", i),
                payload: json!({"activities": [{"name": format!("Class {}", i), "venue": "Library"}]}),
            })
            .collect();

        let reports = use_case.convert_sources(sources).await.unwrap();
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.summary.converted == 1));
        assert_eq!(written.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_output_failure_is_reported() {
        let use_case = use_case(Box::new(FailingOutput));
        let err = use_case
            .convert_source(SourcePayload {
                source_id: "broken".to_string(),
                payload: json!({}),
            })
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
    }
}
