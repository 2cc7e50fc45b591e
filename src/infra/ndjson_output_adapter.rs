use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::app::ports::ConversionOutputPort;
use crate::conversion::diagnostics::ConversionDiagnostics;
use crate::conversion::orchestrator::ConversionOutcome;
use crate::error::{ConverterError, Result};

/// Diagnostics line, tagged with the source and the activity it belongs to
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsLine<'a> {
    source_id: &'a str,
    activity_id: Option<Uuid>,
    #[serde(flatten)]
    diagnostics: &'a ConversionDiagnostics,
}

/// File-based implementation of ConversionOutputPort.
/// Writes `<source>_activities.ndjson` and `<source>_diagnostics.ndjson` per source.
pub struct NdjsonOutputAdapter {
    output_dir: PathBuf,
}

impl NdjsonOutputAdapter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn activities_path(&self, source_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_activities.ndjson", file_stem(source_id)))
    }

    pub fn diagnostics_path(&self, source_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_diagnostics.ndjson", file_stem(source_id)))
    }

    fn write_files(&self, source_id: &str, outcomes: &[ConversionOutcome]) -> Result<()> {
        let activities_path = self.activities_path(source_id);
        let diagnostics_path = self.diagnostics_path(source_id);

        let mut activities = open_truncated(&activities_path)?;
        let mut diagnostics = open_truncated(&diagnostics_path)?;

        let mut written = 0;
        for outcome in outcomes {
            if let Some(activity) = &outcome.activity {
                serde_json::to_writer(&mut activities, activity)?;
                activities.write_all(b"\n")?;
                written += 1;
            }
            let line = DiagnosticsLine {
                source_id,
                activity_id: outcome.activity.as_ref().map(|a| a.id),
                diagnostics: &outcome.diagnostics,
            };
            serde_json::to_writer(&mut diagnostics, &line)?;
            diagnostics.write_all(b"\n")?;
        }
        activities.flush()?;
        diagnostics.flush()?;

        info!(
            source = source_id,
            activities = written,
            diagnostics = outcomes.len(),
            path = %activities_path.display(),
            "wrote conversion output"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversionOutputPort for NdjsonOutputAdapter {
    async fn write_outcomes(&self, source_id: &str, outcomes: &[ConversionOutcome]) -> anyhow::Result<()> {
        self.write_files(source_id, outcomes)?;
        Ok(())
    }
}

fn open_truncated(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| ConverterError::Output {
            message: format!("cannot open {}: {}", path.display(), e),
        })
}

/// Keep source ids usable as file names
fn file_stem(source_id: &str) -> String {
    let stem: String = source_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}
