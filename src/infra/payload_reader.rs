use std::path::Path;
use tracing::debug;

use crate::app::convert_use_case::SourcePayload;
use crate::error::{ConverterError, Result};

/// Read an extraction payload from a JSON file. The file stem becomes the source id.
pub fn read_payload<P: AsRef<Path>>(path: P) -> Result<SourcePayload> {
    let path = path.as_ref();
    let source_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConverterError::Config(format!("cannot derive a source id from {}", path.display())))?
        .to_string();

    let content = std::fs::read_to_string(path)?;
    let payload = serde_json::from_str(&content)?;
    debug!(source = %source_id, bytes = content.len(), "read extraction payload");

    Ok(SourcePayload { source_id, payload })
}
