use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::compose::OutputFormat;
use crate::error::RushIdError;

/// Integrity record for an encoded output written to a temporary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Location of the kept temporary copy.
    pub out_path: PathBuf,
    /// Lowercase hex SHA-256 of the encoded bytes.
    pub sha256: String,
    /// Length of the encoded bytes.
    pub bytes: usize,
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> RushIdError {
    let path = path.to_path_buf();
    move |source| RushIdError::WriteError { path, source }
}

/// Write `data` to a temporary file that outlives the process and describe it.
pub(crate) fn write_temp_artifact(
    data: &[u8],
    format: OutputFormat,
) -> Result<ArtifactRecord, RushIdError> {
    let temp_dir = std::env::temp_dir();
    let suffix = format!(".{}", format.extension());
    let mut file = tempfile::Builder::new()
        .prefix("rushid-")
        .suffix(&suffix)
        .tempfile()
        .map_err(write_error(&temp_dir))?;
    file.write_all(data).map_err(write_error(file.path()))?;
    file.flush().map_err(write_error(file.path()))?;

    let (_, out_path) = file.keep().map_err(|e| RushIdError::WriteError {
        path: temp_dir.clone(),
        source: e.error,
    })?;

    let record = ArtifactRecord {
        out_path,
        sha256: sha256_hex(data),
        bytes: data.len(),
    };
    log::debug!(
        "temporary artifact {} ({} bytes, sha256 {})",
        record.out_path.display(),
        record.bytes,
        record.sha256
    );
    Ok(record)
}

/// Write the final output, creating parent directories as needed.
pub(crate) fn write_output(destination: &Path, data: &[u8]) -> Result<(), RushIdError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error(parent))?;
    }
    fs::write(destination, data).map_err(write_error(destination))?;
    log::debug!("output written: {}", destination.display());
    Ok(())
}
