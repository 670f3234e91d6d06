//! tempfile wrappers with consistent error context

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use kernforge::jit::FunctionInfo;
use serde::Serialize;

pub fn create_temp_dir() -> anyhow::Result<tempfile::TempDir> {
    tempfile::tempdir().context("Failed to create temporary directory for test")
}

/// Write `value` as JSON into a fresh `.json` temp file.
pub fn write_json_temp<T: Serialize>(value: &T) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::with_suffix(".json")
        .context("Failed to create temporary JSON file")?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize test value")?;
    file.write_all(json.as_bytes())
        .context("Failed to write temporary JSON file")?;
    Ok(file)
}

/// Save `info` under `dir` and return the path.
pub fn save_function(dir: &tempfile::TempDir, info: &FunctionInfo) -> anyhow::Result<PathBuf> {
    let path = dir.path().join(format!("{}.json", info.name));
    info.save(&path)
        .with_context(|| format!("Failed to save function to {}", path.display()))?;
    Ok(path)
}

#[allow(dead_code)]
pub use tempfile::{NamedTempFile, TempDir};
