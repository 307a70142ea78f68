use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::error::AggregationError;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Error with `MissingInput` unless `path` is an existing file.
pub fn require_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(AggregationError::MissingInput { path: path.to_path_buf() }.into());
    }
    Ok(())
}

/// File stem of `path` as a string, if it has one.
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string)
}
