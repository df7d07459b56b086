//! Stretch curve persistence.
//!
//! The curve file is a JSON object of note name to array-of-6 partial
//! frequencies, pretty-printed so it stays human-diffable. The core is
//! handed a concrete path; choosing it (dialogs, folders) is the
//! presentation layer's business.

use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::curve::PartialsMapping;
use crate::error::StretchError;

/// Piano name used when the user leaves the name empty.
pub const DEFAULT_PIANO_NAME: &str = "MyPiano";

/// File name convention for a saved curve: `<piano>_stretch_curve.json`.
pub fn curve_file_name(piano_name: &str) -> String {
    let name = piano_name.trim();
    let name = if name.is_empty() {
        DEFAULT_PIANO_NAME
    } else {
        name
    };
    format!("{name}_stretch_curve.json")
}

/// Writes the mapping to `path` as pretty JSON.
pub fn save(mapping: &PartialsMapping, path: &Path) -> Result<(), StretchError> {
    let json = serde_json::to_string_pretty(mapping)
        .context("serializing stretch curve")
        .map_err(|cause| storage_error(path, cause))?;
    fs::write(path, json)
        .context("writing stretch curve file")
        .map_err(|cause| storage_error(path, cause))?;
    info!("stretch curve saved to {}", path.display());
    Ok(())
}

/// Reads a mapping back from `path`. I/O and parse failures surface as
/// [`StretchError::Storage`] and leave the caller's state untouched.
pub fn load(path: &Path) -> Result<PartialsMapping, StretchError> {
    let data = fs::read_to_string(path)
        .context("reading stretch curve file")
        .map_err(|cause| storage_error(path, cause))?;
    let mapping: PartialsMapping = serde_json::from_str(&data)
        .context("parsing stretch curve file")
        .map_err(|cause| storage_error(path, cause))?;
    info!(
        "stretch curve loaded from {} ({} notes)",
        path.display(),
        mapping.len()
    );
    Ok(mapping)
}

fn storage_error(path: &Path, cause: anyhow::Error) -> StretchError {
    StretchError::Storage {
        path: path.to_path_buf(),
        cause,
    }
}
