// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reads the `.tags` sidecar JSON written alongside each DICOM file in
//! `incoming/`.

use crate::error::EngineError;
use std::collections::HashMap;
use std::path::Path;

/// Reads and parses `<series_folder>/<first_file>.tags`, the header fields
/// of the first file in a series folder, as a flat string-keyed map.
pub fn read_series_tags(series_dir: &Path) -> Result<HashMap<String, String>, EngineError> {
    let sidecar = first_tags_sidecar(series_dir)?;
    let contents = std::fs::read_to_string(&sidecar).map_err(|source| {
        EngineError::Spool(relay_spool::SpoolError::io(sidecar.clone(), source))
    })?;
    serde_json::from_str(&contents).map_err(|source| EngineError::MalformedTagSidecar(sidecar, source))
}

fn first_tags_sidecar(series_dir: &Path) -> Result<std::path::PathBuf, EngineError> {
    let mut entries: Vec<_> = std::fs::read_dir(series_dir)
        .map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(series_dir.to_path_buf(), source)))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tags"))
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    entries.into_iter().next().ok_or_else(|| EngineError::MissingTagSidecar(series_dir.to_path_buf()))
}
