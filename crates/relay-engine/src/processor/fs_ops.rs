// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem choreography for one processing run: snapshotting inputs,
//! rotating `out/` into `in/` between pipeline steps, and counting DICOM
//! files for the begin/complete events.

use crate::error::EngineError;
use relay_spool::SpoolError;
use std::fs;
use std::path::Path;

fn io(path: impl AsRef<Path>, source: std::io::Error) -> EngineError {
    EngineError::Spool(SpoolError::io(path.as_ref(), source))
}

/// Copies every top-level, non-hidden, non-`task.json` entry of `unit_dir`
/// into `as_received_dir`, preserving a pristine copy of what arrived
/// before any move into `in/` mutates the unit folder.
pub fn snapshot_as_received(unit_dir: &Path, as_received_dir: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(as_received_dir).map_err(|e| io(as_received_dir, e))?;
    for entry in fs::read_dir(unit_dir).map_err(|e| io(unit_dir, e))? {
        let entry = entry.map_err(|e| io(unit_dir, e))?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || name_str == "task.json" {
            continue;
        }
        let dest = as_received_dir.join(&name);
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| io(&dest, e))?;
        }
    }
    Ok(())
}

/// Moves every top-level, non-hidden, non-`task.json` entry of `unit_dir`
/// into a freshly created `in_dir`.
pub fn move_top_level_files(unit_dir: &Path, in_dir: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(in_dir).map_err(|e| io(in_dir, e))?;
    for entry in fs::read_dir(unit_dir).map_err(|e| io(unit_dir, e))? {
        let entry = entry.map_err(|e| io(unit_dir, e))?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || name_str == "task.json" || entry.path() == in_dir {
            continue;
        }
        let dest = in_dir.join(&name);
        fs::rename(entry.path(), &dest).map_err(|e| io(&dest, e))?;
    }
    Ok(())
}

/// Recursively copies a directory tree.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(dest).map_err(|e| io(dest, e))?;
    for entry in fs::read_dir(src).map_err(|e| io(src, e))? {
        let entry = entry.map_err(|e| io(src, e))?;
        let to = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to).map_err(|e| io(&to, e))?;
        }
    }
    Ok(())
}

/// Counts files with a `.dcm` extension anywhere under `dir`.
pub fn count_dicom_files(dir: &Path) -> Result<usize, EngineError> {
    let mut count = 0;
    if !dir.exists() {
        return Ok(0);
    }
    for entry in fs::read_dir(dir).map_err(|e| io(dir, e))? {
        let entry = entry.map_err(|e| io(dir, e))?;
        if entry.path().is_dir() {
            count += count_dicom_files(&entry.path())?;
        } else if entry.path().extension().is_some_and(|ext| ext == "dcm") {
            count += 1;
        }
    }
    Ok(count)
}

/// Group-writable permissions (`770` dirs / `660` files) so a container
/// running under a different UID in the same group can read and write.
#[cfg(unix)]
pub fn make_group_writable(dir: &Path) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).map_err(|e| io(dir, e))? {
        let entry = entry.map_err(|e| io(dir, e))?;
        let mode = if entry.path().is_dir() { 0o770 } else { 0o660 };
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode)).map_err(|e| io(entry.path(), e))?;
        if entry.path().is_dir() {
            make_group_writable(&entry.path())?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn make_group_writable(_dir: &Path) -> Result<(), EngineError> {
    Ok(())
}

/// Parses `out/result.json` as a module's structured output, if present.
pub fn read_result_json(out_dir: &Path) -> Result<Option<serde_json::Value>, EngineError> {
    let path = out_dir.join("result.json");
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(|e| io(&path, e))?;
    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}

/// Rotates `out/` to become the next step's `in/`, and creates a fresh
/// empty `out/` for that step.
pub fn rotate_out_to_in(in_dir: &Path, out_dir: &Path) -> Result<(), EngineError> {
    fs::remove_dir_all(in_dir).map_err(|e| io(in_dir, e))?;
    fs::rename(out_dir, in_dir).map_err(|e| io(in_dir, e))?;
    fs::create_dir_all(out_dir).map_err(|e| io(out_dir, e))?;
    Ok(())
}

/// Writes the pipeline-level `result.json`: an ordered list of
/// `(module_name, module_output)` pairs.
pub fn write_pipeline_result(out_dir: &Path, outputs: &[(String, serde_json::Value)]) -> Result<(), EngineError> {
    let path = out_dir.join("result.json");
    let value: Vec<_> = outputs.iter().map(|(name, output)| serde_json::json!([name, output])).collect();
    let contents = serde_json::to_vec_pretty(&value).map_err(|source| EngineError::MalformedTagSidecar(path.clone(), source))?;
    fs::write(&path, contents).map_err(|e| io(&path, e))
}

/// Restores a retained `input_files/` snapshot as the final `in/`, replacing
/// whatever the last pipeline step left there.
pub fn restore_input_files(unit_dir: &Path, in_dir: &Path) -> Result<(), EngineError> {
    let input_files = unit_dir.join("input_files");
    if !input_files.exists() {
        return Ok(());
    }
    if in_dir.exists() {
        fs::remove_dir_all(in_dir).map_err(|e| io(in_dir, e))?;
    }
    fs::rename(&input_files, in_dir).map_err(|e| io(in_dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_dcm_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dcm"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.dcm"), b"").unwrap();
        fs::write(dir.path().join("c.tags"), b"").unwrap();
        assert_eq!(count_dicom_files(dir.path()).unwrap(), 2);
    }

    #[test]
    fn snapshot_copies_without_removing_originals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dcm"), b"hello").unwrap();
        let snapshot = dir.path().join("as_received");
        snapshot_as_received(dir.path(), &snapshot).unwrap();
        assert!(dir.path().join("a.dcm").exists());
        assert_eq!(fs::read_to_string(snapshot.join("a.dcm")).unwrap(), "hello");
    }

    #[test]
    fn rotate_replaces_in_with_out_contents() {
        let dir = tempfile::tempdir().unwrap();
        let in_dir = dir.path().join("in");
        let out_dir = dir.path().join("out");
        fs::create_dir(&in_dir).unwrap();
        fs::create_dir(&out_dir).unwrap();
        fs::write(out_dir.join("result.json"), b"{}").unwrap();
        rotate_out_to_in(&in_dir, &out_dir).unwrap();
        assert!(in_dir.join("result.json").exists());
        assert!(out_dir.exists());
        assert!(fs::read_dir(&out_dir).unwrap().next().is_none());
    }
}
