// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The spool tree and its lock protocol.

use crate::error::SpoolError;
use relay_core::{Stage, UnitRef};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".lock";
const PROCESSING_FILE: &str = ".processing";
const COMPLETE_FORCE_FILE: &str = ".complete_force";
const HALT_FILE: &str = ".halt";

/// Owns the spool root and exposes one operation per well-known folder.
#[derive(Debug, Clone)]
pub struct Spool {
    root: PathBuf,
}

impl Spool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Spool { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    /// Ensures all nine well-known directories exist.
    pub fn ensure_layout(&self) -> Result<(), SpoolError> {
        for stage in Stage::ALL {
            let dir = self.stage_dir(stage);
            fs::create_dir_all(&dir).map_err(|source| SpoolError::io(dir, source))?;
        }
        Ok(())
    }

    /// Whether `<folder>/.halt` is present, suspending scans of this stage
    /// without dropping in-flight work.
    pub fn is_halted(&self, stage: Stage) -> bool {
        stage.supports_halt() && self.stage_dir(stage).join(HALT_FILE).exists()
    }

    /// Folder names directly under `stage`, sorted for the deterministic
    /// within-scan ordering the worker loops rely on.
    pub fn folder_names(&self, stage: Stage) -> Result<Vec<String>, SpoolError> {
        let dir = self.stage_dir(stage);
        let mut names = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(source) => return Err(SpoolError::io(dir, source)),
        };
        for entry in entries {
            let entry = entry.map_err(|source| SpoolError::io(&dir, source))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Units in `stage` eligible for a scan: unlocked, not mid-`.processing`,
    /// and carrying either a `task.json` or at least one payload file
    /// — the scan rule every stage worker shares.
    pub fn scan_ready(&self, stage: Stage) -> Result<Vec<UnitRef>, SpoolError> {
        let mut ready = Vec::new();
        for folder in self.folder_names(stage)? {
            let unit = UnitRef::new(stage, &self.root, folder);
            if unit.path.join(LOCK_FILE).exists() {
                continue;
            }
            if unit.path.join(PROCESSING_FILE).exists() {
                continue;
            }
            if !Self::is_ready(&unit.path)? {
                continue;
            }
            ready.push(unit);
        }
        Ok(ready)
    }

    fn is_ready(path: &Path) -> Result<bool, SpoolError> {
        if path.join("task.json").exists() {
            return Ok(true);
        }
        let mut entries = fs::read_dir(path).map_err(|source| SpoolError::io(path, source))?;
        Ok(entries.any(|entry| {
            entry.ok().is_some_and(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                !name.starts_with('.')
            })
        }))
    }

    /// Atomically acquires `<unit>/.lock`. Fails if already present — no
    /// separate existence check, avoiding the TOCTOU race.
    pub fn acquire_lock(&self, unit: &Path) -> Result<UnitLock, SpoolError> {
        let lock_path = unit.join(LOCK_FILE);
        OpenOptions::new().write(true).create_new(true).open(&lock_path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                SpoolError::AlreadyLocked { path: lock_path.clone() }
            } else {
                SpoolError::io(lock_path.clone(), source)
            }
        })?;
        Ok(UnitLock { path: lock_path })
    }

    pub fn mark_processing(&self, unit: &Path) -> Result<(), SpoolError> {
        let path = unit.join(PROCESSING_FILE);
        fs::write(&path, b"").map_err(|source| SpoolError::io(path, source))
    }

    pub fn unmark_processing(&self, unit: &Path) -> Result<(), SpoolError> {
        let path = unit.join(PROCESSING_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SpoolError::io(path, source)),
        }
    }

    /// Age of a `.processing` marker, for the "stale marker" restart check
    /// (deletable only with an explicit `force=true` after five minutes).
    pub fn processing_marker_age(&self, unit: &Path) -> Result<Option<std::time::Duration>, SpoolError> {
        let path = unit.join(PROCESSING_FILE);
        match fs::metadata(&path) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|source| SpoolError::io(&path, source))?;
                Ok(Some(modified.elapsed().unwrap_or_default()))
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SpoolError::io(path, source)),
        }
    }

    pub fn mark_complete_force(&self, unit: &Path) -> Result<(), SpoolError> {
        let path = unit.join(COMPLETE_FORCE_FILE);
        fs::write(&path, b"").map_err(|source| SpoolError::io(path, source))
    }

    pub fn has_complete_force_marker(&self, unit: &Path) -> bool {
        unit.join(COMPLETE_FORCE_FILE).exists()
    }

    /// Moves a unit to `dest_stage`:
    /// create destination, acquire its lock, move every entry except the
    /// source `.lock`, release the destination lock, then drop the source
    /// lock and remove the now-empty source folder.
    ///
    /// Takes ownership of `src_lock` as proof the caller holds the unit's
    /// lock; the lock is consumed as part of the move rather than released
    /// separately by the caller.
    ///
    /// The move is not transactional: a crash between steps leaves two
    /// locked copies for an operator to resolve, matching the documented
    /// failure semantics.
    pub fn move_unit(
        &self,
        src: &UnitRef,
        src_lock: UnitLock,
        dest_stage: Stage,
        dest_folder: &str,
    ) -> Result<UnitRef, SpoolError> {
        let dest = UnitRef::new(dest_stage, &self.root, dest_folder);
        fs::create_dir_all(&dest.path).map_err(|source| SpoolError::io(&dest.path, source))?;
        let dest_lock = self.acquire_lock(&dest.path)?;

        let entries = fs::read_dir(&src.path).map_err(|source| SpoolError::io(&src.path, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| SpoolError::io(&src.path, source))?;
            let name = entry.file_name();
            if name == LOCK_FILE {
                continue;
            }
            let to = dest.path.join(&name);
            fs::rename(entry.path(), &to).map_err(|source| SpoolError::io(to, source))?;
        }

        dest_lock.release()?;
        src_lock.release()?;
        fs::remove_dir(&src.path).map_err(|source| SpoolError::io(&src.path, source))?;
        Ok(dest)
    }
}

/// RAII-ish handle to an acquired `.lock` file.
///
/// Deliberately does NOT remove the lock on an unwinding panic or process
/// abort — only [`UnitLock::release`] removes it. A process crash between
/// `acquire_lock` and `release` leaves a dangling lock on disk by design —
/// the system must not auto-resolve this silently.
#[must_use = "an unreleased lock is left dangling on disk for operator review"]
pub struct UnitLock {
    path: PathBuf,
}

impl UnitLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> Result<(), SpoolError> {
        fs::remove_file(&self.path).map_err(|source| SpoolError::io(self.path.clone(), source))
    }
}

#[cfg(test)]
#[path = "spool_tests.rs"]
mod tests;
