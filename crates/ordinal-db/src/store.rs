use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ordinal_common::{Error, Result};
use tracing::debug;

/// A migration file discovered on disk. The id is the filename stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub id: u64,
    pub path: PathBuf,
}

impl MigrationFile {
    /// Read the file's SQL text. Non-UTF-8 content is rejected.
    pub fn read_sql(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            Error::execution(
                self.id,
                format!("failed to read {}: {e}", self.path.display()),
            )
        })
    }
}

/// Scan `folder` (non-recursively) and return every migration with an id
/// greater than `last_applied`, in ascending id order.
///
/// Only regular files count. A filename whose stem is not a positive integer,
/// or two files sharing an id, abort the scan.
pub fn list_pending(folder: &Path, last_applied: u64) -> Result<Vec<MigrationFile>> {
    let entries = std::fs::read_dir(folder).map_err(|e| {
        Error::Config(format!(
            "failed to read migrations folder {}: {e}",
            folder.display()
        ))
    })?;

    let mut by_id: BTreeMap<u64, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Config(format!(
                "failed to list migrations folder {}: {e}",
                folder.display()
            ))
        })?;

        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            debug!("skipping non-regular entry {}", entry.path().display());
            continue;
        }

        let path = entry.path();
        let id = parse_id(&path)?;
        if let Some(existing) = by_id.insert(id, path.clone()) {
            return Err(Error::Config(format!(
                "duplicate migration id {id}: {} and {}",
                existing.display(),
                path.display()
            )));
        }
    }

    Ok(by_id
        .into_iter()
        .filter(|(id, _)| *id > last_applied)
        .map(|(id, path)| MigrationFile { id, path })
        .collect())
}

/// The id is the filename with its last extension removed.
fn parse_id(path: &Path) -> Result<u64> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config(format!("invalid migration filename: {}", path.display())))?;

    match stem.parse::<u64>() {
        Ok(0) => Err(Error::Config(format!(
            "migration id must be positive: {}",
            path.display()
        ))),
        Ok(id) => Ok(id),
        Err(e) => Err(Error::Config(format!(
            "migration filename {} is not an integer id: {e}",
            path.display()
        ))),
    }
}
