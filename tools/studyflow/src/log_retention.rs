use crate::errors::StudyError;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_EXTENSION: &str = "jsonl";

/// Deletes the oldest `.jsonl` files in `dir` until their total size fits in
/// `budget_bytes`. `active` is never deleted, even when it alone exceeds the
/// budget. Other files in the directory are ignored.
pub fn enforce_total_budget(
    dir: &Path,
    budget_bytes: u64,
    active: Option<&Path>,
) -> Result<Vec<PathBuf>, StudyError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|e| StudyError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(LOG_EXTENSION))
        .filter_map(|path| {
            let meta = fs::metadata(&path).ok()?;
            Some((path, meta.len(), meta.modified().ok()))
        })
        .collect::<Vec<_>>();

    logs.sort_by(|a, b| a.2.cmp(&b.2));

    let mut total = logs.iter().map(|(_, len, _)| *len).sum::<u64>();
    let mut deleted = Vec::new();
    for (path, len, _) in logs {
        if total <= budget_bytes {
            break;
        }
        if active.is_some_and(|keep| keep == path.as_path()) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| StudyError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}
