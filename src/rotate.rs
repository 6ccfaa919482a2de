//! Renames a log file out from under the process writing to it.
//!
//! Relies on POSIX rename semantics: open descriptors keep pointing at the
//! same inode, and the new name replaces any existing file atomically.

use std::fs;
use std::path::{Path, PathBuf};

use crate::diary::Diary;
use crate::error::{Error, Result};

pub const FINAL_PREFIX: &str = "forked-";
pub const LOG_SUFFIX: &str = ".log";

/// `forked-<pid>.log` next to `initial`.
pub fn final_path(initial: &Path, pid: u32) -> PathBuf {
    initial.with_file_name(format!("{}{}{}", FINAL_PREFIX, pid, LOG_SUFFIX))
}

pub fn rotate(initial: &Path, pid: u32, diary: &dyn Diary) -> Result<PathBuf> {
    let target = final_path(initial, pid);
    fs::rename(initial, &target).map_err(|source| Error::RenameFailure {
        from: initial.to_path_buf(),
        to: target.clone(),
        source,
    })?;

    tracing::info!(from = %initial.display(), to = %target.display(), "rotated log file");
    diary.push_line(&format!("log file renamed to: {}", absolute(&target).display()));
    Ok(target)
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
