//! Moving earlier output of a deal into numbered archive folders

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where the previous files went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archived {
    pub folder: PathBuf,
    pub moved: usize,
}

/// Move every file of `folder` into a new numbered subfolder.
///
/// The folder is created when missing. Subfolders are left in place; the
/// new archive is numbered one past the largest numeric subfolder name.
/// Returns `None` when there was nothing to move.
pub fn archive_existing_files(folder: &Path) -> Result<Option<Archived>> {
    fs::create_dir_all(folder)?;

    let mut files = Vec::new();
    let mut last_archive = 0u64;
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            files.push(entry.path());
        } else if file_type.is_dir() {
            if let Some(n) = entry.file_name().to_str().and_then(archive_number) {
                last_archive = last_archive.max(n);
            }
        }
    }

    if files.is_empty() {
        tracing::debug!("nothing to archive in {}", folder.display());
        return Ok(None);
    }

    let next = last_archive
        .checked_add(1)
        .ok_or_else(|| Error::ArchiveExhausted {
            folder: folder.to_path_buf(),
            last: last_archive,
        })?;
    let archive = folder.join(next.to_string());
    fs::create_dir(&archive)?;
    for file in &files {
        if let Some(name) = file.file_name() {
            fs::rename(file, archive.join(name))?;
        }
    }

    tracing::info!(
        moved = files.len(),
        "previous files archived to {}",
        archive.display()
    );
    Ok(Some(Archived {
        folder: archive,
        moved: files.len(),
    }))
}

fn archive_number(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
