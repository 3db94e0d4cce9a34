use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub files_archived: usize,
    pub archive_path: PathBuf,
}

/// Package the migrated tree into a deflate-compressed zip.
///
/// Entry names are relative to the output root's parent, so the archive's
/// top-level entry is the output root directory itself and it unpacks into
/// a single `knowledge_articles/`-style tree.
pub fn archive_output(output_dir: &Path, archive_path: &Path) -> Result<ArchiveReport> {
    if !output_dir.is_dir() {
        bail!("output directory {} does not exist", output_dir.display());
    }
    let base = output_dir.parent().unwrap_or_else(|| Path::new(""));

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files_archived = 0usize;
    for entry in WalkDir::new(output_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.context("failed to walk output directory")?;
        if !entry.file_type().is_file() || entry.path() == archive_path {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(base)
            .with_context(|| format!("failed to relativize {}", entry.path().display()))?;
        writer
            .start_file(zip_entry_name(relative), options)
            .with_context(|| format!("failed to start archive entry for {}", relative.display()))?;
        let mut source = File::open(entry.path())
            .with_context(|| format!("failed to open {}", entry.path().display()))?;
        io::copy(&mut source, &mut writer)
            .with_context(|| format!("failed to compress {}", entry.path().display()))?;
        files_archived += 1;
    }

    writer
        .finish()
        .with_context(|| format!("failed to finalize {}", archive_path.display()))?;

    info!(files = files_archived, archive = %archive_path.display(), "archive written");
    Ok(ArchiveReport {
        files_archived,
        archive_path: archive_path.to_path_buf(),
    })
}

/// Zip entries always use forward slashes, whatever the host separator.
fn zip_entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
