use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::fetch::FetchAssets;
use crate::manifest::{MANIFEST_FILENAME, load_manifest, write_manifest};
use crate::sanitize::sanitize;
use crate::transform::transform;

pub const ASSETS_DIR: &str = "assets";

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub input_csv: PathBuf,
    pub output_dir: PathBuf,
}

/// Summary of one migration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateReport {
    pub articles_total: usize,
    pub articles_written: usize,
    pub articles_skipped: usize,
    pub assets_localized: usize,
    pub assets_left_remote: usize,
    /// `{language}_{externalId}` keys that appeared more than once; later
    /// articles overwrite earlier output under the same directory.
    pub duplicate_directories: Vec<String>,
    pub manifest_path: PathBuf,
}

/// Convert every record in the input table into a self-contained HTML
/// document plus local assets, then write the updated manifest into the
/// output root.
///
/// Per-article failures are logged and skipped; the skipped row is carried
/// into the output manifest with its original body so the divergence stays
/// visible downstream. Filesystem errors abort the run.
pub fn run_migration(options: &MigrateOptions, fetcher: &dyn FetchAssets) -> Result<MigrateReport> {
    let manifest = load_manifest(&options.input_csv)?;
    fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("failed to create {}", options.output_dir.display()))?;

    let mut report = MigrateReport {
        articles_total: manifest.rows.len(),
        ..MigrateReport::default()
    };
    let mut seen_directories = HashSet::new();
    let mut output_rows = Vec::with_capacity(manifest.rows.len());

    for row in &manifest.rows {
        let article = manifest.layout.article(row);
        let directory_name = article.directory_name();
        if !seen_directories.insert(directory_name.clone()) {
            warn!(
                directory = %directory_name,
                "duplicate language/external-id pair, output directories collide"
            );
            report.duplicate_directories.push(directory_name.clone());
        }

        let article_dir = options.output_dir.join(&directory_name);
        let assets_dir = article_dir.join(ASSETS_DIR);
        fs::create_dir_all(&assets_dir)
            .with_context(|| format!("failed to create {}", assets_dir.display()))?;

        let title = match article.title {
            Some(value) => value,
            None => {
                warn!(
                    external_id = article.external_id,
                    "title cell missing, coercing to empty string"
                );
                ""
            }
        };
        let title = sanitize(title);

        let body = article.body.unwrap_or_default();
        let transformed = match transform(body, &assets_dir, &title, fetcher) {
            Ok(transformed) => transformed,
            Err(error) => {
                warn!(external_id = article.external_id, %error, "skipping article");
                report.articles_skipped += 1;
                output_rows.push(row.clone());
                continue;
            }
        };

        let html_path = article_dir.join(format!("{directory_name}.html"));
        fs::write(&html_path, &transformed.html)
            .with_context(|| format!("failed to write {}", html_path.display()))?;

        report.articles_written += 1;
        report.assets_localized += transformed.assets.localized;
        report.assets_left_remote += transformed.assets.left_remote;
        output_rows.push(manifest.layout.with_body(row, &manifest_body_path(&html_path)));
    }

    let manifest_path = options.output_dir.join(MANIFEST_FILENAME);
    write_manifest(&manifest_path, &manifest.headers, &output_rows)?;
    report.manifest_path = manifest_path;

    info!(
        total = report.articles_total,
        written = report.articles_written,
        skipped = report.articles_skipped,
        assets = report.assets_localized,
        "migration finished"
    );
    Ok(report)
}

fn manifest_body_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
