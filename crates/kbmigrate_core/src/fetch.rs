use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::MigrationConfig;

const FALLBACK_BASENAME: &str = "asset";

/// Source of local copies for remote assets.
///
/// Retrieval failures are recoverable per-asset: they surface as `None`
/// (with a logged diagnostic) and the caller leaves the original remote
/// reference in place.
pub trait FetchAssets {
    /// Download `url` into `target_dir` and return the stored filename
    /// relative to `target_dir`, or `None` when the asset is unreachable.
    fn fetch_asset(&self, url: &str, target_dir: &Path) -> Option<String>;
}

/// Blocking HTTP implementation of [`FetchAssets`].
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &MigrationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(Duration::from_millis(config.timeout_ms()))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn download(&self, url: &Url, target_dir: &Path) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("request for {url} failed"))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

        let filename = local_filename(url, content_type.as_deref());
        let target = unique_target(target_dir, &filename, url.as_str());
        let mut file = File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        let mut response = response;
        response
            .copy_to(&mut file)
            .with_context(|| format!("failed to stream {url} to disk"))?;

        let stored = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(filename);
        debug!(url = %url, file = %stored, "stored asset");
        Ok(stored)
    }
}

impl FetchAssets for HttpFetcher {
    fn fetch_asset(&self, url: &str, target_dir: &Path) -> Option<String> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(url, %error, "skipping asset with invalid URL");
                return None;
            }
        };
        match self.download(&parsed, target_dir) {
            Ok(filename) => Some(filename),
            Err(error) => {
                warn!(url, error = %format!("{error:#}"), "skipping asset after failed retrieval");
                None
            }
        }
    }
}

/// Derive the stored filename: URL path basename, `asset` when the path has
/// none, and an extension inferred from the response media type when the
/// basename carries none.
fn local_filename(url: &Url, content_type: Option<&str>) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(FALLBACK_BASENAME);

    let mut filename = basename.to_string();
    if Path::new(basename).extension().is_none()
        && let Some(extension) = extension_for(content_type)
    {
        filename.push('.');
        filename.push_str(extension);
    }
    filename
}

fn extension_for(content_type: Option<&str>) -> Option<&'static str> {
    let media_type = content_type?;
    mime_guess::get_mime_extensions_str(media_type)
        .and_then(|extensions| extensions.first())
        .copied()
}

/// Two distinct source URLs can share a basename within one article. When
/// the plain name is already taken on disk, tag the filename with a short
/// hash of the source URL instead of silently overwriting.
fn unique_target(target_dir: &Path, filename: &str, source_url: &str) -> PathBuf {
    let candidate = target_dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let digest = Sha256::digest(source_url.as_bytes());
    let tag = format!("{digest:x}");
    let tag = &tag[..8];
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(FALLBACK_BASENAME);
    let tagged = match path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) => format!("{stem}-{tag}.{extension}"),
        None => format!("{stem}-{tag}"),
    };
    target_dir.join(tagged)
}
