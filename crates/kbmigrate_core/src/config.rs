use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "kbmigrate/0.1";
pub const DEFAULT_INPUT_CSV: &str = "articles_to_migrate.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "knowledge_articles";
pub const DEFAULT_ARCHIVE_PATH: &str = "knowledge_articles.zip";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrationConfig {
    #[serde(default)]
    pub migration: MigrationSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrationSection {
    pub input_csv: Option<String>,
    pub output_dir: Option<String>,
    pub archive: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct HttpSection {
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl MigrationConfig {
    /// Resolve the HTTP user agent: env KB_USER_AGENT > config > default.
    pub fn user_agent(&self) -> String {
        if let Ok(value) = env::var("KB_USER_AGENT") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.http
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve the per-request timeout: env KB_HTTP_TIMEOUT_MS > config > default.
    pub fn timeout_ms(&self) -> u64 {
        if let Ok(value) = env::var("KB_HTTP_TIMEOUT_MS")
            && let Ok(parsed) = value.trim().parse::<u64>()
        {
            return parsed;
        }
        self.http.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn input_csv(&self) -> PathBuf {
        PathBuf::from(
            self.migration
                .input_csv
                .as_deref()
                .unwrap_or(DEFAULT_INPUT_CSV),
        )
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(
            self.migration
                .output_dir
                .as_deref()
                .unwrap_or(DEFAULT_OUTPUT_DIR),
        )
    }

    pub fn archive_path(&self) -> PathBuf {
        PathBuf::from(
            self.migration
                .archive
                .as_deref()
                .unwrap_or(DEFAULT_ARCHIVE_PATH),
        )
    }
}

/// Load a MigrationConfig from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<MigrationConfig> {
    if !config_path.exists() {
        return Ok(MigrationConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: MigrationConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
