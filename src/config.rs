//! Configuration for cockpit-graph.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (COCKPIT_BASE_URL, COCKPIT_TOKEN)
//! 2. Config file given with `--config`
//! 3. `.cockpit/config.yaml` in the current directory or a parent
//! 4. `~/.config/cockpit-graph/config.yaml`
//!
//! Example:
//!
//! ```yaml
//! base_url: https://cms.example
//! token: account-xxxx
//! collections: [posts, authors]
//! trees: [pages]
//! aliases:
//!   collection:
//!     posts: BlogPost
//! on_fetch_error: skip
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::content::SourceKind;
use crate::ids::Locale;

pub const ENV_BASE_URL: &str = "COCKPIT_BASE_URL";
pub const ENV_TOKEN: &str = "COCKPIT_TOKEN";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub token: Option<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub trees: Vec<String>,
    #[serde(default)]
    pub aliases: Aliases,
    #[serde(default)]
    pub locales: Vec<String>,
    #[serde(default)]
    pub on_fetch_error: FetchErrorPolicy,
    pub request_timeout_seconds: Option<u64>,
}

/// Published names for collections and trees, keyed by CMS name
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Aliases {
    #[serde(default)]
    pub collection: HashMap<String, String>,
    #[serde(default)]
    pub tree: HashMap<String, String>,
}

/// What to do when fetching one collection or tree fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorPolicy {
    /// Leave the failed name out of the run
    #[default]
    Skip,
    /// Fail the whole run
    Abort,
}

/// Invalid configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base_url is not set (config file or COCKPIT_BASE_URL)")]
    MissingBaseUrl,

    #[error("base_url '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("token is not set (config file or COCKPIT_TOKEN)")]
    MissingToken,

    #[error("no collections or trees configured")]
    NoSources,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// CMS root without trailing slash
    pub base_url: String,
    pub token: String,
    pub collections: Vec<String>,
    pub trees: Vec<String>,
    pub aliases: Aliases,
    pub locales: Vec<Locale>,
    pub on_fetch_error: FetchErrorPolicy,
    pub request_timeout: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Name a collection or tree is published under
    pub fn published_name<'a>(&'a self, kind: SourceKind, name: &'a str) -> &'a str {
        let aliases = match kind {
            SourceKind::Collection => &self.aliases.collection,
            SourceKind::Tree => &self.aliases.tree,
        };
        aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Token with all but the last 4 characters hidden
    pub fn masked_token(&self) -> String {
        let visible: String = self
            .token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

/// Find config file by searching current directory and parents,
/// then the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".cockpit").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
    }

    let user_config = dirs::config_dir()?.join("cockpit-graph").join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from all sources
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let resolved = resolve(
        file,
        std::env::var(ENV_BASE_URL).ok(),
        std::env::var(ENV_TOKEN).ok(),
        config_file,
    )?;
    Ok(resolved)
}

/// Merge environment overrides into a config file and validate the result
pub fn resolve(
    file: ConfigFile,
    env_base_url: Option<String>,
    env_token: Option<String>,
    config_file: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let base_url = env_base_url
        .or(file.base_url)
        .filter(|url| !url.trim().is_empty())
        .ok_or(ConfigError::MissingBaseUrl)?;
    let base_url = validate_base_url(&base_url)?;

    let token = env_token
        .or(file.token)
        .filter(|token| !token.trim().is_empty())
        .ok_or(ConfigError::MissingToken)?;

    if file.collections.is_empty() && file.trees.is_empty() {
        return Err(ConfigError::NoSources);
    }

    let locales: Vec<Locale> = file.locales.iter().map(|tag| Locale::new(tag)).collect();
    if locales.iter().any(|locale| *locale != Locale::Any) {
        warn!(
            locales = ?file.locales,
            "Per-locale fetching is not implemented; only the default locale is fetched"
        );
    }

    Ok(ResolvedConfig {
        base_url,
        token,
        collections: file.collections,
        trees: file.trees,
        aliases: file.aliases,
        locales,
        on_fetch_error: file.on_fetch_error,
        request_timeout: Duration::from_secs(file.request_timeout_seconds.unwrap_or(30)),
        config_file,
    })
}

/// Absolute http(s) URL, returned without trailing slash
fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn minimal() -> ConfigFile {
        ConfigFile {
            base_url: Some("https://cms.example/".to_string()),
            token: Some("secret-token".to_string()),
            collections: vec!["posts".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
base_url: https://cms.example
token: abc
collections: [posts, authors]
trees: [pages]
aliases:
  collection:
    posts: BlogPost
on_fetch_error: abort
request_timeout_seconds: 5
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.collections, vec!["posts", "authors"]);
        assert_eq!(config.trees, vec!["pages"]);
        assert_eq!(config.on_fetch_error, FetchErrorPolicy::Abort);
        assert_eq!(
            config.aliases.collection.get("posts"),
            Some(&"BlogPost".to_string())
        );

        let resolved = resolve(config, None, None, Some(config_path)).unwrap();
        assert_eq!(resolved.request_timeout, Duration::from_secs(5));
        assert_eq!(resolved.published_name(SourceKind::Collection, "posts"), "BlogPost");
        assert_eq!(resolved.published_name(SourceKind::Collection, "authors"), "authors");
        assert_eq!(resolved.published_name(SourceKind::Tree, "pages"), "pages");
    }

    #[test]
    fn test_env_overrides_file() {
        let resolved = resolve(
            minimal(),
            Some("http://localhost:8080".to_string()),
            Some("env-token".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(resolved.base_url, "http://localhost:8080");
        assert_eq!(resolved.token, "env-token");
        assert_eq!(resolved.on_fetch_error, FetchErrorPolicy::Skip);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let resolved = resolve(minimal(), None, None, None).unwrap();
        assert_eq!(resolved.base_url, "https://cms.example");
    }

    #[test]
    fn test_validation_errors() {
        let no_url = ConfigFile {
            base_url: None,
            ..minimal()
        };
        assert_eq!(resolve(no_url, None, None, None).unwrap_err(), ConfigError::MissingBaseUrl);

        let bad_url = ConfigFile {
            base_url: Some("ftp://cms.example".to_string()),
            ..minimal()
        };
        assert!(matches!(
            resolve(bad_url, None, None, None),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));

        let no_token = ConfigFile {
            token: Some("  ".to_string()),
            ..minimal()
        };
        assert_eq!(resolve(no_token, None, None, None).unwrap_err(), ConfigError::MissingToken);

        let no_sources = ConfigFile {
            collections: vec![],
            ..minimal()
        };
        assert_eq!(resolve(no_sources, None, None, None).unwrap_err(), ConfigError::NoSources);
    }

    #[test]
    fn test_masked_token() {
        let resolved = resolve(minimal(), None, None, None).unwrap();
        assert_eq!(resolved.masked_token(), "****oken");
    }
}
