//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::router::{RouterOptions, SourceMode};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "foglio";
const DEFAULT_REPO: &str = "blog-data";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
const DEFAULT_LOCAL_DIR: &str = "content";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_CACHE_POST_LIMIT: usize = 500;
const DEFAULT_CACHE_COLLECTION_LIMIT: usize = 100;

/// Command-line arguments for the foglio binary.
#[derive(Debug, Parser)]
#[command(name = "foglio", version, about = "GitHub-backed blog content client")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOGLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List blog posts, newest first.
    Posts,
    /// Show one blog post.
    Post {
        /// Post id (filename without extension).
        id: String,
    },
    /// List memos, newest first.
    Memos,
    /// Show the configured site links.
    Links,
    /// Show like counts.
    Likes,
    /// Manifest utilities.
    Manifest {
        #[command(subcommand)]
        command: ManifestCommand,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ManifestCommand {
    /// Print the manifest.
    Show,
    /// Create the manifest upstream when it does not exist yet.
    Ensure,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the content source mode (local|remote).
    #[arg(long = "content-mode", value_name = "MODE")]
    pub mode: Option<String>,

    /// Override the content repository owner.
    #[arg(long = "content-owner", env = "GITHUB_USERNAME", value_name = "OWNER")]
    pub owner: Option<String>,

    /// Override the access token for the authenticated API.
    #[arg(
        long = "content-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    /// Override the content repository name.
    #[arg(long = "content-repo", value_name = "NAME")]
    pub repo: Option<String>,

    /// Override the content repository branch.
    #[arg(long = "content-branch", value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Override the local content directory (local mode).
    #[arg(long = "content-local-dir", value_name = "PATH")]
    pub local_dir: Option<PathBuf>,

    /// Override the cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub content: ContentSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub mode: SourceMode,
    pub owner: Option<String>,
    pub token: Option<String>,
    pub repo: String,
    pub branch: String,
    pub api_base: Url,
    pub raw_base: Url,
    pub local_dir: PathBuf,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_seconds: NonZeroU64,
    pub post_limit: usize,
    pub collection_limit: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl Settings {
    /// Map the content settings onto router constructor inputs.
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            mode: self.content.mode,
            token: self.content.token.clone(),
            owner: self.content.owner.clone(),
            repo: self.content.repo.clone(),
            branch: self.content.branch.clone(),
            api_base: self.content.api_base.clone(),
            raw_base: self.content.raw_base.clone(),
            local_dir: self.content.local_dir.clone(),
            http_timeout: self.content.http_timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(config_file: Option<&PathBuf>, overrides: &Overrides) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOGLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(overrides);
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    content: RawContentSettings,
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    mode: Option<String>,
    owner: Option<String>,
    token: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    api_base_url: Option<String>,
    raw_base_url: Option<String>,
    local_dir: Option<PathBuf>,
    http_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    post_limit: Option<usize>,
    collection_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(mode) = overrides.mode.as_ref() {
            self.content.mode = Some(mode.clone());
        }
        if let Some(owner) = overrides.owner.as_ref() {
            self.content.owner = Some(owner.clone());
        }
        if let Some(token) = overrides.token.as_ref() {
            self.content.token = Some(token.clone());
        }
        if let Some(repo) = overrides.repo.as_ref() {
            self.content.repo = Some(repo.clone());
        }
        if let Some(branch) = overrides.branch.as_ref() {
            self.content.branch = Some(branch.clone());
        }
        if let Some(dir) = overrides.local_dir.as_ref() {
            self.content.local_dir = Some(dir.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            content,
            cache,
            logging,
        } = raw;

        Ok(Self {
            content: build_content_settings(content)?,
            cache: build_cache_settings(cache)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_content_settings(raw: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let mode = match raw.mode.as_deref() {
        None => SourceMode::Remote,
        Some(value) => SourceMode::from_str(value)
            .map_err(|reason| LoadError::invalid("content.mode", reason))?,
    };

    let api_base = raw
        .api_base_url
        .as_deref()
        .unwrap_or(DEFAULT_API_BASE)
        .parse::<Url>()
        .map_err(|err| LoadError::invalid("content.api_base_url", err.to_string()))?;
    let raw_base = raw
        .raw_base_url
        .as_deref()
        .unwrap_or(DEFAULT_RAW_BASE)
        .parse::<Url>()
        .map_err(|err| LoadError::invalid("content.raw_base_url", err.to_string()))?;

    let http_timeout_seconds = raw.http_timeout_seconds.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    if http_timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "content.http_timeout_seconds",
            "timeout must be positive",
        ));
    }

    Ok(ContentSettings {
        mode,
        owner: raw.owner.filter(|owner| !owner.is_empty()),
        token: raw.token.filter(|token| !token.is_empty()),
        repo: raw.repo.unwrap_or_else(|| DEFAULT_REPO.to_string()),
        branch: raw.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        api_base,
        raw_base,
        local_dir: raw
            .local_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DIR)),
        http_timeout: Duration::from_secs(http_timeout_seconds),
    })
}

fn build_cache_settings(raw: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = raw.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS);
    let ttl_seconds = NonZeroU64::new(ttl_seconds)
        .ok_or_else(|| LoadError::invalid("cache.ttl_seconds", "ttl must be positive"))?;

    Ok(CacheSettings {
        ttl_seconds,
        post_limit: raw.post_limit.unwrap_or(DEFAULT_CACHE_POST_LIMIT),
        collection_limit: raw
            .collection_limit
            .unwrap_or(DEFAULT_CACHE_COLLECTION_LIMIT),
    })
}

fn build_logging_settings(raw: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match raw.level.as_deref() {
        None => LevelFilter::INFO,
        Some(value) => LevelFilter::from_str(value)
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
    };

    Ok(LoggingSettings {
        level,
        format: if raw.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        },
    })
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("expected `local` or `remote`, got `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn overrides() -> Overrides {
        Overrides::default()
    }

    #[test]
    #[serial]
    fn defaults_load_without_configuration() {
        let settings = load(None, &overrides()).expect("settings");
        assert_eq!(settings.content.mode, SourceMode::Remote);
        assert_eq!(settings.content.repo, DEFAULT_REPO);
        assert_eq!(settings.content.branch, DEFAULT_BRANCH);
        assert_eq!(settings.cache.ttl_seconds.get(), 300);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    #[serial]
    fn cli_overrides_win() {
        let overrides = Overrides {
            mode: Some("local".to_string()),
            owner: Some("octocat".to_string()),
            cache_ttl_seconds: Some(60),
            log_json: Some(true),
            ..Overrides::default()
        };
        let settings = load(None, &overrides).expect("settings");
        assert_eq!(settings.content.mode, SourceMode::Local);
        assert_eq!(settings.content.owner.as_deref(), Some("octocat"));
        assert_eq!(settings.cache.ttl_seconds.get(), 60);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn invalid_mode_is_rejected() {
        let overrides = Overrides {
            mode: Some("browser".to_string()),
            ..Overrides::default()
        };
        let error = load(None, &overrides).expect_err("should fail");
        assert!(matches!(error, LoadError::Invalid { key, .. } if key == "content.mode"));
    }

    #[test]
    #[serial]
    fn environment_variables_feed_settings() {
        // SAFETY: serialized by #[serial]; no other thread reads the
        // environment while this test runs.
        unsafe {
            std::env::set_var("FOGLIO__CONTENT__OWNER", "env-owner");
        }
        let settings = load(None, &overrides()).expect("settings");
        unsafe {
            std::env::remove_var("FOGLIO__CONTENT__OWNER");
        }
        assert_eq!(settings.content.owner.as_deref(), Some("env-owner"));
    }

    #[test]
    fn source_mode_parses() {
        assert_eq!(SourceMode::from_str("local"), Ok(SourceMode::Local));
        assert_eq!(SourceMode::from_str("remote"), Ok(SourceMode::Remote));
        assert!(SourceMode::from_str("browser").is_err());
    }
}
