//! Runtime configuration: the feed list and server/store settings.
//!
//! Loaded from a TOML file at startup. A missing file yields
//! [`Config::default()`], the five status-page feeds the service was
//! built around, so the binary runs usefully with zero setup. The feed
//! list is immutable for the life of the process; ingestion and the
//! adapter receive it as an explicit argument, never as global state.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Color used for events whose source is not in the configured list.
pub const DEFAULT_COLOR: &str = "#555555";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid feed source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One upstream status feed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FeedSource {
    /// Unique, human-readable name; the dedup partition key.
    pub name: String,
    pub url: String,
    /// Display color for the timeline view.
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the built-in defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite database path.
    pub db_path: String,

    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Default recency window for `/api/events`, in hours.
    pub window_hours: i64,

    /// Events older than this many days are evicted after each run.
    pub retention_days: i64,

    /// Minutes between automatic ingestion runs. 0 = manual refresh only
    /// (`POST /refresh` or an external scheduler invoking `--once`).
    pub refresh_interval_minutes: u64,

    /// Ordered list of upstream feeds.
    pub feeds: Vec<FeedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "events.db".to_string(),
            bind_addr: "0.0.0.0:5042".to_string(),
            window_hours: 48,
            retention_days: 7,
            refresh_interval_minutes: 0,
            feeds: default_feeds(),
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    let feed = |name: &str, url: &str, color: &str| FeedSource {
        name: name.to_string(),
        url: url.to_string(),
        color: color.to_string(),
    };
    vec![
        feed(
            "GitHub",
            "https://www.githubstatus.com/history.rss",
            "#24292e",
        ),
        feed(
            "Docker",
            "https://www.dockerstatus.com/pages/533c6539221ae15e3f000031/rss",
            "#0db7ed",
        ),
        feed(
            "Cloudflare",
            "https://www.cloudflarestatus.com/history.rss",
            "#f38020",
        ),
        feed("Linear", "https://linearstatus.com/feed.rss", "#717ce1"),
        feed(
            "Notion",
            "https://www.notion-status.com/history.rss",
            "#6f6f6f",
        ),
    ]
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Invalid feed entries → `Err(ConfigError::InvalidSource)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Display color for a source name; unrecognized sources get
    /// [`DEFAULT_COLOR`].
    pub fn color_for(&self, source: &str) -> &str {
        self.feeds
            .iter()
            .find(|f| f.name == source)
            .map(|f| f.color.as_str())
            .unwrap_or(DEFAULT_COLOR)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::InvalidSource {
                    name: feed.url.clone(),
                    reason: "name must not be empty".to_string(),
                });
            }
            if self.feeds.iter().filter(|f| f.name == feed.name).count() > 1 {
                return Err(ConfigError::InvalidSource {
                    name: feed.name.clone(),
                    reason: "duplicate source name".to_string(),
                });
            }
            let url = Url::parse(&feed.url).map_err(|e| ConfigError::InvalidSource {
                name: feed.name.clone(),
                reason: format!("invalid url: {e}"),
            })?;
            match url.scheme() {
                "http" | "https" => {}
                scheme => {
                    return Err(ConfigError::InvalidSource {
                        name: feed.name.clone(),
                        reason: format!("unsupported scheme: {scheme}"),
                    })
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_carries_the_builtin_feeds() {
        let config = Config::default();
        assert_eq!(config.db_path, "events.db");
        assert_eq!(config.window_hours, 48);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.refresh_interval_minutes, 0);
        assert_eq!(config.feeds.len(), 5);
        assert_eq!(config.feeds[0].name, "GitHub");
    }

    #[test]
    fn missing_file_returns_default() {
        let config = Config::load(Path::new("/tmp/statuswatch_nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_config_uses_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "window_hours = 24\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.window_hours, 24);
        assert_eq!(config.retention_days, 7); // default
        assert_eq!(config.feeds.len(), 5); // default feed list
    }

    #[test]
    fn explicit_feed_list_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
[[feeds]]
name = "Example"
url = "https://status.example.com/history.rss"
color = "#123456"
"##,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].name, "Example");
        assert_eq!(config.color_for("Example"), "#123456");
    }

    #[test]
    fn feed_without_color_gets_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[feeds]]\nname = \"Example\"\nurl = \"https://example.com/feed\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feeds[0].color, DEFAULT_COLOR);
    }

    #[test]
    fn unknown_source_color_is_the_default() {
        let config = Config::default();
        assert_eq!(config.color_for("NotConfigured"), DEFAULT_COLOR);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[feeds]]\nname = \"Bad\"\nurl = \"file:///etc/passwd\"\n",
        )
        .unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InvalidSource { .. })
        ));
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[[feeds]]
name = "Twice"
url = "https://a.example.com/feed"

[[feeds]]
name = "Twice"
url = "https://b.example.com/feed"
"#,
        )
        .unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InvalidSource { .. })
        ));
    }
}
