use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::{ensure, ResultExt as _, Snafu};
use url::Url;

/// Everything the application reads from the environment. Variable names are the upper-cased field names.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub scraper_key: String,
    pub fetcher_key: String,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_scraper_url")]
    pub scraper_url: Url,
    #[serde(default = "default_fetcher_url")]
    pub fetcher_url: Url,

    #[serde(default = "default_fetch_concurrency")]
    fetch_concurrency: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_download_videos")]
    pub download_videos: bool,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Config, ConfigError> {
        let config: Config = envy::from_iter(vars).context(EnvironmentSnafu)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        ensure!(
            !self.scraper_key.trim().is_empty(),
            MissingCredentialSnafu { name: "SCRAPER_KEY" }
        );
        ensure!(
            !self.fetcher_key.trim().is_empty(),
            MissingCredentialSnafu { name: "FETCHER_KEY" }
        );
        ensure!(
            self.fetch_concurrency > 0,
            InvalidValueSnafu {
                name: "FETCH_CONCURRENCY",
                reason: "must be at least 1",
            }
        );
        ensure!(
            self.page_size > 0,
            InvalidValueSnafu {
                name: "PAGE_SIZE",
                reason: "must be at least 1",
            }
        );

        Ok(self)
    }

    /// Upper bound of concurrently running resolutions or fetches.
    pub fn fetch_concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.fetch_concurrency).unwrap_or(NonZeroUsize::MIN)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("scraper_key", &"<redacted>")
            .field("fetcher_key", &"<redacted>")
            .field("database_path", &self.database_path)
            .field("output_dir", &self.output_dir)
            .field("log_dir", &self.log_dir)
            .field("scraper_url", &self.scraper_url.as_str())
            .field("fetcher_url", &self.fetcher_url.as_str())
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("download_videos", &self.download_videos)
            .finish()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("could not read the configuration from the environment: {source}"))]
    Environment { source: envy::Error },

    #[snafu(display("{name} must be set"))]
    MissingCredential { name: &'static str },

    #[snafu(display("invalid {name}: {reason}"))]
    InvalidValue {
        name: &'static str,
        reason: &'static str,
    },
}

fn default_database_path() -> PathBuf {
    PathBuf::from("users_db")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_scraper_url() -> Url {
    Url::parse("https://scraper.tikapi.dev/").expect("valid default scraper url")
}

fn default_fetcher_url() -> Url {
    Url::parse("https://fetcher.tikapi.dev/").expect("valid default fetcher url")
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_page_size() -> u32 {
    30
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_attempts() -> usize {
    3
}

fn default_download_videos() -> bool {
    true
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
