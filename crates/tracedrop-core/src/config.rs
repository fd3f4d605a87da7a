//! Configuration module for tracedrop.
//!
//! The YAML file has four sections (collector, submission, logging and
//! storage). Every field has a default, so an empty file is a valid
//! configuration that records crashes but sends nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{DomainError, DEFAULT_MAX_TRACES};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for tracedrop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub submission: SubmissionConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

/// Remote collector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Endpoint receiving crash reports. Required before the first submission.
    pub url: Option<String>,
    /// Connect and read timeout per request (ms). `None` keeps the HTTP client default.
    pub http_timeout_ms: Option<u64>,
}

/// Submission pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Minimum time (ms) between starting a submission and reporting it done.
    pub min_delay_ms: u64,
    /// Maximum number of crash records claimed per scan.
    pub max_traces: usize,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tag attached to every log event emitted by the pipeline.
    pub tag: String,
    /// Log resolved metadata and configuration at setup.
    pub verbose: bool,
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Crash file storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the storage directory reported by the host.
    pub dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but any read or parse error yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Where the configuration file lives when `--config` is not given.
    ///
    /// Typically `$XDG_CONFIG_HOME/tracedrop/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tracedrop")
            .join("config.yaml")
    }

    /// Minimum submission duration as a [`Duration`].
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.submission.min_delay_ms)
    }

    /// Per-request HTTP timeout, if one is configured.
    pub fn http_timeout(&self) -> Option<Duration> {
        self.collector.http_timeout_ms.map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_traces: DEFAULT_MAX_TRACES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            tag: "tracedrop".to_string(),
            verbose: false,
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"collector.url"`.
    pub field: String,
    /// What is wrong with the value.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `submission.max_traces`.
const MAX_TRACES_LIMIT: usize = 100;

/// Parses a collector URL, accepting only `http` and `https`.
pub fn parse_collector_url(raw: &str) -> Result<Url, DomainError> {
    let url = Url::parse(raw).map_err(|e| DomainError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DomainError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{other}'"
        ))),
    }
}

impl Config {
    /// Checks every field and returns all problems at once.
    ///
    /// An empty vector means the configuration is valid. A missing
    /// collector URL is not an error here; it only blocks submission.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- collector ---
        if let Some(ref raw) = self.collector.url {
            if let Err(e) = parse_collector_url(raw) {
                errors.push(ValidationError {
                    field: "collector.url".into(),
                    message: e.to_string(),
                });
            }
        }
        if self.collector.http_timeout_ms == Some(0) {
            errors.push(ValidationError {
                field: "collector.http_timeout_ms".into(),
                message: "must be greater than 0 when set".into(),
            });
        }

        // --- submission ---
        if self.submission.max_traces == 0 || self.submission.max_traces > MAX_TRACES_LIMIT {
            errors.push(ValidationError {
                field: "submission.max_traces".into(),
                message: format!("must be in range 1..={MAX_TRACES_LIMIT}"),
            });
        }

        // --- logging ---
        if self.logging.tag.trim().is_empty() {
            errors.push(ValidationError {
                field: "logging.tag".into(),
                message: "must not be empty".into(),
            });
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builds a [`Config`] in code, for hosts without a config file.
///
/// Unset fields keep their defaults.
///
/// # Example
///
/// ```rust
/// use tracedrop_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .collector_url("https://crash.example.com/collect")
///     .min_delay_ms(2000)
///     .logging_tag("myapp")
///     .build();
/// assert_eq!(config.submission.min_delay_ms, 2000);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- collector ---

    pub fn collector_url(mut self, url: impl Into<String>) -> Self {
        self.config.collector.url = Some(url.into());
        self
    }

    pub fn http_timeout_ms(mut self, ms: u64) -> Self {
        self.config.collector.http_timeout_ms = Some(ms);
        self
    }

    // --- submission ---

    pub fn min_delay_ms(mut self, ms: u64) -> Self {
        self.config.submission.min_delay_ms = ms;
        self
    }

    pub fn max_traces(mut self, n: usize) -> Self {
        self.config.submission.max_traces = n;
        self
    }

    // --- logging ---

    pub fn logging_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.logging.tag = tag.into();
        self
    }

    pub fn logging_verbose(mut self, verbose: bool) -> Self {
        self.config.logging.verbose = verbose;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- storage ---

    pub fn storage_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.dir = Some(dir);
        self
    }

    // --- build ---

    /// Returns the configuration without validating it.
    pub fn build(self) -> Config {
        self.config
    }

    /// Returns the configuration, or every validation error it has.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.collector.url.is_none());
        assert!(cfg.collector.http_timeout_ms.is_none());
        assert_eq!(cfg.submission.min_delay_ms, 0);
        assert_eq!(cfg.submission.max_traces, 5);
        assert_eq!(cfg.logging.tag, "tracedrop");
        assert!(!cfg.logging.verbose);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.storage.dir.is_none());
        assert_eq!(cfg.min_delay(), Duration::ZERO);
        assert!(cfg.http_timeout().is_none());
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
collector:
  url: https://crash.example.com/collect
  http_timeout_ms: 15000
submission:
  min_delay_ms: 4000
  max_traces: 3
logging:
  tag: myapp
  verbose: true
  level: debug
storage:
  dir: /tmp/traces
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(
            cfg.collector.url.as_deref(),
            Some("https://crash.example.com/collect")
        );
        assert_eq!(cfg.http_timeout(), Some(Duration::from_millis(15000)));
        assert_eq!(cfg.min_delay(), Duration::from_millis(4000));
        assert_eq!(cfg.submission.max_traces, 3);
        assert_eq!(cfg.logging.tag, "myapp");
        assert!(cfg.logging.verbose);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.storage.dir, Some(PathBuf::from("/tmp/traces")));
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"collector:\n  url: http://localhost:8080/\n")
            .unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.collector.url.as_deref(), Some("http://localhost:8080/"));
        assert_eq!(cfg.submission.max_traces, 5);
        assert_eq!(cfg.logging.tag, "tracedrop");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.submission.max_traces, 5);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_collector_url() {
        let cfg = ConfigBuilder::new().collector_url("not a url").build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "collector.url"));
    }

    #[test]
    fn validate_catches_unsupported_scheme() {
        let cfg = ConfigBuilder::new().collector_url("ftp://example.com/").build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unsupported scheme"));
    }

    #[test]
    fn validate_catches_zero_timeout() {
        let cfg = ConfigBuilder::new().http_timeout_ms(0).build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "collector.http_timeout_ms"));
    }

    #[test]
    fn validate_catches_out_of_range_max_traces() {
        for n in [0, 101] {
            let cfg = ConfigBuilder::new().max_traces(n).build();
            let errors = cfg.validate();
            assert!(
                errors.iter().any(|e| e.field == "submission.max_traces"),
                "max_traces={n} should be rejected"
            );
        }
    }

    #[test]
    fn validate_catches_empty_tag_and_bad_level() {
        let cfg = ConfigBuilder::new()
            .logging_tag("  ")
            .logging_level("loud")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"logging.tag".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let cfg = ConfigBuilder::new().logging_level(*level).build();
            assert!(cfg.validate().is_empty(), "level '{level}' should be valid");
        }
    }

    #[test]
    fn parse_collector_url_accepts_http_and_https() {
        assert!(parse_collector_url("http://localhost:9000/collect").is_ok());
        assert!(parse_collector_url("https://crash.example.com").is_ok());
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .collector_url("https://c.example.com/")
            .http_timeout_ms(2500)
            .min_delay_ms(750)
            .max_traces(2)
            .logging_tag("app")
            .logging_verbose(true)
            .logging_level("warn")
            .storage_dir(PathBuf::from("/var/tmp/traces"))
            .build();

        assert_eq!(cfg.collector.url.as_deref(), Some("https://c.example.com/"));
        assert_eq!(cfg.collector.http_timeout_ms, Some(2500));
        assert_eq!(cfg.submission.min_delay_ms, 750);
        assert_eq!(cfg.submission.max_traces, 2);
        assert_eq!(cfg.logging.tag, "app");
        assert!(cfg.logging.verbose);
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.storage.dir, Some(PathBuf::from("/var/tmp/traces")));
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new().max_traces(0).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "submission.max_traces");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("tracedrop/config.yaml"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "collector.url".into(),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "collector.url: bad");
    }
}
