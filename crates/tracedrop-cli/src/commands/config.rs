//! Config command - View and manage tracedrop configuration
//!
//! Provides the `tracedrop config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracedrop::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};
use crate::GlobalArgs;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "collector.url")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, args: &GlobalArgs) -> Result<()> {
        let formatter = get_formatter(args.format, args.quiet);
        let config_path = args.config_path.as_path();

        match self {
            ConfigCommand::Show => execute_show(config_path, args.format, &*formatter),
            ConfigCommand::Set { key, value } => {
                execute_set(config_path, key, value, args.format, &*formatter)
            }
            ConfigCommand::Validate => execute_validate(config_path, args.format, &*formatter),
            ConfigCommand::Path => {
                if matches!(args.format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(
    config_path: &Path,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if matches!(format, OutputFormat::Json) {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(
    config_path: &Path,
    key: &str,
    value: &str,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<28} - {help}"));
            }
        }
        return Ok(());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": messages,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, messages.join("; ")));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, yaml).context("Failed to write configuration file")?;

    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }

    Ok(())
}

fn execute_validate(
    config_path: &Path,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    // Load explicitly; a missing or broken file is worth reporting here.
    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {e}")
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };

            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else if config_path.exists() {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Using default configuration. Run 'tracedrop config set <key> <value>' to create one.");
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if matches!(format, OutputFormat::Json) {
        let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("collector.url", "Collector URL (http or https), 'none' to unset"),
    ("collector.http_timeout_ms", "HTTP timeout in milliseconds, 'none' to unset"),
    ("submission.min_delay_ms", "Minimum submission duration in milliseconds"),
    ("submission.max_traces", "Crash traces sent per run (1-100)"),
    ("logging.tag", "Tag attached to every log line"),
    ("logging.verbose", "true|false"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("storage.dir", "Crash directory, 'none' for the default"),
];

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value)
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- collector ---
        "collector.url" => {
            config.collector.url = optional(value).map(str::to_string);
        }
        "collector.http_timeout_ms" => {
            config.collector.http_timeout_ms = optional(value)
                .map(str::parse::<u64>)
                .transpose()
                .context("Expected a positive integer for collector.http_timeout_ms")?;
        }

        // --- submission ---
        "submission.min_delay_ms" => {
            config.submission.min_delay_ms = value
                .parse::<u64>()
                .context("Expected a non-negative integer for submission.min_delay_ms")?;
        }
        "submission.max_traces" => {
            config.submission.max_traces = value
                .parse::<usize>()
                .context("Expected a positive integer for submission.max_traces")?;
        }

        // --- logging ---
        "logging.tag" => {
            config.logging.tag = value.to_string();
        }
        "logging.verbose" => {
            config.logging.verbose = value
                .parse::<bool>()
                .context("Expected true or false for logging.verbose")?;
        }
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        // --- storage ---
        "storage.dir" => {
            config.storage.dir = optional(value).map(PathBuf::from);
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Console;

    #[test]
    fn test_apply_collector_url() {
        let mut config = Config::default();
        apply_config_value(&mut config, "collector.url", "https://crash.example.com").unwrap();
        assert_eq!(
            config.collector.url.as_deref(),
            Some("https://crash.example.com")
        );

        apply_config_value(&mut config, "collector.url", "none").unwrap();
        assert!(config.collector.url.is_none());
    }

    #[test]
    fn test_apply_http_timeout() {
        let mut config = Config::default();
        apply_config_value(&mut config, "collector.http_timeout_ms", "2500").unwrap();
        assert_eq!(config.collector.http_timeout_ms, Some(2500));

        apply_config_value(&mut config, "collector.http_timeout_ms", "").unwrap();
        assert_eq!(config.collector.http_timeout_ms, None);

        assert!(apply_config_value(&mut config, "collector.http_timeout_ms", "soon").is_err());
    }

    #[test]
    fn test_apply_submission_values() {
        let mut config = Config::default();
        apply_config_value(&mut config, "submission.min_delay_ms", "4000").unwrap();
        apply_config_value(&mut config, "submission.max_traces", "10").unwrap();
        assert_eq!(config.submission.min_delay_ms, 4000);
        assert_eq!(config.submission.max_traces, 10);

        assert!(apply_config_value(&mut config, "submission.max_traces", "-1").is_err());
    }

    #[test]
    fn test_apply_logging_values() {
        let mut config = Config::default();
        apply_config_value(&mut config, "logging.tag", "myapp").unwrap();
        apply_config_value(&mut config, "logging.verbose", "true").unwrap();
        apply_config_value(&mut config, "logging.level", "debug").unwrap();
        assert_eq!(config.logging.tag, "myapp");
        assert!(config.logging.verbose);
        assert_eq!(config.logging.level, "debug");

        assert!(apply_config_value(&mut config, "logging.verbose", "yes").is_err());
    }

    #[test]
    fn test_apply_storage_dir() {
        let mut config = Config::default();
        apply_config_value(&mut config, "storage.dir", "/var/tmp/traces").unwrap();
        assert_eq!(config.storage.dir, Some(PathBuf::from("/var/tmp/traces")));

        apply_config_value(&mut config, "storage.dir", "none").unwrap();
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_apply_unknown_key() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "sync.root", "/tmp").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_set_writes_file_and_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        execute_set(
            &path,
            "collector.url",
            "https://crash.example.com",
            OutputFormat::Json,
            &Console::new(OutputFormat::Json, false),
        )
        .unwrap();
        let saved = Config::load(&path).unwrap();
        assert_eq!(
            saved.collector.url.as_deref(),
            Some("https://crash.example.com")
        );

        // Rejected by validation: the file keeps its previous content.
        execute_set(
            &path,
            "collector.url",
            "ftp://crash.example.com",
            OutputFormat::Json,
            &Console::new(OutputFormat::Json, false),
        )
        .unwrap();
        let saved = Config::load(&path).unwrap();
        assert_eq!(
            saved.collector.url.as_deref(),
            Some("https://crash.example.com")
        );
    }
}
