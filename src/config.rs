use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineConfig, OverlapMethod, DEFAULT_FRONTIER_CAP};
use crate::frontier::SelectionStrategy;

/// Settings for qexpand as read from disk.
/// All fields are optional to support partial configurations and merging
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QexpandConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion: Option<ExpansionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExpansionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier_cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<String>>,
}

/// Configuration with resolved values (no Options)
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub defaults: ResolvedDefaultsConfig,
    pub expansion: ResolvedExpansionConfig,
    pub source: ResolvedSourceConfig,
}

#[derive(Debug, Clone)]
pub struct ResolvedDefaultsConfig {
    pub log_level: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedExpansionConfig {
    pub method: OverlapMethod,
    pub iterations: usize,
    pub threshold: f64,
    pub selection_factor: f64,
    pub selection: SelectionStrategy,
    pub shuffle_seed: Option<u64>,
    pub frontier_cap: usize,
    pub max_retries: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedSourceConfig {
    pub requests_per_hour: u32,
    pub jitter: Duration,
    pub credentials: Vec<String>,
}

impl QexpandConfig {
    /// Load configuration from multiple levels and merge them
    pub fn load() -> Result<ResolvedConfig> {
        let configs = Self::load_all_configs(&Self::get_config_paths())?;

        // Merge configurations (global -> project -> local -> custom)
        let mut merged = QexpandConfig::default();
        for config in configs {
            merged = Self::merge_configs(merged, config);
        }

        merged.apply_env_overrides();
        merged.validate()?;

        Ok(merged.resolve_with_defaults())
    }

    /// Get all configuration file paths in priority order
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Global config: ~/.qexpand/settings.json
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".qexpand").join("settings.json"));
        }

        // 2. Project config: ./.qexpand/settings.json and the local override
        paths.push(PathBuf::from(".qexpand").join("settings.json"));
        paths.push(PathBuf::from(".qexpand").join("settings.local.json"));

        // 3. Custom path via environment variable - HIGHEST precedence (last wins)
        if let Ok(custom_path) = env::var("QEXPAND_CONFIG_PATH") {
            let looks_like_dir = custom_path.ends_with('/') || custom_path.ends_with('\\');
            let p = if looks_like_dir {
                PathBuf::from(&custom_path).join("settings.json")
            } else {
                PathBuf::from(&custom_path)
            };
            paths.push(p);
        }

        paths
    }

    /// Load all configuration files that exist. A file that exists but does
    /// not parse is an error.
    fn load_all_configs(paths: &[PathBuf]) -> Result<Vec<QexpandConfig>> {
        let mut configs = Vec::new();
        for path in paths {
            match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => configs.push(Self::load_from_file(path)?),
                _ => continue,
            }
        }
        Ok(configs)
    }

    /// Load a single configuration file
    fn load_from_file(path: &Path) -> Result<QexpandConfig> {
        let bytes = fs::read(path).context(format!("Failed to read config file: {path:?}"))?;

        // Strip UTF-8 BOM if present (0xEF, 0xBB, 0xBF)
        let content_bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            &bytes[3..]
        } else {
            &bytes[..]
        };

        let config: QexpandConfig = serde_json::from_slice(content_bytes)
            .context(format!("Failed to parse config file: {path:?}"))?;

        Ok(config)
    }

    /// Deep merge two configurations, with `other` taking precedence
    fn merge_configs(mut base: QexpandConfig, other: QexpandConfig) -> QexpandConfig {
        if let Some(other_defaults) = other.defaults {
            let base_defaults = base.defaults.get_or_insert(DefaultsConfig::default());
            if other_defaults.log_level.is_some() {
                base_defaults.log_level = other_defaults.log_level;
            }
            if other_defaults.data_dir.is_some() {
                base_defaults.data_dir = other_defaults.data_dir;
            }
        }

        if let Some(other_expansion) = other.expansion {
            let base_expansion = base.expansion.get_or_insert(ExpansionConfig::default());
            if other_expansion.method.is_some() {
                base_expansion.method = other_expansion.method;
            }
            if other_expansion.iterations.is_some() {
                base_expansion.iterations = other_expansion.iterations;
            }
            if other_expansion.threshold.is_some() {
                base_expansion.threshold = other_expansion.threshold;
            }
            if other_expansion.selection_factor.is_some() {
                base_expansion.selection_factor = other_expansion.selection_factor;
            }
            if other_expansion.selection.is_some() {
                base_expansion.selection = other_expansion.selection;
            }
            if other_expansion.shuffle_seed.is_some() {
                base_expansion.shuffle_seed = other_expansion.shuffle_seed;
            }
            if other_expansion.frontier_cap.is_some() {
                base_expansion.frontier_cap = other_expansion.frontier_cap;
            }
            if other_expansion.max_retries.is_some() {
                base_expansion.max_retries = other_expansion.max_retries;
            }
        }

        if let Some(other_source) = other.source {
            let base_source = base.source.get_or_insert(SourceConfig::default());
            if other_source.requests_per_hour.is_some() {
                base_source.requests_per_hour = other_source.requests_per_hour;
            }
            if other_source.jitter_secs.is_some() {
                base_source.jitter_secs = other_source.jitter_secs;
            }
            if other_source.credentials.is_some() {
                base_source.credentials = other_source.credentials;
            }
        }

        base
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let defaults = self.defaults.get_or_insert(DefaultsConfig::default());
        if let Some(val) = lookup("QEXPAND_LOG_LEVEL") {
            defaults.log_level = Some(val);
        }
        if let Some(val) = lookup("QEXPAND_DATA_DIR") {
            defaults.data_dir = Some(val);
        }

        let expansion = self.expansion.get_or_insert(ExpansionConfig::default());
        if let Some(val) = lookup("QEXPAND_METHOD") {
            expansion.method = Some(val);
        }
        if let Some(val) = lookup("QEXPAND_ITERATIONS") {
            if let Ok(iterations) = val.parse() {
                expansion.iterations = Some(iterations);
            }
        }
        if let Some(val) = lookup("QEXPAND_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                expansion.threshold = Some(threshold);
            }
        }
        if let Some(val) = lookup("QEXPAND_SELECTION_FACTOR") {
            if let Ok(factor) = val.parse() {
                expansion.selection_factor = Some(factor);
            }
        }

        let source = self.source.get_or_insert(SourceConfig::default());
        if let Some(val) = lookup("QEXPAND_REQUESTS_PER_HOUR") {
            if let Ok(rate) = val.parse() {
                source.requests_per_hour = Some(rate);
            }
        }
        if let Some(val) = lookup("QEXPAND_CREDENTIALS") {
            source.credentials = Some(
                val.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
    }

    /// Convert to resolved config with all defaults applied
    fn resolve_with_defaults(self) -> ResolvedConfig {
        let defaults = self.defaults.unwrap_or_default();
        let expansion = self.expansion.unwrap_or_default();
        let source = self.source.unwrap_or_default();

        ResolvedConfig {
            defaults: ResolvedDefaultsConfig {
                log_level: defaults.log_level.unwrap_or_else(|| "info".to_string()),
                data_dir: PathBuf::from(defaults.data_dir.unwrap_or_else(|| "data".to_string())),
            },
            expansion: ResolvedExpansionConfig {
                method: expansion
                    .method
                    .and_then(|m| m.parse().ok())
                    .unwrap_or(OverlapMethod::LexicalNgram),
                iterations: expansion.iterations.unwrap_or(3),
                threshold: expansion.threshold.unwrap_or(0.25),
                selection_factor: expansion.selection_factor.unwrap_or(1.0),
                selection: expansion
                    .selection
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(SelectionStrategy::Shuffle),
                shuffle_seed: expansion.shuffle_seed,
                frontier_cap: expansion.frontier_cap.unwrap_or(DEFAULT_FRONTIER_CAP),
                max_retries: expansion.max_retries.unwrap_or(3),
            },
            source: ResolvedSourceConfig {
                requests_per_hour: source.requests_per_hour.unwrap_or(3600),
                jitter: Duration::from_secs(source.jitter_secs.unwrap_or(5)),
                credentials: source.credentials.unwrap_or_default(),
            },
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(ref defaults) = self.defaults {
            if let Some(ref log_level) = defaults.log_level {
                let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
                let level_lower = log_level.to_lowercase();
                if !valid_log_levels.contains(&level_lower.as_str()) {
                    anyhow::bail!("Invalid log level: {}", log_level);
                }
            }
        }

        if let Some(ref expansion) = self.expansion {
            if let Some(ref method) = expansion.method {
                method
                    .parse::<OverlapMethod>()
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            if let Some(ref selection) = expansion.selection {
                selection
                    .parse::<SelectionStrategy>()
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            if let Some(threshold) = expansion.threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    anyhow::bail!("Invalid threshold: {} (expected 0..=1)", threshold);
                }
            }
            if let Some(factor) = expansion.selection_factor {
                if !(0.0..=1.0).contains(&factor) {
                    anyhow::bail!("Invalid selection factor: {} (expected 0..=1)", factor);
                }
            }
            if expansion.frontier_cap == Some(0) {
                anyhow::bail!("Invalid frontier cap: 0");
            }
        }

        if let Some(ref source) = self.source {
            if source.requests_per_hour == Some(0) {
                anyhow::bail!("Invalid requests per hour: 0");
            }
        }

        Ok(())
    }
}

impl ResolvedConfig {
    /// Engine settings derived from the expansion section.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            method: self.expansion.method,
            iteration_limit: self.expansion.iterations,
            threshold: self.expansion.threshold,
            selection_factor: self.expansion.selection_factor,
            selection: self.expansion.selection,
            shuffle_seed: self.expansion.shuffle_seed,
            frontier_cap: self.expansion.frontier_cap,
            max_retries: self.expansion.max_retries,
        }
    }

    /// Convert back to QexpandConfig for serialization. Credentials are
    /// masked.
    pub fn to_qexpand_config(&self) -> QexpandConfig {
        QexpandConfig {
            defaults: Some(DefaultsConfig {
                log_level: Some(self.defaults.log_level.clone()),
                data_dir: Some(self.defaults.data_dir.display().to_string()),
            }),
            expansion: Some(ExpansionConfig {
                method: Some(self.expansion.method.to_string()),
                iterations: Some(self.expansion.iterations),
                threshold: Some(self.expansion.threshold),
                selection_factor: Some(self.expansion.selection_factor),
                selection: Some(self.expansion.selection.to_string()),
                shuffle_seed: self.expansion.shuffle_seed,
                frontier_cap: Some(self.expansion.frontier_cap),
                max_retries: Some(self.expansion.max_retries),
            }),
            source: Some(SourceConfig {
                requests_per_hour: Some(self.source.requests_per_hour),
                jitter_secs: Some(self.source.jitter.as_secs()),
                credentials: Some(
                    self.source
                        .credentials
                        .iter()
                        .map(|k| crate::source::credentials::mask(k))
                        .collect(),
                ),
            }),
        }
    }

    /// Get a pretty-printed JSON representation
    pub fn to_json_string(&self) -> Result<String> {
        let config = self.to_qexpand_config();
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration to JSON")
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        QexpandConfig::default().resolve_with_defaults()
    }
}
