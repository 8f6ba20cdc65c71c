//! # Harness configuration
//!
//! Settings are layered, lowest precedence first: built-in defaults, a TOML
//! file, `CATALOG_*` environment variables, then command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "catalog-contract.toml";
pub const DEFAULT_BASE_URL: &str = "https://fakestoreapi.com";

pub const ENV_BASE_URL: &str = "CATALOG_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "CATALOG_TIMEOUT_MS";
pub const ENV_MAX_CONCURRENCY: &str = "CATALOG_MAX_CONCURRENCY";
pub const ENV_RETRY_COUNT: &str = "CATALOG_RETRY_COUNT";
pub const ENV_RUN_TIMEOUT_MS: &str = "CATALOG_RUN_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(alias = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(alias = "timeoutMs")]
    pub timeout_ms: u64,
    /// Worker pool size for independent scenario groups.
    #[serde(alias = "maxConcurrency")]
    pub max_concurrency: usize,
    /// Extra attempts after a retryable transport failure.
    #[serde(alias = "retryCount")]
    pub retry_count: u32,
    #[serde(alias = "retryDelayMs")]
    pub retry_delay_ms: u64,
    /// Budget for the whole run; scenarios still running afterwards error out.
    #[serde(alias = "runTimeoutMs")]
    pub run_timeout_ms: u64,
    /// Run state-changing scenarios one at a time after everything else.
    #[serde(alias = "serialMutations")]
    pub serial_mutations: bool,
    #[serde(alias = "proxyUrl")]
    pub proxy_url: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
            max_concurrency: 4,
            retry_count: 1,
            retry_delay_ms: 500,
            run_timeout_ms: 120_000,
            serial_mutations: true,
            proxy_url: None,
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub retry_count: Option<u32>,
    pub run_timeout_ms: Option<u64>,
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the full configuration stack against the process environment.
    pub fn load(
        explicit_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path(explicit_path) {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply `CATALOG_*` variables through `lookup` so callers can supply
    /// something other than the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get(ENV_BASE_URL) {
            self.base_url = value;
        }
        if let Some(value) = get(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_number(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = get(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = parse_number(ENV_MAX_CONCURRENCY, &value)?;
        }
        if let Some(value) = get(ENV_RETRY_COUNT) {
            self.retry_count = parse_number(ENV_RETRY_COUNT, &value)?;
        }
        if let Some(value) = get(ENV_RUN_TIMEOUT_MS) {
            self.run_timeout_ms = parse_number(ENV_RUN_TIMEOUT_MS, &value)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(value) = &overrides.base_url {
            self.base_url = value.clone();
        }
        if let Some(value) = overrides.timeout_ms {
            self.timeout_ms = value;
        }
        if let Some(value) = overrides.max_concurrency {
            self.max_concurrency = value;
        }
        if let Some(value) = overrides.retry_count {
            self.retry_count = value;
        }
        if let Some(value) = overrides.run_timeout_ms {
            self.run_timeout_ms = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        let parsed = reqwest::Url::parse(base_url).map_err(|err| ConfigError::Invalid {
            key: "base_url".into(),
            reason: format!("`{base_url}` is not a valid URL: {err}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "base_url".into(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }
        if self.timeout_ms == 0 {
            return Err(invalid_zero("timeout_ms"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid_zero("max_concurrency"));
        }
        if self.run_timeout_ms == 0 {
            return Err(invalid_zero("run_timeout_ms"));
        }
        Ok(())
    }
}

fn config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        reason: format!("`{value}` is not a non-negative integer"),
    })
}

fn invalid_zero(key: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: "must be greater than 0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.serial_mutations);
        config.validate().unwrap();
    }

    #[test]
    fn file_accepts_snake_case_and_camel_case_aliases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "baseURL = \"http://localhost:3000\"\ntimeoutMs = 2500\nmax_concurrency = 2"
        )
        .unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout_ms, 2500);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.retry_count, 1);
    }

    #[test]
    fn file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_ur = \"typo\"").unwrap();

        let err = HarnessConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = HarnessConfig {
            base_url: "http://from-file".into(),
            ..HarnessConfig::default()
        };
        config
            .apply_env(lookup(&[
                (ENV_BASE_URL, "http://from-env"),
                (ENV_MAX_CONCURRENCY, "8"),
                (ENV_TIMEOUT_MS, "  "),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "http://from-env");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn env_rejects_non_numeric_values() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_env(lookup(&[(ENV_RETRY_COUNT, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_RETRY_COUNT));
    }

    #[test]
    fn overrides_take_precedence_over_env() {
        let mut config = HarnessConfig::default();
        config
            .apply_env(lookup(&[(ENV_BASE_URL, "http://from-env")]))
            .unwrap();
        config.apply_overrides(&ConfigOverrides {
            base_url: Some("http://from-cli".into()),
            retry_count: Some(0),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.base_url, "http://from-cli");
        assert_eq!(config.retry_count, 0);
    }

    #[test]
    fn validate_rejects_zero_and_bad_urls() {
        let config = HarnessConfig {
            max_concurrency: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            base_url: "ftp://example.com".into(),
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            base_url: "not a url".into(),
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
