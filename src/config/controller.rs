//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    CLOUD_GOV_DOMAINS, DEFAULT_ATLAS_BASE_URL, DEFAULT_METRICS_PORT, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no Atlas access token configured (set ATLAS_ACCESS_TOKEN_FILE or ATLAS_ACCESS_TOKEN)")]
    MissingAccessToken,

    #[error("failed to read Atlas access token from {path}: {source}")]
    ReadAccessToken {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Atlas access token is empty")]
    EmptyAccessToken,
}

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Clone)]
pub struct ControllerConfig {
    /// Delay before an `InProgress` result is retried (seconds)
    pub retry_secs: u64,
    /// Atlas Admin API base URL
    pub atlas_base_url: String,
    /// File holding the Atlas access token, preferred over `access_token`
    pub access_token_file: Option<PathBuf>,
    pub access_token: Option<Zeroizing<String>>,
    /// Namespace to watch, `None` for all namespaces
    pub watch_namespace: Option<String>,
    /// Namespace the controller runs in
    pub controller_namespace: String,
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Timeout of a single Atlas request (seconds)
    pub request_timeout_secs: u64,
    /// Delay before a secret watch stream is restarted after it ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Explicit serverless tolerance; derived from the base URL when unset
    pub serverless_tolerate_failure: Option<bool>,
    /// Run the `AtlasAuditing` controller (requires the CRD and an access token)
    pub enable_auditing: bool,
}

impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("retry_secs", &self.retry_secs)
            .field("atlas_base_url", &self.atlas_base_url)
            .field("access_token_file", &self.access_token_file)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("watch_namespace", &self.watch_namespace)
            .field("controller_namespace", &self.controller_namespace)
            .field("metrics_port", &self.metrics_port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("watch_restart_delay_secs", &self.watch_restart_delay_secs)
            .field("serverless_tolerate_failure", &self.serverless_tolerate_failure)
            .field("enable_auditing", &self.enable_auditing)
            .finish()
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry_secs: DEFAULT_RETRY_SECS,
            atlas_base_url: DEFAULT_ATLAS_BASE_URL.to_string(),
            access_token_file: None,
            access_token: None,
            watch_namespace: None,
            controller_namespace: "mongodb-atlas-system".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            serverless_tolerate_failure: None,
            enable_auditing: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            retry_secs: env_var_or_default(&lookup, "DEFAULT_RETRY_SECS", defaults.retry_secs),
            atlas_base_url: env_var_or_default_str(&lookup, "ATLAS_BASE_URL", &defaults.atlas_base_url),
            access_token_file: non_empty(&lookup, "ATLAS_ACCESS_TOKEN_FILE").map(PathBuf::from),
            access_token: non_empty(&lookup, "ATLAS_ACCESS_TOKEN").map(Zeroizing::new),
            watch_namespace: non_empty(&lookup, "WATCH_NAMESPACE"),
            controller_namespace: env_var_or_default_str(
                &lookup,
                "POD_NAMESPACE",
                &defaults.controller_namespace,
            ),
            metrics_port: env_var_or_default(&lookup, "METRICS_PORT", defaults.metrics_port),
            log_level: env_var_or_default_str(&lookup, "LOG_LEVEL", &defaults.log_level),
            log_format: env_var_or_default_str(&lookup, "LOG_FORMAT", &defaults.log_format),
            request_timeout_secs: env_var_or_default(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            watch_restart_delay_secs: env_var_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            serverless_tolerate_failure: lookup("SERVERLESS_TOLERATE_FAILURE").map(|v| parse_bool(&v)),
            enable_auditing: lookup("ENABLE_AUDITING").map_or(defaults.enable_auditing, |v| parse_bool(&v)),
        }
    }

    /// Get `InProgress` retry duration
    #[must_use]
    pub fn retry_duration(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Whether a failed serverless listing is treated as an empty one
    #[must_use]
    pub fn serverless_failure_tolerated(&self) -> bool {
        self.serverless_tolerate_failure
            .unwrap_or_else(|| is_cloud_gov_host(&self.atlas_base_url))
    }

    /// Resolve the Atlas access token. A token file wins over the inline
    /// variable so rotated tokens are picked up on restart.
    ///
    /// # Errors
    /// Returns an error if no token is configured, the file cannot be read,
    /// or the token is empty
    pub fn load_access_token(&self) -> Result<Zeroizing<String>, ConfigError> {
        let token = match (&self.access_token_file, &self.access_token) {
            (Some(path), _) => {
                let raw = Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::ReadAccessToken {
                        path: path.clone(),
                        source,
                    }
                })?);
                Zeroizing::new(raw.trim().to_string())
            }
            (None, Some(token)) => Zeroizing::new(token.trim().to_string()),
            (None, None) => return Err(ConfigError::MissingAccessToken),
        };
        if token.is_empty() {
            return Err(ConfigError::EmptyAccessToken);
        }
        Ok(token)
    }
}

/// Whether `base_url` points at an Atlas for Government host
#[must_use]
pub fn is_cloud_gov_host(base_url: &str) -> bool {
    let without_scheme = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    let host = without_scheme.split('/').next().unwrap_or_default();
    CLOUD_GOV_DOMAINS.iter().any(|domain| host.starts_with(domain))
}

/// Read variable or return default value
fn env_var_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read variable as string or return default
fn env_var_or_default_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
