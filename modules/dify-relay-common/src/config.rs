use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Relay configuration loaded from environment variables.
/// Every value has a default; nothing is required.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Request limits
    pub max_upload_files: usize,
    pub max_file_size: usize,
    pub default_user: String,

    // Timeouts
    pub api_timeout: Duration,
    pub download_timeout: Duration,
    pub callback_timeout: Duration,

    // Async tasks
    pub max_concurrent_tasks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3010,
            environment: "development".to_string(),
            max_upload_files: 10,
            max_file_size: 100 * 1024 * 1024,
            default_user: "user".to_string(),
            api_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(60),
            callback_timeout: Duration::from_secs(10),
            max_concurrent_tasks: 32,
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable or non-positive numbers
    /// keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            host: text("HOST", defaults.host),
            port: positive(&lookup, "PORT", defaults.port),
            environment: lookup("APP_ENV")
                .or_else(|| lookup("GO_ENV"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.environment),
            max_upload_files: positive(&lookup, "MAX_UPLOAD_FILES", defaults.max_upload_files),
            max_file_size: positive(&lookup, "MAX_FILE_SIZE", defaults.max_file_size),
            default_user: text("DEFAULT_USER", defaults.default_user),
            api_timeout: Duration::from_secs(positive(
                &lookup,
                "API_TIMEOUT",
                defaults.api_timeout.as_secs(),
            )),
            download_timeout: Duration::from_secs(positive(
                &lookup,
                "DOWNLOAD_TIMEOUT",
                defaults.download_timeout.as_secs(),
            )),
            callback_timeout: Duration::from_secs(positive(
                &lookup,
                "CALLBACK_TIMEOUT",
                defaults.callback_timeout.as_secs(),
            )),
            max_concurrent_tasks: positive(
                &lookup,
                "MAX_CONCURRENT_TASKS",
                defaults.max_concurrent_tasks,
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Largest request body accepted: every file of a multi-file form at full size.
    pub fn body_limit(&self) -> usize {
        self.max_file_size.saturating_mul(self.max_upload_files)
    }

    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  environment: {}", self.environment);
        tracing::info!("  listen: {}:{}", self.host, self.port);
        tracing::info!(
            "  limits: max_upload_files={} max_file_size={}",
            self.max_upload_files,
            self.max_file_size
        );
        tracing::info!(
            "  timeouts: api={:?} download={:?} callback={:?}",
            self.api_timeout,
            self.download_timeout,
            self.callback_timeout
        );
        tracing::info!("  max_concurrent_tasks: {}", self.max_concurrent_tasks);
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(key, value = %raw, "Ignoring invalid config value, keeping default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3010);
        assert_eq!(config.max_upload_files, 10);
        assert_eq!(config.default_user, "user");
        assert_eq!(config.api_timeout, Duration::from_secs(120));
        assert_eq!(config.callback_timeout, Duration::from_secs(10));
        assert!(!config.is_production());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("MAX_UPLOAD_FILES", "3"),
            ("DEFAULT_USER", "relay"),
            ("API_TIMEOUT", "30"),
            ("APP_ENV", "production"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_files, 3);
        assert_eq!(config.default_user, "relay");
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert!(config.is_production());
    }

    #[test]
    fn invalid_and_non_positive_values_keep_defaults() {
        let config = config_from(&[("MAX_UPLOAD_FILES", "0"), ("API_TIMEOUT", "soon")]);
        assert_eq!(config.max_upload_files, 10);
        assert_eq!(config.api_timeout, Duration::from_secs(120));
    }

    #[test]
    fn production_check_follows_the_resolved_environment() {
        assert!(config_from(&[("GO_ENV", "Production")]).is_production());
        assert!(config_from(&[("APP_ENV", "PRODUCTION")]).is_production());
        assert!(!config_from(&[("APP_ENV", "staging"), ("GO_ENV", "production")]).is_production());
        assert!(!config_from(&[("APP_ENV", "prod")]).is_production());
    }

    #[test]
    fn go_env_is_accepted_as_environment_alias() {
        let config = config_from(&[("GO_ENV", "staging")]);
        assert_eq!(config.environment, "staging");
    }

    #[test]
    fn body_limit_covers_all_files() {
        let config = config_from(&[("MAX_UPLOAD_FILES", "2"), ("MAX_FILE_SIZE", "1000")]);
        assert_eq!(config.body_limit(), 2000);
    }
}
