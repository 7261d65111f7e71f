//! Configuration loading.
//!
//! Settings come from an optional TOML file, then `BACKOFFICE_*` environment
//! variables, then command-line flags, each overriding the previous. Every
//! field of the file is optional; absent values fall back to the library
//! defaults.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use backoffice_lib::cache::CacheConfig;
use backoffice_lib::triage::CalendarConfig;
use backoffice_lib::triage::PaymentWindows;
use chrono::FixedOffset;
use serde::Deserialize;

use crate::paths;

pub const URL_VAR: &str = "BACKOFFICE_URL";
pub const KEY_VAR: &str = "BACKOFFICE_KEY";
pub const TOKEN_VAR: &str = "BACKOFFICE_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing gateway URL (use --url, BACKOFFICE_URL or `url` in the config file)")]
    MissingUrl,
    #[error("Missing API key (use --key, BACKOFFICE_KEY or `api_key` in the config file)")]
    MissingKey,
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub image_bucket: Option<String>,
    /// Persist list totals between runs. Default: true
    pub durable_counts: Option<bool>,
    pub cache: CacheSection,
    pub payments: PaymentsSection,
    pub calendar: CalendarSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub record_ttl_secs: Option<u64>,
    pub list_ttl_secs: Option<u64>,
    pub count_ttl_secs: Option<u64>,
    pub durable_count_ttl_secs: Option<u64>,
    /// 0 disables the fetch timeout.
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaymentsSection {
    pub due_today_after_hours: Option<i64>,
    pub overdue_after_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarSection {
    pub first_hour: Option<u32>,
    pub last_hour: Option<u32>,
    pub utc_offset_minutes: Option<i32>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub timeout: Option<Duration>,
    pub image_bucket: Option<String>,
    pub durable_counts: bool,
    pub cache: CacheConfig,
    pub windows: PaymentWindows,
    pub calendar: CalendarConfig,
}

impl FileConfig {
    /// Reads `path`, or the default config file if no path is given. A
    /// missing default file yields an empty config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match paths::config_file() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

impl Settings {
    /// Merges the file, the environment (read through `env`) and the flags.
    pub fn resolve(
        file: FileConfig,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let url = non_empty(overrides.url)
            .or_else(|| non_empty(env(URL_VAR)))
            .or_else(|| non_empty(file.url))
            .ok_or(ConfigError::MissingUrl)?;
        let api_key = non_empty(overrides.api_key)
            .or_else(|| non_empty(env(KEY_VAR)))
            .or_else(|| non_empty(file.api_key))
            .ok_or(ConfigError::MissingKey)?;
        let access_token = non_empty(env(TOKEN_VAR)).or_else(|| non_empty(file.access_token));

        Ok(Self {
            url,
            api_key,
            access_token,
            timeout: file.timeout_secs.map(Duration::from_secs),
            image_bucket: file.image_bucket,
            durable_counts: file.durable_counts.unwrap_or(true),
            cache: file.cache.apply(CacheConfig::default()),
            windows: file.payments.windows()?,
            calendar: file.calendar.calendar()?,
        })
    }
}

impl CacheSection {
    fn apply(&self, mut config: CacheConfig) -> CacheConfig {
        if let Some(secs) = self.record_ttl_secs {
            config = config.with_record_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = self.list_ttl_secs {
            config = config.with_list_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = self.count_ttl_secs {
            config = config.with_count_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = self.durable_count_ttl_secs {
            config = config.with_durable_count_ttl(Duration::from_secs(secs));
        }
        match self.fetch_timeout_secs {
            Some(0) => config.with_fetch_timeout(None),
            Some(secs) => config.with_fetch_timeout(Some(Duration::from_secs(secs))),
            None => config,
        }
    }
}

impl PaymentsSection {
    fn windows(&self) -> Result<PaymentWindows, ConfigError> {
        let defaults = PaymentWindows::default();
        let due_today = self
            .due_today_after_hours
            .map(chrono::Duration::hours)
            .unwrap_or(defaults.due_today_after);
        let overdue = self
            .overdue_after_hours
            .map(chrono::Duration::hours)
            .unwrap_or(defaults.overdue_after);

        PaymentWindows::new(due_today, overdue).map_err(|e| ConfigError::InvalidValue {
            field: "payments",
            reason: e.to_string(),
        })
    }
}

impl CalendarSection {
    fn calendar(&self) -> Result<CalendarConfig, ConfigError> {
        let defaults = CalendarConfig::default();
        let offset = match self.utc_offset_minutes {
            Some(minutes) => FixedOffset::east_opt(minutes.saturating_mul(60)).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "calendar.utc_offset_minutes",
                    reason: format!("{minutes} is not a valid UTC offset"),
                }
            })?,
            None => defaults.offset,
        };
        let calendar = CalendarConfig {
            first_hour: self.first_hour.unwrap_or(defaults.first_hour),
            last_hour: self.last_hour.unwrap_or(defaults.last_hour),
            offset,
        };
        calendar.validate().map_err(|e| ConfigError::InvalidValue {
            field: "calendar",
            reason: e.to_string(),
        })?;
        Ok(calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = FileConfig::parse("url = \"https://db.example.co\"\napi_key = \"anon\"").unwrap();
        let settings = Settings::resolve(file, Overrides::default(), no_env).unwrap();

        assert_eq!(settings.cache.record_ttl, Duration::from_secs(300));
        assert_eq!(settings.windows, PaymentWindows::default());
        assert_eq!(settings.calendar, CalendarConfig::default());
        assert!(settings.durable_counts);
    }

    #[test]
    fn test_precedence() {
        let file = FileConfig::parse("url = \"https://file.example.co\"\napi_key = \"file\"").unwrap();
        let env = |name: &str| (name == URL_VAR).then(|| "https://env.example.co".to_string());
        let overrides = Overrides {
            url: None,
            api_key: Some("flag".to_string()),
        };

        let settings = Settings::resolve(file, overrides, env).unwrap();
        assert_eq!(settings.url, "https://env.example.co");
        assert_eq!(settings.api_key, "flag");
    }

    #[test]
    fn test_missing_url() {
        let result = Settings::resolve(FileConfig::default(), Overrides::default(), no_env);
        assert!(matches!(result, Err(ConfigError::MissingUrl)));
    }

    #[test]
    fn test_sections() {
        let file = FileConfig::parse(
            r#"
            url = "https://db.example.co"
            api_key = "anon"

            [cache]
            count_ttl_secs = 60
            fetch_timeout_secs = 0

            [payments]
            due_today_after_hours = 12
            overdue_after_hours = 36

            [calendar]
            first_hour = 7
            utc_offset_minutes = 120
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Overrides::default(), no_env).unwrap();

        assert_eq!(settings.cache.count_ttl, Duration::from_secs(60));
        assert_eq!(settings.cache.fetch_timeout, None);
        assert_eq!(settings.windows.overdue_after, chrono::Duration::hours(36));
        assert_eq!(settings.calendar.first_hour, 7);
        assert_eq!(settings.calendar.offset.local_minus_utc(), 7200);
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        let file = FileConfig::parse("url = \"u\"\napi_key = \"k\"\n[payments]\noverdue_after_hours = 1").unwrap();
        assert!(matches!(
            Settings::resolve(file, Overrides::default(), no_env),
            Err(ConfigError::InvalidValue { field: "payments", .. })
        ));

        assert!(FileConfig::parse("unknown = 1").is_err());
    }
}
