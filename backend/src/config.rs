//! Runtime configuration from the environment (and `.env`).
//!
//! | Variable                       | Default                 |
//! |--------------------------------|-------------------------|
//! | `PILOTAGE_SOURCE`              | `<workbook>.xlsx`       |
//! | `PILOTAGE_SOURCE_TOKEN`        | none                    |
//! | `PILOTAGE_WORKBOOK`            | `Test_Dashboard`        |
//! | `PILOTAGE_CACHE_TTL_SECS`      | `60`                    |
//! | `PILOTAGE_SESSION_IDLE_SECS`   | `28800` (8 hours)       |
//! | `PILOTAGE_REFERENCE_DATE`      | today (`DD/MM/YYYY`)    |
//! | `PILOTAGE_USERNAME`/`_PASSWORD`| required by `serve`     |
//! | `PILOTAGE_PORT`                | `3000`                  |
//! | `PILOTAGE_SHEET_*`             | default sheet names     |

use chrono::NaiveDate;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::error::{ConfigError, ConfigResult};
use crate::normalize::parse_date_str;
use crate::session::{Credentials, DEFAULT_IDLE_TIMEOUT};
use crate::source::SourceConfig;
use crate::transform::pipeline::{PipelineOptions, WorkbookLayout};

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub layout: WorkbookLayout,
    pub cache_ttl: Duration,
    pub session_idle: Duration,
    pub reference_date: Option<NaiveDate>,
    pub credentials: Option<Credentials>,
    pub port: u16,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = WorkbookLayout::default();
        let layout = WorkbookLayout {
            workbook: get("PILOTAGE_WORKBOOK").unwrap_or(defaults.workbook),
            people: get("PILOTAGE_SHEET_PEOPLE").unwrap_or(defaults.people),
            salaries: get("PILOTAGE_SHEET_SALARIES").unwrap_or(defaults.salaries),
            training: get("PILOTAGE_SHEET_TRAINING").unwrap_or(defaults.training),
            recruitment: get("PILOTAGE_SHEET_RECRUITMENT").unwrap_or(defaults.recruitment),
            finances: get("PILOTAGE_SHEET_FINANCES").unwrap_or(defaults.finances),
            opportunities: get("PILOTAGE_SHEET_OPPORTUNITIES").or(defaults.opportunities),
        };

        let location = get("PILOTAGE_SOURCE").unwrap_or_else(|| format!("{}.xlsx", layout.workbook));
        let source = SourceConfig::from_location(&location, &layout.workbook).with_token(get("PILOTAGE_SOURCE_TOKEN"));

        let cache_ttl = match get("PILOTAGE_CACHE_TTL_SECS") {
            Some(v) => Duration::from_secs(parse_key("PILOTAGE_CACHE_TTL_SECS", &v)?),
            None => DEFAULT_TTL,
        };

        let session_idle = match get("PILOTAGE_SESSION_IDLE_SECS") {
            Some(v) => Duration::from_secs(parse_key("PILOTAGE_SESSION_IDLE_SECS", &v)?),
            None => DEFAULT_IDLE_TIMEOUT,
        };

        let reference_date = match get("PILOTAGE_REFERENCE_DATE") {
            Some(v) => Some(parse_date_str(&v).ok_or_else(|| ConfigError::Invalid {
                key: "PILOTAGE_REFERENCE_DATE".to_string(),
                message: format!("'{}' is not a DD/MM/YYYY date", v),
            })?),
            None => None,
        };

        let credentials = match (get("PILOTAGE_USERNAME"), lookup("PILOTAGE_PASSWORD")) {
            (Some(user), Some(password)) if !password.is_empty() => Some(Credentials::new(user, password)),
            _ => None,
        };

        let port = match get("PILOTAGE_PORT") {
            Some(v) => parse_key("PILOTAGE_PORT", &v)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            source,
            layout,
            cache_ttl,
            session_idle,
            reference_date,
            credentials,
            port,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            layout: self.layout.clone(),
            reference_date: self.reference_date,
        }
    }

    /// Login credentials, required to serve the dashboard.
    pub fn require_credentials(&self) -> ConfigResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("PILOTAGE_USERNAME and PILOTAGE_PASSWORD".to_string()))
    }
}

fn parse_key<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.session_idle, Duration::from_secs(8 * 60 * 60));
        assert_eq!(config.layout.people, "Données Sociales");
        assert_eq!(config.source, SourceConfig::Xlsx { path: "Test_Dashboard.xlsx".into() });
        assert!(config.credentials.is_none());
        assert!(config.require_credentials().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PILOTAGE_SOURCE", "https://sheets.example/api"),
            ("PILOTAGE_SOURCE_TOKEN", "tok"),
            ("PILOTAGE_WORKBOOK", "RH_2025"),
            ("PILOTAGE_SHEET_SALARIES", "Paie"),
            ("PILOTAGE_SHEET_OPPORTUNITIES", "Pipeline"),
            ("PILOTAGE_REFERENCE_DATE", "01/01/2024"),
            ("PILOTAGE_USERNAME", "admin"),
            ("PILOTAGE_PASSWORD", "secret"),
            ("PILOTAGE_CACHE_TTL_SECS", " 5 "),
            ("PILOTAGE_SESSION_IDLE_SECS", "900"),
        ])
        .unwrap();
        assert_eq!(config.layout.salaries, "Paie");
        assert_eq!(config.layout.opportunities.as_deref(), Some("Pipeline"));
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.session_idle, Duration::from_secs(900));
        assert!(matches!(
            config.source,
            SourceConfig::Http { ref workbook, token: Some(_), .. } if workbook == "RH_2025"
        ));
        assert_eq!(config.require_credentials().unwrap().username, "admin");
        assert_eq!(config.pipeline_options().reference_date, config.reference_date);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("PILOTAGE_PORT", "http")]),
            Err(ConfigError::Invalid { ref key, .. }) if key == "PILOTAGE_PORT"
        ));
        assert!(config(&[("PILOTAGE_REFERENCE_DATE", "demain")]).is_err());
    }
}
