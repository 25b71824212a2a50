//! Runtime configuration read from the environment.

use chrono_tz::Tz;
use std::path::PathBuf;

pub const DEFAULT_RAW_DIR: &str = "data/raw";
pub const DEFAULT_FILE_PATTERNS: &str = "*.csv,*.xlsx,*.xls";
pub const DEFAULT_TZ: &str = "Europe/Moscow";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Directory scanned by the ingest step.
    pub raw_dir: PathBuf,
    /// Glob patterns, relative to `raw_dir`.
    pub file_patterns: Vec<String>,
    /// Zone for timestamps written without an offset, and for calendar enrichment.
    pub default_tz: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = match var("DATABASE_URL") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Err("Missing DATABASE_URL".to_string()),
        };

        let raw_dir = var("RAW_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RAW_DIR));

        let patterns = var("FILE_PATTERNS")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_PATTERNS.to_string());
        let file_patterns = patterns
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        for pattern in &file_patterns {
            glob::Pattern::new(pattern).map_err(|e| format!("FILE_PATTERNS entry {:?} is invalid: {}", pattern, e))?;
        }

        let tz_name = var("DEFAULT_TZ")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TZ.to_string());
        let default_tz = tz_name
            .trim()
            .parse::<Tz>()
            .map_err(|_| format!("DEFAULT_TZ is not a known IANA time zone: {}", tz_name))?;

        Ok(Config {
            database_url,
            raw_dir,
            file_patterns,
            default_tz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/heat")]).unwrap();
        assert_eq!(cfg.raw_dir, PathBuf::from("data/raw"));
        assert_eq!(cfg.file_patterns, vec!["*.csv", "*.xlsx", "*.xls"]);
        assert_eq!(cfg.default_tz, chrono_tz::Europe::Moscow);
    }

    #[test]
    fn database_url_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/heat"),
            ("RAW_DIR", "/srv/exports"),
            ("FILE_PATTERNS", " *.csv , ,report_*.xlsx"),
            ("DEFAULT_TZ", "Asia/Yekaterinburg"),
        ])
        .unwrap();
        assert_eq!(cfg.raw_dir, PathBuf::from("/srv/exports"));
        assert_eq!(cfg.file_patterns, vec!["*.csv", "report_*.xlsx"]);
        assert_eq!(cfg.default_tz, chrono_tz::Asia::Yekaterinburg);
    }

    #[test]
    fn rejects_unknown_zone_and_bad_pattern() {
        assert!(config(&[("DATABASE_URL", "x"), ("DEFAULT_TZ", "Mars/Olympus")]).is_err());
        assert!(config(&[("DATABASE_URL", "x"), ("FILE_PATTERNS", "[")]).is_err());
    }
}
