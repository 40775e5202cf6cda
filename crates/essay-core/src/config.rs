use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;

use crate::error::ConfigError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AUDIT_TABLE: &str = "essay_review";
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

/// On-disk settings. Every field is optional; environment variables win.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ConfigFile {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub shared_passphrase: Option<String>,
    pub audit_table: Option<String>,
    pub audit_timezone: Option<String>,
    pub audit_utc_offset_hours: Option<i32>,
}

impl ConfigFile {
    /// Loads the user config file, or an empty one if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("essay-feedback").join("config.json"))
    }
}

/// Where audit rows go and which keys may write them.
#[derive(Clone)]
pub struct AuditConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
    pub table: String,
    pub timezone: String,
    pub utc_offset: FixedOffset,
}

/// Fully resolved process-wide settings, fixed for the process lifetime.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub shared_passphrase: String,
    pub audit: AuditConfig,
}

impl Config {
    /// Reads the config file, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let file = ConfigFile::load()?;
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Merges `file` with values from `env`. Every missing required setting is
    /// reported at once.
    pub fn resolve<F>(file: ConfigFile, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str, fallback: Option<String>| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .or(fallback.filter(|v| !v.trim().is_empty()))
        };

        let openai_api_key = pick("OPENAI_API_KEY", file.openai_api_key);
        let supabase_url = pick("SUPABASE_URL", file.supabase_url);
        let supabase_key = pick("SUPABASE_KEY", file.supabase_key);
        let shared_passphrase = pick("PLAINTEXT_SHARED_PASSWORD", file.shared_passphrase);

        let mut missing = Vec::new();
        if openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if supabase_url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if supabase_key.is_none() {
            missing.push("SUPABASE_KEY");
        }
        if shared_passphrase.is_none() {
            missing.push("PLAINTEXT_SHARED_PASSWORD");
        }

        let (Some(openai_api_key), Some(supabase_url), Some(supabase_key), Some(shared_passphrase)) =
            (openai_api_key, supabase_url, supabase_key, shared_passphrase)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let offset_hours = match env("AUDIT_UTC_OFFSET_HOURS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<i32>().map_err(|e| ConfigError::Invalid {
                name: "AUDIT_UTC_OFFSET_HOURS",
                message: e.to_string(),
            })?,
            None => file.audit_utc_offset_hours.unwrap_or(DEFAULT_UTC_OFFSET_HOURS),
        };
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid {
                name: "AUDIT_UTC_OFFSET_HOURS",
                message: format!("{offset_hours} is out of range"),
            })?;

        Ok(Self {
            openai_api_key,
            openai_base_url: pick("OPENAI_BASE_URL", file.openai_base_url)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            shared_passphrase,
            audit: AuditConfig {
                url: supabase_url.trim_end_matches('/').to_string(),
                anon_key: supabase_key,
                service_role_key: pick("SUPABASE_SERVICE_ROLE_KEY", file.supabase_service_role_key),
                table: pick("AUDIT_TABLE", file.audit_table)
                    .unwrap_or_else(|| DEFAULT_AUDIT_TABLE.to_string()),
                timezone: pick("AUDIT_TIMEZONE", file.audit_timezone)
                    .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
                utc_offset,
            },
        })
    }
}

// Secrets never end up in logs through Debug.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("shared_passphrase", &"<redacted>")
            .field("audit", &self.audit)
            .finish()
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("service_role_key", &self.service_role_key.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .field("timezone", &self.timezone)
            .field("utc_offset", &self.utc_offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("OPENAI_API_KEY", "sk-test"),
            ("SUPABASE_URL", "https://db.example.co/"),
            ("SUPABASE_KEY", "anon"),
            ("PLAINTEXT_SHARED_PASSWORD", "letmein"),
        ]
    }

    #[test]
    fn test_resolve_from_env_with_defaults() {
        let config = Config::resolve(ConfigFile::default(), env_of(&full_env())).unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.audit.url, "https://db.example.co");
        assert_eq!(config.audit.table, DEFAULT_AUDIT_TABLE);
        assert_eq!(config.audit.timezone, "Asia/Seoul");
        assert_eq!(config.audit.utc_offset.local_minus_utc(), 9 * 3600);
        assert!(config.audit.service_role_key.is_none());
    }

    #[test]
    fn test_missing_values_are_all_reported() {
        let err = Config::resolve(
            ConfigFile::default(),
            env_of(&[("SUPABASE_URL", "https://db.example.co"), ("SUPABASE_KEY", "  ")]),
        )
        .unwrap_err();

        match err {
            ConfigError::Missing(names) => assert_eq!(
                names,
                vec!["OPENAI_API_KEY", "SUPABASE_KEY", "PLAINTEXT_SHARED_PASSWORD"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            openai_api_key: Some("from-file".into()),
            supabase_service_role_key: Some("service".into()),
            audit_table: Some("reviews".into()),
            ..Default::default()
        };
        let config = Config::resolve(file, env_of(&full_env())).unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.audit.service_role_key.as_deref(), Some("service"));
        assert_eq!(config.audit.table, "reviews");
    }

    #[test]
    fn test_bad_offset_is_invalid() {
        let mut env = full_env();
        env.push(("AUDIT_UTC_OFFSET_HOURS", "ninety"));
        let err = Config::resolve(ConfigFile::default(), env_of(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AUDIT_UTC_OFFSET_HOURS", .. }));
    }

    #[test]
    fn test_huge_offset_is_invalid_not_a_panic() {
        for hours in ["1000000", "1193047", "-1193047", "25"] {
            let mut env = full_env();
            env.push(("AUDIT_UTC_OFFSET_HOURS", hours));
            let err = Config::resolve(ConfigFile::default(), env_of(&env)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: "AUDIT_UTC_OFFSET_HOURS", .. }),
                "{hours} should be rejected"
            );
        }

        let file = ConfigFile { audit_utc_offset_hours: Some(i32::MAX), ..Default::default() };
        let err = Config::resolve(file, env_of(&full_env())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"openai_api_key":"sk-file","shared_passphrase":"pw","audit_utc_offset_hours":0}"#,
        )
        .unwrap();

        let file = ConfigFile::load_from(&path).unwrap();
        assert_eq!(file.openai_api_key.as_deref(), Some("sk-file"));
        assert_eq!(file.audit_utc_offset_hours, Some(0));
        assert!(file.supabase_url.is_none());
    }

    #[test]
    fn test_missing_file_is_empty_and_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let absent = ConfigFile::load_from(&dir.path().join("nope.json")).unwrap();
        assert!(absent.openai_api_key.is_none());

        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(ConfigFile::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::resolve(ConfigFile::default(), env_of(&full_env())).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-test"));
        assert!(!printed.contains("letmein"));
        assert!(printed.contains("<redacted>"));
    }
}
