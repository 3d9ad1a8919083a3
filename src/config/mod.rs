//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::database::IN_MEMORY;
use crate::store::logbook::DEFAULT_TABLE;
use crate::validation::DEFAULT_ITEM_CODE_MAX_LEN;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,

    /// SQLite file for items and users; `:memory:` keeps everything in RAM
    pub database_path: PathBuf,
    /// Longest accepted inventory code
    pub item_code_max_len: usize,

    /// Allowed client origins for CORS, comma separated
    pub client_origin: String,

    /// Remote logbook settings, present only when both URL and key are set
    pub supabase: Option<SupabaseConfig>,
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub logbook_table: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let item_code_max_len = match lookup("ITEM_CODE_MAX_LEN") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|len| *len > 0)
                .ok_or(ConfigError::InvalidNumber("ITEM_CODE_MAX_LEN"))?,
            None => DEFAULT_ITEM_CODE_MAX_LEN,
        };

        let supabase = match (
            non_blank(&lookup, "SUPABASE_URL"),
            non_blank(&lookup, "SUPABASE_KEY"),
        ) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url,
                key,
                logbook_table: non_blank(&lookup, "LOGBOOK_TABLE")
                    .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            }),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (None, None) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT")
                .map(|f| f.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("records.db")),
            item_code_max_len,

            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_default(),

            supabase,
        })
    }

    pub fn in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be a positive number")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.database_path, PathBuf::from("records.db"));
        assert_eq!(config.item_code_max_len, 10);
        assert!(config.supabase.is_none());
        assert!(!config.in_memory());
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:7000")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            load(&[("ITEM_CODE_MAX_LEN", "zero")]),
            Err(ConfigError::InvalidNumber(_))
        ));
        assert!(matches!(
            load(&[("SUPABASE_URL", "https://x.supabase.co")]),
            Err(ConfigError::Missing("SUPABASE_KEY"))
        ));
    }

    #[test]
    fn supabase_enabled_with_both_keys() {
        let config = load(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
            ("DATABASE_PATH", ":memory:"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert!(config.log_json);
        let supabase = config.supabase.as_ref().unwrap();
        assert_eq!(supabase.logbook_table, "logbook_kkn");
        assert!(config.in_memory());
    }
}
