use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_OPEN: usize = 5;

pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Per-session construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub max_open: usize,
    pub default_selected_path: Option<String>,
    pub default_open: bool,
    pub default_collapsed: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_open: DEFAULT_MAX_OPEN,
            default_selected_path: None,
            default_open: true,
            default_collapsed: false,
        }
    }
}

/// Fields a client may override when creating a session. Anything left out
/// keeps the server's configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExplorerOverrides {
    pub max_open: Option<usize>,
    pub default_selected_path: Option<String>,
    pub default_open: Option<bool>,
    pub default_collapsed: Option<bool>,
}

impl ExplorerOverrides {
    pub fn apply_to(self, base: &ExplorerConfig) -> ExplorerConfig {
        ExplorerConfig {
            max_open: self.max_open.unwrap_or(base.max_open),
            default_selected_path: self
                .default_selected_path
                .or_else(|| base.default_selected_path.clone()),
            default_open: self.default_open.unwrap_or(base.default_open),
            default_collapsed: self.default_collapsed.unwrap_or(base.default_collapsed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub snapshot_path: PathBuf,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub max_sessions: usize,
    pub explorer: ExplorerConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ExplorerConfig::default();
        let explorer = ExplorerConfig {
            max_open: parse_var(&lookup, "MAX_OPEN")?.unwrap_or(defaults.max_open),
            default_selected_path: lookup("DEFAULT_SELECTED_PATH").filter(|p| !p.is_empty()),
            default_open: parse_var(&lookup, "DEFAULT_OPEN")?.unwrap_or(defaults.default_open),
            default_collapsed: parse_var(&lookup, "DEFAULT_COLLAPSED")?
                .unwrap_or(defaults.default_collapsed),
        };
        Ok(Self {
            port: parse_var(&lookup, "PORT")?.unwrap_or(3000),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            cert_path: lookup("CERT_PATH"),
            key_path: lookup("KEY_PATH"),
            max_sessions: parse_var(&lookup, "MAX_SESSIONS")?
                .unwrap_or(DEFAULT_MAX_SESSIONS)
                .max(1),
            explorer,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.snapshot_path, PathBuf::from("."));
        assert_eq!(config.explorer, ExplorerConfig::default());
        assert_eq!(config.explorer.max_open, 5);
    }

    #[test]
    fn reads_explorer_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MAX_OPEN", "3"),
            ("DEFAULT_SELECTED_PATH", "/proj/src/a.ts"),
            ("DEFAULT_OPEN", "false"),
            ("DEFAULT_COLLAPSED", "true"),
            ("SNAPSHOT_PATH", "/tmp/snapshot.json"),
        ]))
        .unwrap();
        assert_eq!(config.explorer.max_open, 3);
        assert_eq!(
            config.explorer.default_selected_path.as_deref(),
            Some("/proj/src/a.ts")
        );
        assert!(!config.explorer.default_open);
        assert!(config.explorer.default_collapsed);
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/snapshot.json"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = ServerConfig::from_lookup(lookup(&[("MAX_OPEN", "many")])).unwrap_err();
        assert!(err.to_string().contains("MAX_OPEN"));
    }

    #[test]
    fn overrides_fill_gaps_from_server_defaults() {
        let base = ExplorerConfig {
            max_open: 2,
            default_selected_path: Some("/proj/a.ts".to_string()),
            ..ExplorerConfig::default()
        };
        let overrides: ExplorerOverrides =
            serde_json::from_str(r#"{"defaultCollapsed": true}"#).unwrap();
        let config = overrides.apply_to(&base);
        assert_eq!(config.max_open, 2);
        assert_eq!(config.default_selected_path.as_deref(), Some("/proj/a.ts"));
        assert!(config.default_open);
        assert!(config.default_collapsed);
    }

    #[test]
    fn overrides_reject_bad_types_and_unknown_fields() {
        assert!(serde_json::from_str::<ExplorerOverrides>(r#"{"maxOpen": "two"}"#).is_err());
        assert!(serde_json::from_str::<ExplorerOverrides>(r#"{"maxTabs": 2}"#).is_err());
    }

    #[test]
    fn session_limit_defaults_and_clamps() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        let config = ServerConfig::from_lookup(lookup(&[("MAX_SESSIONS", "0")])).unwrap();
        assert_eq!(config.max_sessions, 1);
    }
}
