use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConchConfig {
    #[serde(default)]
    pub api: ApiConf,
    /// Preferred workspace, by id or by name.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub ui: UiConf,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiConf {
    pub base_url: String, // ex: "https://conch.example.com"
    /// Transport-level timeout; the view model itself imposes none.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UiConf {
    #[serde(default = "default_assign_success_ms")]
    pub assign_success_ms: u64,
    #[serde(default = "default_active_window_secs")]
    pub active_window_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Credentials {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

fn default_assign_success_ms() -> u64 {
    2600
}

fn default_active_window_secs() -> u64 {
    crate::health::DEFAULT_ACTIVE_WINDOW.whole_seconds().unsigned_abs()
}

impl Default for ApiConf {
    fn default() -> Self {
        Self { base_url: "http://localhost:5001".into(), timeout_secs: None }
    }
}

impl Default for UiConf {
    fn default() -> Self {
        Self {
            assign_success_ms: default_assign_success_ms(),
            active_window_secs: default_active_window_secs(),
        }
    }
}

impl Default for ConchConfig {
    fn default() -> Self {
        Self {
            api: ApiConf::default(),
            workspace: None,
            ui: UiConf::default(),
            credentials: None,
        }
    }
}

impl ConchConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).await?;
        Self::parse(&txt)
    }

    /// `CONCH_URL`, `CONCH_WORKSPACE`, `CONCH_USER` and `CONCH_PASSWORD` win over the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CONCH_URL") {
            self.api.base_url = url;
        }
        if let Some(ws) = lookup("CONCH_WORKSPACE") {
            self.workspace = Some(ws);
        }
        match (lookup("CONCH_USER"), lookup("CONCH_PASSWORD")) {
            (Some(user), Some(password)) => self.credentials = Some(Credentials { user, password }),
            (None, Some(password)) => {
                if let Some(creds) = self.credentials.as_mut() {
                    creds.password = password;
                }
            }
            (Some(user), None) => {
                let password = self.credentials.take().map(|c| c.password).unwrap_or_default();
                self.credentials = Some(Credentials { user, password });
            }
            (None, None) => {}
        }
    }

    pub fn assign_success_window(&self) -> Duration {
        Duration::from_millis(self.ui.assign_success_ms)
    }

    pub fn active_window(&self) -> time::Duration {
        time::Duration::seconds(self.ui.active_window_secs as i64)
    }
}

/// Reads `CONCH_CONFIG` (default `conch.yaml`). Missing or broken files fall back to defaults.
pub async fn load_config() -> ConchConfig {
    let path = std::env::var("CONCH_CONFIG").unwrap_or_else(|_| "conch.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        ConchConfig::from_file(&path).await.unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "invalid config, using defaults");
            ConchConfig::default()
        })
    } else {
        warn!(path = %path, "no config file, using defaults");
        ConchConfig::default()
    };
    cfg.apply_env();
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = ConchConfig::parse("").unwrap();
        assert_eq!(cfg.ui.assign_success_ms, 2600);
        assert_eq!(cfg.assign_success_window(), Duration::from_millis(2600));
        assert_eq!(cfg.active_window(), time::Duration::minutes(5));
        assert!(cfg.credentials.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = ConchConfig::parse(
            "api:\n  base_url: https://conch.example.com\nworkspace: GLOBAL\nui:\n  assign_success_ms: 1000\n",
        )
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://conch.example.com");
        assert_eq!(cfg.workspace.as_deref(), Some("GLOBAL"));
        assert_eq!(cfg.ui.assign_success_ms, 1000);
        assert_eq!(cfg.ui.active_window_secs, 300);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(matches!(ConchConfig::parse("api: [1, 2"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [("CONCH_URL", "http://10.0.0.1"), ("CONCH_USER", "ops@example.com"), ("CONCH_PASSWORD", "hunter2")]
                .into_iter()
                .collect();
        let mut cfg = ConchConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api.base_url, "http://10.0.0.1");
        let creds = cfg.credentials.unwrap();
        assert_eq!(creds.user, "ops@example.com");
        assert_eq!(creds.password, "hunter2");
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "credentials:\n  user: admin\n  password: secret").unwrap();
        let cfg = ConchConfig::from_file(file.path()).await.unwrap();
        assert_eq!(cfg.credentials.unwrap().user, "admin");
    }
}
