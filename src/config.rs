use crate::api::ApiClient;
use crate::types::AgentInfo;
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONFIG_FILE: &str = "agents_config.json";

/// Values taken from explicit CLI flags. Highest precedence.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub bearer_token: Option<String>,
}

/// Values captured from the process environment. Second precedence.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub bearer_token: Option<String>,
}

impl EnvOverrides {
    pub fn capture() -> Self {
        Self {
            api_url: env_non_empty("API_URL"),
            bearer_token: env_non_empty("BEARER_TOKEN"),
        }
    }
}

/// The local JSON config file. Third precedence, and the only local source
/// of a fallback agent list for degraded mode.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentInfo>,
}

impl FileConfig {
    /// A missing file is normal; a malformed one is reported once and
    /// ignored. Config-file problems never abort the tool.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(error) => {
                eprintln!(
                    "Warning: ignoring malformed config file {}: {error}",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSource {
    /// Agent list fetched from the live service.
    Api,
    /// Local config-file list (or empty): the service was unreachable.
    Fallback,
}

/// The effective configuration for one session. Built once at startup;
/// `discover_agents` may later upgrade the agent list from the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub bearer_token: Option<String>,
    pub agents: Vec<AgentInfo>,
    pub agent_source: AgentSource,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid API URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }
        Ok(())
    }
}

/// Merge the three local sources by per-field precedence: CLI flag over
/// environment over config file over built-in default. Pure and total; the
/// live-service probe happens separately in `discover_agents`.
pub fn resolve(cli: &CliOverrides, env: &EnvOverrides, file: &FileConfig) -> Config {
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| env.api_url.clone())
        .or_else(|| file.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let bearer_token = cli
        .bearer_token
        .clone()
        .or_else(|| env.bearer_token.clone())
        .or_else(|| file.bearer_token.clone());

    Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        bearer_token,
        agents: file.agents.clone(),
        agent_source: AgentSource::Fallback,
    }
}

/// Probe the live service and adopt its agent list. On any failure the
/// config keeps the local fallback list and the session proceeds in
/// degraded mode; this never raises to the caller.
pub async fn discover_agents(client: &ApiClient, config: &mut Config) {
    if client.health().await.is_err() {
        return;
    }
    if let Ok(agents) = client.list_agents().await {
        config.agents = agents;
        config.agent_source = AgentSource::Api;
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sources() -> (CliOverrides, EnvOverrides, FileConfig) {
        (
            CliOverrides {
                api_url: Some("http://cli:1".to_string()),
                bearer_token: Some("cli-token".to_string()),
            },
            EnvOverrides {
                api_url: Some("http://env:2".to_string()),
                bearer_token: Some("env-token".to_string()),
            },
            FileConfig {
                api_url: Some("http://file:3".to_string()),
                bearer_token: Some("file-token".to_string()),
                agents: Vec::new(),
            },
        )
    }

    #[test]
    fn test_resolve_prefers_cli_then_env_then_file_then_default() {
        let (cli, env, file) = all_sources();

        let config = resolve(&cli, &env, &file);
        assert_eq!(config.api_url, "http://cli:1");
        assert_eq!(config.bearer_token.as_deref(), Some("cli-token"));

        let config = resolve(&CliOverrides::default(), &env, &file);
        assert_eq!(config.api_url, "http://env:2");

        let config = resolve(&CliOverrides::default(), &EnvOverrides::default(), &file);
        assert_eq!(config.api_url, "http://file:3");
        assert_eq!(config.bearer_token.as_deref(), Some("file-token"));

        let config = resolve(
            &CliOverrides::default(),
            &EnvOverrides::default(),
            &FileConfig::default(),
        );
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.bearer_token, None);
        assert!(config.agents.is_empty());
        assert_eq!(config.agent_source, AgentSource::Fallback);
    }

    #[test]
    fn test_resolve_trims_trailing_slash() {
        let cli = CliOverrides {
            api_url: Some("http://localhost:9090/".to_string()),
            bearer_token: None,
        };
        let config = resolve(&cli, &EnvOverrides::default(), &FileConfig::default());
        assert_eq!(config.api_url, "http://localhost:9090");
    }

    #[test]
    fn test_env_capture_ignores_blank_values() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("API_URL", "   ");
        std::env::remove_var("BEARER_TOKEN");
        let env = EnvOverrides::capture();
        assert_eq!(env.api_url, None);
        assert_eq!(env.bearer_token, None);
        std::env::remove_var("API_URL");
    }

    #[test]
    fn test_file_config_tolerates_missing_and_malformed_files() {
        let missing = FileConfig::load(Path::new("/nonexistent/agents_config.json"));
        assert!(missing.agents.is_empty());

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("agents_config.json");
        std::fs::write(&path, "{ this is not json").expect("write fixture");
        let malformed = FileConfig::load(&path);
        assert_eq!(malformed.api_url, None);
        assert!(malformed.agents.is_empty());
    }

    #[test]
    fn test_file_config_parses_agents_with_key_alias() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("agents_config.json");
        std::fs::write(
            &path,
            r#"{
                "api_url": "http://localhost:8080",
                "agents": [
                    { "id": "sallyC", "name": "SallyC", "description": "CRM helper" },
                    { "key": "probe", "description": "" }
                ]
            }"#,
        )
        .expect("write fixture");

        let file = FileConfig::load(&path);
        assert_eq!(file.agents.len(), 2);
        assert_eq!(file.agents[0].name, "SallyC");
        assert_eq!(file.agents[1].id, "probe");
        assert_eq!(file.agents[1].name, "probe");
    }

    #[tokio::test]
    async fn test_discover_agents_degrades_to_file_list_when_service_is_down() {
        // Port 1 refuses the connection immediately; no live service needed.
        let client = ApiClient::new("http://127.0.0.1:1", None);
        let file = FileConfig {
            api_url: None,
            bearer_token: None,
            agents: vec![serde_json::from_value(
                serde_json::json!({ "id": "sallyC", "description": "CRM helper" }),
            )
            .expect("agent fixture")],
        };
        let mut config = resolve(&CliOverrides::default(), &EnvOverrides::default(), &file);

        discover_agents(&client, &mut config).await;
        assert_eq!(config.agent_source, AgentSource::Fallback);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].id, "sallyC");
    }

    #[tokio::test]
    async fn test_discover_agents_with_no_file_agents_stays_empty_without_error() {
        let client = ApiClient::new("http://127.0.0.1:1", None);
        let mut config = resolve(
            &CliOverrides::default(),
            &EnvOverrides::default(),
            &FileConfig::default(),
        );

        discover_agents(&client, &mut config).await;
        assert_eq!(config.agent_source, AgentSource::Fallback);
        assert!(config.agents.is_empty());
    }

    #[test]
    fn test_validate_rejects_non_http_urls() {
        let cli = CliOverrides {
            api_url: Some("ftp://localhost:8080".to_string()),
            bearer_token: None,
        };
        let config = resolve(&cli, &EnvOverrides::default(), &FileConfig::default());
        assert!(config.validate().is_err());
    }
}
