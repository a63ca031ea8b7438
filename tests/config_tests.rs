use agentcli::config::{resolve, AgentSource, CliOverrides, EnvOverrides, FileConfig, DEFAULT_API_URL};
use std::path::Path;

fn cli(api_url: &str) -> CliOverrides {
    CliOverrides {
        api_url: Some(api_url.to_string()),
        bearer_token: None,
    }
}

fn env(api_url: &str) -> EnvOverrides {
    EnvOverrides {
        api_url: Some(api_url.to_string()),
        bearer_token: None,
    }
}

fn file(api_url: &str) -> FileConfig {
    FileConfig {
        api_url: Some(api_url.to_string()),
        bearer_token: None,
        agents: Vec::new(),
    }
}

#[test]
fn test_precedence_ladder_for_api_url() {
    let effective = resolve(&cli("http://a:1"), &env("http://b:2"), &file("http://c:3"));
    assert_eq!(effective.api_url, "http://a:1");

    let effective = resolve(&CliOverrides::default(), &env("http://b:2"), &file("http://c:3"));
    assert_eq!(effective.api_url, "http://b:2");

    let effective = resolve(
        &CliOverrides::default(),
        &EnvOverrides::default(),
        &file("http://c:3"),
    );
    assert_eq!(effective.api_url, "http://c:3");

    let effective = resolve(
        &CliOverrides::default(),
        &EnvOverrides::default(),
        &FileConfig::default(),
    );
    assert_eq!(effective.api_url, DEFAULT_API_URL);
}

#[test]
fn test_file_agents_become_the_fallback_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("agents_config.json");
    std::fs::write(
        &path,
        r#"{ "agents": [ { "id": "sallyC", "name": "SallyC", "description": "CRM helper" } ] }"#,
    )
    .expect("write fixture");

    let effective = resolve(
        &CliOverrides::default(),
        &EnvOverrides::default(),
        &FileConfig::load(&path),
    );
    assert_eq!(effective.agent_source, AgentSource::Fallback);
    assert_eq!(effective.agents.len(), 1);
    assert_eq!(effective.agents[0].id, "sallyC");
}

#[test]
fn test_missing_config_file_yields_empty_fallback_without_error() {
    let effective = resolve(
        &CliOverrides::default(),
        &EnvOverrides::default(),
        &FileConfig::load(Path::new("/nonexistent/agents_config.json")),
    );
    assert_eq!(effective.agent_source, AgentSource::Fallback);
    assert!(effective.agents.is_empty());
}
