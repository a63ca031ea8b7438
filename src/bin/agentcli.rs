use agentcli::chat::{run_chat, run_check, ChatOptions};
use agentcli::config::{self, CliOverrides, EnvOverrides, FileConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Interactive terminal client for testing agents during development.
#[derive(Parser)]
#[command(name = "agentcli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session with an agent.
    Chat {
        /// The agent ID to chat with; prompts for a selection when omitted.
        #[arg(short, long)]
        agent: Option<String>,
        /// Use the single-shot invoke endpoint instead of streaming.
        #[arg(short, long)]
        invoke: bool,
        /// Override the API URL.
        #[arg(long)]
        api_url: Option<String>,
        /// Bearer token for API authentication.
        #[arg(long)]
        bearer_token: Option<String>,
        /// Path to the JSON config file.
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Show debug information during the session.
        #[arg(short, long)]
        debug: bool,
        /// Disable conversation context tracking.
        #[arg(long)]
        no_context: bool,
    },
    /// Check connectivity to the agent service.
    Check {
        /// Override the API URL.
        #[arg(long)]
        api_url: Option<String>,
        /// Bearer token for API authentication.
        #[arg(long)]
        bearer_token: Option<String>,
        /// Path to the JSON config file.
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Chat {
            agent,
            invoke,
            api_url,
            bearer_token,
            config: config_path,
            debug,
            no_context,
        } => {
            let resolved = resolve_config(api_url, bearer_token, &config_path);
            resolved.validate()?;
            run_chat(
                resolved,
                ChatOptions {
                    agent_id: agent,
                    invoke,
                    debug,
                    no_context,
                },
            )
            .await
        }
        Command::Check {
            api_url,
            bearer_token,
            config: config_path,
        } => {
            let resolved = resolve_config(api_url, bearer_token, &config_path);
            resolved.validate()?;
            run_check(&resolved).await
        }
    }
}

fn resolve_config(
    api_url: Option<String>,
    bearer_token: Option<String>,
    config_path: &std::path::Path,
) -> config::Config {
    let overrides = CliOverrides {
        api_url,
        bearer_token,
    };
    config::resolve(
        &overrides,
        &EnvOverrides::capture(),
        &FileConfig::load(config_path),
    )
}
