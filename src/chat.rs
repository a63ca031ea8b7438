use crate::api::stream::StreamParser;
use crate::api::ApiClient;
use crate::config::{AgentSource, Config};
use crate::render::TranscriptRenderer;
use crate::state::Session;
use crate::types::{extract_thread_id, StreamEvent, THREAD_ID_KEYS};
use anyhow::{bail, Result};
use crossterm::style::Stylize;
use futures::StreamExt;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// In-session commands, matched exactly against the trimmed input line and
/// never forwarded to the service.
pub const EXIT_COMMAND: &str = "exit";
pub const RESET_COMMAND: &str = "!clear";
pub const DEBUG_COMMAND: &str = "!debug";

/// Response-body fields the service may put its full text under, in the
/// order they are tried.
const RESPONSE_TEXT_KEYS: [&str; 5] = ["output", "response", "content", "text", "message"];

/// Longest the stream may stay silent between chunks. A long turn is fine
/// as long as data keeps arriving.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { thread_id: Option<String> },
    Interrupted,
}

pub struct ChatOptions {
    pub agent_id: Option<String>,
    pub invoke: bool,
    pub debug: bool,
    pub no_context: bool,
}

/// Build the outbound turn body. The conversation identifier is fanned out
/// under every parameter name heterogeneous service implementations
/// recognize; this is deliberate compatibility redundancy, done in exactly
/// one place.
pub fn build_turn_payload(message: &str, session: &Session, config: &Config) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("message".to_string(), json!(message));

    if let Some(token) = &config.bearer_token {
        object.insert(
            "context".to_string(),
            json!({ "configurable": { "__bearer_token": token } }),
        );
    }

    if let Some(id) = session.outbound_conversation_id() {
        for key in THREAD_ID_KEYS {
            object.insert(key.to_string(), json!(id));
        }
    }

    Value::Object(object)
}

/// Drive one full turn: send, drain, render, adopt any server-assigned
/// conversation identifier. A transport error fails the turn but leaves the
/// session open for retry.
pub async fn send_turn<W: Write>(
    client: &ApiClient,
    agent_id: &str,
    session: &mut Session,
    config: &Config,
    renderer: &mut TranscriptRenderer<W>,
    user_text: &str,
    invoke: bool,
) -> Result<TurnOutcome> {
    session.push_user_turn(user_text.to_string());
    let payload = build_turn_payload(user_text, session, config);

    if session.debug() {
        if let Some(id) = session.outbound_conversation_id() {
            renderer.debug_line(&format!("Using conversation ID: {id}"))?;
        }
        renderer.debug_line(&format!("Payload: {payload}"))?;
    }

    renderer.agent_prompt()?;
    let outcome = if invoke {
        invoke_turn(client, agent_id, &payload, session, renderer).await
    } else {
        stream_turn(client, agent_id, &payload, session, renderer).await
    }?;

    if let TurnOutcome::Completed {
        thread_id: Some(id),
    } = &outcome
    {
        if session.context_enabled() && id != session.conversation_id() {
            if session.debug() {
                renderer.debug_line(&format!("Adopting server conversation ID: {id}"))?;
            }
            session.adopt_thread_id(id.clone());
        }
    }

    Ok(outcome)
}

/// Streaming transport: drain frames incrementally through the parser and
/// renderer. The only suspension point of a turn; Ctrl-C here drops the
/// stream and discards the in-progress turn.
async fn stream_turn<W: Write>(
    client: &ApiClient,
    agent_id: &str,
    payload: &Value,
    session: &mut Session,
    renderer: &mut TranscriptRenderer<W>,
) -> Result<TurnOutcome> {
    let mut stream = client.create_stream(agent_id, payload).await?;
    session.begin_agent_turn();

    let mut parser = StreamParser::new();
    let mut thread_id = None;
    let mut turn_ended = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                drop(stream);
                session.discard_draft();
                return Ok(TurnOutcome::Interrupted);
            }
            next = tokio::time::timeout(STREAM_IDLE_TIMEOUT, stream.next()) => {
                let Ok(next) = next else {
                    session.discard_draft();
                    bail!(
                        "stream produced no data for {}s",
                        STREAM_IDLE_TIMEOUT.as_secs()
                    );
                };
                let Some(chunk_result) = next else { break };
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        session.discard_draft();
                        return Err(error);
                    }
                };
                for event in parser.process(&chunk) {
                    track_turn_progress(&event, &mut thread_id, &mut turn_ended);
                    renderer.render(event, session)?;
                }
            }
        }
    }

    if let Some(event) = parser.finish() {
        track_turn_progress(&event, &mut thread_id, &mut turn_ended);
        renderer.render(event, session)?;
    }

    // Servers that never send stream_end still get a clean turn boundary.
    if !turn_ended {
        renderer.render(StreamEvent::TurnEnd { thread_id: None }, session)?;
    }

    Ok(TurnOutcome::Completed { thread_id })
}

fn track_turn_progress(event: &StreamEvent, thread_id: &mut Option<String>, turn_ended: &mut bool) {
    if let StreamEvent::TurnEnd { thread_id: id } = event {
        *turn_ended = true;
        if id.is_some() {
            *thread_id = id.clone();
        }
    }
}

/// Single-shot transport: one complete body, rendered as one token followed
/// by a turn end so the transcript path is identical to streaming.
async fn invoke_turn<W: Write>(
    client: &ApiClient,
    agent_id: &str,
    payload: &Value,
    session: &mut Session,
    renderer: &mut TranscriptRenderer<W>,
) -> Result<TurnOutcome> {
    let body = client.invoke(agent_id, payload).await?;
    let thread_id = extract_thread_id(&body);

    session.begin_agent_turn();
    match extract_response_text(&body) {
        Some(text) => renderer.render(StreamEvent::Token { text }, session)?,
        None => renderer.render(
            StreamEvent::Unknown {
                event: None,
                data: body.to_string(),
            },
            session,
        )?,
    }
    renderer.render(
        StreamEvent::TurnEnd {
            thread_id: thread_id.clone(),
        },
        session,
    )?;

    Ok(TurnOutcome::Completed { thread_id })
}

pub fn extract_response_text(body: &Value) -> Option<String> {
    if let Some(text) = body.as_str() {
        return Some(text.to_string());
    }
    RESPONSE_TEXT_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
}

/// The interactive chat loop: read stdin, intercept in-session commands,
/// send the turn, repeat until `exit` or end of input.
pub async fn run_chat(mut config: Config, options: ChatOptions) -> Result<()> {
    let client = ApiClient::new(&config.api_url, config.bearer_token.as_deref());
    crate::config::discover_agents(&client, &mut config).await;

    if config.agent_source == AgentSource::Fallback {
        println!(
            "{}",
            format!(
                "Service at {} is unreachable; using local agent list ({} configured)",
                config.api_url,
                config.agents.len()
            )
            .yellow()
        );
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let agent_id = select_agent(&config, options.agent_id, &mut input)?;
    let agent_name = config
        .agents
        .iter()
        .find(|agent| agent.id == agent_id)
        .map(|agent| agent.name.clone())
        .unwrap_or_else(|| agent_id.clone());

    println!(
        "\n{} {}",
        "Starting chat session with".green().bold(),
        agent_name.clone().blue().bold()
    );
    if options.no_context {
        println!(
            "{}",
            "Context tracking disabled - each message is a new conversation".yellow()
        );
    }
    println!("\nAvailable commands:");
    println!("  {}  - clear conversation context/history", RESET_COMMAND.yellow());
    println!("  {}  - toggle debug mode", DEBUG_COMMAND.yellow());
    println!("  {}    - end the chat session", EXIT_COMMAND.yellow());

    let mut session = Session::new(!options.no_context, options.debug);
    let mut renderer = TranscriptRenderer::new(io::stdout());

    loop {
        print!("\n{} ", "You:".green().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();

        match text {
            "" => continue,
            EXIT_COMMAND => break,
            RESET_COMMAND => {
                session.reset();
                println!("{}", "Conversation context cleared".yellow());
                continue;
            }
            DEBUG_COMMAND => {
                let enabled = session.toggle_debug();
                let state = if enabled { "enabled" } else { "disabled" };
                println!("{}", format!("Debug mode {state}").yellow());
                continue;
            }
            _ => {}
        }

        match send_turn(
            &client,
            &agent_id,
            &mut session,
            &config,
            &mut renderer,
            text,
            options.invoke,
        )
        .await
        {
            Ok(TurnOutcome::Completed { .. }) => {}
            Ok(TurnOutcome::Interrupted) => {
                println!("\n{}", "Turn interrupted".yellow());
            }
            Err(error) => {
                eprintln!("{} {error:#}", "Error:".red().bold());
            }
        }
    }

    Ok(())
}

fn select_agent(
    config: &Config,
    requested: Option<String>,
    input: &mut impl BufRead,
) -> Result<String> {
    if let Some(id) = requested {
        if config.agents.is_empty() {
            // Degraded mode with no local list: trust the operator's choice
            // so connectivity problems can still be diagnosed end to end.
            println!(
                "{}",
                format!("No agent list available; using '{id}' unverified").yellow()
            );
            return Ok(id);
        }
        if config.agents.iter().any(|agent| agent.id == id) {
            return Ok(id);
        }
        bail!("agent '{id}' not found");
    }

    if config.agents.is_empty() {
        bail!("no agents available; pass --agent or declare agents in the config file");
    }

    println!("\nAvailable agents:");
    for (position, agent) in config.agents.iter().enumerate() {
        println!(
            "{}. {} - {}",
            (position + 1).to_string().cyan().bold(),
            agent.name,
            agent.description
        );
    }

    loop {
        print!("\nSelect an agent by number: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("no agent selected");
        }
        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=config.agents.len()).contains(&choice) => {
                return Ok(config.agents[choice - 1].id.clone());
            }
            _ => println!(
                "{}",
                format!("Enter a number between 1 and {}", config.agents.len()).yellow()
            ),
        }
    }
}

/// The `check` subcommand: run only the resolver's probes and report each
/// endpoint's status.
pub async fn run_check(config: &Config) -> Result<()> {
    println!("Checking API at {}...", config.api_url);
    let client = ApiClient::new(&config.api_url, config.bearer_token.as_deref());

    match client.health().await {
        Ok(()) => println!("{} Health endpoint is available", "✓".green()),
        Err(error) => println!("{} Health endpoint error: {error:#}", "✗".red()),
    }

    match client.list_agents().await {
        Ok(agents) => {
            println!("{} Found {} agents", "✓".green(), agents.len());
            for agent in agents {
                println!("  {} {}: {}", "•".blue(), agent.id, agent.description);
            }
        }
        Err(error) => println!("{} Agents endpoint error: {error:#}", "✗".red()),
    }

    Ok(())
}
