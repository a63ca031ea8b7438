use crate::util::parse_bool_str;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_LOG_PATH: &str = "/tmp/agentcli-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "AGENTCLI_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "AGENTCLI_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message =
        format!("AGENTCLI DEBUG outbound_payload url={request_url}\npayload:\n{formatted_payload}\n");
    emit_log_message(&message);
}

/// Record a frame that did not classify under either event vocabulary.
/// The frame still reaches the renderer as an unknown event; this is the
/// durable trace for diagnosing a misbehaving service.
pub fn emit_stream_anomaly(event_name: Option<&str>, data: &str) {
    let message = format!(
        "AGENTCLI WARN unclassified_frame event={}\ndata:\n{data}\n",
        event_name.unwrap_or("<none>")
    );
    emit_log_message(&message);
}

pub fn emit_tool_ordering_anomaly(tool_name: &str, phase: &str) {
    let message =
        format!("AGENTCLI WARN tool_{phase}_without_matching_start tool={tool_name}\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
