use crate::api::logging::emit_stream_anomaly;
use crate::types::{extract_thread_id, StreamEvent, ToolEvent, ToolPhase};
use serde_json::Value;

/// Incremental parser for the line-oriented event stream.
///
/// Frames are `event: <name>` / `data: <json-or-text>` lines terminated by a
/// blank line. Chunks may end mid-line, mid-frame, or mid-UTF-8-character;
/// the buffer holds raw bytes and only complete frames are decoded, so a
/// chunk boundary inside a multibyte character never corrupts a token.
/// Events come out strictly in arrival order.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = find_blank_line(&self.buffer[start..]) {
            let frame_end = start + end + 2;
            let frame = String::from_utf8_lossy(&self.buffer[start..frame_end]);
            if let Some(event) = classify_frame(&frame) {
                events.push(event);
            }
            start = frame_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        events
    }

    /// Classify whatever remains in the buffer as one final frame. Called
    /// once at end-of-stream for servers that omit the last blank line.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        if rest.trim().is_empty() {
            return None;
        }
        classify_frame(&rest)
    }
}

fn find_blank_line(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\n\n")
}

fn classify_frame(frame: &str) -> Option<StreamEvent> {
    let mut event_name: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if event_name.is_none() && data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    let payload = serde_json::from_str::<Value>(&data).ok();
    Some(normalize(event_name, payload, data))
}

enum FrameKind {
    Token,
    Tool(ToolPhase),
    TurnEnd,
    Unknown,
}

/// Collapse both wire vocabularies onto the closed event set. A frame that
/// names a known event but whose payload does not fit comes back `Unknown`
/// rather than being dropped.
fn normalize(event_name: Option<String>, payload: Option<Value>, data: String) -> StreamEvent {
    let kind = match event_name.as_deref() {
        Some("stream_token") => FrameKind::Token,
        Some("tool_execution_start" | "tool_start") => FrameKind::Tool(ToolPhase::Start),
        Some("tool_execution_complete" | "tool_end") => FrameKind::Tool(ToolPhase::Complete),
        Some("tool_execution_error" | "tool_error") => FrameKind::Tool(ToolPhase::Error),
        Some("stream_end") => FrameKind::TurnEnd,
        Some(_) => FrameKind::Unknown,
        // No `event:` line at all: default to a plain-token frame, unless the
        // payload shape clearly marks a tool event.
        None => match payload.as_ref().and_then(infer_tool_phase) {
            Some(phase) => FrameKind::Tool(phase),
            None => FrameKind::Token,
        },
    };

    match kind {
        FrameKind::Token => token_event(payload, data),
        FrameKind::Tool(phase) => tool_stream_event(phase, event_name, payload, data),
        FrameKind::TurnEnd => StreamEvent::TurnEnd {
            thread_id: payload.as_ref().and_then(extract_thread_id),
        },
        FrameKind::Unknown => unknown_event(event_name, data),
    }
}

fn token_event(payload: Option<Value>, data: String) -> StreamEvent {
    match payload {
        Some(Value::String(text)) => StreamEvent::Token { text },
        Some(Value::Object(object)) => {
            // `token` is the current field name, `content` the legacy one.
            let text = object
                .get("token")
                .or_else(|| object.get("content"))
                .and_then(Value::as_str);
            match text {
                Some(text) => StreamEvent::Token {
                    text: text.to_string(),
                },
                None => unknown_event(None, data),
            }
        }
        // Not valid JSON: treat the raw line as opaque token text.
        None => StreamEvent::Token { text: data },
        Some(_) => unknown_event(None, data),
    }
}

fn tool_stream_event(
    phase: ToolPhase,
    event_name: Option<String>,
    payload: Option<Value>,
    data: String,
) -> StreamEvent {
    let Some(tool) = payload.as_ref().and_then(|value| decode_tool(phase, value)) else {
        return unknown_event(event_name, data);
    };
    match phase {
        ToolPhase::Start => StreamEvent::ToolStart(tool),
        ToolPhase::Complete => StreamEvent::ToolComplete(tool),
        ToolPhase::Error => StreamEvent::ToolError(tool),
    }
}

fn decode_tool(phase: ToolPhase, value: &Value) -> Option<ToolEvent> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    // The primary vocabulary carries `params`, the legacy one `input` on
    // start and `output`/`error` on completion.
    let payload = match phase {
        ToolPhase::Start => object.get("params").or_else(|| object.get("input")),
        ToolPhase::Complete => object.get("output"),
        ToolPhase::Error => object.get("error"),
    };
    Some(ToolEvent {
        name,
        phase,
        payload: payload.cloned().unwrap_or(Value::Null),
    })
}

/// Shape inference for event-less frames, matching what servers actually
/// send: an object with `name` plus `input`/`output`/`error` is a tool event.
fn infer_tool_phase(payload: &Value) -> Option<ToolPhase> {
    let object = payload.as_object()?;
    if !object.contains_key("name") || object.contains_key("token") {
        return None;
    }
    if object.contains_key("output") {
        Some(ToolPhase::Complete)
    } else if object.contains_key("error") {
        Some(ToolPhase::Error)
    } else if object.contains_key("input") || object.contains_key("params") {
        Some(ToolPhase::Start)
    } else {
        None
    }
}

fn unknown_event(event_name: Option<String>, data: String) -> StreamEvent {
    emit_stream_anomaly(event_name.as_deref(), &data);
    StreamEvent::Unknown {
        event: event_name,
        data,
    }
}
