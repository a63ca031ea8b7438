use crate::api::logging;
use crate::state::Session;
use crate::types::{StreamEvent, ToolEvent, ToolPhase};
use crossterm::style::Stylize;
use serde_json::Value;
use std::io::{self, Write};

const TOOL_OUTPUT_PREVIEW_CHARS: usize = 100;

/// Turns normalized events into terminal output and session turn-log
/// updates, one event at a time in arrival order. Never fails the session
/// on a malformed event sequence.
pub struct TranscriptRenderer<W: Write> {
    out: W,
    unknown_events: usize,
}

impl<W: Write> TranscriptRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            unknown_events: 0,
        }
    }

    /// Unclassified events seen while debug mode was off.
    pub fn unknown_events(&self) -> usize {
        self.unknown_events
    }

    /// The `Agent:` prefix, printed at turn start and after tool blocks.
    pub fn agent_prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{} ", "Agent:".blue().bold())?;
        self.out.flush()
    }

    /// Dim diagnostic line, used for debug-mode output.
    pub fn debug_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text.dim())
    }

    pub fn render(&mut self, event: StreamEvent, session: &mut Session) -> io::Result<()> {
        match event {
            StreamEvent::Token { text } => {
                session.draft_mut().content.push_str(&text);
                write!(self.out, "{text}")?;
                self.out.flush()
            }
            StreamEvent::ToolStart(tool) => self.open_tool(tool, session),
            StreamEvent::ToolComplete(tool) | StreamEvent::ToolError(tool) => {
                self.close_tool(tool, session)
            }
            StreamEvent::TurnEnd { .. } => {
                writeln!(self.out)?;
                session.commit_draft();
                Ok(())
            }
            StreamEvent::Unknown { event, data } => {
                if session.debug() {
                    let label = event.as_deref().unwrap_or("<none>");
                    writeln!(
                        self.out,
                        "{}",
                        format!("[unclassified event {label}: {}]", data.trim()).dim()
                    )
                } else {
                    self.unknown_events += 1;
                    Ok(())
                }
            }
        }
    }

    fn open_tool(&mut self, tool: ToolEvent, session: &mut Session) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "{} {}",
            "Using tool:".yellow().bold(),
            tool.name.clone().cyan().bold()
        )?;
        let input = serde_json::to_string_pretty(&tool.payload)
            .unwrap_or_else(|_| tool.payload.to_string());
        writeln!(self.out, "{}", format!("Tool input: {input}").dim())?;
        session.draft_mut().tool_events.push(tool);
        Ok(())
    }

    /// Close the most recently opened tool event with a matching name. A
    /// complete/error without a start is an ordering anomaly: a terminal
    /// record is synthesized instead of failing the session.
    fn close_tool(&mut self, incoming: ToolEvent, session: &mut Session) -> io::Result<()> {
        let debug = session.debug();
        let draft = session.draft_mut();
        let open = draft
            .tool_events
            .iter_mut()
            .rev()
            .find(|tool| tool.phase == ToolPhase::Start && tool.name == incoming.name);

        match open {
            Some(tool) => {
                tool.phase = incoming.phase;
                if !incoming.payload.is_null() {
                    tool.payload = incoming.payload.clone();
                }
            }
            None => {
                logging::emit_tool_ordering_anomaly(&incoming.name, phase_label(incoming.phase));
                draft.tool_events.push(incoming.clone());
                if debug {
                    writeln!(
                        self.out,
                        "{}",
                        format!("[no matching start for tool {}]", incoming.name).dim()
                    )?;
                }
            }
        }

        match incoming.phase {
            ToolPhase::Error => {
                writeln!(
                    self.out,
                    "\n{} {}",
                    "Tool error:".red().bold(),
                    incoming.name.clone().cyan().bold()
                )?;
                writeln!(
                    self.out,
                    "{} {}",
                    "Error message:".red().bold(),
                    payload_preview(&incoming.payload)
                )?;
            }
            _ => {
                writeln!(
                    self.out,
                    "{} {}",
                    "Tool complete:".yellow().bold(),
                    incoming.name.clone().cyan().bold()
                )?;
                if !incoming.payload.is_null() {
                    writeln!(
                        self.out,
                        "{}",
                        format!("Tool output: {}", payload_preview(&incoming.payload)).dim()
                    )?;
                }
            }
        }

        // Resume the agent's prose on a fresh prefix after the tool block.
        writeln!(self.out)?;
        self.agent_prompt()
    }
}

fn phase_label(phase: ToolPhase) -> &'static str {
    match phase {
        ToolPhase::Start => "start",
        ToolPhase::Complete => "complete",
        ToolPhase::Error => "error",
    }
}

fn payload_preview(payload: &Value) -> String {
    let text = match payload {
        Value::String(text) => text.clone(),
        Value::Null => "Unknown".to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > TOOL_OUTPUT_PREVIEW_CHARS {
        let preview: String = text.chars().take(TOOL_OUTPUT_PREVIEW_CHARS).collect();
        format!("{preview}...(truncated)")
    } else {
        text
    }
}
