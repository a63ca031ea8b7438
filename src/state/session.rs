use crate::types::ToolEvent;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

/// One committed exchange entry. Immutable once pushed onto the session's
/// turn log.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub tool_events: Vec<ToolEvent>,
}

impl Turn {
    pub fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            tool_events: Vec::new(),
        }
    }

    pub fn agent() -> Self {
        Self {
            role: Role::Agent,
            content: String::new(),
            tool_events: Vec::new(),
        }
    }
}

/// Client-side conversation state for one tool invocation: identifier,
/// turn log, and the mode flags toggled by in-session commands.
#[derive(Debug)]
pub struct Session {
    conversation_id: String,
    turns: Vec<Turn>,
    /// The in-progress agent turn. Committed on turn end, discarded on
    /// interrupt, never partially committed.
    draft: Option<Turn>,
    context_enabled: bool,
    debug: bool,
}

impl Session {
    pub fn new(context_enabled: bool, debug: bool) -> Self {
        Self {
            conversation_id: new_conversation_id(),
            turns: Vec::new(),
            draft: None,
            context_enabled,
            debug,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The identifier to attach to an outbound turn. Always generated, but
    /// only attached when context tracking is on.
    pub fn outbound_conversation_id(&self) -> Option<&str> {
        if self.context_enabled {
            Some(&self.conversation_id)
        } else {
            None
        }
    }

    /// Adopt a server-assigned identifier. Explicit replace, called between
    /// turns, never mid-stream.
    pub fn adopt_thread_id(&mut self, thread_id: String) {
        self.conversation_id = thread_id;
    }

    /// New identifier, empty turn log. Mode flags are untouched.
    pub fn reset(&mut self) {
        self.conversation_id = new_conversation_id();
        self.turns.clear();
        self.draft = None;
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        self.debug
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn context_enabled(&self) -> bool {
        self.context_enabled
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push_user_turn(&mut self, content: String) {
        self.turns.push(Turn::user(content));
    }

    pub fn begin_agent_turn(&mut self) {
        self.draft = Some(Turn::agent());
    }

    pub fn draft(&self) -> Option<&Turn> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> &mut Turn {
        self.draft.get_or_insert_with(Turn::agent)
    }

    pub fn commit_draft(&mut self) {
        if let Some(turn) = self.draft.take() {
            self.turns.push(turn);
        }
    }

    pub fn discard_draft(&mut self) {
        self.draft = None;
    }
}

fn new_conversation_id() -> String {
    format!("cli-{}", Uuid::new_v4())
}
