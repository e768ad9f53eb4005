// ABOUTME: Conversation store — role-tagged message logs per session.
// ABOUTME: Owns the single-writer append contract for the in-flight assistant message.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Diagnostic shown when a chat stream dies before completing.
pub const STREAM_FAILURE_NOTICE: &str =
    "**Error**: Failed to generate response. Check connection.";

/// Title given to a session created empty, before any prompt names it.
pub const NEW_CHAT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message. Immutable once superseded; only the in-flight
/// assistant message grows, append-only, while its stream runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// One conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: String,
}

/// Derive a session title from its first prompt: the first 30 characters,
/// with a `...` suffix when truncated.
pub fn derive_title(prompt: &str) -> String {
    let title: String = prompt.chars().take(TITLE_MAX_CHARS).collect();
    if prompt.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", title)
    } else {
        title
    }
}

/// The per-session message logs plus the active-session and in-flight-turn
/// bookkeeping. All mutation flows through the turn transitions below.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active_id: Option<String>,
    in_flight: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted sessions list. Nothing is active and
    /// no turn is in flight after loading.
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            active_id: None,
            in_flight: None,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Session> {
        let id = self.active_id.as_deref()?;
        self.session(id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// The session id whose last message is currently streaming, if any.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Create a new session at the front of the list and make it active.
    pub fn create_session(&mut self, title: &str) -> &Session {
        let id = self.next_session_id();
        let session = Session {
            id: id.clone(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.sessions.insert(0, session);
        self.active_id = Some(id);
        &self.sessions[0]
    }

    /// Make the given session active. Returns false if it does not exist.
    pub fn select_session(&mut self, id: &str) -> bool {
        if self.session(id).is_none() {
            return false;
        }
        self.active_id = Some(id.to_string());
        true
    }

    /// Append a user message to a session.
    pub fn push_user_message(&mut self, session_id: &str, text: &str) -> anyhow::Result<()> {
        let session = self
            .session_mut(session_id)
            .ok_or_else(|| anyhow::anyhow!("no such session: {}", session_id))?;
        session.messages.push(Message::user(text));
        Ok(())
    }

    /// Retitle a session still carrying the placeholder title from the prompt
    /// being sent into it.
    pub fn retitle_from_prompt(&mut self, session_id: &str, prompt: &str) {
        if let Some(session) = self.session_mut(session_id) {
            if session.title == NEW_CHAT_TITLE {
                session.title = derive_title(prompt);
            }
        }
    }

    /// Begin a turn: append an empty assistant placeholder and mark the
    /// session in-flight. At most one turn may be in flight at a time.
    pub fn begin_turn(&mut self, session_id: &str) -> anyhow::Result<()> {
        if let Some(current) = &self.in_flight {
            anyhow::bail!("a turn is already in flight for session {}", current);
        }
        let session = self
            .session_mut(session_id)
            .ok_or_else(|| anyhow::anyhow!("no such session: {}", session_id))?;
        session.messages.push(Message::assistant(""));
        self.in_flight = Some(session_id.to_string());
        Ok(())
    }

    /// Append a text delta to the in-flight assistant message. Returns false
    /// (a silent discard) if the session is not the in-flight one or its last
    /// message is not the assistant placeholder.
    pub fn append_delta(&mut self, session_id: &str, text: &str) -> bool {
        if self.in_flight.as_deref() != Some(session_id) {
            return false;
        }
        let Some(session) = self.session_mut(session_id) else {
            return false;
        };
        match session.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// The full accumulated content of the in-flight assistant message.
    pub fn in_flight_content(&self) -> Option<&str> {
        let id = self.in_flight.as_deref()?;
        let session = self.session(id)?;
        match session.messages.last() {
            Some(last) if last.role == Role::Assistant => Some(&last.content),
            _ => None,
        }
    }

    /// End the turn for a session. Returns false if that session was not the
    /// in-flight one.
    pub fn end_turn(&mut self, session_id: &str) -> bool {
        if self.in_flight.as_deref() != Some(session_id) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Terminate a turn on stream failure. An empty placeholder is replaced by
    /// the diagnostic; partial content is kept intact and the diagnostic is
    /// appended as its own assistant message.
    pub fn fail_turn(&mut self, session_id: &str) -> bool {
        if self.in_flight.as_deref() != Some(session_id) {
            return false;
        }
        if let Some(session) = self.session_mut(session_id) {
            match session.messages.last_mut() {
                Some(last) if last.role == Role::Assistant && last.content.is_empty() => {
                    last.content = STREAM_FAILURE_NOTICE.to_string();
                }
                _ => {
                    session
                        .messages
                        .push(Message::assistant(STREAM_FAILURE_NOTICE));
                }
            }
        }
        self.in_flight = None;
        true
    }

    /// Content of the most recent assistant message in a session, if any.
    pub fn last_assistant_content(&self, session_id: &str) -> Option<&str> {
        let session = self.session(session_id)?;
        session
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Session ids come from the creation time in epoch milliseconds; bump on
    /// collision so two sessions created within the same millisecond stay
    /// distinct.
    fn next_session_id(&self) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let candidate = millis.to_string();
            if !self.sessions.iter().any(|s| s.id == candidate) {
                return candidate;
            }
            millis += 1;
        }
    }
}
