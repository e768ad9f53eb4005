// ABOUTME: Application controller — owns settings, sessions, and the workspace.
// ABOUTME: All mutation flows through defined transitions driven by one event loop.

use std::io::Write as _;
use std::path::PathBuf;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::ollama::{ModelInfo, OllamaClient, SamplingOptions, TransportError};
use crate::session::persistence::save_sessions_to;
use crate::session::{derive_title, Message, Session, SessionStore, NEW_CHAT_TITLE};
use crate::workspace::{extract_files, Workspace};

/// Events emitted by the spawned streaming task. Every event carries the id
/// of the session it was generated for; the controller discards events whose
/// session is no longer both active and in-flight.
#[derive(Debug)]
pub enum TurnEvent {
    Delta { session_id: String, text: String },
    Completed { session_id: String },
    Failed { session_id: String, error: String },
}

/// What the controller did with one turn event.
#[derive(Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The delta was appended and the workspace re-merged; carries the text
    /// so the caller can echo it.
    Applied(String),
    /// The stream finished; a final merge ran and sessions were persisted.
    Completed,
    /// The stream died; the diagnostic was recorded and sessions persisted.
    Failed(String),
    /// The event targeted a session that is no longer live; dropped.
    Discarded,
}

/// The application: explicit state plus the transitions that mutate it.
///
/// The streaming task never touches state directly; it only sends
/// session-tagged `TurnEvent`s into the controller's channel, so every
/// mutation is serialized through `handle_turn_event`.
pub struct App {
    settings: Settings,
    client: OllamaClient,
    store: SessionStore,
    workspace: Workspace,
    sessions_path: PathBuf,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
    turn_rx: Option<mpsc::UnboundedReceiver<TurnEvent>>,
}

impl App {
    /// Create the app with loaded settings and previously persisted sessions.
    pub fn new(settings: Settings, sessions: Vec<Session>, sessions_path: PathBuf) -> Self {
        let client = OllamaClient::new(&settings.server_address);
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            client,
            store: SessionStore::from_sessions(sessions),
            workspace: Workspace::new(),
            sessions_path,
            turn_tx,
            turn_rx: Some(turn_rx),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn is_streaming(&self) -> bool {
        self.store.in_flight().is_some()
    }

    /// Store-side half of sending a prompt: ensure an active session exists
    /// (created lazily, titled from the prompt), record the user message,
    /// assemble the request payload, and open the turn. Returns the target
    /// session id and the payload for the transport.
    ///
    /// Split from `send_prompt` so the whole turn lifecycle is exercisable
    /// without a server.
    pub fn start_turn(&mut self, prompt: &str) -> anyhow::Result<(String, Vec<Message>)> {
        if self.is_streaming() {
            anyhow::bail!("a generation is already in flight");
        }
        if self.settings.model.is_empty() {
            anyhow::bail!("no model selected; run /models to pick one");
        }

        let session_id = match self.store.active_id().map(str::to_string) {
            Some(id) => {
                self.store.retitle_from_prompt(&id, prompt);
                id
            }
            None => self.store.create_session(&derive_title(prompt)).id.clone(),
        };

        self.store.push_user_message(&session_id, prompt)?;

        // Payload is the system instruction plus the history up to and
        // including the new user message — assembled before the assistant
        // placeholder is appended.
        let mut payload = vec![Message::system(&self.settings.system_instruction)];
        if let Some(session) = self.store.session(&session_id) {
            payload.extend(session.messages.iter().cloned());
        }

        self.store.begin_turn(&session_id)?;
        Ok((session_id, payload))
    }

    /// Send a prompt: open the turn and spawn the streaming request.
    pub fn send_prompt(&mut self, prompt: &str) -> anyhow::Result<()> {
        let (session_id, payload) = self.start_turn(prompt)?;

        let client = self.client.clone();
        let model = self.settings.model.clone();
        let options = SamplingOptions {
            temperature: self.settings.temperature,
            top_k: self.settings.top_k,
            top_p: self.settings.top_p,
        };
        let tx = self.turn_tx.clone();

        tokio::spawn(async move {
            let delta_tx = tx.clone();
            let delta_sid = session_id.clone();
            let result = client
                .chat_stream(&model, &payload, &options, move |delta| {
                    let _ = delta_tx.send(TurnEvent::Delta {
                        session_id: delta_sid.clone(),
                        text: delta.to_string(),
                    });
                })
                .await;

            let event = match result {
                Ok(()) => TurnEvent::Completed { session_id },
                Err(e) => TurnEvent::Failed {
                    session_id,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });

        Ok(())
    }

    /// An event may mutate state only while its session is both the in-flight
    /// one and still active; stop and session switches break that condition
    /// and late events fall through here.
    fn event_targets_live_turn(&self, session_id: &str) -> bool {
        self.store.in_flight() == Some(session_id) && self.store.active_id() == Some(session_id)
    }

    /// Apply one turn event: append the delta, re-extract from the full
    /// accumulated message, and merge into the workspace; or finish/fail the
    /// turn. Runs to completion before the next event is looked at, so the
    /// workspace never observes out-of-order partial states.
    pub fn handle_turn_event(&mut self, event: TurnEvent) -> TurnOutcome {
        match event {
            TurnEvent::Delta { session_id, text } => {
                if !self.event_targets_live_turn(&session_id) {
                    return TurnOutcome::Discarded;
                }
                if !self.store.append_delta(&session_id, &text) {
                    return TurnOutcome::Discarded;
                }
                self.merge_in_flight();
                TurnOutcome::Applied(text)
            }
            TurnEvent::Completed { session_id } => {
                if !self.event_targets_live_turn(&session_id) {
                    return TurnOutcome::Discarded;
                }
                // Final pass on completion, then the turn closes and no
                // further re-derivation happens for this message.
                self.merge_in_flight();
                self.store.end_turn(&session_id);
                self.persist_sessions();
                TurnOutcome::Completed
            }
            TurnEvent::Failed { session_id, error } => {
                if !self.event_targets_live_turn(&session_id) {
                    return TurnOutcome::Discarded;
                }
                self.store.fail_turn(&session_id);
                self.persist_sessions();
                TurnOutcome::Failed(error)
            }
        }
    }

    fn merge_in_flight(&mut self) {
        if let Some(content) = self.store.in_flight_content() {
            let extracted = extract_files(content);
            self.workspace.merge(&extracted);
        }
    }

    /// Stop the in-flight generation. Advisory: the underlying request may
    /// run to completion server-side, but its remaining events are discarded.
    pub fn stop(&mut self) -> bool {
        let Some(session_id) = self.store.in_flight().map(str::to_string) else {
            return false;
        };
        self.store.end_turn(&session_id);
        self.persist_sessions();
        true
    }

    /// Create a fresh session and make it active. Stops any in-flight
    /// generation first; the workspace starts empty.
    pub fn new_chat(&mut self) {
        self.stop();
        self.store.create_session(NEW_CHAT_TITLE);
        self.workspace.clear();
    }

    /// Switch the active session. Stops any in-flight generation; the
    /// workspace is discarded and starts empty for the new session.
    pub fn switch_session(&mut self, session_id: &str) -> bool {
        if self.store.session(session_id).is_none() {
            return false;
        }
        if self.store.active_id() != Some(session_id) {
            self.stop();
            self.store.select_session(session_id);
            self.workspace.clear();
        }
        true
    }

    /// Re-derive the workspace from the active session's latest assistant
    /// message. Returns the resulting file count.
    pub fn rescan(&mut self) -> usize {
        self.workspace.clear();
        if let Some(id) = self.store.active_id().map(str::to_string) {
            if let Some(content) = self.store.last_assistant_content(&id) {
                let extracted = extract_files(content);
                self.workspace.merge(&extracted);
            }
        }
        self.workspace.files().len()
    }

    /// User edit of one workspace file: last writer wins, never reconciled
    /// against a stream merge (both run through this single-threaded loop).
    pub fn edit_file(&mut self, path: &str, content: &str) -> bool {
        self.workspace.edit_file(path, content)
    }

    /// Fetch the model list. When no model is selected yet and the listing
    /// is non-empty, the first model is auto-selected and settings saved.
    pub async fn refresh_models(&mut self) -> Result<Vec<ModelInfo>, TransportError> {
        let models = self.client.list_models().await?;
        if self.settings.model.is_empty() {
            if let Some(first) = models.first() {
                self.settings.model = first.name.clone();
                log::info!("auto-selected model {}", first.name);
                if let Err(e) = self.settings.save() {
                    log::warn!("failed to save settings: {}", e);
                }
            }
        }
        Ok(models)
    }

    fn persist_sessions(&self) {
        if let Err(e) = save_sessions_to(&self.sessions_path, self.store.sessions()) {
            log::warn!("failed to persist sessions: {}", e);
        }
    }

    /// Drive the line-oriented REPL until the user quits or stdin closes.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut turn_rx = self
            .turn_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("app is already running"))?;

        println!("atelier — {}", self.client.base_url());
        match self.refresh_models().await {
            Ok(models) => print_models(&models, &self.settings.model),
            Err(e) => {
                println!("{}", e);
                println!("Check the server address in your settings, then /models to retry.");
            }
        }
        print_help();
        print_prompt();

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(line.trim()).await? {
                        break;
                    }
                    if !self.is_streaming() {
                        print_prompt();
                    }
                }
                Some(event) = turn_rx.recv() => {
                    match self.handle_turn_event(event) {
                        TurnOutcome::Applied(text) => {
                            print!("{}", text);
                            let _ = std::io::stdout().flush();
                        }
                        TurnOutcome::Completed => {
                            println!();
                            let count = self.workspace.files().len();
                            if count > 0 {
                                println!("[workspace: {} file(s) — /files to inspect]", count);
                            }
                            print_prompt();
                        }
                        TurnOutcome::Failed(error) => {
                            log::error!("stream failed: {}", error);
                            println!();
                            println!("{}", crate::session::STREAM_FAILURE_NOTICE);
                            print_prompt();
                        }
                        TurnOutcome::Discarded => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle one REPL line. Returns false to quit.
    async fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        if line.is_empty() {
            return Ok(true);
        }

        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => return Ok(false),
            "/stop" => {
                if self.stop() {
                    println!("[generation stopped]");
                } else {
                    println!("nothing is streaming");
                }
            }
            _ if self.is_streaming() => {
                println!("[a generation is in flight — /stop it first]");
            }
            "/help" => print_help(),
            "/new" => {
                self.new_chat();
                println!("[new chat]");
            }
            "/sessions" => self.print_sessions(),
            "/switch" => match rest.parse::<usize>() {
                Ok(index) if index < self.store.sessions().len() => {
                    let id = self.store.sessions()[index].id.clone();
                    self.switch_session(&id);
                    let title = self.store.session(&id).map(|s| s.title.clone());
                    println!("[switched to: {}]", title.unwrap_or_default());
                    println!("[workspace reset — /rescan to re-derive it]");
                }
                _ => println!("usage: /switch <index>  (see /sessions)"),
            },
            "/models" => match self.refresh_models().await {
                Ok(models) => print_models(&models, &self.settings.model),
                Err(e) => println!("{}", e),
            },
            "/files" => {
                if self.workspace.is_empty() {
                    println!("workspace is empty");
                } else {
                    for file in self.workspace.files() {
                        println!(
                            "{}  [{}, {} bytes]",
                            file.path,
                            file.language,
                            file.content.len()
                        );
                    }
                }
            }
            "/show" => match self.workspace.file(rest) {
                Some(file) => println!("{}", file.content),
                None => println!("no such file: {}", rest),
            },
            "/edit" => match rest.split_once(' ') {
                Some((path, content)) => {
                    if self.edit_file(path, content.trim()) {
                        println!("[{} updated]", path);
                    } else {
                        println!("no such file: {}", path);
                    }
                }
                None => println!("usage: /edit <path> <new content>"),
            },
            "/rescan" => {
                let count = self.rescan();
                println!("[workspace re-derived: {} file(s)]", count);
            }
            _ if command.starts_with('/') => {
                println!("unknown command: {} — /help for the list", command);
            }
            _ => {
                if let Err(e) = self.send_prompt(line) {
                    println!("{}", e);
                }
            }
        }

        Ok(true)
    }

    fn print_sessions(&self) {
        if self.store.sessions().is_empty() {
            println!("no sessions yet — just type a prompt");
            return;
        }
        for (index, session) in self.store.sessions().iter().enumerate() {
            let marker = if self.store.active_id() == Some(session.id.as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "{} [{}] {}  ({} messages)",
                marker,
                index,
                session.title,
                session.messages.len()
            );
        }
    }
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_models(models: &[ModelInfo], selected: &str) {
    if models.is_empty() {
        println!("server reports no models — pull one with `ollama pull`");
        return;
    }
    for model in models {
        let marker = if model.name == selected { "*" } else { " " };
        if model.details.parameter_size.is_empty() {
            println!("{} {}", marker, model.name);
        } else {
            println!("{} {} ({})", marker, model.name, model.details.parameter_size);
        }
    }
}

fn print_help() {
    println!(
        "commands: /new /sessions /switch <n> /models /files /show <path> \
         /edit <path> <content> /rescan /stop /help /quit — anything else is a prompt"
    );
}
