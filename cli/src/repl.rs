//! Interactive chat REPL
//!
//! Reads lines with rustyline while generations run on background tasks,
//! so the prompt stays live for `/cancel` (or Ctrl+C) during a long
//! stream or consensus run. Transcript output is driven entirely by
//! store events, rendered through rustyline's external printer so it
//! does not fight the prompt.

use colored::Colorize;
use parley_application::{
    BackendGateway, DispatchError, Dispatcher, GenerationCoordinator, SendMode, SessionStore,
    StoreEvent,
};
use parley_domain::{ChatId, ConsensusSetup, MessageStatus, Role, Session};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, ExternalPrinter};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Interactive chat REPL
pub struct ChatRepl<G: BackendGateway + 'static> {
    dispatcher: Arc<Dispatcher<G>>,
    coordinator: Arc<GenerationCoordinator>,
    /// Setup from configuration, used when `/consensus` is toggled on
    /// without naming a profile.
    configured_setup: Option<ConsensusSetup>,
    /// Setup for subsequent sends; `None` means direct streaming.
    active_setup: Option<ConsensusSetup>,
}

impl<G: BackendGateway + 'static> ChatRepl<G> {
    pub fn new(
        dispatcher: Arc<Dispatcher<G>>,
        coordinator: Arc<GenerationCoordinator>,
        configured_setup: Option<ConsensusSetup>,
    ) -> Self {
        Self {
            dispatcher,
            coordinator,
            configured_setup,
            active_setup: None,
        }
    }

    /// Run the interactive REPL
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("parley").join("history.txt"));
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        // Transcript renderer: store events in, prompt-safe output out.
        let printer = rl.create_external_printer()?;
        let events = self.dispatcher.store().subscribe();
        tokio::spawn(render_events(
            events,
            Arc::clone(self.dispatcher.store()),
            Arc::clone(&self.coordinator),
            printer,
        ));
        // Background send tasks report dispatch errors through a channel
        // drained by its own printer task.
        let mut error_printer = rl.create_external_printer()?;
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = error_rx.recv().await {
                let _ = error_printer.print(line);
            }
        });

        self.print_welcome();

        loop {
            let prompt = if self.active_setup.is_some() {
                "consensus> "
            } else {
                "> "
            };
            match rl.readline(prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(&line);

                    if line.starts_with('/') {
                        if self.handle_command(&line).await {
                            break;
                        }
                        continue;
                    }

                    self.spawn_send(line, &error_tx);
                }
                Err(ReadlineError::Interrupted) => {
                    if self.dispatcher.is_busy() {
                        self.dispatcher.cancel_active().await;
                        println!("{}", "(cancelled)".yellow());
                    } else {
                        println!("^C");
                    }
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err:?}");
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    /// Kick off a send on a background task so the prompt stays live.
    fn spawn_send(&self, content: String, errors: &UnboundedSender<String>) {
        if self.dispatcher.is_busy() {
            println!(
                "{}",
                "A generation is already in progress. /cancel to stop it.".yellow()
            );
            return;
        }

        let mode = match &self.active_setup {
            Some(setup) => SendMode::Consensus(setup.clone()),
            None => SendMode::Direct,
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let errors = errors.clone();
        tokio::spawn(async move {
            // Terminal outcomes reach the transcript through store events;
            // only dispatch errors need reporting here.
            if let Err(e) = dispatcher.send(&content, mode).await {
                let _ = errors.send(format!("{} {e}", "Error:".red()));
            }
        });
    }

    /// Handle slash commands. Returns true if the REPL should exit.
    async fn handle_command(&mut self, cmd: &str) -> bool {
        let mut parts = cmd.split_whitespace();
        let head = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        match head {
            "/quit" | "/exit" | "/q" => {
                println!("Bye!");
                true
            }
            "/help" | "/h" | "/?" => {
                self.print_help();
                false
            }
            "/sessions" | "/ls" => {
                self.list_sessions().await;
                false
            }
            "/new" => {
                self.dispatcher.store().select(None);
                println!("New session; it is created on the server at first send.");
                false
            }
            "/open" => {
                match rest.first() {
                    Some(arg) => self.open_session(arg).await,
                    None => println!("Usage: /open <n>"),
                }
                false
            }
            "/delete" => {
                match rest.first() {
                    Some(arg) => self.delete_session(arg).await,
                    None => println!("Usage: /delete <n>"),
                }
                false
            }
            "/consensus" => {
                self.configure_consensus(&rest).await;
                false
            }
            "/cancel" => {
                if self.dispatcher.is_busy() {
                    self.dispatcher.cancel_active().await;
                    println!("{}", "(cancelled)".yellow());
                } else {
                    println!("Nothing to cancel.");
                }
                false
            }
            _ => {
                println!("Unknown command: {head}");
                println!("Type /help for available commands");
                false
            }
        }
    }

    async fn list_sessions(&self) {
        if let Err(e) = self.dispatcher.load_sessions().await {
            eprintln!("{} {e}", "Error:".red());
            return;
        }
        let store = self.dispatcher.store();
        let sessions = store.sessions();
        if sessions.is_empty() {
            println!("No sessions yet. Just type a message to start one.");
            return;
        }
        let active = store.active_session_id();
        println!();
        for (i, session) in sessions.iter().enumerate() {
            let marker = if active.as_ref() == Some(&session.id) {
                "*"
            } else {
                " "
            };
            println!(
                " {marker} {:>2}. {}  ({})",
                i + 1,
                display_title(session),
                session.last_updated.format("%Y-%m-%d %H:%M")
            );
        }
        println!();
    }

    async fn open_session(&self, arg: &str) {
        let Some(id) = self.resolve_session(arg) else {
            println!("No such session: {arg}");
            return;
        };
        match self.dispatcher.open_session(&id).await {
            Ok(()) => self.print_transcript(&id),
            Err(e) => eprintln!("{} {e}", "Error:".red()),
        }
    }

    async fn delete_session(&self, arg: &str) {
        let Some(id) = self.resolve_session(arg) else {
            println!("No such session: {arg}");
            return;
        };
        match self.dispatcher.delete_session(&id).await {
            Ok(()) => println!("Deleted."),
            Err(DispatchError::SessionBusy(_)) => {
                println!(
                    "{}",
                    "That session has a generation in progress. /cancel first.".yellow()
                );
            }
            Err(e) => eprintln!("{} {e}", "Error:".red()),
        }
    }

    /// `/consensus` toggles consensus mode using the configured setup;
    /// `/consensus profile <name>` resolves a saved profile by name;
    /// `/consensus off` returns to direct streaming.
    async fn configure_consensus(&mut self, args: &[&str]) {
        match args {
            [] => {
                if self.active_setup.take().is_some() {
                    println!("Consensus off; messages stream from a single model again.");
                } else if let Some(setup) = self.configured_setup.clone() {
                    self.active_setup = Some(setup);
                    println!("Consensus on; messages are answered by deliberation.");
                } else {
                    println!(
                        "No consensus configuration. Use /consensus profile <name> \
                         or set [consensus] in parley.toml."
                    );
                }
            }
            ["off"] => {
                self.active_setup = None;
                println!("Consensus off.");
            }
            ["profile", name] => match self.dispatcher.list_profiles().await {
                Ok(profiles) => match profiles.iter().find(|p| p.name == *name) {
                    Some(profile) => {
                        println!(
                            "Consensus on: {} guiding {}",
                            profile.guiding_model,
                            profile.participant_models.join(", ")
                        );
                        self.active_setup =
                            Some(ConsensusSetup::Profile(profile.id.clone()));
                    }
                    None => {
                        println!("No profile named '{name}'. Available:");
                        for p in &profiles {
                            println!("  - {}", p.name);
                        }
                    }
                },
                Err(e) => eprintln!("{} {e}", "Error:".red()),
            },
            _ => println!("Usage: /consensus [profile <name> | off]"),
        }
    }

    /// Resolve a session by list position (as shown by /sessions) or id.
    fn resolve_session(&self, arg: &str) -> Option<ChatId> {
        let sessions = self.dispatcher.store().sessions();
        if let Ok(n) = arg.parse::<usize>() {
            return sessions.get(n.checked_sub(1)?).map(|s| s.id.clone());
        }
        sessions
            .iter()
            .find(|s| s.id.as_str() == arg)
            .map(|s| s.id.clone())
    }

    fn print_transcript(&self, id: &ChatId) {
        let Some(session) = self.dispatcher.store().session(id) else {
            return;
        };
        println!();
        println!("{}", display_title(&session).bold());
        for message in &session.messages {
            let label = match message.role {
                Role::User => "you".cyan(),
                Role::Assistant => message
                    .model
                    .as_deref()
                    .unwrap_or("assistant")
                    .to_string()
                    .green(),
            };
            match message.status {
                MessageStatus::Failed => println!("{label}: {}", message.content.red()),
                _ => println!("{label}: {}", message.content),
            }
        }
        println!();
    }

    fn print_welcome(&self) {
        println!();
        println!("parley - chat with one model or a council of them");
        println!();
        println!("Type a message to send it. Commands:");
        println!("  /sessions        - List sessions");
        println!("  /open <n>        - Open a session");
        println!("  /consensus       - Toggle consensus mode");
        println!("  /help            - Full command list");
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Commands:");
        println!("  /sessions, /ls          - List sessions (refreshes from the server)");
        println!("  /open <n>               - Open session n and show its transcript");
        println!("  /new                    - Start a fresh session");
        println!("  /delete <n>             - Delete session n");
        println!("  /consensus              - Toggle consensus mode for subsequent sends");
        println!("  /consensus profile <p>  - Use the saved profile p");
        println!("  /consensus off          - Back to direct streaming");
        println!("  /cancel                 - Cancel the generation in progress");
        println!("  /help, /h, /?           - Show this help");
        println!("  /quit, /exit, /q        - Exit");
        println!();
    }
}

fn display_title(session: &Session) -> String {
    session
        .title
        .clone()
        .unwrap_or_else(|| session.id.to_string())
}

/// Render store changes to the terminal.
///
/// Streamed deltas are printed as they land in the pending row; consensus
/// round progress is shown as dim status lines; terminal rows (final
/// answers, failures) are printed once. Everything goes through the
/// external printer so in-flight output does not corrupt the prompt.
async fn render_events<P>(
    mut events: UnboundedReceiver<StoreEvent>,
    store: Arc<SessionStore>,
    coordinator: Arc<GenerationCoordinator>,
    mut printer: P,
) where
    P: ExternalPrinter + Send + 'static,
{
    // Bytes of the pending streamed row already printed.
    let mut shown = 0usize;
    // Last consensus progress line printed, to suppress repeats.
    let mut last_progress = String::new();

    while let Some(event) = events.recv().await {
        let session = match &event {
            StoreEvent::MessageAppended { session, .. } => {
                shown = 0;
                last_progress.clear();
                session.clone()
            }
            StoreEvent::MessageUpdated { session } => session.clone(),
            // The consensus answer arrives as a transcript refresh while
            // the generation slot is still held.
            StoreEvent::TranscriptReplaced { session } if coordinator.is_busy() => {
                if let Some(s) = store.session(session) {
                    if let Some(m) = s.messages.last() {
                        if m.role == Role::Assistant && m.status == MessageStatus::Complete {
                            let _ = printer.print(format!("{}", m.content.green()));
                        }
                    }
                }
                continue;
            }
            _ => continue,
        };

        let Some(s) = store.session(&session) else {
            continue;
        };
        let Some(m) = s.messages.last() else {
            continue;
        };
        if m.role != Role::Assistant {
            continue;
        }

        match (m.status, m.is_consensus) {
            (MessageStatus::Pending, false) => {
                if m.content.len() > shown && m.content.is_char_boundary(shown) {
                    let _ = printer.print(m.content[shown..].to_string());
                    shown = m.content.len();
                }
            }
            (MessageStatus::Pending, true) => {
                if m.content != last_progress {
                    last_progress = m.content.clone();
                    let _ = printer.print(format!("{}", m.content.dimmed()));
                }
            }
            (MessageStatus::Complete, false) => {
                if m.content.len() > shown && m.content.is_char_boundary(shown) {
                    let _ = printer.print(m.content[shown..].to_string());
                }
                shown = 0;
            }
            // Inline fallback when the final transcript fetch failed.
            (MessageStatus::Complete, true) => {
                let _ = printer.print(format!("{}", m.content.green()));
            }
            (MessageStatus::Failed, _) => {
                let _ = printer.print(format!("{}", m.content.red()));
            }
        }
    }
}
