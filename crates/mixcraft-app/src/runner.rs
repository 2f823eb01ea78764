//! Terminal host loop.

use crate::commands::{self, Command};
use mixcraft_core::storage::create_default_store;
use mixcraft_core::sync::PlatformWebSocket;
use mixcraft_core::{
    ClientConfig, ConfigError, Effect, MemoryNameStore, MouseButton, NameStore, PointerId, Session, TokenId,
    TransportError,
};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Frame interval of the host loop.
const FRAME: Duration = Duration::from_millis(16);

/// Errors that end the host.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Load the config file at `path` (defaults when absent) and apply environment overrides.
pub fn load_config(path: Option<&str>) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn open_store() -> Box<dyn NameStore> {
    match create_default_store() {
        Ok(store) => store,
        Err(e) => {
            log::warn!("Name storage unavailable, using memory: {}", e);
            Box::new(MemoryNameStore::new())
        }
    }
}

/// Owns the session and its transport.
pub struct Host {
    config: ClientConfig,
    session: Session,
    ws: PlatformWebSocket,
}

impl Host {
    /// Build a session and connect it.
    pub fn connect(config: ClientConfig) -> Result<Self, RunError> {
        let session = build_session(&config);
        let mut ws = PlatformWebSocket::new(config.reconnect);
        let url = config.endpoint_url();
        ws.connect(&url)?;
        log::info!("Connecting to {}", url);
        Ok(Self { config, session, ws })
    }

    /// Throw everything away and start over.
    fn reload(&mut self) -> Result<(), RunError> {
        log::info!("Reloading session");
        self.ws.disconnect();
        *self = Self::connect(self.config.clone())?;
        Ok(())
    }

    /// One frame: pump transport events, tick, flush, report.
    fn frame(&mut self, now: Instant) -> Result<(), RunError> {
        for event in self.ws.poll_events() {
            self.session.handle_sync_event(event, now);
        }
        self.session.tick(now);
        self.flush();

        let mut reload = false;
        for effect in self.session.take_effects() {
            if effect == Effect::Reload {
                reload = true;
            } else if let Some(line) = describe_effect(&effect, &self.session) {
                println!("{}", line);
            }
        }
        if reload {
            self.reload()?;
        }
        Ok(())
    }

    fn flush(&mut self) {
        for msg in self.session.take_outgoing() {
            if let Err(e) = self.ws.send(&msg) {
                log::warn!("Dropping outgoing message: {}", e);
            }
        }
    }

    /// Execute a user command against the session.
    fn execute(&mut self, command: Command, now: Instant) {
        let mouse = PointerId::MOUSE;
        match command {
            Command::Spawn { label, at } => {
                let Some(slot) = self.session.catalog().get(&label).map(|s| s.id) else {
                    println!("No palette item named {}", label);
                    return;
                };
                self.session.palette_press(slot, mouse, at, MouseButton::Left);
                self.session.pointer_up(mouse, at);
            }
            Command::Drag { from, to } => {
                if self.session.pointer_down(mouse, from, MouseButton::Left, now).is_none() {
                    println!("Nothing at {}, {}", from.x, from.y);
                    return;
                }
                self.session.pointer_move(mouse, to);
                self.session.pointer_up(mouse, to);
            }
            Command::Combine { first, second } => {
                let Some(a) = find_token(&self.session, &first, None) else {
                    println!("No free token named {}", first);
                    return;
                };
                let Some(b) = find_token(&self.session, &second, Some(a)) else {
                    println!("No free token named {}", second);
                    return;
                };
                if let Err(e) = self.session.request_pair(a, b) {
                    println!("{}", e);
                }
            }
            Command::Name(name) => {
                if let Err(e) = self.session.change_display_name(&name) {
                    log::error!("Failed to store display name: {}", e);
                }
            }
            Command::Bingo(index) => {
                if !self.session.click_bingo(index) {
                    println!("Cannot click cell {}", index);
                }
            }
            Command::Clear => self.session.clear_tokens(),
            Command::List => print_surface(&self.session),
            Command::Help => {
                for entry in commands::help() {
                    println!("  {:<26} {}", entry.usage, entry.description);
                }
            }
            Command::Quit => {}
        }
        self.flush();
    }
}

fn build_session(config: &ClientConfig) -> Session {
    let mut session = Session::new(config, open_store());
    if let Some(name) = &config.display_name {
        if let Err(e) = session.change_display_name(name) {
            log::warn!("Failed to store display name: {}", e);
        }
    }
    session
}

/// First non-pairing token with `label`, skipping `except`.
fn find_token(session: &Session, label: &str, except: Option<TokenId>) -> Option<TokenId> {
    session
        .tokens()
        .iter()
        .find(|t| t.label == label && !t.is_pairing() && Some(t.id()) != except)
        .map(|t| t.id())
}

fn print_surface(session: &Session) {
    println!("[{}] {}", session.connection_state().label(), session.status());
    for token in session.tokens().iter() {
        let marker = if token.is_pairing() { " (pairing)" } else { "" };
        println!(
            "  {} {} at {:.0}, {:.0}{}",
            token.icon, token.label, token.position.x, token.position.y, marker
        );
    }
    let palette: Vec<_> = session
        .catalog()
        .iter()
        .map(|s| format!("{} {}", s.entry.icon, s.entry.label))
        .collect();
    println!("  palette: {}", palette.join(", "));
}

/// One line describing an effect, for effects worth showing.
pub fn describe_effect(effect: &Effect, session: &Session) -> Option<String> {
    let label = |id: TokenId| {
        session
            .tokens()
            .get(id)
            .map(|t| format!("{} {}", t.icon, t.label))
            .unwrap_or_else(|| "token".to_string())
    };
    match effect {
        Effect::Connection(state) => Some(format!("Connection: {}", state.label())),
        Effect::Merged { spawned, discovery: true } => Some(format!("New discovery: {}!", label(*spawned))),
        Effect::Merged { spawned, .. } => Some(format!("Combined into {}", label(*spawned))),
        Effect::Negotiating { token, active: false } => Some(format!("{} is free again", label(*token))),
        Effect::PaletteChanged(diff) => Some(format!(
            "Palette: {} added, {} removed",
            diff.added.len(),
            diff.removed.len()
        )),
        Effect::TokensCleared(ids) => Some(format!("Cleared {} tokens", ids.len())),
        Effect::Status(status) => Some(format!("Mode: {}", status)),
        Effect::DisplayName(name) => Some(format!("You are: {}", name)),
        Effect::News(news) => Some(format!("News: {}", news)),
        Effect::FatalNotice(message) => Some(format!("!! {}", message)),
        Effect::BingoUpdated => session.bingo().map(|field| {
            let rows: Vec<String> = field
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|c| if c.done { format!("[{}]", c.text) } else { c.text.clone() })
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect();
            format!("Bingo:\n  {}", rows.join("\n  "))
        }),
        Effect::Countdown(text) => Some(format!("Timer: {}", text)),
        Effect::Stopwatch(text) => Some(format!("Stopwatch: {}", text)),
        _ => None,
    }
}

fn spawn_stdin() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Run the host until `quit` or end of input.
pub fn run(config: ClientConfig) -> Result<(), RunError> {
    let mut host = Host::connect(config)?;
    let lines = spawn_stdin();
    println!("Type `help` for commands.");

    loop {
        let now = Instant::now();
        loop {
            match lines.try_recv() {
                Ok(line) => match line.parse::<Command>() {
                    Ok(Command::Quit) => return Ok(()),
                    Ok(command) => host.execute(command, now),
                    Err(commands::CommandError::Empty) => {}
                    Err(e) => println!("{}", e),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        host.frame(now)?;
        thread::sleep(FRAME);
    }
}
