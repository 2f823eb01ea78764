//! The session: one value owning all client state.
//!
//! Pointer input and transport events go in, outbound JSON envelopes and
//! host [`Effect`]s come out. Every handler runs to completion on the host
//! thread; nothing here blocks or spawns.

use crate::bingo::BingoField;
use crate::catalog::{Catalog, CatalogDiff, CatalogEntry, SlotId};
use crate::clock::{Countdown, Stopwatch};
use crate::config::ClientConfig;
use crate::drag::{self, DragIntent, Interaction, Press, Step};
use crate::input::{ClickTracker, MouseButton, PointerId};
use crate::pairing::{PairOutcome, PairingCoordinator, PairingError};
use crate::protocol::{ClientMessage, PairResult, ProtocolError, ServerMessage};
use crate::storage::{NameStore, StorageResult};
use crate::sync::{ConnectionState, SyncEvent};
use crate::token::{TokenId, TokenSet};
use kurbo::{Point, Rect, Size};
use std::collections::HashMap;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Something the host has to reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    TokenSpawned(TokenId),
    TokenMoved(TokenId),
    TokenRaised(TokenId),
    TokenRemoved(TokenId),
    TokensCleared(Vec<TokenId>),
    /// Pairing-candidate highlight toggled.
    HighlightChanged { token: TokenId, highlighted: bool },
    /// Token entered or left an in-flight pairing request.
    Negotiating { token: TokenId, active: bool },
    /// A pairing produced a new token.
    Merged { spawned: TokenId, discovery: bool },
    PaletteChanged(CatalogDiff),
    Status(String),
    DisplayName(String),
    News(String),
    /// Blocking notice with the server's message.
    FatalNotice(String),
    /// Rebuild the client from scratch.
    Reload,
    BingoUpdated,
    Countdown(String),
    Stopwatch(String),
    Connection(ConnectionState),
}

/// Client session state.
pub struct Session {
    pair_distance: f64,
    jitter: f64,
    tokens: TokenSet,
    pairing: PairingCoordinator,
    catalog: Catalog,
    /// Active drags by pointer.
    drags: HashMap<PointerId, TokenId>,
    clicks: ClickTracker,
    connection: ConnectionState,
    status: String,
    display_name: Option<String>,
    news: String,
    bingo: Option<BingoField>,
    countdown: Countdown,
    stopwatch: Stopwatch,
    disposal_zone: Option<Rect>,
    name_store: Box<dyn NameStore>,
    /// Serialized envelopes waiting to be sent.
    outgoing: Vec<String>,
    effects: Vec<Effect>,
}

impl Session {
    /// Create a session from config, loading the stored display name.
    pub fn new(config: &ClientConfig, name_store: Box<dyn NameStore>) -> Self {
        let display_name = match name_store.load_name() {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Failed to load display name: {}", e);
                None
            }
        };
        Self {
            pair_distance: config.pair_distance,
            jitter: config.jitter,
            tokens: TokenSet::new(),
            pairing: PairingCoordinator::new(),
            catalog: Catalog::with_entries(&config.initial_catalog),
            drags: HashMap::new(),
            clicks: ClickTracker::new(),
            connection: ConnectionState::NotConnected,
            status: String::new(),
            display_name,
            news: String::new(),
            bingo: None,
            countdown: Countdown::new(),
            stopwatch: Stopwatch::new(),
            disposal_zone: None,
            name_store,
            outgoing: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Stored or server-confirmed display name.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn news(&self) -> &str {
        &self.news
    }

    pub fn bingo(&self) -> Option<&BingoField> {
        self.bingo.as_ref()
    }

    /// Number of pairing requests awaiting the server.
    pub fn pending_pairs(&self) -> usize {
        self.pairing.pending_count()
    }

    /// Token currently dragged by `pointer`.
    pub fn dragged_by(&self, pointer: PointerId) -> Option<TokenId> {
        self.drags.get(&pointer).copied()
    }

    /// Set the region where dropped tokens are destroyed.
    pub fn set_disposal_zone(&mut self, zone: Option<Rect>) {
        self.disposal_zone = zone;
    }

    /// Record the size the host measured for a token.
    pub fn set_token_size(&mut self, id: TokenId, size: Size) {
        self.tokens.set_size(id, size);
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection != state {
            self.connection = state;
            self.effects.push(Effect::Connection(state));
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Feed one transport event into the session.
    pub fn handle_sync_event(&mut self, event: SyncEvent, now: Instant) {
        match event {
            SyncEvent::Connected => {
                log::info!("Connected to server");
                self.set_connection_state(ConnectionState::Connected);
                for token in self.pairing.abandon_all(&mut self.tokens) {
                    self.effects.push(Effect::Negotiating { token, active: false });
                }
                self.enqueue(ClientMessage::Join {});
                if let Some(name) = self.display_name.clone() {
                    self.enqueue(ClientMessage::Username { name });
                }
            }
            SyncEvent::Disconnected => {
                log::info!("Disconnected from server");
                self.set_connection_state(ConnectionState::Disconnected);
            }
            SyncEvent::Reconnecting { attempt, delay } => {
                log::info!("Reconnecting (attempt {}) in {:?}", attempt, delay);
                self.set_connection_state(ConnectionState::Connecting);
            }
            SyncEvent::Error { message } => {
                log::error!("Transport error: {}", message);
                self.set_connection_state(ConnectionState::Disconnected);
            }
            SyncEvent::Message(text) => {
                // Already logged; bad envelopes are dropped
                let _ = self.handle_message(&text, now);
            }
        }
    }

    /// Parse and dispatch one inbound envelope.
    ///
    /// Envelopes that fail validation are logged and dropped without any
    /// effect on the session.
    pub fn handle_message(&mut self, json: &str, now: Instant) -> Result<(), ProtocolError> {
        match ServerMessage::parse(json) {
            Ok(msg) => {
                self.dispatch(msg, now);
                Ok(())
            }
            Err(e) => {
                log::debug!("Discarding envelope: {} ({})", e, json);
                Err(e)
            }
        }
    }

    /// Apply a validated server message.
    pub fn dispatch(&mut self, msg: ServerMessage, now: Instant) {
        match msg {
            ServerMessage::PairResult(result) => self.resolve_pair(&result),
            ServerMessage::Mode(mode) => {
                self.status = mode.clone();
                self.effects.push(Effect::Status(mode));
            }
            ServerMessage::Username(name) => {
                self.display_name = Some(name.clone());
                self.effects.push(Effect::DisplayName(name));
            }
            ServerMessage::Clear => self.clear_tokens(),
            ServerMessage::Items(entries) => {
                let diff = self.catalog.reconcile(&entries);
                if !diff.is_empty() {
                    self.effects.push(Effect::PaletteChanged(diff));
                }
            }
            ServerMessage::Bingo(field) => {
                self.bingo = Some(field);
                self.effects.push(Effect::BingoUpdated);
            }
            ServerMessage::News(news) => {
                self.news = news.clone();
                self.effects.push(Effect::News(news));
            }
            ServerMessage::Error(message) => {
                if message.is_empty() {
                    log::debug!("Ignoring empty server error");
                } else {
                    log::warn!("Server error: {}", message);
                    self.effects.push(Effect::FatalNotice(message));
                }
            }
            ServerMessage::Retry => {
                log::info!("Server requested a reload");
                self.effects.push(Effect::Reload);
            }
            ServerMessage::Timer(seconds) => {
                let text = self.countdown.set(seconds, now);
                self.effects.push(Effect::Countdown(text));
            }
            ServerMessage::Stopwatch(snapshot) => {
                let text = self.stopwatch.set(snapshot, now);
                self.effects.push(Effect::Stopwatch(text));
            }
        }
    }

    fn resolve_pair(&mut self, result: &PairResult) {
        match self.pairing.resolve_pair(&mut self.tokens, result) {
            PairOutcome::Merged { consumed, spawned, discovery, .. } => {
                for token in consumed {
                    self.effects.push(Effect::TokenRemoved(token));
                }
                self.effects.push(Effect::TokenSpawned(spawned));
                self.effects.push(Effect::Merged { spawned, discovery });
            }
            PairOutcome::Reverted { tokens, .. } => {
                for token in tokens {
                    self.effects.push(Effect::Negotiating { token, active: false });
                }
            }
            PairOutcome::Ignored { .. } => {}
        }
    }

    fn enqueue(&mut self, msg: ClientMessage) {
        match msg.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to serialize {:?}: {}", msg, e),
        }
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    /// Pointer pressed on the surface. Returns the token hit, if any.
    pub fn pointer_down(
        &mut self,
        pointer: PointerId,
        position: Point,
        button: MouseButton,
        now: Instant,
    ) -> Option<TokenId> {
        let clicks = self.clicks.register(position, button, now);
        // A press from a pointer that still holds a token means its release was lost
        self.cancel_drag(pointer);
        let id = self.tokens.token_at(position)?;
        self.press_token(id, Press { pointer, position, button, clicks });
        Some(id)
    }

    /// Pointer moved. Only matters while the pointer drags a token.
    pub fn pointer_move(&mut self, pointer: PointerId, position: Point) {
        let Some(id) = self.drags.get(&pointer).copied() else {
            return;
        };
        let Some(token) = self.tokens.get(id) else {
            self.drags.remove(&pointer);
            return;
        };
        let step = drag::drag_to(token, position, &self.tokens, self.pair_distance, self.jitter);
        self.apply_step(id, step, None);
    }

    /// Pointer released, ending its drag.
    pub fn pointer_up(&mut self, pointer: PointerId, position: Point) {
        let Some(id) = self.drags.get(&pointer).copied() else {
            return;
        };
        let moved = match self.tokens.get(id).map(|t| t.interaction()) {
            Some(Interaction::Dragging(drag)) => drag.last != position,
            _ => false,
        };
        if moved {
            self.pointer_move(pointer, position);
        }

        self.drags.remove(&pointer);
        let Some(token) = self.tokens.get(id) else {
            return;
        };
        let step = drag::release(token, self.disposal_zone);
        self.apply_step(id, step, None);
    }

    /// Press on a palette entry: spawn a token under the pointer and drag it.
    pub fn palette_press(
        &mut self,
        slot: SlotId,
        pointer: PointerId,
        position: Point,
        button: MouseButton,
    ) -> Option<TokenId> {
        if button != MouseButton::Left || self.drags.contains_key(&pointer) {
            return None;
        }
        let entry = self.catalog.slot(slot)?.entry.clone();
        self.clicks.reset();
        let id = self.tokens.spawn_centered(&entry, position);
        self.effects.push(Effect::TokenSpawned(id));
        self.press_token(id, Press::primary(pointer, position));
        Some(id)
    }

    fn cancel_drag(&mut self, pointer: PointerId) {
        let Some(id) = self.drags.remove(&pointer) else {
            return;
        };
        if let Some(token) = self.tokens.get(id) {
            log::debug!("Dropping stale drag of {}", token.label);
            let step = drag::cancel(token);
            self.apply_step(id, step, None);
        }
    }

    fn press_token(&mut self, id: TokenId, press: Press) {
        let Some(token) = self.tokens.get(id) else {
            return;
        };
        let step = drag::press(token, &press);
        self.apply_step(id, step, Some(press));
    }

    /// Carry out a drag transition.
    fn apply_step(&mut self, id: TokenId, step: Step, press: Option<Press>) {
        let Some(token) = self.tokens.get_mut(id) else {
            return;
        };
        let was_dragging = token.is_dragging();
        token.interaction = step.next;
        match &token.interaction {
            Interaction::Dragging(drag) => {
                self.drags.insert(drag.pointer, id);
            }
            _ if was_dragging => self.drags.retain(|_, t| *t != id),
            _ => {}
        }

        for intent in step.intents {
            match intent {
                DragIntent::MarkSeen => {
                    if let Some(token) = self.tokens.get_mut(id) {
                        token.is_new = false;
                    }
                }
                DragIntent::Raise => {
                    self.tokens.raise(id);
                    self.effects.push(Effect::TokenRaised(id));
                }
                DragIntent::MoveBy(delta) => {
                    if let Some(token) = self.tokens.get_mut(id) {
                        token.position += delta;
                        self.effects.push(Effect::TokenMoved(id));
                    }
                }
                DragIntent::Highlight { from, to } => {
                    if let Some(token) = from {
                        self.effects.push(Effect::HighlightChanged { token, highlighted: false });
                    }
                    if let Some(token) = to {
                        self.effects.push(Effect::HighlightChanged { token, highlighted: true });
                    }
                }
                DragIntent::SpawnCopy { at } => self.spawn_copy(id, at, press),
                DragIntent::Destroy => {
                    self.remove_token(id);
                }
                DragIntent::RequestPair { with } => {
                    // Failure is logged and leaves both tokens as they were
                    let _ = self.request_pair(id, with);
                }
            }
        }
    }

    fn spawn_copy(&mut self, original: TokenId, at: Point, press: Option<Press>) {
        let Some(entry) = self.tokens.get(original).map(|t| t.entry()) else {
            return;
        };
        let copy = self.tokens.spawn_centered(&entry, at);
        log::debug!("Copied {} {}", entry.icon, entry.label);
        self.effects.push(Effect::TokenSpawned(copy));

        // A primary-button copy follows the pointer straight away
        if let Some(press) = press.filter(|p| p.button == MouseButton::Left) {
            self.press_token(copy, Press::primary(press.pointer, at));
        }
    }

    fn remove_token(&mut self, id: TokenId) -> bool {
        if self.tokens.remove(id).is_none() {
            return false;
        }
        self.drags.retain(|_, t| *t != id);
        self.effects.push(Effect::TokenRemoved(id));
        true
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    /// Spawn a token with its top-left corner at `position`.
    pub fn spawn(&mut self, entry: &CatalogEntry, position: Point) -> TokenId {
        let id = self.tokens.spawn(entry, position);
        self.effects.push(Effect::TokenSpawned(id));
        id
    }

    /// Delete a token. Tokens waiting on the server cannot be deleted.
    pub fn delete_token(&mut self, id: TokenId) -> bool {
        match self.tokens.get(id) {
            Some(token) if !token.is_pairing() => self.remove_token(id),
            _ => false,
        }
    }

    /// Remove every token from the surface.
    ///
    /// Pending requests lose their participants; their late results are ignored.
    pub fn clear_tokens(&mut self) {
        let removed = self.tokens.clear();
        self.drags.clear();
        let dropped = self.pairing.forget_missing(&mut self.tokens);
        if dropped > 0 {
            log::debug!("Dropped {} pending pair requests on clear", dropped);
        }
        self.effects.push(Effect::TokensCleared(removed));
    }

    /// Ask the server to combine two tokens.
    pub fn request_pair(&mut self, a: TokenId, b: TokenId) -> Result<u64, PairingError> {
        let connected = self.is_connected();
        // Participants still under another pointer lose their drag and its highlight
        let highlighted: Vec<TokenId> = [a, b]
            .iter()
            .filter_map(|&id| match self.tokens.get(id).map(|t| t.interaction()) {
                Some(Interaction::Dragging(drag)) => drag.candidate,
                _ => None,
            })
            .collect();
        match self.pairing.request_pair(&mut self.tokens, a, b, connected) {
            Ok(request) => {
                self.drags.retain(|_, t| !request.tokens.contains(t));
                for token in highlighted {
                    self.effects.push(Effect::HighlightChanged { token, highlighted: false });
                }
                for token in request.tokens {
                    self.effects.push(Effect::Negotiating { token, active: true });
                }
                self.enqueue(request.message);
                Ok(request.id)
            }
            Err(e) => {
                log::warn!("Pair request rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Store a new display name and announce it when connected.
    pub fn change_display_name(&mut self, name: &str) -> StorageResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        self.name_store.save_name(name)?;
        self.display_name = Some(name.to_string());
        self.effects.push(Effect::DisplayName(name.to_string()));
        if self.is_connected() {
            self.enqueue(ClientMessage::Username { name: name.to_string() });
        }
        Ok(())
    }

    /// Click a bingo cell. Returns false if nothing was sent.
    pub fn click_bingo(&mut self, index: usize) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(click) = self.bingo.as_ref().and_then(|field| field.click(index)) else {
            return false;
        };
        self.enqueue(ClientMessage::BingoClick(click));
        true
    }

    /// Advance the countdown and stopwatch.
    pub fn tick(&mut self, now: Instant) {
        if let Some(text) = self.countdown.tick(now) {
            self.effects.push(Effect::Countdown(text));
        }
        if let Some(text) = self.stopwatch.tick(now) {
            self.effects.push(Effect::Stopwatch(text));
        }
    }

    /// Take pending outgoing envelopes.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing envelopes.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Take pending host effects.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }
}
