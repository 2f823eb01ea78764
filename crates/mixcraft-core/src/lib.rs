//! Mixcraft Core Library
//!
//! Platform-agnostic client logic for the Mixcraft party game: draggable
//! tokens, the pairing negotiation with the server, the item palette and the
//! protocol bridge tying them together.

pub mod bingo;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod drag;
pub mod input;
pub mod pairing;
pub mod protocol;
pub mod proximity;
pub mod session;
pub mod storage;
pub mod sync;
pub mod token;

pub use bingo::{BingoCell, BingoClick, BingoField};
pub use catalog::{Catalog, CatalogDiff, CatalogEntry, PaletteSlot, SlotId};
pub use clock::{Countdown, Stopwatch, format_clock};
pub use config::{ClientConfig, ConfigError, resolve_server_url};
pub use drag::{DragIntent, DragState, Interaction, Press, Step};
pub use input::{ClickTracker, MouseButton, PointerId};
pub use pairing::{PairOutcome, PairRequest, PairingCoordinator, PairingError};
pub use protocol::{ClientMessage, PairResult, ProtocolError, ServerMessage, StopwatchSnapshot};
pub use proximity::{MAX_PAIR_DISTANCE, find_candidate, overlaps};
pub use session::{Effect, Session};
pub use storage::{MemoryNameStore, NameStore, StorageError, StorageResult, create_default_store};
pub use sync::{ConnectionState, PlatformWebSocket, ReconnectPolicy, SyncEvent, TransportError};
pub use token::{Token, TokenId, TokenSet};
