//! Bingo board snapshots and cell clicks.

use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported board edge lengths.
pub const MIN_BOARD_SIZE: usize = 2;
pub const MAX_BOARD_SIZE: usize = 5;

/// One cell of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BingoCell {
    pub text: String,
    #[serde(default)]
    pub done: bool,
    /// Colour of the player who completed the cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_color: Option<String>,
    /// Colours of every player who completed the cell (shared boards).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub done_colors: Vec<String>,
}

impl BingoCell {
    /// Colours to paint the cell with, most specific first.
    pub fn colors(&self) -> Vec<&str> {
        if !self.done_colors.is_empty() {
            self.done_colors.iter().map(String::as_str).collect()
        } else {
            self.done_color.as_deref().into_iter().collect()
        }
    }
}

/// Board snapshot pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BingoField {
    pub size: usize,
    pub cells: Vec<BingoCell>,
}

/// Payload of an outbound `bingo_click`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoClick {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub size: usize,
    pub text: String,
    pub done: bool,
}

impl BingoField {
    /// Validate a `bingo` payload.
    pub fn from_payload(value: Value) -> Result<Self, ProtocolError> {
        let field: BingoField = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidPayload { tag: "bingo", reason: e.to_string() })?;
        field.validate()?;
        Ok(field)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&self.size) {
            return Err(ProtocolError::InvalidPayload {
                tag: "bingo",
                reason: format!("unsupported board size {}", self.size),
            });
        }
        let expected = self.size * self.size;
        if self.cells.len() != expected {
            return Err(ProtocolError::InvalidPayload {
                tag: "bingo",
                reason: format!("expected {} cells, got {}", expected, self.cells.len()),
            });
        }
        Ok(())
    }

    /// Cells grouped into rows.
    pub fn rows(&self) -> impl Iterator<Item = &[BingoCell]> {
        self.cells.chunks(self.size.max(1))
    }

    /// Build the click payload for a cell.
    pub fn click(&self, index: usize) -> Option<BingoClick> {
        if self.size == 0 {
            return None;
        }
        let cell = self.cells.get(index)?;
        Some(BingoClick {
            index,
            row: index / self.size,
            col: index % self.size,
            size: self.size,
            text: cell.text.clone(),
            done: cell.done,
        })
    }

    /// Number of completed cells.
    pub fn done_count(&self) -> usize {
        self.cells.iter().filter(|c| c.done).count()
    }
}
