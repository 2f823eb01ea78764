//! Wire protocol with the game server.
//!
//! Every message in either direction is a JSON envelope
//! `{ "type": <tag>, "data": <payload> }`. Inbound envelopes are validated
//! here, at the boundary, and turned into a [`ServerMessage`]; anything that
//! does not fit becomes a [`ProtocolError`] for the caller to log and drop.

use crate::bingo::{BingoClick, BingoField};
use crate::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce ourselves after every (re)connect.
    Join {},
    /// Ask the server to combine two items.
    Pair { pair: [String; 2], id: u64 },
    /// Change the display name.
    Username { name: String },
    /// Toggle a bingo cell.
    BingoClick(BingoClick),
}

impl ClientMessage {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Resolution of a pairing request.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    /// Correlation id of the request.
    pub id: u64,
    /// The combined item, if the combination produced one.
    pub new_item: Option<CatalogEntry>,
    /// Whether nobody had discovered this item before.
    pub is_new: bool,
}

/// Stopwatch snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StopwatchSnapshot {
    pub seconds: u64,
    #[serde(default)]
    pub running: bool,
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// A pairing request was resolved.
    PairResult(PairResult),
    /// Status line (current game mode).
    Mode(String),
    /// Our display name.
    Username(String),
    /// Remove every token from the surface.
    Clear,
    /// Authoritative palette snapshot.
    Items(Vec<CatalogEntry>),
    /// Bingo board snapshot.
    Bingo(BingoField),
    /// News ticker text.
    News(String),
    /// Message to show the user in a blocking notice.
    Error(String),
    /// Reload the client from scratch.
    Retry,
    /// Countdown snapshot in seconds.
    Timer(u64),
    /// Stopwatch snapshot.
    Stopwatch(StopwatchSnapshot),
}

/// Why an inbound envelope was discarded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Envelope has no type tag")]
    MissingTag,
    #[error("Unknown message type: {0}")]
    UnknownTag(String),
    #[error("Missing payload for {0}")]
    MissingPayload(&'static str),
    #[error("Invalid payload for {tag}: {reason}")]
    InvalidPayload { tag: &'static str, reason: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    tag: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct RawPairResult {
    id: u64,
    #[serde(default)]
    new_item: Option<Value>,
    #[serde(default)]
    is_new: bool,
}

fn invalid(tag: &'static str, reason: impl ToString) -> ProtocolError {
    ProtocolError::InvalidPayload { tag, reason: reason.to_string() }
}

fn require(tag: &'static str, data: Option<Value>) -> Result<Value, ProtocolError> {
    data.ok_or(ProtocolError::MissingPayload(tag))
}

/// Text payloads accept strings and, leniently, numbers and booleans.
fn text(tag: &'static str, data: Option<Value>) -> Result<String, ProtocolError> {
    match require(tag, data)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(tag, format!("expected text, got {other}"))),
    }
}

fn items(data: Option<Value>) -> Result<Vec<CatalogEntry>, ProtocolError> {
    let Value::Array(raw) = require("items", data)? else {
        return Err(invalid("items", "expected an array"));
    };
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<CatalogEntry>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(_) => {
                log::debug!("Item without emoji or name: {}", item);
                None
            }
        })
        .collect())
}

fn pair_result(data: Option<Value>) -> Result<PairResult, ProtocolError> {
    let raw: RawPairResult =
        serde_json::from_value(require("pair_result", data)?).map_err(|e| invalid("pair_result", e))?;
    // An incomplete item counts as no item
    let new_item = raw
        .new_item
        .filter(|v| !v.is_null())
        .and_then(|v| match serde_json::from_value::<CatalogEntry>(v) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Pair result {} has an incomplete item: {}", raw.id, e);
                None
            }
        });
    Ok(PairResult { id: raw.id, new_item, is_new: raw.is_new })
}

impl ServerMessage {
    /// Parse an envelope from JSON text.
    pub fn parse(json: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Parse an already-decoded envelope.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        if !value.is_object() {
            return Err(ProtocolError::MissingTag);
        }
        let raw: RawEnvelope = serde_json::from_value(value)?;
        let tag = raw.tag.ok_or(ProtocolError::MissingTag)?;
        let data = raw.data;

        let msg = match tag.as_str() {
            "pair_result" => Self::PairResult(pair_result(data)?),
            "mode" => Self::Mode(text("mode", data)?),
            "username" => Self::Username(text("username", data)?),
            "clear" => Self::Clear,
            "items" => Self::Items(items(data)?),
            "bingo" => Self::Bingo(BingoField::from_payload(require("bingo", data)?)?),
            "news" => Self::News(text("news", data)?),
            "error" => Self::Error(text("error", data)?),
            "retry" => Self::Retry,
            "timer" => {
                let seconds = require("timer", data)?
                    .as_u64()
                    .ok_or_else(|| invalid("timer", "expected a non-negative integer"))?;
                Self::Timer(seconds)
            }
            "stopwatch" => Self::Stopwatch(
                serde_json::from_value(require("stopwatch", data)?).map_err(|e| invalid("stopwatch", e))?,
            ),
            _ => return Err(ProtocolError::UnknownTag(tag)),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Pair {
            pair: ["Kaputt".to_string(), "Verbindung".to_string()],
            id: 7,
        };
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "pair");
        assert_eq!(json["data"]["id"], 7);
        assert_eq!(json["data"]["pair"][0], "Kaputt");
        assert_eq!(json["data"]["pair"][1], "Verbindung");
    }

    #[test]
    fn test_join_has_empty_payload() {
        let json: Value = serde_json::from_str(&ClientMessage::Join {}.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "join");
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_username_serialize() {
        let msg = ClientMessage::Username { name: "Ada".to_string() };
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"username","data":{"name":"Ada"}}"#);
    }

    #[test]
    fn test_pair_result_with_item() {
        let msg = ServerMessage::parse(
            r#"{"type":"pair_result","data":{"id":3,"new_item":{"emoji":"💻","name":"Server"},"is_new":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::PairResult(PairResult {
                id: 3,
                new_item: Some(CatalogEntry::new("💻", "Server")),
                is_new: true,
            })
        );
    }

    #[test]
    fn test_pair_result_without_item() {
        for json in [
            r#"{"type":"pair_result","data":{"id":4,"new_item":null}}"#,
            r#"{"type":"pair_result","data":{"id":4}}"#,
            r#"{"type":"pair_result","data":{"id":4,"new_item":{"emoji":"💻"}}}"#,
        ] {
            match ServerMessage::parse(json).unwrap() {
                ServerMessage::PairResult(result) => {
                    assert_eq!(result.id, 4);
                    assert!(result.new_item.is_none());
                }
                other => panic!("Wrong message type: {other:?}"),
            }
        }
    }

    #[test]
    fn test_pair_result_requires_id() {
        let err = ServerMessage::parse(r#"{"type":"pair_result","data":{"new_item":null}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { tag: "pair_result", .. }));
        let err = ServerMessage::parse(r#"{"type":"pair_result"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingPayload("pair_result")));
    }

    #[test]
    fn test_unknown_and_untagged() {
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"dance","data":1}"#),
            Err(ProtocolError::UnknownTag(tag)) if tag == "dance"
        ));
        assert!(matches!(ServerMessage::parse(r#"{"data":1}"#), Err(ProtocolError::MissingTag)));
        assert!(matches!(ServerMessage::parse("[1,2]"), Err(ProtocolError::MissingTag)));
        assert!(matches!(ServerMessage::parse("{not json"), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_text_payloads() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"mode","data":"Bingo (Manual)"}"#).unwrap(),
            ServerMessage::Mode("Bingo (Manual)".to_string())
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"news","data":42}"#).unwrap(),
            ServerMessage::News("42".to_string())
        );
        assert!(ServerMessage::parse(r#"{"type":"username"}"#).is_err());
        assert!(ServerMessage::parse(r#"{"type":"mode","data":{"x":1}}"#).is_err());
    }

    #[test]
    fn test_items_skip_incomplete_entries() {
        let msg = ServerMessage::parse(
            r#"{"type":"items","data":[{"emoji":"🚧","name":"Kaputt"},{"name":"Ghost"},{"emoji":"🔗","name":"Verbindung"}]}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Items(vec![
                CatalogEntry::new("🚧", "Kaputt"),
                CatalogEntry::new("🔗", "Verbindung"),
            ])
        );
        assert!(ServerMessage::parse(r#"{"type":"items","data":"nope"}"#).is_err());
    }

    #[test]
    fn test_payloadless_tags() {
        assert_eq!(ServerMessage::parse(r#"{"type":"clear"}"#).unwrap(), ServerMessage::Clear);
        assert_eq!(ServerMessage::parse(r#"{"type":"retry"}"#).unwrap(), ServerMessage::Retry);
    }

    #[test]
    fn test_timer_payloads() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"timer","data":900}"#).unwrap(),
            ServerMessage::Timer(900)
        );
        assert!(ServerMessage::parse(r#"{"type":"timer","data":-1}"#).is_err());
        assert_eq!(
            ServerMessage::parse(r#"{"type":"stopwatch","data":{"seconds":12,"running":true}}"#).unwrap(),
            ServerMessage::Stopwatch(StopwatchSnapshot { seconds: 12, running: true })
        );
    }
}
