//! Pairing negotiation with the server.
//!
//! A pairing request freezes both tokens and is tagged with a correlation id.
//! The server answers at some later point with a `pair_result` carrying that
//! id; until then the tokens stay frozen. There is no client-side timeout.

use crate::catalog::CatalogEntry;
use crate::protocol::{ClientMessage, PairResult};
use crate::token::{TokenId, TokenSet};
use kurbo::Point;
use std::collections::HashMap;
use thiserror::Error;

/// Why a pairing request could not be issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("Not connected to the server")]
    NotConnected,
    #[error("Token not found: {0}")]
    UnknownToken(TokenId),
    #[error("A token cannot be paired with itself")]
    SameToken,
    #[error("Token is already pairing: {0}")]
    AlreadyPairing(TokenId),
}

/// A request issued by [`PairingCoordinator::request_pair`].
#[derive(Debug, Clone, PartialEq)]
pub struct PairRequest {
    pub id: u64,
    pub tokens: [TokenId; 2],
    /// Envelope to send to the server.
    pub message: ClientMessage,
}

/// What a resolution did to the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    /// Both participants were consumed and a new token spawned.
    Merged {
        id: u64,
        consumed: [TokenId; 2],
        spawned: TokenId,
        discovery: bool,
    },
    /// The participants still on the surface were unfrozen.
    Reverted { id: u64, tokens: Vec<TokenId> },
    /// Unknown or already resolved id.
    Ignored { id: u64 },
}

/// Tracks in-flight pairing requests.
#[derive(Debug, Clone)]
pub struct PairingCoordinator {
    next_id: u64,
    pending: HashMap<u64, [TokenId; 2]>,
}

impl Default for PairingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingCoordinator {
    /// Create a coordinator with no pending requests.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Issue a pairing request for `a` and `b`.
    ///
    /// On success both tokens are frozen and the returned request carries the
    /// envelope to send. On error nothing is changed; retrying is up to the user.
    pub fn request_pair(
        &mut self,
        tokens: &mut TokenSet,
        a: TokenId,
        b: TokenId,
        connected: bool,
    ) -> Result<PairRequest, PairingError> {
        if !connected {
            return Err(PairingError::NotConnected);
        }
        if a == b {
            return Err(PairingError::SameToken);
        }
        let label_a = pairable_label(tokens, a)?;
        let label_b = pairable_label(tokens, b)?;

        tokens.freeze(a);
        tokens.freeze(b);

        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, [a, b]);
        log::debug!("Pair request {}: {} + {}", id, label_a, label_b);

        Ok(PairRequest {
            id,
            tokens: [a, b],
            message: ClientMessage::Pair { pair: [label_a, label_b], id },
        })
    }

    /// Apply the server's answer to a request.
    pub fn resolve_pair(&mut self, tokens: &mut TokenSet, result: &PairResult) -> PairOutcome {
        let id = result.id;
        let Some([a, b]) = self.pending.remove(&id) else {
            log::warn!("Ignoring pair result for unknown id {}", id);
            return PairOutcome::Ignored { id };
        };

        if let Some(item) = &result.new_item {
            if let Some(spawned) = merge(tokens, a, b, item) {
                log::info!("Pair {} produced {} {}", id, item.icon, item.label);
                return PairOutcome::Merged {
                    id,
                    consumed: [a, b],
                    spawned,
                    discovery: result.is_new,
                };
            }
            log::warn!("Pair {} resolved after a participant was removed", id);
        } else {
            log::debug!("Pair {} produced nothing", id);
        }

        let reverted = [a, b].into_iter().filter(|&t| tokens.thaw(t)).collect();
        PairOutcome::Reverted { id, tokens: reverted }
    }

    /// Drop every pending request, unfreezing participants still on the surface.
    ///
    /// Late results for the dropped ids are ignored.
    pub fn abandon_all(&mut self, tokens: &mut TokenSet) -> Vec<TokenId> {
        let mut thawed = Vec::new();
        for (id, pair) in self.pending.drain() {
            log::debug!("Abandoning pair request {}", id);
            thawed.extend(pair.into_iter().filter(|&t| tokens.thaw(t)));
        }
        thawed
    }

    /// Drop requests whose participants are gone, unfreezing any survivor.
    pub fn forget_missing(&mut self, tokens: &mut TokenSet) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pair| {
            let alive = pair.iter().all(|&t| tokens.contains(t));
            if !alive {
                for &t in pair.iter() {
                    tokens.thaw(t);
                }
            }
            alive
        });
        before - self.pending.len()
    }

    /// Check whether an id is still awaiting resolution.
    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of requests awaiting resolution.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn pairable_label(tokens: &TokenSet, id: TokenId) -> Result<String, PairingError> {
    let token = tokens.get(id).ok_or(PairingError::UnknownToken(id))?;
    if token.is_pairing() {
        return Err(PairingError::AlreadyPairing(id));
    }
    Ok(token.label.clone())
}

/// Replace both participants with one token at the midpoint of their positions.
fn merge(tokens: &mut TokenSet, a: TokenId, b: TokenId, item: &CatalogEntry) -> Option<TokenId> {
    let pa = tokens.get(a)?.position;
    let pb = tokens.get(b)?.position;
    tokens.remove(a);
    tokens.remove(b);
    Some(tokens.spawn(item, Point::new((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> (TokenSet, TokenId, TokenId) {
        let mut set = TokenSet::new();
        let a = set.spawn(&CatalogEntry::new("🚧", "Kaputt"), Point::new(100.0, 100.0));
        let b = set.spawn(&CatalogEntry::new("🔗", "Verbindung"), Point::new(108.0, 104.0));
        (set, a, b)
    }

    fn server() -> Option<CatalogEntry> {
        Some(CatalogEntry::new("💻", "Server"))
    }

    #[test]
    fn test_request_freezes_and_builds_message() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();

        let request = coordinator.request_pair(&mut set, a, b, true).unwrap();

        assert_eq!(request.id, 1);
        assert_eq!(
            request.message,
            ClientMessage::Pair { pair: ["Kaputt".to_string(), "Verbindung".to_string()], id: 1 }
        );
        assert!(set.get(a).unwrap().is_pairing());
        assert!(set.get(b).unwrap().is_pairing());
        assert!(coordinator.is_pending(1));
    }

    #[test]
    fn test_request_when_disconnected_leaves_tokens_alone() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();

        assert_eq!(coordinator.request_pair(&mut set, a, b, false), Err(PairingError::NotConnected));
        assert_eq!(set.frozen_count(), 0);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn test_request_rejects_pairing_token() {
        let (mut set, a, b) = surface();
        let c = set.spawn(&CatalogEntry::new("💻", "Server"), Point::ZERO);
        let mut coordinator = PairingCoordinator::new();

        coordinator.request_pair(&mut set, a, b, true).unwrap();
        assert_eq!(coordinator.request_pair(&mut set, c, b, true), Err(PairingError::AlreadyPairing(b)));
        assert!(!set.get(c).unwrap().is_pairing());
        assert_eq!(coordinator.request_pair(&mut set, c, c, true), Err(PairingError::SameToken));
    }

    #[test]
    fn test_ids_increase() {
        let (mut set, a, b) = surface();
        let c = set.spawn(&CatalogEntry::new("💧", "Wasser"), Point::ZERO);
        let d = set.spawn(&CatalogEntry::new("🔥", "Feuer"), Point::ZERO);
        let mut coordinator = PairingCoordinator::new();

        let first = coordinator.request_pair(&mut set, a, b, true).unwrap().id;
        let second = coordinator.request_pair(&mut set, c, d, true).unwrap().id;
        assert!(second > first);
    }

    #[test]
    fn test_merge_at_midpoint() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        let id = coordinator.request_pair(&mut set, a, b, true).unwrap().id;

        let outcome = coordinator.resolve_pair(&mut set, &PairResult { id, new_item: server(), is_new: false });

        let PairOutcome::Merged { spawned, consumed, .. } = outcome else {
            panic!("expected merge, got {outcome:?}");
        };
        assert_eq!(consumed, [a, b]);
        assert_eq!(set.len(), 1);
        let token = set.get(spawned).unwrap();
        assert_eq!(token.label, "Server");
        assert_eq!(token.position, Point::new(104.0, 102.0));
        assert!(!token.is_pairing());
    }

    #[test]
    fn test_failure_reverts() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        let id = coordinator.request_pair(&mut set, a, b, true).unwrap().id;

        let outcome = coordinator.resolve_pair(&mut set, &PairResult { id, new_item: None, is_new: false });

        assert_eq!(outcome, PairOutcome::Reverted { id, tokens: vec![a, b] });
        assert_eq!(set.frozen_count(), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_duplicate_resolution_is_noop() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        let id = coordinator.request_pair(&mut set, a, b, true).unwrap().id;

        coordinator.resolve_pair(&mut set, &PairResult { id, new_item: server(), is_new: false });
        let snapshot: Vec<_> = set.iter().map(|t| t.id()).collect();

        let outcome = coordinator.resolve_pair(&mut set, &PairResult { id, new_item: server(), is_new: false });
        assert_eq!(outcome, PairOutcome::Ignored { id });
        assert_eq!(set.iter().map(|t| t.id()).collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn test_unknown_id_ignored() {
        let (mut set, _, _) = surface();
        let mut coordinator = PairingCoordinator::new();
        let outcome = coordinator.resolve_pair(&mut set, &PairResult { id: 99, new_item: None, is_new: false });
        assert_eq!(outcome, PairOutcome::Ignored { id: 99 });
    }

    #[test]
    fn test_merge_after_participant_removed_reverts_survivor() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        let id = coordinator.request_pair(&mut set, a, b, true).unwrap().id;
        set.remove(a);

        let outcome = coordinator.resolve_pair(&mut set, &PairResult { id, new_item: server(), is_new: true });
        assert_eq!(outcome, PairOutcome::Reverted { id, tokens: vec![b] });
        assert_eq!(set.len(), 1);
        assert!(!set.get(b).unwrap().is_pairing());
    }

    #[test]
    fn test_abandon_all_unfreezes() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        let id = coordinator.request_pair(&mut set, a, b, true).unwrap().id;

        let thawed = coordinator.abandon_all(&mut set);
        assert_eq!(thawed.len(), 2);
        assert_eq!(set.frozen_count(), 0);
        assert!(!coordinator.is_pending(id));
    }

    #[test]
    fn test_forget_missing() {
        let (mut set, a, b) = surface();
        let mut coordinator = PairingCoordinator::new();
        coordinator.request_pair(&mut set, a, b, true).unwrap();

        assert_eq!(coordinator.forget_missing(&mut set), 0);
        set.clear();
        assert_eq!(coordinator.forget_missing(&mut set), 1);
        assert_eq!(coordinator.pending_count(), 0);
    }
}
