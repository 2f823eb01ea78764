//! Live tokens on the play surface and the set that owns them.

use crate::catalog::CatalogEntry;
use crate::drag::Interaction;
use kurbo::{Point, Rect, Size};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a token.
pub type TokenId = Uuid;

/// First z-index handed out; lower layers belong to the surface decoration.
const BASE_Z_INDEX: u64 = 10;

/// Chip metrics used to estimate a token's size before the host measures it.
const CHIP_PADDING: f64 = 10.0;
const ICON_ADVANCE: f64 = 25.0;
const GLYPH_ADVANCE: f64 = 9.5;
const CHIP_HEIGHT: f64 = 41.0;

/// A draggable, pairable instance of a catalog item.
#[derive(Debug, Clone)]
pub struct Token {
    pub(crate) id: TokenId,
    /// Item label, the identity the server combines on.
    pub label: String,
    /// Icon glyph shown before the label.
    pub icon: String,
    /// Top-left anchor in surface coordinates.
    pub position: Point,
    /// Rendered size.
    pub size: Size,
    pub(crate) interaction: Interaction,
    pub(crate) is_new: bool,
    pub(crate) z_index: u64,
}

impl Token {
    fn new(entry: &CatalogEntry, position: Point, z_index: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: entry.label.clone(),
            icon: entry.icon.clone(),
            position,
            size: estimate_size(entry),
            interaction: Interaction::Idle,
            is_new: true,
            z_index,
        }
    }

    /// Get the token's ID.
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// The catalog entry this token is an instance of.
    pub fn entry(&self) -> CatalogEntry {
        CatalogEntry::new(self.icon.clone(), self.label.clone())
    }

    /// Bounding box in surface coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Current interaction state.
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Whether the token is frozen by an in-flight pairing request.
    pub fn is_pairing(&self) -> bool {
        matches!(self.interaction, Interaction::Frozen)
    }

    /// Whether the token is being dragged.
    pub fn is_dragging(&self) -> bool {
        matches!(self.interaction, Interaction::Dragging(_))
    }

    /// True until the token's first drag starts.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Stacking order; higher is drawn on top.
    pub fn z_index(&self) -> u64 {
        self.z_index
    }
}

/// Estimate the rendered size of a chip for an entry.
pub fn estimate_size(entry: &CatalogEntry) -> Size {
    let glyphs = entry.label.chars().count() as f64;
    Size::new(CHIP_PADDING * 2.0 + ICON_ADVANCE + glyphs * GLYPH_ADVANCE, CHIP_HEIGHT)
}

/// Insertion-ordered collection that exclusively owns every live token.
#[derive(Debug, Clone)]
pub struct TokenSet {
    tokens: HashMap<TokenId, Token>,
    /// Insertion order.
    order: Vec<TokenId>,
    next_z: u64,
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            order: Vec::new(),
            next_z: BASE_Z_INDEX,
        }
    }

    fn take_z(&mut self) -> u64 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }

    /// Spawn a token with its top-left corner at `position`.
    pub fn spawn(&mut self, entry: &CatalogEntry, position: Point) -> TokenId {
        let z = self.take_z();
        let token = Token::new(entry, position, z);
        let id = token.id;
        self.order.push(id);
        self.tokens.insert(id, token);
        id
    }

    /// Spawn a token centred on `center`.
    pub fn spawn_centered(&mut self, entry: &CatalogEntry, center: Point) -> TokenId {
        let size = estimate_size(entry);
        let origin = Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0);
        self.spawn(entry, origin)
    }

    /// Remove a token.
    pub fn remove(&mut self, id: TokenId) -> Option<Token> {
        self.order.retain(|&token_id| token_id != id);
        self.tokens.remove(&id)
    }

    /// Remove every token, returning their IDs in insertion order.
    pub fn clear(&mut self) -> Vec<TokenId> {
        self.tokens.clear();
        std::mem::take(&mut self.order)
    }

    /// Get a token by ID.
    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// Get a mutable reference to a token by ID.
    pub fn get_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.get_mut(&id)
    }

    /// Check whether a token is live.
    pub fn contains(&self, id: TokenId) -> bool {
        self.tokens.contains_key(&id)
    }

    /// Tokens in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.order.iter().filter_map(|id| self.tokens.get(id))
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Move a token above every other token.
    pub fn raise(&mut self, id: TokenId) {
        if self.tokens.contains_key(&id) {
            let z = self.take_z();
            if let Some(token) = self.tokens.get_mut(&id) {
                token.z_index = z;
            }
        }
    }

    /// Record the size the host measured for a token.
    pub fn set_size(&mut self, id: TokenId, size: Size) {
        if let Some(token) = self.tokens.get_mut(&id) {
            token.size = size;
        }
    }

    /// Topmost token whose bounds contain `point`.
    pub fn token_at(&self, point: Point) -> Option<TokenId> {
        self.tokens
            .values()
            .filter(|t| t.bounds().contains(point))
            .max_by_key(|t| t.z_index)
            .map(|t| t.id)
    }

    /// Freeze a token for a pairing request.
    pub(crate) fn freeze(&mut self, id: TokenId) {
        if let Some(token) = self.tokens.get_mut(&id) {
            token.interaction = Interaction::Frozen;
        }
    }

    /// Unfreeze a token. Returns true if it was frozen.
    pub(crate) fn thaw(&mut self, id: TokenId) -> bool {
        match self.tokens.get_mut(&id) {
            Some(token) if token.is_pairing() => {
                token.interaction = Interaction::Idle;
                true
            }
            _ => false,
        }
    }

    /// Count frozen tokens.
    pub fn frozen_count(&self) -> usize {
        self.tokens.values().filter(|t| t.is_pairing()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str) -> CatalogEntry {
        CatalogEntry::new("🔗", label)
    }

    #[test]
    fn test_spawn_preserves_insertion_order() {
        let mut set = TokenSet::new();
        let a = set.spawn(&entry("A"), Point::new(0.0, 0.0));
        let b = set.spawn(&entry("B"), Point::new(50.0, 0.0));
        let c = set.spawn(&entry("C"), Point::new(100.0, 0.0));

        let ids: Vec<_> = set.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![a, b, c]);

        set.remove(b);
        let ids: Vec<_> = set.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_new_token_defaults() {
        let mut set = TokenSet::new();
        let id = set.spawn(&entry("Kaputt"), Point::new(5.0, 6.0));
        let token = set.get(id).unwrap();

        assert!(token.is_new());
        assert!(!token.is_pairing());
        assert!(!token.is_dragging());
        assert_eq!(token.position, Point::new(5.0, 6.0));
        assert_eq!(token.entry(), entry("Kaputt"));
    }

    #[test]
    fn test_z_index_unique_and_increasing() {
        let mut set = TokenSet::new();
        let a = set.spawn(&entry("A"), Point::ZERO);
        let b = set.spawn(&entry("B"), Point::ZERO);
        assert!(set.get(b).unwrap().z_index() > set.get(a).unwrap().z_index());

        set.raise(a);
        let za = set.get(a).unwrap().z_index();
        let zb = set.get(b).unwrap().z_index();
        assert!(za > zb);

        // Raising again still increases
        set.raise(a);
        assert!(set.get(a).unwrap().z_index() > za);
    }

    #[test]
    fn test_spawn_centered() {
        let mut set = TokenSet::new();
        let id = set.spawn_centered(&entry("Server"), Point::new(200.0, 100.0));
        let bounds = set.get(id).unwrap().bounds();
        assert!((bounds.center().x - 200.0).abs() < 1e-9);
        assert!((bounds.center().y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_at_prefers_topmost() {
        let mut set = TokenSet::new();
        let below = set.spawn(&entry("Below"), Point::new(0.0, 0.0));
        let above = set.spawn(&entry("Above"), Point::new(10.0, 10.0));

        assert_eq!(set.token_at(Point::new(20.0, 20.0)), Some(above));
        set.raise(below);
        assert_eq!(set.token_at(Point::new(20.0, 20.0)), Some(below));
        assert_eq!(set.token_at(Point::new(-5.0, -5.0)), None);
    }

    #[test]
    fn test_freeze_and_thaw() {
        let mut set = TokenSet::new();
        let id = set.spawn(&entry("A"), Point::ZERO);

        assert!(!set.thaw(id));
        set.freeze(id);
        assert!(set.get(id).unwrap().is_pairing());
        assert_eq!(set.frozen_count(), 1);
        assert!(set.thaw(id));
        assert_eq!(set.frozen_count(), 0);
    }

    #[test]
    fn test_clear_returns_ids() {
        let mut set = TokenSet::new();
        let a = set.spawn(&entry("A"), Point::ZERO);
        let b = set.spawn(&entry("B"), Point::ZERO);

        assert_eq!(set.clear(), vec![a, b]);
        assert!(set.is_empty());
        assert!(!set.contains(a));
    }
}
