//! The palette of spawnable items, kept in step with the server's catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A spawnable item type. Unique by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Icon glyph.
    #[serde(rename = "emoji")]
    pub icon: String,
    /// Item label.
    #[serde(rename = "name")]
    pub label: String,
}

impl CatalogEntry {
    /// Create a new entry.
    pub fn new(icon: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            icon: icon.into(),
            label: label.into(),
        }
    }
}

/// Identifier of a palette slot. Stable for as long as the entry stays displayed.
pub type SlotId = u32;

/// A displayed palette entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteSlot {
    pub id: SlotId,
    pub entry: CatalogEntry,
}

/// Changes produced by a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    /// Slots removed, in display order.
    pub removed: Vec<PaletteSlot>,
    /// Slots added, in snapshot order.
    pub added: Vec<PaletteSlot>,
}

impl CatalogDiff {
    /// Check whether the reconciliation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// The displayed palette.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    slots: Vec<PaletteSlot>,
    next_slot: SlotId,
}

impl Catalog {
    /// Create an empty palette.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a palette seeded with `entries`.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add(entry.clone());
        }
        catalog
    }

    /// Display an entry. Returns `None` if its label is already displayed.
    pub fn add(&mut self, entry: CatalogEntry) -> Option<SlotId> {
        if self.contains(&entry.label) {
            return None;
        }
        let id = self.next_slot;
        self.next_slot += 1;
        self.slots.push(PaletteSlot { id, entry });
        Some(id)
    }

    /// Replace the displayed set with the server's snapshot by full diff.
    ///
    /// Entries whose label is missing from the snapshot are removed, unseen
    /// labels are appended in snapshot order, and everything else keeps its
    /// slot untouched.
    pub fn reconcile(&mut self, snapshot: &[CatalogEntry]) -> CatalogDiff {
        let wanted: HashSet<&str> = snapshot.iter().map(|e| e.label.as_str()).collect();

        let mut removed = Vec::new();
        self.slots.retain(|slot| {
            let keep = wanted.contains(slot.entry.label.as_str());
            if !keep {
                removed.push(slot.clone());
            }
            keep
        });

        let mut added = Vec::new();
        for entry in snapshot {
            if let Some(id) = self.add(entry.clone()) {
                added.push(PaletteSlot { id, entry: entry.clone() });
            }
        }

        if !removed.is_empty() || !added.is_empty() {
            log::debug!("Palette reconciled: -{} +{}", removed.len(), added.len());
        }

        CatalogDiff { removed, added }
    }

    /// Check whether a label is displayed.
    pub fn contains(&self, label: &str) -> bool {
        self.slots.iter().any(|s| s.entry.label == label)
    }

    /// Look up a displayed entry by label.
    pub fn get(&self, label: &str) -> Option<&PaletteSlot> {
        self.slots.iter().find(|s| s.entry.label == label)
    }

    /// Look up a slot by ID.
    pub fn slot(&self, id: SlotId) -> Option<&PaletteSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Displayed slots in order.
    pub fn iter(&self) -> impl Iterator<Item = &PaletteSlot> {
        self.slots.iter()
    }

    /// Number of displayed entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check whether the palette is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
