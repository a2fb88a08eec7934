//! Schema migration for the sticky-note board.
//!
//! Three generations of persisted shapes exist in the wild: the current
//! two-column keys, a single-list format, and a first-generation flat
//! string array. Which shape a user has is inferred from which keys exist;
//! migration collapses all of them into the two-column schema with a pure
//! transform, applied once per load and never writing to the legacy keys.

use tracing::{debug, info};

use crate::board::BrainDumpItem;
use crate::store::{Store, load_json};

pub(crate) const BOARD_LEFT_KEY: &str = "board-left";
pub(crate) const BOARD_RIGHT_KEY: &str = "board-right";
const LEGACY_LIST_V2_KEY: &str = "board-list-v2";
const LEGACY_LIST_V1_KEY: &str = "board-list";

const IMAGE_DATA_PREFIX: &str = "data:image";

/// Every shape the board has ever been persisted in.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredShape {
    Current {
        left: Vec<BrainDumpItem>,
        right: Vec<BrainDumpItem>,
    },
    /// Single ordered list, split into columns on migration.
    V2(Vec<BrainDumpItem>),
    /// Flat string array; image entries are raw data URIs.
    V1(Vec<String>),
    Absent,
}

/// Total version detection: exactly one shape comes back for any store
/// contents. Current keys win, then v2, then v1, then empty.
#[tracing::instrument(skip(store))]
pub fn detect(store: &dyn Store) -> StoredShape {
    let left: Option<Vec<BrainDumpItem>> = load_json(store, BOARD_LEFT_KEY);
    let right: Option<Vec<BrainDumpItem>> = load_json(store, BOARD_RIGHT_KEY);
    if left.is_some() || right.is_some() {
        return StoredShape::Current {
            left: left.unwrap_or_default(),
            right: right.unwrap_or_default(),
        };
    }

    if let Some(items) = load_json::<Vec<BrainDumpItem>>(store, LEGACY_LIST_V2_KEY) {
        debug!(count = items.len(), "detected v2 board data");
        return StoredShape::V2(items);
    }

    if let Some(entries) = load_json::<Vec<String>>(store, LEGACY_LIST_V1_KEY) {
        debug!(count = entries.len(), "detected v1 board data");
        return StoredShape::V1(entries);
    }

    StoredShape::Absent
}

/// Pure `shape -> (left, right)` transform. Item order is preserved within
/// each half; running it twice over the same payload yields the same
/// columns.
pub fn migrate(shape: StoredShape) -> (Vec<BrainDumpItem>, Vec<BrainDumpItem>) {
    match shape {
        StoredShape::Current { left, right } => (left, right),
        StoredShape::V2(items) => {
            info!(count = items.len(), "migrating v2 board data");
            split_mid(items)
        }
        StoredShape::V1(entries) => {
            info!(count = entries.len(), "migrating v1 board data");
            let items = entries.iter().map(|raw| item_from_legacy(raw)).collect();
            split_mid(items)
        }
        StoredShape::Absent => (Vec::new(), Vec::new()),
    }
}

/// Midpoint split: `ceil(n/2)` items to the left column.
fn split_mid(mut items: Vec<BrainDumpItem>) -> (Vec<BrainDumpItem>, Vec<BrainDumpItem>) {
    let mid = items.len().div_ceil(2);
    let right = items.split_off(mid);
    (items, right)
}

/// A v1 entry is either a raw image data URI or plain text.
fn item_from_legacy(raw: &str) -> BrainDumpItem {
    if raw.starts_with(IMAGE_DATA_PREFIX) {
        BrainDumpItem::new("", Some(raw.to_string()))
    } else {
        BrainDumpItem::new(raw, None)
    }
}
