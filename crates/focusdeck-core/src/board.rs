use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::migrate;
use crate::store::{self, Store};

/// One sticky note: text, an optional image blob reference (data URI), or
/// both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainDumpItem {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl BrainDumpItem {
    pub fn new(text: &str, image: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.trim().to_string(),
            image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Left,
    Right,
}

/// Two-column sticky-note board. Columns are kept balanced by inserting
/// new items at the head of whichever column is currently shorter.
#[derive(Debug)]
pub struct BrainDumpBoard {
    left: Vec<BrainDumpItem>,
    right: Vec<BrainDumpItem>,
}

impl BrainDumpBoard {
    /// Loads the current schema, migrating legacy shapes when present.
    /// Migration is read-only: legacy keys survive until the first
    /// current-format save, so a reload before that reproduces the split.
    #[tracing::instrument(skip(store))]
    pub fn load(store: &dyn Store) -> Self {
        let shape = migrate::detect(store);
        let (left, right) = migrate::migrate(shape);
        debug!(left = left.len(), right = right.len(), "loaded board");
        Self { left, right }
    }

    pub fn left(&self) -> &[BrainDumpItem] {
        &self.left
    }

    pub fn right(&self) -> &[BrainDumpItem] {
        &self.right
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Adds a note to the head of the shorter column (ties go left).
    /// Returns `None` for an empty note (no text and no image).
    pub fn add(
        &mut self,
        store: &mut dyn Store,
        text: &str,
        image: Option<String>,
    ) -> Option<&BrainDumpItem> {
        if text.trim().is_empty() && image.is_none() {
            return None;
        }

        let item = BrainDumpItem::new(text, image);
        let to_left = self.left.len() <= self.right.len();
        if to_left {
            self.left.insert(0, item);
        } else {
            self.right.insert(0, item);
        }
        self.save(store);
        let column = if to_left { &self.left } else { &self.right };
        Some(&column[0])
    }

    pub fn delete(&mut self, store: &mut dyn Store, id: &str) -> bool {
        let before = self.left.len() + self.right.len();
        self.left.retain(|item| item.id != id);
        self.right.retain(|item| item.id != id);
        if self.left.len() + self.right.len() == before {
            return false;
        }
        self.save(store);
        true
    }

    /// Moves a note to the head of the opposite column.
    pub fn move_to_other_column(&mut self, store: &mut dyn Store, id: &str) -> bool {
        if let Some(pos) = self.left.iter().position(|item| item.id == id) {
            let item = self.left.remove(pos);
            self.right.insert(0, item);
        } else if let Some(pos) = self.right.iter().position(|item| item.id == id) {
            let item = self.right.remove(pos);
            self.left.insert(0, item);
        } else {
            return false;
        }
        self.save(store);
        true
    }

    pub fn column_of(&self, id: &str) -> Option<Column> {
        if self.left.iter().any(|item| item.id == id) {
            Some(Column::Left)
        } else if self.right.iter().any(|item| item.id == id) {
            Some(Column::Right)
        } else {
            None
        }
    }

    pub fn clear(&mut self, store: &mut dyn Store) {
        info!(
            cleared = self.left.len() + self.right.len(),
            "board cleared"
        );
        self.left.clear();
        self.right.clear();
        self.save(store);
    }

    fn save(&self, store: &mut dyn Store) {
        store::save_json(store, migrate::BOARD_LEFT_KEY, &self.left);
        store::save_json(store, migrate::BOARD_RIGHT_KEY, &self.right);
    }
}
