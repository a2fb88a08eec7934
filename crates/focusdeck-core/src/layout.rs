use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{self, Store};
use crate::widgets::WidgetKind;

const LAYOUT_KEY: &str = "layout";

/// One widget's placement on the grid, in grid units.
///
/// `x` may go negative (the grid is centered, items can hang past the left
/// edge); `y` is clamped to 0 at every commit. `w`/`h` never rest below the
/// widget's minimum span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridItem {
    pub id: WidgetKind,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    #[serde(default)]
    pub min_w: i32,
    #[serde(default)]
    pub min_h: i32,
}

impl GridItem {
    fn seed(id: WidgetKind, x: i32, y: i32, w: i32, h: i32) -> Self {
        let (min_w, min_h) = id.min_size();
        Self {
            id,
            x,
            y,
            w,
            h,
            min_w,
            min_h,
        }
    }

    /// Re-applies the registry minimums. Stored layouts may predate a
    /// minimum-size increase (or omit the fields entirely), so loads
    /// back-fill the minimums and raise the spans to match.
    fn enforce_minimums(&mut self) {
        let (min_w, min_h) = self.id.min_size();
        self.min_w = self.min_w.max(min_w);
        self.min_h = self.min_h.max(min_h);
        self.w = self.w.max(self.min_w);
        self.h = self.h.max(self.min_h);
    }
}

/// A partial geometry update; unset fields keep their current value.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridPatch {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<i32>,
    pub h: Option<i32>,
}

pub fn initial_layout() -> Vec<GridItem> {
    vec![
        GridItem::seed(WidgetKind::Sonic, 0, 0, 3, 5),
        GridItem::seed(WidgetKind::Breaker, 0, 5, 3, 5),
        GridItem::seed(WidgetKind::Todo, 3, 0, 3, 10),
        GridItem::seed(WidgetKind::Brain, 6, 0, 5, 10),
        GridItem::seed(WidgetKind::Timer, 11, 0, 3, 5),
        GridItem::seed(WidgetKind::Dopamine, 11, 5, 3, 5),
    ]
}

/// Owns the ordered item collection and is the single source of truth the
/// layout engine mutates. Every mutation persists best-effort.
#[derive(Debug)]
pub struct LayoutStore {
    items: Vec<GridItem>,
}

impl LayoutStore {
    /// Loads the persisted layout, falling back to the fixed initial layout
    /// on absence or parse failure. Runs before any save can happen, so a
    /// default in-memory layout never clobbers saved data.
    #[tracing::instrument(skip(store))]
    pub fn load(store: &dyn Store) -> Self {
        let items = match store::load_json::<Vec<GridItem>>(store, LAYOUT_KEY) {
            Some(mut items) => {
                for item in &mut items {
                    item.enforce_minimums();
                }
                debug!(count = items.len(), "loaded layout");
                items
            }
            None => {
                debug!("no stored layout; seeding initial layout");
                initial_layout()
            }
        };
        Self { items }
    }

    pub fn items(&self) -> &[GridItem] {
        &self.items
    }

    pub fn get(&self, id: WidgetKind) -> Option<&GridItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Merges a patch into an item, clamping spans to the item's minimums,
    /// then persists. Returns false when the item is not in the layout.
    #[tracing::instrument(skip(self, store))]
    pub fn update(&mut self, store: &mut dyn Store, id: WidgetKind, patch: GridPatch) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            warn!(%id, "update for widget not in layout");
            return false;
        };

        if let Some(x) = patch.x {
            item.x = x;
        }
        if let Some(y) = patch.y {
            item.y = y;
        }
        if let Some(w) = patch.w {
            item.w = w.max(item.min_w);
        }
        if let Some(h) = patch.h {
            item.h = h.max(item.min_h);
        }

        self.save(store);
        true
    }

    /// Soft-hides a widget. Its internal state is untouched; it only comes
    /// back through a full layout reset.
    #[tracing::instrument(skip(self, store))]
    pub fn remove(&mut self, store: &mut dyn Store, id: WidgetKind) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() == before {
            return false;
        }
        info!(%id, "removed widget from layout");
        self.save(store);
        true
    }

    /// Drops the persisted layout and reseeds every widget.
    #[tracing::instrument(skip(self, store))]
    pub fn reset(&mut self, store: &mut dyn Store) {
        if let Err(err) = store.delete(LAYOUT_KEY) {
            warn!(error = %err, "failed to delete stored layout");
        }
        self.items = initial_layout();
        info!("layout reset to initial state");
    }

    fn save(&self, store: &mut dyn Store) {
        store::save_json(store, LAYOUT_KEY, &self.items);
    }
}

#[cfg(test)]
mod tests {
    use super::{GridPatch, LayoutStore, initial_layout};
    use crate::store::{MemoryStore, Store};
    use crate::widgets::WidgetKind;

    #[test]
    fn absent_store_seeds_initial_layout() {
        let store = MemoryStore::new();
        let layout = LayoutStore::load(&store);
        assert_eq!(layout.items(), initial_layout().as_slice());
    }

    #[test]
    fn malformed_layout_falls_back_to_initial() {
        let mut store = MemoryStore::new();
        store.put_raw("layout", "[{\"id\": 42}]").expect("put");
        let layout = LayoutStore::load(&store);
        assert_eq!(layout.items(), initial_layout().as_slice());
    }

    #[test]
    fn update_clamps_spans_to_minimums() {
        let mut store = MemoryStore::new();
        let mut layout = LayoutStore::load(&store);

        let patch = GridPatch {
            w: Some(1),
            h: Some(2),
            ..GridPatch::default()
        };
        assert!(layout.update(&mut store, WidgetKind::Timer, patch));

        let timer = layout.get(WidgetKind::Timer).expect("timer item");
        assert_eq!((timer.w, timer.h), (2, 5));
    }

    #[test]
    fn stored_items_without_minimums_are_backfilled() {
        let mut store = MemoryStore::new();
        store
            .put_raw(
                "layout",
                r#"[{"id":"timer","x":11,"y":0,"w":3,"h":3}]"#,
            )
            .expect("put");

        let layout = LayoutStore::load(&store);
        let timer = layout.get(WidgetKind::Timer).expect("timer item");
        assert_eq!((timer.min_w, timer.min_h), (2, 5));
        // Height below the raised minimum is lifted on load.
        assert_eq!(timer.h, 5);
    }

    #[test]
    fn removal_is_soft_until_reset() {
        let mut store = MemoryStore::new();
        let mut layout = LayoutStore::load(&store);

        assert!(layout.remove(&mut store, WidgetKind::Dopamine));
        assert!(layout.get(WidgetKind::Dopamine).is_none());

        // A plain reload keeps the widget hidden.
        let layout = LayoutStore::load(&store);
        assert!(layout.get(WidgetKind::Dopamine).is_none());

        // Reset brings it back.
        let mut layout = layout;
        layout.reset(&mut store);
        assert!(layout.get(WidgetKind::Dopamine).is_some());
    }

    #[test]
    fn updates_survive_reload() {
        let mut store = MemoryStore::new();
        let mut layout = LayoutStore::load(&store);
        let patch = GridPatch {
            x: Some(-1),
            y: Some(3),
            ..GridPatch::default()
        };
        assert!(layout.update(&mut store, WidgetKind::Sonic, patch));

        let reloaded = LayoutStore::load(&store);
        let sonic = reloaded.get(WidgetKind::Sonic).expect("sonic item");
        assert_eq!((sonic.x, sonic.y), (-1, 3));
    }
}
