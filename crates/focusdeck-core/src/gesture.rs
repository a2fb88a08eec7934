use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::geometry::GridGeometry;
use crate::layout::{GridItem, GridPatch, LayoutStore};
use crate::store::Store;
use crate::widgets::WidgetKind;

/// A pointer position in container pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

impl Pointer {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The engine-wide gesture state. At most one item is manipulated at a
/// time; all other items stay idle and renderable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    Dragging {
        id: WidgetKind,
        start: Pointer,
        origin_px: (f64, f64),
        current: Pointer,
    },
    Resizing {
        id: WidgetKind,
        start: Pointer,
        start_size_px: (f64, f64),
    },
}

const Z_ACTIVE: i32 = 50;
const Z_IDLE: i32 = 10;

/// Drives drag, resize, and snapping against the layout store.
///
/// Drag is continuous and commits only on release; resize snaps and commits
/// on every move. The asymmetry is observable behavior and is kept.
#[derive(Debug)]
pub struct LayoutEngine {
    layout: LayoutStore,
    geometry: GridGeometry,
    gesture: Gesture,
    active: Option<WidgetKind>,
    focused: BTreeSet<WidgetKind>,
}

impl LayoutEngine {
    pub fn new(layout: LayoutStore) -> Self {
        Self {
            layout,
            geometry: GridGeometry::reference(),
            gesture: Gesture::Idle,
            active: None,
            focused: BTreeSet::new(),
        }
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.layout
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Responsive recompute: a container resize changes only the pixel
    /// projection, never the stored grid units.
    pub fn set_container_width(&mut self, container_width: f64) {
        self.geometry = GridGeometry::for_container_width(container_width);
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn z_order(&self, id: WidgetKind) -> i32 {
        if self.active == Some(id) { Z_ACTIVE } else { Z_IDLE }
    }

    pub fn begin_drag(&mut self, id: WidgetKind, pointer: Pointer) -> bool {
        if self.gesture != Gesture::Idle {
            warn!(%id, "gesture already in flight; drag refused");
            return false;
        }
        let Some(item) = self.layout.get(id) else {
            warn!(%id, "drag on widget not in layout");
            return false;
        };

        let origin_px = self.geometry.to_pixels(item.x, item.y);
        self.active = Some(id);
        self.gesture = Gesture::Dragging {
            id,
            start: pointer,
            origin_px,
            current: pointer,
        };
        debug!(%id, "drag started");
        true
    }

    /// Tracks the pointer mid-drag. The visual position moves continuously;
    /// no grid mutation happens until release.
    pub fn drag_to(&mut self, pointer: Pointer) {
        if let Gesture::Dragging { current, .. } = &mut self.gesture {
            *current = pointer;
        }
    }

    /// Snaps the final pixel position to grid units and commits. `y` is
    /// clamped to 0; `x` has no lower bound (the grid is centered).
    pub fn end_drag(&mut self, store: &mut dyn Store, pointer: Pointer) -> Option<(i32, i32)> {
        let Gesture::Dragging {
            id,
            start,
            origin_px,
            ..
        } = self.gesture
        else {
            return None;
        };

        let end_x = origin_px.0 + (pointer.x - start.x);
        let end_y = origin_px.1 + (pointer.y - start.y);
        let (gx, gy) = self.geometry.to_grid(end_x, end_y);
        let gy = gy.max(0);

        self.gesture = Gesture::Idle;
        let patch = GridPatch {
            x: Some(gx),
            y: Some(gy),
            ..GridPatch::default()
        };
        self.layout.update(store, id, patch);
        debug!(%id, gx, gy, "drag committed");
        Some((gx, gy))
    }

    pub fn begin_resize(&mut self, id: WidgetKind, pointer: Pointer) -> bool {
        if self.gesture != Gesture::Idle {
            warn!(%id, "gesture already in flight; resize refused");
            return false;
        }
        let Some(item) = self.layout.get(id) else {
            warn!(%id, "resize on widget not in layout");
            return false;
        };

        let start_size_px = (
            self.geometry.span_width(item.w),
            self.geometry.span_height(item.h),
        );
        self.active = Some(id);
        self.gesture = Gesture::Resizing {
            id,
            start: pointer,
            start_size_px,
        };
        debug!(%id, "resize started");
        true
    }

    /// Live resize: every pointer move snaps the tentative size to grid
    /// units, clamps to the item minimums, and commits immediately.
    pub fn resize_to(&mut self, store: &mut dyn Store, pointer: Pointer) -> Option<(i32, i32)> {
        let Gesture::Resizing {
            id,
            start,
            start_size_px,
        } = self.gesture
        else {
            return None;
        };
        let item = self.layout.get(id)?;

        let tentative_w = start_size_px.0 + (pointer.x - start.x);
        let tentative_h = start_size_px.1 + (pointer.y - start.y);
        let w = self.geometry.snap_span_w(tentative_w).max(item.min_w);
        let h = self.geometry.snap_span_h(tentative_h).max(item.min_h);

        let patch = GridPatch {
            w: Some(w),
            h: Some(h),
            ..GridPatch::default()
        };
        self.layout.update(store, id, patch);
        Some((w, h))
    }

    pub fn end_resize(&mut self) {
        if let Gesture::Resizing { id, .. } = self.gesture {
            debug!(%id, "resize finished");
            self.gesture = Gesture::Idle;
        }
    }

    /// Pixel rectangle for rendering: committed geometry plus, mid-drag,
    /// the continuous pointer offset.
    pub fn visual_rect(&self, item: &GridItem) -> (f64, f64, f64, f64) {
        let (mut px, mut py) = self.geometry.to_pixels(item.x, item.y);
        if let Gesture::Dragging {
            id,
            start,
            origin_px,
            current,
        } = self.gesture
            && id == item.id
        {
            px = origin_px.0 + (current.x - start.x);
            py = origin_px.1 + (current.y - start.y);
        }
        (
            px,
            py,
            self.geometry.span_width(item.w),
            self.geometry.span_height(item.h),
        )
    }

    pub fn toggle_focus(&mut self, id: WidgetKind) {
        if !self.focused.remove(&id) {
            self.focused.insert(id);
        }
    }

    pub fn clear_focus(&mut self) {
        self.focused.clear();
    }

    pub fn focused(&self) -> &BTreeSet<WidgetKind> {
        &self.focused
    }

    /// Focus-mode partition: when the focused set is non-empty, unfocused
    /// items are dimmed, not removed, so their widget state stays live.
    pub fn partition(&self) -> (Vec<&GridItem>, Vec<&GridItem>) {
        if self.focused.is_empty() {
            return (self.layout.items().iter().collect(), Vec::new());
        }
        self.layout
            .items()
            .iter()
            .partition(|item| self.focused.contains(&item.id))
    }

    pub fn remove(&mut self, store: &mut dyn Store, id: WidgetKind) -> bool {
        self.focused.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
        self.layout.remove(store, id)
    }

    pub fn reset(&mut self, store: &mut dyn Store) {
        self.gesture = Gesture::Idle;
        self.active = None;
        self.focused.clear();
        self.layout.reset(store);
    }
}

#[cfg(test)]
mod tests {
    use super::{Gesture, LayoutEngine, Pointer};
    use crate::layout::LayoutStore;
    use crate::store::MemoryStore;
    use crate::widgets::WidgetKind;

    fn engine_with_store() -> (LayoutEngine, MemoryStore) {
        let store = MemoryStore::new();
        let engine = LayoutEngine::new(LayoutStore::load(&store));
        (engine, store)
    }

    #[test]
    fn drag_commits_only_on_release() {
        let (mut engine, mut store) = engine_with_store();
        let unit = 54.0 + 22.0;

        assert!(engine.begin_drag(WidgetKind::Sonic, Pointer::new(5.0, 5.0)));
        engine.drag_to(Pointer::new(5.0 + unit, 5.0));

        // Mid-drag the stored grid position is untouched.
        let sonic = engine.layout().get(WidgetKind::Sonic).expect("sonic");
        assert_eq!((sonic.x, sonic.y), (0, 0));

        engine.end_drag(&mut store, Pointer::new(5.0 + unit, 5.0));
        let sonic = engine.layout().get(WidgetKind::Sonic).expect("sonic");
        assert_eq!((sonic.x, sonic.y), (1, 0));
    }

    #[test]
    fn drag_clamps_y_but_not_x() {
        let (mut engine, mut store) = engine_with_store();
        let unit = 54.0 + 22.0;

        assert!(engine.begin_drag(WidgetKind::Sonic, Pointer::new(0.0, 0.0)));
        let committed = engine
            .end_drag(&mut store, Pointer::new(-2.0 * unit, -3.0 * unit))
            .expect("commit");
        assert_eq!(committed, (-2, 0));
    }

    #[test]
    fn second_gesture_is_refused_while_one_is_in_flight() {
        let (mut engine, _store) = engine_with_store();

        assert!(engine.begin_drag(WidgetKind::Sonic, Pointer::new(0.0, 0.0)));
        assert!(!engine.begin_drag(WidgetKind::Timer, Pointer::new(0.0, 0.0)));
        assert!(!engine.begin_resize(WidgetKind::Timer, Pointer::new(0.0, 0.0)));
        assert!(matches!(engine.gesture(), Gesture::Dragging { id, .. } if id == WidgetKind::Sonic));
    }

    #[test]
    fn resize_commits_live_and_clamps_to_minimums() {
        let (mut engine, mut store) = engine_with_store();

        assert!(engine.begin_resize(WidgetKind::Timer, Pointer::new(100.0, 100.0)));
        // Pull far up and left: implied span is below the minimums.
        let committed = engine
            .resize_to(&mut store, Pointer::new(-400.0, -400.0))
            .expect("commit");
        assert_eq!(committed, (2, 5));

        // Committed before the gesture ends.
        let timer = engine.layout().get(WidgetKind::Timer).expect("timer");
        assert_eq!((timer.w, timer.h), (2, 5));
        engine.end_resize();
    }

    #[test]
    fn container_resize_changes_projection_not_grid_state() {
        let (mut engine, _store) = engine_with_store();
        let before: Vec<_> = engine.layout().items().to_vec();

        engine.set_container_width(1800.0);
        assert_eq!(engine.layout().items(), before.as_slice());
        assert!(engine.geometry().col_width > 54.0);
    }

    #[test]
    fn focus_partition_dims_rather_than_drops() {
        let (mut engine, _store) = engine_with_store();

        let (visible, dimmed) = engine.partition();
        assert_eq!(visible.len(), 6);
        assert!(dimmed.is_empty());

        engine.toggle_focus(WidgetKind::Timer);
        engine.toggle_focus(WidgetKind::Sonic);
        let (visible, dimmed) = engine.partition();
        assert_eq!(visible.len(), 2);
        assert_eq!(dimmed.len(), 4);

        engine.clear_focus();
        let (visible, _) = engine.partition();
        assert_eq!(visible.len(), 6);
    }

    #[test]
    fn active_item_is_raised() {
        let (mut engine, _store) = engine_with_store();
        assert!(engine.begin_drag(WidgetKind::Brain, Pointer::new(0.0, 0.0)));
        assert_eq!(engine.z_order(WidgetKind::Brain), 50);
        assert_eq!(engine.z_order(WidgetKind::Todo), 10);
    }
}
