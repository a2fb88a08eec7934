//! Grid-unit / pixel conversions for the dashboard grid.
//!
//! The grid is 14 columns wide. Column width is derived from the hosting
//! container width at render time; row height and gutter are fixed. All
//! conversions here are pure so the same projection math serves rendering,
//! drag snapping, and resize snapping.

pub const COLUMNS: i32 = 14;
pub const REF_COL_WIDTH: f64 = 54.0;
pub const ROW_HEIGHT: f64 = 54.0;
pub const GAP: f64 = 22.0;
pub const MIN_COL_WIDTH: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub col_width: f64,
    pub row_height: f64,
    pub gap: f64,
}

impl GridGeometry {
    /// Projection at the reference column width, used when the container
    /// width is not yet known.
    pub fn reference() -> Self {
        Self {
            col_width: REF_COL_WIDTH,
            row_height: ROW_HEIGHT,
            gap: GAP,
        }
    }

    /// Derives the projection for a container width. Grid-unit state never
    /// changes with the container; only this projection does.
    pub fn for_container_width(container_width: f64) -> Self {
        if container_width <= 0.0 {
            return Self::reference();
        }
        let available = container_width - f64::from(COLUMNS - 1) * GAP;
        let col_width = (available / f64::from(COLUMNS)).max(MIN_COL_WIDTH);
        Self {
            col_width,
            row_height: ROW_HEIGHT,
            gap: GAP,
        }
    }

    fn x_unit(&self) -> f64 {
        self.col_width + self.gap
    }

    fn y_unit(&self) -> f64 {
        self.row_height + self.gap
    }

    pub fn to_pixels(&self, gx: i32, gy: i32) -> (f64, f64) {
        (f64::from(gx) * self.x_unit(), f64::from(gy) * self.y_unit())
    }

    /// Snaps a continuous pixel position to the nearest grid coordinate.
    pub fn to_grid(&self, px: f64, py: f64) -> (i32, i32) {
        (
            (px / self.x_unit()).round() as i32,
            (py / self.y_unit()).round() as i32,
        )
    }

    /// Pixel extent of a span of `w` columns (gutters between, not around).
    pub fn span_width(&self, w: i32) -> f64 {
        f64::from(w) * self.col_width + f64::from(w - 1) * self.gap
    }

    pub fn span_height(&self, h: i32) -> f64 {
        f64::from(h) * self.row_height + f64::from(h - 1) * self.gap
    }

    /// Nearest column span for a tentative pixel width.
    pub fn snap_span_w(&self, px: f64) -> i32 {
        (px / self.x_unit()).round() as i32
    }

    /// Nearest row span for a tentative pixel height.
    pub fn snap_span_h(&self, px: f64) -> i32 {
        (px / self.y_unit()).round() as i32
    }
}
