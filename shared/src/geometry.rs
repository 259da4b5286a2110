use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::map::CombatToken;

/// Share of a grid cell added after snapping so tokens sit inside the cell.
pub const GRID_CELL_INSET: f64 = 0.05;
/// Token footprint relative to a grid cell.
pub const TOKEN_CELL_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rotation (degrees) and zoom applied to the map when it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTransform {
    pub rotation_deg: f64,
    pub zoom: f64,
}

impl MapTransform {
    pub const fn new(rotation_deg: f64, zoom: f64) -> Self {
        Self { rotation_deg, zoom }
    }

    /// Converts a screen-space mouse delta into map-local units.
    pub fn screen_delta_to_local(&self, dx: f64, dy: f64) -> Point {
        let (sin, cos) = (-self.rotation_deg).to_radians().sin_cos();
        let unrotated_x = dx * cos - dy * sin;
        let unrotated_y = dx * sin + dy * cos;
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Point::new(unrotated_x / zoom, unrotated_y / zoom)
    }
}

impl Default for MapTransform {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Rounds to the nearest grid intersection (halves toward +inf), then
/// insets by 5% of a cell.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return point;
    }
    let snap = |v: f64| (v / grid_size + 0.5).floor() * grid_size + grid_size * GRID_CELL_INSET;
    Point::new(snap(point.x), snap(point.y))
}

/// Where a sidebar token lands when the map is clicked in placement mode.
pub fn placement_point(click: Point, grid_size: f64, zoom: f64) -> Point {
    let zoom = if zoom > 0.0 { zoom } else { 1.0 };
    let half = grid_size * TOKEN_CELL_RATIO / zoom / 2.0;
    Point::new(click.x - half, click.y - half)
}

/// One press-move-release sequence on a placed token.
///
/// `release` consumes the gesture, so nothing survives past the mouse-up.
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    token_id: RecordId,
    start_screen: Point,
    origin: Point,
    current: Point,
    transform: MapTransform,
}

impl DragGesture {
    /// Starts a drag. Tokens that are not on the map cannot be dragged;
    /// the caller switches to placement mode instead.
    pub fn begin(token: &CombatToken, screen: Point, transform: MapTransform) -> Option<Self> {
        let origin = token.position()?;
        Some(Self {
            token_id: token.id.clone(),
            start_screen: screen,
            origin,
            current: origin,
            transform,
        })
    }

    pub fn token_id(&self) -> &RecordId {
        &self.token_id
    }

    /// Unsnapped local position while the mouse moves.
    pub fn current(&self) -> Point {
        self.current
    }

    pub fn move_to(&mut self, screen: Point) -> Point {
        let delta = self.transform.screen_delta_to_local(
            screen.x - self.start_screen.x,
            screen.y - self.start_screen.y,
        );
        self.current = Point::new(self.origin.x + delta.x, self.origin.y + delta.y);
        self.current
    }

    pub fn release(self, grid_size: f64) -> (RecordId, Point) {
        (self.token_id, snap_to_grid(self.current, grid_size))
    }
}
