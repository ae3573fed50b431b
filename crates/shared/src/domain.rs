use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved id of the chrome element whose click requests shutdown.
pub const SHUTDOWN_ELEMENT_ID: &str = "power_off";

/// Reserved id of the transient notes/web panel.
pub const PANEL_ELEMENT_ID: &str = "panel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest addressable x coordinate.
    pub fn max_x(&self) -> i32 {
        self.width.saturating_sub(1) as i32
    }

    /// Largest addressable y coordinate.
    pub fn max_y(&self) -> i32 {
        self.height.saturating_sub(1) as i32
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(0, 0, self.max_x(), self.max_y())
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(128, 64)
    }
}

/// Axis-aligned box with inclusive corners, always stored with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Bounds {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_origin(origin: Point, width: u32, height: u32) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + width as i32,
            origin.y + height as i32,
        )
    }

    pub fn centered(center: Point, radius: i32) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        self.x1 <= point.x && point.x <= self.x2 && self.y1 <= point.y && point.y <= self.y2
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    White,
    Black,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn shutdown() -> Self {
        Self::new(SHUTDOWN_ELEMENT_ID)
    }

    pub fn panel() -> Self {
        Self::new(PANEL_ELEMENT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_shutdown(&self) -> bool {
        self.0 == SHUTDOWN_ELEMENT_ID
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
