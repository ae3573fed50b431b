use std::time::Instant;

use shared::domain::{Point, ScreenSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub position: Point,
    /// True only during the tick in which a click fired.
    pub clicked: bool,
    pub last_click_time: Option<Instant>,
}

/// Clamps a point onto the addressable pixels of `screen`.
pub fn clamp_to_screen(point: Point, screen: ScreenSize) -> Point {
    Point::new(
        point.x.min(screen.max_x()).max(0),
        point.y.min(screen.max_y()).max(0),
    )
}

/// Relative move from `from`, clamped to the screen.
pub fn moved(from: Point, dx: i32, dy: i32, screen: ScreenSize) -> Point {
    clamp_to_screen(
        Point::new(from.x.saturating_add(dx), from.y.saturating_add(dy)),
        screen,
    )
}

/// Sole owner of the cursor position; both input paths go through here.
#[derive(Debug, Clone)]
pub struct CursorModel {
    screen: ScreenSize,
    state: CursorState,
}

impl CursorModel {
    /// Starts in the middle of the display.
    pub fn new(screen: ScreenSize) -> Self {
        let center = Point::new(screen.max_x() / 2, screen.max_y() / 2);
        Self {
            screen,
            state: CursorState {
                position: center,
                clicked: false,
                last_click_time: None,
            },
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn position(&self) -> Point {
        self.state.position
    }

    pub fn set_absolute(&mut self, x: i32, y: i32) -> Point {
        self.state.position = clamp_to_screen(Point::new(x, y), self.screen);
        self.state.position
    }

    pub fn apply_delta(&mut self, dx: i32, dy: i32) -> Point {
        self.state.position = moved(self.state.position, dx, dy, self.screen);
        self.state.position
    }

    /// Records this tick's click flag.
    pub fn set_clicked(&mut self, clicked: bool, now: Instant) {
        self.state.clicked = clicked;
        if clicked {
            self.state.last_click_time = Some(now);
        }
    }
}
