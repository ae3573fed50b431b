//! Hand-gesture input: landmark frames from the camera tracker, finger flex
//! classification and the fist-to-click debouncer.

use std::time::{Duration, Instant};

use serde::Deserialize;
use shared::domain::{Point, ScreenSize};

mod tracker;

pub use tracker::{parse_line, LandmarkSource, TrackerError, TrackerProcess};

/// Points per hand in the 21-landmark hand model.
pub const HAND_LANDMARK_COUNT: usize = 21;
pub const INDEX_FINGER_TIP: usize = 8;

/// (tip, base joint) landmark pairs for index, middle, ring and pinky.
const FLEX_JOINTS: [(usize, usize); 4] = [(8, 5), (12, 9), (16, 13), (20, 17)];

pub const DEFAULT_FLEX_THRESHOLD: f32 = 0.05;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Normalized landmark position; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "Vec<f32>")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl TryFrom<Vec<f32>> for Landmark {
    type Error = String;

    fn try_from(value: Vec<f32>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [x, y, ..] => Ok(Self::new(*x, *y)),
            _ => Err(format!("landmark needs at least 2 coordinates, got {}", value.len())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One camera frame as reported by the tracker. An empty frame means no hand.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub handedness: Option<Handedness>,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl HandFrame {
    /// Only a fully tracked right hand (or an unlabelled one) drives the cursor.
    pub fn is_tracked(&self) -> bool {
        self.landmarks.len() >= HAND_LANDMARK_COUNT && self.handedness != Some(Handedness::Left)
    }

    pub fn pointer(&self) -> Option<Landmark> {
        self.is_tracked().then(|| self.landmarks[INDEX_FINGER_TIP])
    }

    /// Per-finger flex flags, `None` when tracking is lost.
    pub fn finger_flex(&self, threshold: f32) -> Option<[bool; 4]> {
        if !self.is_tracked() {
            return None;
        }
        Some(FLEX_JOINTS.map(|(tip, base)| {
            self.landmarks[tip].y > self.landmarks[base].y + threshold
        }))
    }
}

/// A fist needs at least four bent fingers.
pub fn is_fist(flex: &[bool]) -> bool {
    flex.len() >= FLEX_JOINTS.len() && flex.iter().all(|bent| *bent)
}

/// Maps a normalized landmark into display pixels. Clamping is left to the cursor.
pub fn to_screen(landmark: Landmark, screen: ScreenSize) -> Point {
    Point::new(
        (landmark.x * screen.width as f32) as i32,
        (landmark.y * screen.height as f32) as i32,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub flex_threshold: f32,
    pub debounce: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            flex_threshold: DEFAULT_FLEX_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestureState {
    pub fist_closed: bool,
    pub last_click: Option<Instant>,
}

/// Turns the per-frame fist state into one click per physical gesture.
#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    debounce: Duration,
    state: GestureState,
}

impl GestureDebouncer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: GestureState::default(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Feeds one sample; returns `true` exactly when a click fires.
    ///
    /// `None` means tracking was lost: no click, and the hand is re-armed. The
    /// last click time survives so a flickering track cannot bypass the debounce.
    pub fn observe(&mut self, flex: Option<&[bool]>, now: Instant) -> bool {
        let Some(flex) = flex else {
            self.state.fist_closed = false;
            return false;
        };

        let closed = is_fist(flex);
        if !closed {
            self.state.fist_closed = false;
            return false;
        }

        let cooled_down = self
            .state
            .last_click
            .map_or(true, |last| now.saturating_duration_since(last) > self.debounce);

        if !self.state.fist_closed && cooled_down {
            self.state.fist_closed = true;
            self.state.last_click = Some(now);
            return true;
        }
        false
    }
}

/// Pointer sample produced by the gesture path for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    /// `None` when tracking is lost; the cursor keeps its previous position.
    pub position: Option<Point>,
    pub clicked: bool,
}

/// Frame-to-sample pipeline: flex classification, debounce and screen mapping.
#[derive(Debug, Clone)]
pub struct HandPointer {
    config: GestureConfig,
    screen: ScreenSize,
    debouncer: GestureDebouncer,
}

impl HandPointer {
    pub fn new(config: GestureConfig, screen: ScreenSize) -> Self {
        Self {
            config,
            screen,
            debouncer: GestureDebouncer::new(config.debounce),
        }
    }

    pub fn process(&mut self, frame: &HandFrame, now: Instant) -> PointerSample {
        let flex = frame.finger_flex(self.config.flex_threshold);
        let clicked = self.debouncer.observe(flex.as_ref().map(|f| f.as_slice()), now);
        if clicked {
            tracing::info!("fist closed: click");
        }
        PointerSample {
            position: frame.pointer().map(|tip| to_screen(tip, self.screen)),
            clicked,
        }
    }
}
