//! The display-side control loop and everything it owns: cursor, scene
//! rebuild, click dispatch and the lifecycle from splash to shutdown.

use std::time::{Duration, Instant};

use chrono::Local;
use link::ConnectionState;
use scene::{DisplayElement, GlyphMetrics, Renderer, Scene};
use shared::{
    domain::{Bounds, ElementId, Point, ScreenSize},
    protocol::InputEvent,
    shutdown::DeathFlag,
};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

mod actions;
mod cursor;
mod input;
mod panel;
mod worker;

pub use actions::{Action, ActionRegistry};
pub use cursor::{clamp_to_screen, moved, CursorModel, CursorState};
pub use input::Input;
pub use panel::{Panel, PanelKind, WEB_SUMMARY_CHARS};
pub use worker::run_gesture;

pub const CLOCK_FORMAT: &str = "%H:%M";
pub const SHUTDOWN_MESSAGE: &str = "Shutting down...";
pub const CURSOR_RADIUS: i32 = 3;

const BUTTON_WIDTH: i32 = 24;
const BUTTON_HEIGHT: i32 = 11;
const INDICATOR_ORIGIN: Point = Point::new(36, 0);
/// How long shutdown waits for the acquisition task before aborting it.
const WORKER_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Gesture,
    Wireless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub screen: ScreenSize,
    pub mode: InputMode,
    pub tick_interval: Duration,
    pub poll_timeout: Duration,
    pub splash_step: Duration,
    pub panel_hold: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            screen: ScreenSize::default(),
            mode: InputMode::Wireless,
            tick_interval: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(50),
            splash_step: Duration::from_secs(2),
            panel_hold: Duration::from_secs(5),
        }
    }
}

/// Top-right box whose click requests shutdown.
pub fn shutdown_button_bounds(screen: ScreenSize) -> Bounds {
    Bounds::new(screen.max_x() - BUTTON_WIDTH, 0, screen.max_x(), BUTTON_HEIGHT)
}

pub fn indicator_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "BT",
        ConnectionState::Connecting => "..",
        ConnectionState::Disconnected => "--",
    }
}

pub struct ControlLoop<R> {
    config: LoopConfig,
    state: LoopState,
    cursor: CursorModel,
    scene: Scene,
    renderer: R,
    actions: ActionRegistry,
    death: DeathFlag,
    connection: ConnectionState,
    panel: Option<Panel>,
}

impl<R: Renderer> ControlLoop<R> {
    pub fn new(config: LoopConfig, renderer: R, death: DeathFlag) -> Self {
        Self {
            config,
            state: LoopState::Initializing,
            cursor: CursorModel::new(config.screen),
            scene: Scene::new(),
            renderer,
            actions: ActionRegistry::with_defaults(),
            death,
            connection: ConnectionState::Disconnected,
            panel: None,
        }
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cursor(&self) -> &CursorModel {
        &self.cursor
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn panel(&self) -> Option<&Panel> {
        self.panel.as_ref()
    }

    /// Splash, then ticks until shutdown; finally releases the acquisition task.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Input>, worker: JoinHandle<()>) -> LoopState {
        info!(mode = ?self.config.mode, "control loop starting");
        self.play_splash().await;
        self.start();

        let idle = self.config.tick_interval.saturating_sub(self.config.poll_timeout);
        while self.state == LoopState::Running {
            // `None` from a closed queue just means the input source is gone.
            let input = timeout(self.config.poll_timeout, rx.recv())
                .await
                .unwrap_or(None);
            let received = input.is_some();
            self.tick(input, Instant::now());

            if !received && self.state == LoopState::Running {
                tokio::select! {
                    _ = self.death.wait() => {}
                    _ = tokio::time::sleep(idle) => {}
                }
            }
        }

        self.shutdown(worker).await;
        self.state
    }

    /// Plays the boot screens; cut short if shutdown is requested meanwhile.
    pub async fn play_splash(&mut self) {
        for (elements, steps) in splash_screens(self.config.screen, &self.renderer) {
            if self.death.is_set() {
                break;
            }
            self.scene.clear();
            for element in elements {
                self.scene.add(element);
            }
            self.render();
            tokio::select! {
                _ = self.death.wait() => break,
                _ = tokio::time::sleep(self.config.splash_step * steps) => {}
            }
        }
    }

    /// Leaves `Initializing`.
    pub fn start(&mut self) {
        if self.state != LoopState::Initializing {
            return;
        }
        if self.death.is_set() {
            self.transition(LoopState::ShuttingDown);
        } else {
            self.transition(LoopState::Running);
        }
    }

    /// One `Running` iteration: route input, rebuild, dispatch a click, render.
    pub fn tick(&mut self, input: Option<Input>, now: Instant) -> LoopState {
        if self.state != LoopState::Running {
            return self.state;
        }

        let clicked = input.map_or(false, |input| self.route(input, now));
        self.cursor.set_clicked(clicked, now);

        self.rebuild(now);
        if clicked && self.dispatch_click() {
            self.rebuild(now);
        }

        if self.death.is_set() {
            self.transition(LoopState::ShuttingDown);
        }
        self.render();
        self.state
    }

    pub async fn shutdown(&mut self, mut worker: JoinHandle<()>) {
        if self.state != LoopState::ShuttingDown {
            self.transition(LoopState::ShuttingDown);
        }
        self.death.trigger();

        self.scene.clear();
        self.scene
            .add(DisplayElement::text(Point::new(0, 0), SHUTDOWN_MESSAGE));
        self.render();

        match timeout(WORKER_GRACE, &mut worker).await {
            Ok(Ok(())) => info!("input source released"),
            Ok(Err(err)) => warn!("input worker ended abnormally: {err}"),
            Err(_) => {
                warn!("input worker did not stop in time; aborting");
                worker.abort();
            }
        }
        self.transition(LoopState::Terminated);
    }

    /// Returns whether the input carried a click.
    fn route(&mut self, input: Input, now: Instant) -> bool {
        match input {
            Input::Pointer(sample) => {
                if let Some(position) = sample.position {
                    self.cursor.set_absolute(position.x, position.y);
                }
                sample.clicked
            }
            Input::Event(InputEvent::Move { dx, dy, clicked }) => {
                self.cursor.apply_delta(dx, dy);
                clicked
            }
            Input::Event(InputEvent::Notes(text)) => {
                info!(chars = text.chars().count(), "note received");
                self.panel = Some(Panel::notes(text, now));
                false
            }
            Input::Event(InputEvent::Web(text)) => {
                info!(chars = text.chars().count(), "web summary received");
                self.panel = Some(Panel::web(&text, now));
                false
            }
            Input::Event(InputEvent::Unknown(raw)) => {
                debug!(raw = %raw, "ignoring unrecognised frame");
                false
            }
            Input::Link(state) => {
                if state != self.connection {
                    info!(from = %self.connection, to = %state, "link state changed");
                }
                self.connection = state;
                false
            }
        }
    }

    fn rebuild(&mut self, now: Instant) {
        if self
            .panel
            .as_ref()
            .is_some_and(|panel| panel.is_expired(now, self.config.panel_hold))
        {
            debug!("panel hold elapsed");
            self.panel = None;
        }

        let screen = self.config.screen;
        self.scene.clear();

        self.scene.add(DisplayElement::text(
            Point::new(0, 0),
            Local::now().format(CLOCK_FORMAT).to_string(),
        ));
        let button = shutdown_button_bounds(screen);
        self.scene
            .add(DisplayElement::rectangle(button).with_id(ElementId::shutdown()));
        self.scene
            .add(DisplayElement::text(Point::new(button.x1 + 3, button.y1), "OFF"));
        if self.config.mode == InputMode::Wireless {
            self.scene.add(DisplayElement::text(
                INDICATOR_ORIGIN,
                indicator_label(self.connection),
            ));
        }

        self.scene.add(DisplayElement::ellipse(Bounds::centered(
            self.cursor.position(),
            CURSOR_RADIUS,
        )));

        if let Some(panel) = &self.panel {
            for element in panel.elements(screen, &self.renderer) {
                self.scene.add(element);
            }
        }
    }

    /// Returns whether the action changed what should be on screen.
    fn dispatch_click(&mut self) -> bool {
        let point = self.cursor.position();
        let Some(id) = self.scene.hit_test(point, &self.renderer) else {
            debug!(x = point.x, y = point.y, "click hit nothing");
            return false;
        };

        match self.actions.get(&id) {
            Some(Action::Shutdown) => {
                info!(element = %id, "shutdown requested");
                self.death.trigger();
                false
            }
            Some(Action::DismissPanel) => {
                info!(element = %id, "panel dismissed");
                self.panel = None;
                true
            }
            None => {
                debug!(element = %id, "no action bound to element");
                false
            }
        }
    }

    fn render(&mut self) {
        if let Err(err) = self.renderer.render(self.scene.redraw()) {
            warn!("render failed: {err}");
        }
    }

    fn transition(&mut self, next: LoopState) {
        info!(from = ?self.state, to = ?next, "control loop state");
        self.state = next;
    }
}

/// Boot screens with how many splash steps each is held.
fn splash_screens(
    screen: ScreenSize,
    metrics: &dyn GlyphMetrics,
) -> Vec<(Vec<DisplayElement>, u32)> {
    let centered = |y: i32, text: &str| {
        let (width, _) = metrics.text_size(text);
        let x = (screen.width.saturating_sub(width) / 2) as i32;
        DisplayElement::text(Point::new(x, y), text)
    };
    let middle = screen.max_y() / 2;
    let line = |y: i32, text: &str| DisplayElement::text(Point::new(0, y), text);

    vec![
        (
            vec![
                DisplayElement::rectangle(screen.bounds()),
                centered(middle - 16, "YoRHa"),
                centered(middle - 4, "For the glory\nof Mankind"),
            ],
            2,
        ),
        (vec![line(0, "Initializing...")], 1),
        (
            vec![
                line(0, "Initializing..."),
                line(20, "Checking filesystem\nintegrity... OK"),
            ],
            1,
        ),
        (vec![line(0, "Interlink status... OK")], 1),
        (
            vec![
                line(0, "Interlink status... OK"),
                line(20, "Primary function\nstatus... OK"),
            ],
            1,
        ),
        (vec![line(0, "Connections status... OK")], 1),
    ]
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
