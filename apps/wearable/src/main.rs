use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use controller::{run_gesture, ControlLoop, InputMode};
use gesture::{HandPointer, TrackerProcess};
use scene::MonospaceMetrics;
use shared::shutdown::DeathFlag;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod renderer;

use renderer::TraceRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Camera hand tracking drives the cursor.
    Gesture,
    /// A paired companion sends notes and cursor moves.
    Wireless,
}

impl From<Mode> for InputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Gesture => InputMode::Gesture,
            Mode::Wireless => InputMode::Wireless,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Wearable HUD display")]
struct Args {
    #[arg(long, value_enum)]
    mode: Mode,
    /// Settings file; defaults to ./wearable.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Blocking tasks still running after the loop ends are abandoned after this.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let result = runtime.block_on(run(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> Result<()> {
    let settings = config::load_settings(args.config.as_deref())?;
    let mode = InputMode::from(args.mode);
    info!(
        ?mode,
        width = settings.screen_width,
        height = settings.screen_height,
        "wearable starting"
    );

    let death = DeathFlag::new();
    let (tx, rx) = mpsc::channel(settings.queue_capacity);

    let worker = match mode {
        InputMode::Gesture => {
            let source = TrackerProcess::spawn(&settings.tracker_command).with_context(|| {
                format!("failed to start hand tracker '{}'", settings.tracker_command)
            })?;
            let pointer = HandPointer::new(settings.gesture_config(), settings.screen());
            tokio::spawn(run_gesture(Box::new(source), pointer, tx, death.clone()))
        }
        InputMode::Wireless => {
            info!(
                transport = %settings.transport,
                addr = settings.transport_addr(),
                "using companion link"
            );
            tokio::spawn(link::run_link(
                settings.transport(),
                settings.link_config(),
                tx,
                death.clone(),
            ))
        }
    };

    tokio::spawn({
        let death = death.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                death.trigger();
            }
        }
    });

    let renderer = TraceRenderer::new(MonospaceMetrics::default());
    let state = ControlLoop::new(settings.loop_config(mode), renderer, death)
        .run(rx, worker)
        .await;
    info!(?state, "wearable stopped");
    Ok(())
}
