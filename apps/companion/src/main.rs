use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use link::{LinkSession, StreamSession};
use shared::protocol::{decode, encode, InputEvent};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Companion sender for the wearable display")]
struct Cli {
    /// Address the display connects to.
    #[arg(long, default_value = "127.0.0.1:7878")]
    listen: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a note on the display.
    Note {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show a search result summary.
    Web {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Move the cursor by a relative offset.
    #[command(allow_negative_numbers = true)]
    Move {
        dx: i32,
        dy: i32,
        #[arg(long)]
        click: bool,
    },
    /// Read commands from stdin, one per line.
    Interactive,
}

impl Command {
    fn event(&self) -> Option<InputEvent> {
        match self {
            Command::Note { text } => Some(InputEvent::Notes(text.join(" "))),
            Command::Web { text } => Some(InputEvent::Web(text.join(" "))),
            Command::Move { dx, dy, click } => Some(InputEvent::Move {
                dx: *dx,
                dy: *dy,
                clicked: *click,
            }),
            Command::Interactive => None,
        }
    }
}

/// Parses one interactive line: `note <text>`, `web <text>`,
/// `move <dx> <dy> [click]`, or a raw wire frame.
fn parse_line(line: &str) -> Option<InputEvent> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let event = match word.to_ascii_lowercase().as_str() {
        "note" | "notes" if !rest.is_empty() => InputEvent::Notes(rest.to_string()),
        "web" if !rest.is_empty() => InputEvent::Web(rest.to_string()),
        "move" => {
            let mut fields = rest.split_whitespace();
            let dx = fields.next()?.parse().ok()?;
            let dy = fields.next()?.parse().ok()?;
            let clicked = match fields.next() {
                None => false,
                Some(flag) if flag.eq_ignore_ascii_case("click") => true,
                Some(_) => return None,
            };
            InputEvent::Move { dx, dy, clicked }
        }
        _ => decode(line),
    };

    match event {
        InputEvent::Unknown(_) => None,
        event => Some(event),
    }
}

async fn accept_display(listener: &TcpListener) -> Result<StreamSession<TcpStream>> {
    info!(addr = %listener.local_addr()?, "waiting for the display to connect");
    let (stream, peer) = listener
        .accept()
        .await
        .context("failed to accept display connection")?;
    stream.set_nodelay(true)?;
    info!(%peer, "display connected");
    Ok(StreamSession::new(stream))
}

async fn send_event(session: &mut dyn LinkSession, event: &InputEvent) -> Result<()> {
    let frame = encode(event)?;
    session.send(&format!("{frame}\n")).await?;
    info!(kind = event.kind(), "sent {frame}");
    Ok(())
}

async fn interactive(listener: &TcpListener) -> Result<()> {
    let mut session = accept_display(listener).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(event) = parse_line(&line) else {
            warn!(
                line = %line,
                "unrecognised command; try `note <text>`, `web <text>` or `move <dx> <dy> [click]`"
            );
            continue;
        };

        if let Err(err) = send_event(&mut session, &event).await {
            warn!("display disconnected: {err:#}");
            session.close().await;
            session = accept_display(listener).await?;
            send_event(&mut session, &event).await?;
        }
    }

    session.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to listen on {}", cli.listen))?;

    match cli.command.event() {
        Some(event) => {
            let mut session = accept_display(&listener).await?;
            send_event(&mut session, &event).await?;
            session.close().await;
        }
        None => interactive(&listener).await?,
    }
    Ok(())
}
