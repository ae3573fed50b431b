//! Companion link: transports, connection state and the receive worker that
//! feeds decoded frames to the control loop.

use std::{fmt, time::Duration};

use shared::{
    protocol::{decode, split_frames, InputEvent},
    shutdown::DeathFlag,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

mod transport;

#[cfg(unix)]
pub use transport::TtyStream;
pub use transport::{LinkSession, RfcommTransport, StreamSession, TcpTransport, Transport};

pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Upper bound on a session's close so a wedged device cannot hold up shutdown.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// What the link worker reports to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMessage {
    State(ConnectionState),
    Frame(InputEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Fixed delay between reconnect attempts.
    pub backoff: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

enum SessionEnd {
    PeerClosed,
    Failed,
    Shutdown,
    QueueClosed,
}

/// Connect, receive and reconnect until the death flag is set or the queue's
/// receiver is gone. Frames are dropped with a warning when the queue is full.
pub async fn run_link<T>(
    transport: Box<dyn Transport>,
    config: LinkConfig,
    tx: mpsc::Sender<T>,
    death: DeathFlag,
) where
    T: From<LinkMessage> + Send,
{
    let target = transport.target().to_string();

    while !death.is_set() {
        if !report(&tx, &death, ConnectionState::Connecting).await {
            break;
        }

        let connected = tokio::select! {
            _ = death.wait() => break,
            connected = transport.connect() => connected,
        };

        let end = match connected {
            Ok(mut session) => {
                info!(peer = %target, "companion link connected");
                if !report(&tx, &death, ConnectionState::Connected).await {
                    close_session(session.as_mut(), &target).await;
                    break;
                }
                let end = receive_frames(session.as_mut(), &tx, &death).await;
                close_session(session.as_mut(), &target).await;
                end
            }
            Err(err) => {
                warn!(
                    peer = %target,
                    backoff_ms = config.backoff.as_millis() as u64,
                    "link connect failed: {err}"
                );
                SessionEnd::Failed
            }
        };

        match end {
            SessionEnd::Shutdown | SessionEnd::QueueClosed => break,
            SessionEnd::PeerClosed => info!(peer = %target, "companion closed the link"),
            SessionEnd::Failed => {}
        }

        if !report(&tx, &death, ConnectionState::Disconnected).await {
            break;
        }
        tokio::select! {
            _ = death.wait() => break,
            _ = tokio::time::sleep(config.backoff) => {}
        }
    }

    info!(peer = %target, "link worker stopped");
}

async fn close_session(session: &mut dyn LinkSession, target: &str) {
    if tokio::time::timeout(CLOSE_GRACE, session.close()).await.is_err() {
        warn!(peer = %target, "link close timed out; dropping the session");
    }
}

async fn receive_frames<T>(
    session: &mut dyn LinkSession,
    tx: &mpsc::Sender<T>,
    death: &DeathFlag,
) -> SessionEnd
where
    T: From<LinkMessage> + Send,
{
    loop {
        let received = tokio::select! {
            _ = death.wait() => return SessionEnd::Shutdown,
            received = session.receive() => received,
        };

        let chunk = match received {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return SessionEnd::PeerClosed,
            Err(err) => {
                warn!("link receive failed: {err}");
                return SessionEnd::Failed;
            }
        };

        for frame in split_frames(&chunk) {
            let event = decode(frame);
            if let InputEvent::Unknown(raw) = &event {
                debug!(raw = %raw, "unrecognised frame");
            }
            match tx.try_send(T::from(LinkMessage::Frame(event))) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("input queue full; dropping frame"),
                Err(TrySendError::Closed(_)) => return SessionEnd::QueueClosed,
            }
        }
    }
}

/// State changes are rare and must not be lost, so they wait for queue space.
async fn report<T>(tx: &mpsc::Sender<T>, death: &DeathFlag, state: ConnectionState) -> bool
where
    T: From<LinkMessage> + Send,
{
    debug!(state = %state, "link state");
    tokio::select! {
        _ = death.wait() => false,
        sent = tx.send(T::from(LinkMessage::State(state))) => sent.is_ok(),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
