use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    process::{Child, ChildStdout, Command},
};

use crate::HandFrame;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("hand tracker command is empty")]
    EmptyCommand,
    #[error("failed to spawn hand tracker `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("hand tracker stdout unavailable")]
    NoStdout,
    #[error("hand tracker i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed hand tracker line: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Producer of landmark frames, one per camera frame.
#[async_trait]
pub trait LandmarkSource: Send {
    /// Next frame, or `Ok(None)` once the source has ended.
    async fn next_frame(&mut self) -> Result<Option<HandFrame>, TrackerError>;

    /// Releases the underlying camera/model resources.
    async fn stop(&mut self);
}

/// Parses one JSON line printed by the tracker. `{}` is a frame without a hand.
pub fn parse_line(line: &str) -> Result<HandFrame, TrackerError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Hand tracker running as a child process that prints JSON frames on stdout.
pub struct TrackerProcess {
    command: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl TrackerProcess {
    pub fn spawn(command: &str) -> Result<Self, TrackerError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(TrackerError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TrackerError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(TrackerError::NoStdout)?;

        tracing::info!(command, pid = ?child.id(), "hand tracker started");
        Ok(Self {
            command: command.to_string(),
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

#[async_trait]
impl LandmarkSource for TrackerProcess {
    async fn next_frame(&mut self) -> Result<Option<HandFrame>, TrackerError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return parse_line(&line).map(Some);
        }
    }

    async fn stop(&mut self) {
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(command = %self.command, "hand tracker already exited: {err}");
        }
        match self.child.wait().await {
            Ok(status) => tracing::info!(command = %self.command, %status, "hand tracker stopped"),
            Err(err) => {
                tracing::warn!(command = %self.command, "failed to reap hand tracker: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_a_frame_without_hand() {
        let frame = parse_line("{}\n").expect("frame");
        assert!(frame.landmarks.is_empty());
        assert!(!frame.is_tracked());
    }

    #[test]
    fn garbage_line_is_malformed() {
        assert!(matches!(
            parse_line("not json"),
            Err(TrackerError::Malformed(_))
        ));
    }

    #[test]
    fn short_landmark_is_rejected() {
        assert!(parse_line(r#"{"landmarks":[[0.5]]}"#).is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            TrackerProcess::spawn("   "),
            Err(TrackerError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_frames_from_child_stdout() {
        let mut tracker =
            TrackerProcess::spawn(r#"printf {}\n\n{"handedness":"Left"}\n"#).expect("spawn");

        let first = tracker.next_frame().await.expect("io").expect("frame");
        assert_eq!(first, HandFrame::default());

        let second = tracker.next_frame().await.expect("io").expect("frame");
        assert_eq!(second.handedness, Some(crate::Handedness::Left));

        assert!(tracker.next_frame().await.expect("io").is_none());
        tracker.stop().await;
    }
}
