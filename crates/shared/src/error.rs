use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session already closed")]
    Closed,
}

impl TransportError {
    pub fn connect(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            target: target.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("display device unavailable: {0}")]
    Device(String),
    #[error("failed to draw frame: {0}")]
    Draw(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown frame cannot be re-encoded: {raw:?}")]
    Unencodable { raw: String },
}
