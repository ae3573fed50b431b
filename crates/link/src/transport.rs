use std::{io, path::PathBuf};
#[cfg(unix)]
use std::{
    path::Path,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use shared::{error::TransportError, protocol::MAX_FRAME_BYTES};
#[cfg(unix)]
use tokio::{io::ReadBuf, net::unix::pipe};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

/// Connection factory for the companion link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human readable peer address for logs.
    fn target(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn LinkSession>, TransportError>;
}

/// One established connection.
#[async_trait]
pub trait LinkSession: Send {
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Waits for the next read. `Ok(None)` means the peer closed the link.
    async fn receive(&mut self) -> Result<Option<String>, TransportError>;

    async fn close(&mut self);
}

/// Session over any byte stream; each read returns at most [`MAX_FRAME_BYTES`].
///
/// Reads are decoded lossily and independently, so a character split across
/// two reads comes out as replacement characters.
pub struct StreamSession<S> {
    stream: Option<S>,
    buf: Box<[u8; MAX_FRAME_BYTES]>,
}

impl<S> StreamSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            buf: Box::new([0; MAX_FRAME_BYTES]),
        }
    }

    fn stream(&mut self) -> Result<&mut S, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl<S> LinkSession for StreamSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let stream = self.stream()?;
        stream.write_all(text.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Closed);
        };
        let read = stream.read(&mut self.buf[..]).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf[..read]).into_owned()))
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.shutdown().await {
                tracing::debug!("link shutdown failed: {err}");
            }
        }
    }
}

/// TCP link, used against the desktop companion during development.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn target(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<Box<dyn LinkSession>, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|err| TransportError::connect(&self.addr, err))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(StreamSession::new(stream)))
    }
}

/// Bluetooth serial link exposed by the kernel as an RFCOMM tty (`rfcomm bind`).
///
/// The device is opened non-blocking and driven by the reactor, so a pending
/// read is dropped as soon as the worker is told to stop.
#[derive(Debug, Clone)]
pub struct RfcommTransport {
    device: PathBuf,
    label: String,
}

impl RfcommTransport {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        let device = device.into();
        let label = device.display().to_string();
        Self { device, label }
    }
}

#[cfg(unix)]
#[async_trait]
impl Transport for RfcommTransport {
    fn target(&self) -> &str {
        &self.label
    }

    async fn connect(&self) -> Result<Box<dyn LinkSession>, TransportError> {
        let stream = TtyStream::open(&self.device)
            .map_err(|err| TransportError::connect(&self.label, err))?;
        Ok(Box::new(StreamSession::new(stream)))
    }
}

#[cfg(not(unix))]
#[async_trait]
impl Transport for RfcommTransport {
    fn target(&self) -> &str {
        &self.label
    }

    async fn connect(&self) -> Result<Box<dyn LinkSession>, TransportError> {
        Err(TransportError::connect(
            &self.label,
            io::Error::new(io::ErrorKind::Unsupported, "rfcomm needs a unix tty"),
        ))
    }
}

/// Character device split into a non-blocking read half and write half.
#[cfg(unix)]
pub struct TtyStream {
    reader: pipe::Receiver,
    writer: pipe::Sender,
}

#[cfg(unix)]
impl TtyStream {
    /// Must be called inside a runtime; both halves register with its reactor.
    pub fn open(device: &Path) -> io::Result<Self> {
        // Reader first: a fifo refuses a non-blocking writer until someone reads.
        let reader = pipe::OpenOptions::new()
            .unchecked(true)
            .open_receiver(device)?;
        let writer = pipe::OpenOptions::new()
            .unchecked(true)
            .open_sender(device)?;
        Ok(Self { reader, writer })
    }
}

#[cfg(unix)]
impl AsyncRead for TtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

#[cfg(unix)]
impl AsyncWrite for TtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}
