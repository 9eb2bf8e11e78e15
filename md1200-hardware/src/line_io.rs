//! Reader and writer capabilities over one serial line
//!
//! The line is split into two halves that are used concurrently: the read
//! loop owns the [`LineReader`], while any number of firings share clones of
//! the [`LineWriter`]. The transport buffers input and output independently,
//! so nothing serializes a write behind an in-flight read.

use async_trait::async_trait;
use md1200_core::{Command, Md1200Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

/// Longest frame kept while waiting for its delimiter
pub const MAX_FRAME_LEN: usize = 4096;

/// Type-erased read half of a line
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Type-erased write half of a line
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Source of inbound frames
///
/// Implemented by [`LineReader`]; test doubles implement it to script
/// controller output without a device.
#[async_trait]
pub trait FrameReader: Send {
    /// Read one frame, waiting at most [`FrameReader::read_timeout`].
    ///
    /// The trailing delimiter is stripped from the returned frame.
    async fn read_frame(&mut self) -> Result<String>;

    /// Upper bound on a single [`FrameReader::read_frame`] call
    fn read_timeout(&self) -> Duration;
}

/// Sink for controller commands
#[async_trait]
pub trait CommandWriter: Send + Sync {
    /// Encode and write one command.
    async fn write_command(&self, command: &Command) -> Result<()>;

    /// Best-effort send.
    ///
    /// A failed write is logged and dropped; commands are idempotent and
    /// the next firing sends them again. Returns whether the write succeeded.
    async fn send_command(&self, command: &Command) -> bool {
        match self.write_command(command).await {
            Ok(()) => {
                debug!(command = %command, "sent command");
                true
            }
            Err(e) => {
                error!(command = %command, error = %e, "error writing to serial port");
                false
            }
        }
    }
}

/// Strip the frame delimiter and decode the bytes.
///
/// Removes a trailing `\n` and, if present, the `\r` before it. Invalid UTF-8
/// is replaced rather than rejected.
pub fn decode_frame(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Buffered, line-delimited reader over the read half of a line
pub struct LineReader {
    inner: BufReader<BoxedReader>,
    /// Bytes of a frame whose delimiter has not arrived yet
    pending: Vec<u8>,
    timeout: Duration,
}

impl LineReader {
    pub fn new<R>(reader: R, read_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            inner: BufReader::new(Box::new(reader)),
            pending: Vec::new(),
            timeout: read_timeout,
        }
    }

    /// Bytes received since the last complete frame
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

#[async_trait]
impl FrameReader for LineReader {
    async fn read_frame(&mut self) -> Result<String> {
        // read_until appends to `pending` as bytes arrive, so a frame cut off
        // by the timeout is completed by the next call. The limit keeps
        // `pending` below MAX_FRAME_LEN on a line that never sends '\n'.
        let remaining = MAX_FRAME_LEN.saturating_sub(self.pending.len()).max(1) as u64;
        let mut limited = (&mut self.inner).take(remaining);
        let read = timeout(self.timeout, limited.read_until(b'\n', &mut self.pending)).await;

        match read {
            Err(_) => Err(Md1200Error::Timeout(format!(
                "Read operation timed out after {:?}",
                self.timeout
            ))),
            Ok(Err(e)) => Err(Md1200Error::Io(e)),
            Ok(Ok(0)) => Err(Md1200Error::DeviceDisconnected(
                "Serial port returned EOF".to_string(),
            )),
            Ok(Ok(_)) => {
                if self.pending.last() != Some(&b'\n') && self.pending.len() >= MAX_FRAME_LEN {
                    warn!(
                        "No frame delimiter within {} bytes, passing the data on as one frame",
                        MAX_FRAME_LEN
                    );
                }
                let frame = decode_frame(&self.pending);
                self.pending.clear();
                trace!("RX: {:?}", frame);
                Ok(frame)
            }
        }
    }

    fn read_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Shared writer over the write half of a line
///
/// Clones write to the same half. Concurrent firings take turns on the
/// write half; reads are never blocked by it.
#[derive(Clone)]
pub struct LineWriter {
    inner: Arc<Mutex<Option<BoxedWriter>>>,
    closed: Arc<AtomicBool>,
    timeout: Duration,
}

impl LineWriter {
    pub fn new<W>(writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(writer)))),
            closed: Arc::new(AtomicBool::new(false)),
            timeout: write_timeout,
        }
    }

    /// Whether [`LineWriter::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flush and shut down the write half, then release it.
    ///
    /// Later writes fail with [`Md1200Error::Closed`]. Closing an already
    /// closed writer does nothing.
    pub async fn close(&self) -> Result<()> {
        let writer = {
            let mut guard = self.inner.lock().await;
            self.closed.store(true, Ordering::Release);
            guard.take()
        };

        let Some(mut writer) = writer else {
            return Ok(());
        };

        timeout(self.timeout, writer.shutdown())
            .await
            .map_err(|_| Md1200Error::Timeout("Shutdown of write half timed out".to_string()))??;

        Ok(())
    }
}

#[async_trait]
impl CommandWriter for LineWriter {
    async fn write_command(&self, command: &Command) -> Result<()> {
        let bytes = command.encode();

        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(Md1200Error::Closed)?;

        trace!("TX: {:?}", String::from_utf8_lossy(&bytes));

        timeout(self.timeout, async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| Md1200Error::Timeout("Write operation timed out".to_string()))??;

        Ok(())
    }
}
