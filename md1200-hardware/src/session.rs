//! Serial session
//!
//! Owns the single open line to the enclosure's fan controller and mediates
//! all access to it. The read half is handed out once, to the read loop;
//! the write half is shared by whoever sends commands.

use md1200_core::{Command, DataBits, LineConfig, Md1200Error, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

use crate::line_io::{CommandWriter, FrameReader, LineReader, LineWriter};

/// An open serial line
pub struct SerialSession {
    address: String,
    reader: Option<LineReader>,
    writer: LineWriter,
}

impl SerialSession {
    /// Open the device described by `config`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// The line is opened 8N1-style with the configured baud rate and data
    /// bits, one stop bit, no parity, and no flow control.
    ///
    /// # Errors
    ///
    /// Returns [`Md1200Error::Serial`] if the device cannot be opened
    /// (busy, permission denied, path not found).
    pub fn open(config: &LineConfig) -> Result<Self> {
        let address = config.address();
        let mode = config.mode();
        debug!("Opening serial port: {} ({})", address, mode);

        let stream = tokio_serial::new(address, mode.baud_rate)
            .data_bits(serial_data_bits(mode.data_bits))
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.read_timeout())
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", address, e);
                Md1200Error::Serial(format!("Failed to open serial port {}: {}", address, e))
            })?;

        info!("Serial port {} opened ({})", address, mode);

        let (read_half, write_half) = tokio::io::split(stream);
        Ok(Self::from_parts(
            address,
            read_half,
            write_half,
            config.read_timeout(),
        ))
    }

    /// Build a session over arbitrary byte streams.
    ///
    /// `io_timeout` bounds every read and every write, as it does for a
    /// device opened with [`SerialSession::open`].
    pub fn from_parts<R, W>(
        address: impl Into<String>,
        reader: R,
        writer: W,
        io_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            address: address.into(),
            reader: Some(LineReader::new(reader, io_timeout)),
            writer: LineWriter::new(writer, io_timeout),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Hand out exclusive read access. Returns `None` once taken.
    pub fn take_reader(&mut self) -> Option<LineReader> {
        self.reader.take()
    }

    /// Return the reader taken with [`SerialSession::take_reader`].
    pub fn restore_reader(&mut self, reader: LineReader) {
        self.reader = Some(reader);
    }

    /// A handle to the write half
    pub fn writer(&self) -> LineWriter {
        self.writer.clone()
    }

    /// Format and write one command; failures are logged and swallowed.
    pub async fn send_command(&self, command: &Command) -> bool {
        self.writer.send_command(command).await
    }

    /// Read one frame directly from the session.
    ///
    /// # Errors
    ///
    /// Returns [`Md1200Error::ReaderInUse`] while the reader is held
    /// elsewhere, [`Md1200Error::Closed`] after close, or the read error.
    pub async fn read_frame(&mut self) -> Result<String> {
        if self.is_closed() {
            return Err(Md1200Error::Closed);
        }
        match self.reader.as_mut() {
            Some(reader) => reader.read_frame().await,
            None => Err(Md1200Error::ReaderInUse),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// Release the line.
    ///
    /// Flushes and shuts down the write half, then drops both halves, which
    /// closes the OS handle. A failure is reported to the caller and not
    /// retried; the handle is released either way.
    pub async fn close(mut self) -> Result<()> {
        if self.reader.take().is_none() {
            warn!("Closing serial port {} while its reader is still out", self.address);
        }

        let result = self.writer.close().await;
        match &result {
            Ok(()) => info!("Serial port {} closed", self.address),
            Err(e) => error!("Failed to close serial port {}: {}", self.address, e),
        }
        result
    }
}

fn serial_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        Md1200Error::Serial(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use md1200_core::LineMode;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn simulated() -> (SerialSession, tokio::io::DuplexStream, tokio::io::DuplexStream) {
        let (rx_device, rx_host) = duplex(256);
        let (tx_host, tx_device) = duplex(256);
        let session = SerialSession::from_parts("sim0", rx_host, tx_host, TIMEOUT);
        (session, rx_device, tx_device)
    }

    #[tokio::test]
    async fn test_open_missing_device_is_serial_error() {
        let config = LineConfig::builder()
            .address("/dev/md1200-does-not-exist")
            .mode(LineMode::new(38400, DataBits::Eight))
            .build()
            .unwrap();

        match SerialSession::open(&config) {
            Err(e @ Md1200Error::Serial(_)) => assert!(e.is_fatal()),
            Err(other) => panic!("expected Serial error, got {:?}", other),
            Ok(_) => panic!("opening a missing device should fail"),
        }
    }

    #[test]
    fn test_data_bits_mapping() {
        assert_eq!(
            serial_data_bits(DataBits::Eight),
            tokio_serial::DataBits::Eight
        );
        assert_eq!(serial_data_bits(DataBits::Five), tokio_serial::DataBits::Five);
    }

    #[test]
    fn test_available_ports_does_not_panic() {
        // Depends on the host; only check the call completes
        let _ = available_ports();
    }

    #[tokio::test]
    async fn test_send_and_read_through_session() {
        let (mut session, mut rx_device, mut tx_device) = simulated();
        assert_eq!(session.address(), "sim0");

        assert!(session.send_command(&Command::with_value("shutup", 20)).await);
        let mut buf = vec![0u8; 10];
        tx_device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"shutup 20\r");

        rx_device.write_all(b"TEMP:42\n").await.unwrap();
        assert_eq!(session.read_frame().await.unwrap(), "TEMP:42");
    }

    #[tokio::test]
    async fn test_reader_is_handed_out_once() {
        let (mut session, _rx, _tx) = simulated();

        let reader = session.take_reader();
        assert!(reader.is_some());
        assert!(session.take_reader().is_none());
        assert!(matches!(
            session.read_frame().await,
            Err(Md1200Error::ReaderInUse)
        ));

        session.restore_reader(reader.unwrap());
        assert!(session.take_reader().is_some());
    }

    #[tokio::test]
    async fn test_close_marks_writers_closed() {
        let (mut session, _rx, mut tx_device) = simulated();
        let writer = session.writer();
        let _reader = session.take_reader();

        session.close().await.unwrap();

        assert!(writer.is_closed());
        assert!(!writer.send_command(&Command::shutup(20)).await);

        // Write half shut down: the device side sees EOF
        let mut buf = Vec::new();
        assert_eq!(tx_device.read_to_end(&mut buf).await.unwrap(), 0);
    }
}
