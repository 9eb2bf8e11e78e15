//! md1200-hardware
//!
//! Serial session driver for the MD1200 enclosure fan controller. Opens the
//! line and exposes it as two narrow capabilities that are safe to use at
//! the same time: a frame reader and a command writer.
//
//! Public API:
//! - `session::SerialSession`: owns the open line
//! - `line_io::FrameReader` / `line_io::CommandWriter`: read and write seams
//! - `session::available_ports`: enumerate serial ports

pub mod line_io;
pub mod session;

pub use line_io::{decode_frame, CommandWriter, FrameReader, LineReader, LineWriter};
pub use session::{available_ports, SerialSession};
