//! Termination signal handling
//!
//! Interrupt and terminate both request the same orderly stop; no other
//! signal is handled.

use std::fmt;
use std::io;
use tokio::signal;

/// Signal that requested shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Installed handlers for both termination signals.
///
/// Install before opening the line so a signal arriving during startup is
/// not lost.
pub struct TerminationListener {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl TerminationListener {
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            _ = self.interrupt.recv() => TerminationSignal::Interrupt,
            _ = self.terminate.recv() => TerminationSignal::Terminate,
        }
    }

    /// Wait for the next termination signal.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> TerminationSignal {
        // Only Ctrl+C is deliverable here; a failed listener never resolves
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        TerminationSignal::Interrupt
    }
}
