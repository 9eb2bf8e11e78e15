//! Daemon lifecycle
//!
//! Opens the line, runs the read loop and the command scheduler side by side,
//! and unwinds them in a fixed order once shutdown is requested:
//! cancel, join the read loop, stop the scheduler, close the line.

use md1200_core::{DaemonConfig, Md1200Error, Result};
use md1200_hardware::{LineWriter, SerialSession};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::firing::FiringPlan;
use crate::read_loop::{FrameObserver, ReadLoop};
use crate::scheduler::{CommandScheduler, Schedule};
use crate::shutdown::TerminationSignal;

/// What happened during one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonSummary {
    pub signal: TerminationSignal,
    pub firings: u64,
    pub frames: u64,
    pub read_errors: u64,
    /// Time from cancellation to the read loop stopping
    pub read_loop_stop: Duration,
    /// Whether the line was released without error
    pub line_closed: bool,
}

/// An opened session plus everything scheduled against it
pub struct Daemon {
    session: SerialSession,
    schedule: Schedule,
    plan: Arc<FiringPlan>,
    observer: Option<Arc<dyn FrameObserver>>,
}

impl Daemon {
    pub fn new(session: SerialSession, schedule: Schedule, plan: FiringPlan) -> Self {
        Self {
            session,
            schedule,
            plan: Arc::new(plan),
            observer: None,
        }
    }

    /// Validate `config` and open the line it names.
    ///
    /// Every configuration problem is reported before the device is touched.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        config.validate()?;
        let schedule: Schedule = config.schedule.expression.parse()?;
        let plan = FiringPlan::from_config(config)?;
        let line = config.line_config()?;

        let session = SerialSession::open(&line)?;
        info!(
            address = %line.address(),
            baud = line.mode().baud_rate,
            "serial session started"
        );

        Ok(Self::new(session, schedule, plan))
    }

    pub fn with_observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// A handle to the line's write half
    pub fn writer(&self) -> LineWriter {
        self.session.writer()
    }

    /// Run until `shutdown` resolves, then stop everything in order.
    ///
    /// # Errors
    ///
    /// Returns [`Md1200Error::ReaderInUse`] if the session's reader was
    /// already taken. Failures after startup are logged, not returned.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<DaemonSummary>
    where
        F: Future<Output = TerminationSignal>,
    {
        let reader = self.session.take_reader().ok_or(Md1200Error::ReaderInUse)?;
        let token = CancellationToken::new();

        info!(
            address = %self.session.address(),
            schedule = %self.schedule,
            commands = self.plan.commands().len(),
            loops = self.plan.loops(),
            "starting md1200 fan controller"
        );

        let mut read_loop = ReadLoop::new(reader, token.clone());
        if let Some(observer) = self.observer.clone() {
            read_loop = read_loop.with_observer(observer);
        }
        let mut read_handle = read_loop.spawn();

        let scheduler = {
            let writer = self.session.writer();
            let plan = self.plan.clone();
            let job_token = token.clone();

            CommandScheduler::new(self.schedule.clone()).start(token.clone(), move |firing| {
                let writer = writer.clone();
                let plan = plan.clone();
                let token = job_token.clone();
                async move {
                    let report = plan.fire(&writer, &token).await;
                    info!(
                        firing,
                        commands = %plan.describe(),
                        sent = report.sent,
                        failed = report.failed,
                        "sent commands"
                    );
                }
            })
        };

        let signal = shutdown.await;
        info!(signal = %signal, "received signal, shutting down");

        let cancelled_at = Instant::now();
        token.cancel();

        read_handle.stopped().await;
        let read_loop_stop = cancelled_at.elapsed();
        let frames = read_handle.stats().frames();
        let read_errors = read_handle.stats().errors();

        match read_handle.join().await {
            Ok(reader) => self.session.restore_reader(reader),
            Err(e) => error!("Read loop task failed: {}", e),
        }

        let firings = scheduler.stop().await;

        let line_closed = self.session.close().await.is_ok();

        info!(firings, frames, "md1200 fan controller stopped");

        Ok(DaemonSummary {
            signal,
            firings,
            frames,
            read_errors,
            read_loop_stop,
            line_closed,
        })
    }
}
