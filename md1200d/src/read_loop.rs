//! Read loop
//!
//! Drains inbound frames from the line and logs them until cancelled. Read
//! errors, timeouts included, are logged and the loop carries on; the only
//! way out is the cancellation token, checked once per iteration.

use md1200_core::Md1200Error;
use md1200_hardware::FrameReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on the pause after a read error other than a timeout
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Lifecycle of the read loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLoopState {
    Running,
    Stopped,
}

/// Hook notified of every inbound frame and read error
pub trait FrameObserver: Send + Sync {
    fn on_frame(&self, frame: &str);

    fn on_error(&self, _error: &Md1200Error) {}
}

/// Counters kept by a running loop
#[derive(Debug, Default)]
pub struct ReadLoopStats {
    frames: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
}

impl ReadLoopStats {
    /// Frames received
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Failed reads, timeouts included
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Reads that ended because the line stayed quiet
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

/// Loop over one exclusive frame reader
pub struct ReadLoop<R> {
    reader: R,
    token: CancellationToken,
    observer: Option<Arc<dyn FrameObserver>>,
    error_backoff: Duration,
    stats: Arc<ReadLoopStats>,
    state: watch::Sender<ReadLoopState>,
}

impl<R: FrameReader> ReadLoop<R> {
    pub fn new(reader: R, token: CancellationToken) -> Self {
        let error_backoff = reader.read_timeout().min(MAX_ERROR_BACKOFF);
        let (state, _) = watch::channel(ReadLoopState::Running);

        Self {
            reader,
            token,
            observer: None,
            error_backoff,
            stats: Arc::new(ReadLoopStats::default()),
            state,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Pause after a non-timeout read error, such as end-of-file.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn stats(&self) -> Arc<ReadLoopStats> {
        self.stats.clone()
    }

    /// Run until cancelled, then hand the reader back.
    pub async fn run(mut self) -> R {
        debug!("Read loop started");

        while !self.token.is_cancelled() {
            match self.reader.read_frame().await {
                Ok(frame) => {
                    self.stats.frames.fetch_add(1, Ordering::Relaxed);
                    info!(data = %frame, "received data from serial port");
                    if let Some(observer) = &self.observer {
                        observer.on_frame(&frame);
                    }
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    if let Some(observer) = &self.observer {
                        observer.on_error(&e);
                    }

                    if e.is_timeout() {
                        self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                        debug!(error = %e, "no data from serial port");
                    } else {
                        error!(error = %e, "error reading from serial port");
                        tokio::select! {
                            _ = self.token.cancelled() => {}
                            _ = tokio::time::sleep(self.error_backoff) => {}
                        }
                    }
                }
            }
        }

        info!("shutting down serial reader");
        self.state.send_replace(ReadLoopState::Stopped);
        self.reader
    }
}

impl<R: FrameReader + 'static> ReadLoop<R> {
    /// Run the loop on its own task.
    pub fn spawn(self) -> ReadLoopHandle<R> {
        let state = self.state.subscribe();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run());

        ReadLoopHandle { task, state, stats }
    }
}

/// Handle to a spawned read loop
pub struct ReadLoopHandle<R> {
    task: JoinHandle<R>,
    state: watch::Receiver<ReadLoopState>,
    stats: Arc<ReadLoopStats>,
}

impl<R> ReadLoopHandle<R> {
    pub fn state(&self) -> ReadLoopState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &ReadLoopStats {
        &self.stats
    }

    /// Resolve once the loop has reached `Stopped`.
    pub async fn stopped(&mut self) {
        // An Err means the loop task is gone, which is also terminal
        let _ = self
            .state
            .wait_for(|state| *state == ReadLoopState::Stopped)
            .await;
    }

    /// Wait for the loop to exit and take the reader back.
    pub async fn join(self) -> Result<R, JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use md1200_core::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    enum Step {
        Frame(Duration, &'static str),
        Eof,
    }

    /// Plays back scripted steps, then times out forever
    struct ScriptedReader {
        steps: VecDeque<Step>,
        timeout: Duration,
    }

    impl ScriptedReader {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                timeout: READ_TIMEOUT,
            }
        }

        fn quiet() -> Self {
            Self::new([])
        }
    }

    #[async_trait]
    impl FrameReader for ScriptedReader {
        async fn read_frame(&mut self) -> Result<String> {
            match self.steps.pop_front() {
                Some(Step::Frame(after, frame)) => {
                    sleep(after).await;
                    Ok(frame.to_string())
                }
                Some(Step::Eof) => Err(Md1200Error::DeviceDisconnected(
                    "Serial port returned EOF".to_string(),
                )),
                None => {
                    sleep(self.timeout).await;
                    Err(Md1200Error::Timeout("quiet line".to_string()))
                }
            }
        }

        fn read_timeout(&self) -> Duration {
            self.timeout
        }
    }

    /// Always at end-of-file
    struct DeadReader;

    #[async_trait]
    impl FrameReader for DeadReader {
        async fn read_frame(&mut self) -> Result<String> {
            Err(Md1200Error::DeviceDisconnected("gone".to_string()))
        }

        fn read_timeout(&self) -> Duration {
            READ_TIMEOUT
        }
    }

    #[derive(Default)]
    struct Collector {
        frames: Mutex<Vec<String>>,
        errors: AtomicU64,
    }

    impl FrameObserver for Collector {
        fn on_frame(&self, frame: &str) {
            self.frames.lock().unwrap().push(frame.to_string());
        }

        fn on_error(&self, _error: &Md1200Error) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_never_stop_the_loop() {
        let token = CancellationToken::new();
        let handle = ReadLoop::new(ScriptedReader::quiet(), token.clone()).spawn();

        for _ in 0..10 {
            sleep(READ_TIMEOUT).await;
            assert_eq!(handle.state(), ReadLoopState::Running);
        }
        assert!(handle.stats().timeouts() >= 9);
        assert_eq!(handle.stats().frames(), 0);

        token.cancel();
        let reader = handle.join().await.unwrap();
        assert!(reader.steps.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_within_one_read_timeout() {
        let token = CancellationToken::new();
        let mut handle = ReadLoop::new(ScriptedReader::quiet(), token.clone()).spawn();

        // Cancel part way through a read
        sleep(READ_TIMEOUT + Duration::from_millis(1200)).await;
        let cancelled_at = Instant::now();
        token.cancel();

        handle.stopped().await;
        assert_eq!(handle.state(), ReadLoopState::Stopped);
        assert!(cancelled_at.elapsed() <= READ_TIMEOUT);
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_reach_observer_verbatim() {
        let collector = Arc::new(Collector::default());
        let token = CancellationToken::new();
        let reader = ScriptedReader::new([
            Step::Frame(Duration::from_secs(1), "TEMP:42"),
            Step::Frame(Duration::from_secs(1), "BP1:31c  BP2:29c"),
        ]);
        let handle = ReadLoop::new(reader, token.clone())
            .with_observer(collector.clone())
            .spawn();

        sleep(Duration::from_secs(3)).await;
        token.cancel();
        handle.join().await.unwrap();

        assert_eq!(
            *collector.frames.lock().unwrap(),
            vec!["TEMP:42".to_string(), "BP1:31c  BP2:29c".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_is_logged_and_loop_continues() {
        let collector = Arc::new(Collector::default());
        let token = CancellationToken::new();
        let reader = ScriptedReader::new([
            Step::Eof,
            Step::Frame(Duration::from_millis(10), "TEMP:40"),
        ]);
        let handle = ReadLoop::new(reader, token.clone())
            .with_observer(collector.clone())
            .spawn();

        sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.state(), ReadLoopState::Running);
        assert_eq!(handle.stats().frames(), 1);
        assert_eq!(collector.errors.load(Ordering::SeqCst), 1);

        token.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_line_is_paced_by_backoff() {
        let token = CancellationToken::new();
        let handle = ReadLoop::new(DeadReader, token.clone())
            .with_error_backoff(Duration::from_millis(500))
            .spawn();

        sleep(Duration::from_millis(4900)).await;
        token.cancel();
        let errors = handle.stats().errors();
        handle.join().await.unwrap();

        assert!((9..=11).contains(&errors), "errors = {}", errors);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let token = CancellationToken::new();
        let mut handle = ReadLoop::new(DeadReader, token.clone())
            .with_error_backoff(Duration::from_secs(60))
            .spawn();

        sleep(Duration::from_millis(10)).await;
        let cancelled_at = Instant::now();
        token.cancel();
        handle.stopped().await;

        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_inline_returns_reader_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let read_loop = ReadLoop::new(ScriptedReader::quiet(), token);
        let stats = read_loop.stats();
        let reader = read_loop.run().await;

        assert_eq!(reader.read_timeout(), READ_TIMEOUT);
        assert_eq!(stats.errors(), 0);
    }
}
