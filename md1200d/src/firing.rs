//! Firing plan
//!
//! The fixed command sequence sent on every scheduler firing.

use md1200_core::{Command, DaemonConfig, Result};
use md1200_hardware::CommandWriter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ordered commands, repeated `loops` times per firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringPlan {
    commands: Vec<Command>,
    loops: u32,
    loop_delay: Duration,
}

/// Outcome of one firing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FiringReport {
    pub sent: u32,
    pub failed: u32,
}

impl FiringPlan {
    /// A plan always runs at least one loop.
    pub fn new(commands: Vec<Command>, loops: u32, loop_delay: Duration) -> Self {
        Self {
            commands,
            loops: loops.max(1),
            loop_delay,
        }
    }

    /// Build the plan from the `[command]` section.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        Ok(Self::new(
            config.commands()?,
            config.command.num_loops,
            config.command.loop_delay,
        ))
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn loop_delay(&self) -> Duration {
        self.loop_delay
    }

    /// Commands of one loop as they appear on the wire, minus terminators
    pub fn describe(&self) -> String {
        self.commands
            .iter()
            .map(Command::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Send every command, in order, once per loop.
    ///
    /// Write failures are counted and the firing carries on. Once `token` is
    /// cancelled no further loop starts; a loop already sending completes.
    pub async fn fire(&self, writer: &dyn CommandWriter, token: &CancellationToken) -> FiringReport {
        let mut report = FiringReport::default();

        for pass in 0..self.loops {
            if pass > 0 {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Firing cut short after {} of {} loops", pass, self.loops);
                        break;
                    }
                    _ = tokio::time::sleep(self.loop_delay) => {}
                }
            }

            for command in &self.commands {
                if writer.send_command(command).await {
                    report.sent += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use md1200_core::Md1200Error;
    use std::sync::Mutex;

    /// Records writes; fails the writes whose 0-based index is listed
    #[derive(Default)]
    struct RecordingWriter {
        written: Mutex<Vec<Vec<u8>>>,
        fail_on: Vec<usize>,
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl CommandWriter for RecordingWriter {
        async fn write_command(&self, command: &Command) -> Result<()> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_on.contains(&attempt) {
                return Err(Md1200Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "line dropped",
                )));
            }
            self.written.lock().unwrap().push(command.encode());
            Ok(())
        }
    }

    fn default_plan() -> FiringPlan {
        FiringPlan::from_config(&DaemonConfig::default()).unwrap()
    }

    #[test]
    fn test_plan_from_default_config() {
        let plan = default_plan();
        assert_eq!(plan.loops(), 5);
        assert_eq!(plan.loop_delay(), Duration::from_millis(200));
        assert_eq!(plan.commands().len(), 2);
        assert_eq!(plan.commands()[0].keyword(), "_temp_rd");
        assert_eq!(plan.commands()[1].keyword(), "_shutup");
    }

    #[test]
    fn test_describe_follows_configured_commands() {
        assert_eq!(default_plan().describe(), "_temp_rd, _shutup 20");

        let mut config = DaemonConfig::default();
        config.command.temperature_keyword = String::new();
        config.command.keyword = "set_speed".to_string();
        config.command.value = 35;
        let plan = FiringPlan::from_config(&config).unwrap();
        assert_eq!(plan.describe(), "set_speed 35");
    }

    #[test]
    fn test_zero_loops_becomes_one() {
        let plan = FiringPlan::new(vec![Command::shutup(20)], 0, Duration::ZERO);
        assert_eq!(plan.loops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_sends_sequence_each_loop() {
        let writer = RecordingWriter::default();
        let plan = FiringPlan::new(
            vec![Command::temperature(), Command::shutup(20)],
            3,
            Duration::from_millis(200),
        );

        let report = plan.fire(&writer, &CancellationToken::new()).await;
        assert_eq!(report, FiringReport { sent: 6, failed: 0 });

        let written = writer.written.lock().unwrap();
        let expected: Vec<Vec<u8>> = (0..3)
            .flat_map(|_| [b"_temp_rd\n".to_vec(), b"_shutup 20\r".to_vec()])
            .collect();
        assert_eq!(*written, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_delay_separates_loops() {
        let writer = RecordingWriter::default();
        let plan = FiringPlan::new(vec![Command::shutup(20)], 5, Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        plan.fire(&writer, &CancellationToken::new()).await;

        // Four gaps between five loops
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_does_not_stop_firing() {
        let writer = RecordingWriter {
            fail_on: vec![0],
            ..Default::default()
        };
        let plan = FiringPlan::new(
            vec![Command::temperature(), Command::shutup(20)],
            2,
            Duration::from_millis(10),
        );

        let report = plan.fire(&writer, &CancellationToken::new()).await;
        assert_eq!(report, FiringReport { sent: 3, failed: 1 });
        assert_eq!(writer.written.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_between_loops() {
        let writer = RecordingWriter::default();
        let plan = FiringPlan::new(vec![Command::shutup(20)], 5, Duration::from_secs(1));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                token.cancel();
            })
        };

        let report = plan.fire(&writer, &token).await;
        canceller.await.unwrap();

        assert_eq!(report.sent, 2);
    }
}
