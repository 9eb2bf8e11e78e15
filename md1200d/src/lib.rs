//! md1200d
//!
//! Keeps the fan controller of a Dell PowerEdge MD1200 enclosure quiet by
//! periodically sending it commands over its serial console, while logging
//! everything the controller prints back.
//
//! Public API:
//! - `daemon::Daemon`: opens the line and runs until shutdown
//! - `read_loop::ReadLoop`: drains and logs inbound frames
//! - `scheduler::CommandScheduler`: fires the command plan on a schedule
//! - `firing::FiringPlan`: the command sequence sent per firing
//! - `shutdown::TerminationListener`: SIGINT / SIGTERM handling

pub mod config;
pub mod daemon;
pub mod firing;
pub mod logging;
pub mod read_loop;
pub mod scheduler;
pub mod shutdown;

pub use daemon::{Daemon, DaemonSummary};
pub use firing::{FiringPlan, FiringReport};
pub use read_loop::{FrameObserver, ReadLoop, ReadLoopHandle, ReadLoopState, ReadLoopStats};
pub use scheduler::{CommandScheduler, Schedule, SchedulerHandle};
pub use shutdown::{TerminationListener, TerminationSignal};
