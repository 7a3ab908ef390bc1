//! Core functionality for the tilt module.
//!
//! This module contains:
//! - The debounced alert state machine
//! - Result records and the uplink contract
//! - The wake queue and timers that feed the worker
//! - The sampling scheduler itself

pub mod alert;
pub mod report;
pub mod scheduler;
pub mod signal;
pub mod timer;

// Re-export commonly used types
pub use alert::{AlertStatus, AlertTransition, Emission, ALERT_THRESHOLD, HEARTBEAT_CYCLES};
pub use report::{ChannelUplink, ModuleResult, Notification, Uplink};
pub use scheduler::{ModuleState, Probe, ProbeRequest, Scheduler, SharedModuleState};
pub use signal::{signal_queue, SignalOutcome, Waker, SIGNAL_QUEUE_CAPACITY};
pub use timer::{ManualTimer, Timer, TimerEvent, WakeTimer};
