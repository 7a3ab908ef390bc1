//! Tilt Sensor Agent - periodic accelerometer sampling with debounced tilt alerts.
//!
//! A single background worker samples an accelerometer on a re-armable timer,
//! derives a tilt angle, debounces the "significant tilt" condition, and
//! reports through an uplink callback. It can also be driven on demand through
//! a binary command protocol, a local console, and a physical button.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Tilt Sensor Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐                 │
//! │  │   Timer   │  │ Dispatcher│  │  Console/ │                 │
//! │  │  expiry   │  │  (POLL)   │  │  Button   │                 │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘                 │
//! │        └──────────────┼──────────────┘                        │
//! │                       ▼  bounded wake queue                   │
//! │                ┌─────────────┐   ┌──────────┐   ┌─────────┐  │
//! │                │  Scheduler  │──▶│  Alert   │──▶│ Uplink  │  │
//! │                │  (worker)   │   │  state   │   │         │  │
//! │                └──────┬──────┘   └──────────┘   └─────────┘  │
//! │                       ▼                                       │
//! │                ┌─────────────┐   ┌──────────┐                │
//! │                │   Sensor    │   │  Config  │                │
//! │                │   adapter   │   │  store   │                │
//! │                └─────────────┘   └──────────┘                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tilt_sensor_agent::{
//!     core::Notification,
//!     sensor::{Axes, SensorAdapter, SimulatedAccelerometer},
//!     storage::MemoryStorage,
//!     TiltModule,
//! };
//!
//! let sensor = SensorAdapter::new(SimulatedAccelerometer::new(Axes::new(0, 0, 1000)));
//! let uplink = |n: &Notification| println!("{:?}", n.payload());
//!
//! let module = TiltModule::new(sensor, MemoryStorage::new(), uplink)
//!     .start()
//!     .expect("sensor init failed");
//!
//! // Ask for an immediate sample; the answer arrives through the uplink
//! assert!(module.dispatch(&[0x01]).is_none());
//! ```

pub mod config;
pub mod control;
pub mod core;
pub mod module;
pub mod sensor;
pub mod stats;
pub mod storage;

// Re-export key types at crate root for convenience
pub use config::{ConfigStore, ModuleConfig};
pub use control::{Command, ConsoleCommand, ConsoleOutcome, Reply};
pub use core::{AlertStatus, ModuleResult, Notification, Uplink};
pub use module::{ModuleError, ModuleHandle, TiltModule};
pub use sensor::{Accelerometer, Sample, SensorAdapter};
pub use stats::{ModuleStats, SharedModuleStats};
pub use storage::{FileStorage, MemoryStorage, NvStorage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifier byte leading every reply and report payload.
pub const MODULE_ID: u8 = 0x2C;

/// Short name used in log lines and console output.
pub const MODULE_NAME: &str = "tilt";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_share_module_id() {
        assert_eq!(Reply::ok().to_bytes()[0], MODULE_ID);
        assert_eq!(ModuleResult::new(false, false).payload()[0], MODULE_ID);
    }
}
