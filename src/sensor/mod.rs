//! Accelerometer access for the tilt module.
//!
//! The raw transducer is consumed through the [`Accelerometer`] trait; the
//! [`SensorAdapter`] turns one wake/measure/read/sleep round into a [`Sample`].

pub mod adapter;
pub mod simulated;
pub mod types;

pub use adapter::{Accelerometer, SensorAdapter, SensorError, SensorParams, SETTLE_DELAY};
pub use simulated::SimulatedAccelerometer;
pub use types::{tilt_angle, Axes, Sample};
