//! Single-shot measurement sequencing over an accelerometer driver.

use crate::sensor::types::{Axes, Sample};
use std::thread;
use std::time::Duration;

/// Time the sensor is left in measurement mode before axes are read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Default 7-bit bus address (ADXL345 with ALT ADDRESS tied low).
pub const DEFAULT_SENSOR_ADDRESS: u8 = 0x53;

/// Bus parameters handed to the driver at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorParams {
    /// I2C bus index
    pub bus: u8,
    /// 7-bit device address
    pub address: u8,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            bus: 0,
            address: DEFAULT_SENSOR_ADDRESS,
        }
    }
}

/// Raw accelerometer driver contract.
pub trait Accelerometer: Send {
    /// Configure the device at `params`.
    fn init(&mut self, params: &SensorParams) -> Result<(), SensorError>;

    /// Enter measurement mode.
    fn set_measure(&mut self) -> Result<(), SensorError>;

    /// Read the latest acceleration, in milli-g.
    fn read_axes(&mut self) -> Result<Axes, SensorError>;

    /// Return to low-power standby.
    fn set_sleep(&mut self) -> Result<(), SensorError>;
}

/// Errors reported by accelerometer drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    InitFailed(String),
    Bus(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::InitFailed(e) => write!(f, "Sensor initialization failed: {e}"),
            SensorError::Bus(e) => write!(f, "Sensor bus error: {e}"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Drives one accelerometer through complete measurement rounds.
pub struct SensorAdapter {
    driver: Box<dyn Accelerometer>,
    params: SensorParams,
    settle_delay: Duration,
}

impl SensorAdapter {
    pub fn new(driver: impl Accelerometer + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            params: SensorParams::default(),
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_params(mut self, params: SensorParams) -> Self {
        self.params = params;
        self
    }

    /// Override the settle delay (tests use zero).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn params(&self) -> SensorParams {
        self.params
    }

    /// Configure the device. A failure here means the module must not start.
    pub fn initialize(&mut self) -> Result<(), SensorError> {
        tracing::info!(
            "Initializing accelerometer on bus {} at {:#04x}",
            self.params.bus,
            self.params.address
        );
        self.driver.init(&self.params)
    }

    /// Wake, settle, read, sleep and derive the tilt angle.
    ///
    /// Blocks the caller for the whole settle delay; not interruptible.
    pub fn acquire_sample(&mut self) -> Result<Sample, SensorError> {
        self.driver.set_measure()?;
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        let axes = self.driver.read_axes();

        if let Err(e) = self.driver.set_sleep() {
            tracing::warn!("Could not return accelerometer to standby: {}", e);
        }

        let sample = Sample::from_axes(axes?);
        tracing::debug!("Acceleration: {}", sample);
        Ok(sample)
    }
}
