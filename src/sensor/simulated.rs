//! Host-side accelerometer stand-in.
//!
//! This exists so the module can run on a development machine without a
//! sensor attached. Clones share state, so a test (or the CLI) can keep a
//! handle and steer readings while the worker owns the driver.

use crate::sensor::adapter::{Accelerometer, SensorError, SensorParams};
use crate::sensor::types::Axes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct SimState {
    axes: Axes,
    script: VecDeque<Result<Axes, SensorError>>,
    fail_init: bool,
    init_params: Option<SensorParams>,
    measuring: bool,
    reads: u64,
}

/// A simulated accelerometer with a steady reading and an optional script.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAccelerometer {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedAccelerometer {
    /// Create a simulator that reports `axes` until told otherwise.
    pub fn new(axes: Axes) -> Self {
        let sim = Self::default();
        sim.lock().axes = axes;
        sim
    }

    /// Make the next `init` call fail.
    pub fn failing_init(self) -> Self {
        self.lock().fail_init = true;
        self
    }

    /// Change the steady reading.
    pub fn set_axes(&self, axes: Axes) {
        self.lock().axes = axes;
    }

    /// Queue a one-off reading, returned before the steady one.
    pub fn push_reading(&self, axes: Axes) {
        self.lock().script.push_back(Ok(axes));
    }

    /// Queue a one-off bus fault.
    pub fn push_fault(&self, reason: &str) {
        self.lock()
            .script
            .push_back(Err(SensorError::Bus(reason.to_string())));
    }

    pub fn is_measuring(&self) -> bool {
        self.lock().measuring
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    pub fn init_params(&self) -> Option<SensorParams> {
        self.lock().init_params
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Accelerometer for SimulatedAccelerometer {
    fn init(&mut self, params: &SensorParams) -> Result<(), SensorError> {
        let mut state = self.lock();
        if state.fail_init {
            return Err(SensorError::InitFailed(format!(
                "no device at {:#04x}",
                params.address
            )));
        }
        state.init_params = Some(*params);
        Ok(())
    }

    fn set_measure(&mut self) -> Result<(), SensorError> {
        self.lock().measuring = true;
        Ok(())
    }

    fn read_axes(&mut self) -> Result<Axes, SensorError> {
        let mut state = self.lock();
        if state.init_params.is_none() {
            return Err(SensorError::Bus("device not initialized".into()));
        }
        state.reads += 1;
        match state.script.pop_front() {
            Some(reading) => reading,
            None => Ok(state.axes),
        }
    }

    fn set_sleep(&mut self) -> Result<(), SensorError> {
        self.lock().measuring = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_runs_before_steady_reading() {
        let mut sim = SimulatedAccelerometer::new(Axes::new(0, 0, 1000));
        sim.init(&SensorParams::default()).unwrap();
        sim.push_reading(Axes::new(1, 2, 3));

        assert_eq!(sim.read_axes().unwrap(), Axes::new(1, 2, 3));
        assert_eq!(sim.read_axes().unwrap(), Axes::new(0, 0, 1000));
    }

    #[test]
    fn test_read_before_init_fails() {
        let mut sim = SimulatedAccelerometer::new(Axes::default());
        assert!(sim.read_axes().is_err());
    }
}
