//! Module assembly and lifecycle.
//!
//! [`TiltModule::start`] loads the configuration, initializes the sensor,
//! spawns the sampling worker and arms the timer. Sensor initialization
//! failure is fatal: nothing is spawned and no cycle ever runs.

use crate::config::{ConfigStore, ModuleConfig};
use crate::control::{ConsoleCommand, ConsoleOutcome, Dispatcher, LocalControl, Reply};
use crate::core::{
    signal_queue, ModuleState, Scheduler, SharedModuleState, Timer, Uplink, WakeTimer, Waker,
};
use crate::sensor::{SensorAdapter, SensorError};
use crate::stats::{create_shared_stats, SharedModuleStats, StatsSnapshot};
use crate::storage::NvStorage;
use crate::MODULE_NAME;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Errors surfaced by the module.
#[derive(Debug)]
pub enum ModuleError {
    /// The sensor could not be initialized; the module never started
    SensorInit(SensorError),
    /// A one-off sample failed
    Sensor(SensorError),
    Spawn(String),
    /// The worker is no longer running
    Stopped,
}

impl std::fmt::Display for ModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleError::SensorInit(e) => write!(f, "Unable to init sensor: {e}"),
            ModuleError::Sensor(e) => write!(f, "Sample failed: {e}"),
            ModuleError::Spawn(e) => write!(f, "Could not start worker: {e}"),
            ModuleError::Stopped => write!(f, "Sampling worker is not running"),
        }
    }
}

impl std::error::Error for ModuleError {}

/// Parts of a tilt module, ready to start.
pub struct TiltModule {
    sensor: SensorAdapter,
    storage: Box<dyn NvStorage>,
    uplink: Arc<dyn Uplink>,
    timer: Option<Arc<dyn Timer>>,
    stats: SharedModuleStats,
}

impl TiltModule {
    pub fn new(
        sensor: SensorAdapter,
        storage: impl NvStorage + 'static,
        uplink: impl Uplink + 'static,
    ) -> Self {
        Self {
            sensor,
            storage: Box::new(storage),
            uplink: Arc::new(uplink),
            timer: None,
            stats: create_shared_stats(),
        }
    }

    /// Use an external timer instead of spawning a [`WakeTimer`].
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_stats(mut self, stats: SharedModuleStats) -> Self {
        self.stats = stats;
        self
    }

    /// Bring the module up.
    pub fn start(self) -> Result<ModuleHandle, ModuleError> {
        let mut store = ConfigStore::new(self.storage);
        let config = store.load();
        tracing::info!("[{}] Period: {} sec", MODULE_NAME, config.sampling_period_secs);

        let mut sensor = self.sensor;
        if let Err(e) = sensor.initialize() {
            tracing::error!("[{}] Unable to init sensor: {}", MODULE_NAME, e);
            return Err(ModuleError::SensorInit(e));
        }

        let state: SharedModuleState = Arc::new(ModuleState::new(store, self.stats.clone()));
        let (waker, wake) = signal_queue(self.stats);

        let timer: Arc<dyn Timer> = match self.timer {
            Some(timer) => timer,
            None => Arc::new(
                WakeTimer::spawn(waker.clone()).map_err(|e| ModuleError::Spawn(e.to_string()))?,
            ),
        };

        let (probe_tx, probe_rx) = bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let scheduler = Scheduler::new(sensor, state.clone(), self.uplink, timer.clone());

        let worker = {
            let running = running.clone();
            thread::Builder::new()
                .name("tilt-sampler".into())
                .spawn(move || scheduler.run(wake, probe_rx, running))
                .map_err(|e| ModuleError::Spawn(e.to_string()))?
        };

        if let Some(period) = config.period() {
            timer.arm(period);
        }

        let dispatcher = Dispatcher::new(state.clone(), timer.clone(), waker.clone());
        let local = LocalControl::new(dispatcher.clone(), probe_tx);

        Ok(ModuleHandle {
            state,
            dispatcher,
            local,
            waker,
            timer,
            running,
            worker: Some(worker),
        })
    }
}

/// A running module. Dropping it stops the worker.
pub struct ModuleHandle {
    state: SharedModuleState,
    dispatcher: Dispatcher,
    local: LocalControl,
    waker: Waker,
    timer: Arc<dyn Timer>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ModuleHandle {
    /// Handle an inbound command frame.
    pub fn dispatch(&self, frame: &[u8]) -> Option<Reply> {
        self.dispatcher.dispatch(frame)
    }

    /// Run a console command.
    pub fn console(&self, command: ConsoleCommand) -> Result<ConsoleOutcome, ModuleError> {
        self.local.execute(command)
    }

    /// Button interrupt entry point.
    pub fn press_button(&self) {
        self.local.press_button();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn local_control(&self) -> &LocalControl {
        &self.local
    }

    pub fn config(&self) -> ModuleConfig {
        self.state.config()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats().stats()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        self.timer.disarm();
        self.waker.signal();
        if worker.join().is_err() {
            tracing::error!("[{}] Sampling worker panicked", MODULE_NAME);
        }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
