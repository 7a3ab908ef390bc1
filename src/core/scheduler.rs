//! The sampling worker.
//!
//! One [`Scheduler`] owns the sensor and the alert status. It sleeps on the
//! wake queue and, for every wake-up, runs one cycle:
//!
//! 1. take (and clear) the pending-poll flag
//! 2. acquire a sample
//! 3. feed the tilt angle to the alert state machine
//! 4. build the [`ModuleResult`]
//! 5. notify the uplink on a new alert, a heartbeat, a poll or a failed sample
//! 6. re-arm the timer for the configured period (or leave it off)
//!
//! The cycle is the same whatever produced the wake-up.

use crate::config::{ConfigStore, ModuleConfig};
use crate::core::alert::{is_significant, AlertStatus, Emission};
use crate::core::report::{ModuleResult, Notification, Uplink};
use crate::core::timer::Timer;
use crate::sensor::{Sample, SensorAdapter, SensorError};
use crate::stats::SharedModuleStats;
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// State shared between the worker and the control paths.
pub struct ModuleState {
    config: Mutex<ConfigStore>,
    pending_poll: AtomicBool,
    stats: SharedModuleStats,
}

impl ModuleState {
    pub fn new(config: ConfigStore, stats: SharedModuleStats) -> Self {
        Self {
            config: Mutex::new(config),
            pending_poll: AtomicBool::new(false),
            stats,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> ModuleConfig {
        self.config_store().current()
    }

    /// Run `f` with exclusive access to the configuration store.
    pub fn with_config<R>(&self, f: impl FnOnce(&mut ConfigStore) -> R) -> R {
        f(&mut self.config_store())
    }

    /// Mark the next cycle as answering an explicit poll.
    pub fn request_poll(&self) {
        self.pending_poll.store(true, Ordering::SeqCst);
    }

    /// Mark the next cycle as autonomous.
    pub fn clear_poll(&self) {
        self.pending_poll.store(false, Ordering::SeqCst);
    }

    pub fn poll_pending(&self) -> bool {
        self.pending_poll.load(Ordering::SeqCst)
    }

    fn take_poll(&self) -> bool {
        self.pending_poll.swap(false, Ordering::SeqCst)
    }

    /// Arm `timer` for the configured period, or disarm it for period 0.
    ///
    /// The configuration lock is held across the timer call, so a concurrent
    /// period change always lands after this one.
    pub fn rearm(&self, timer: &dyn Timer) {
        let store = self.config_store();
        match store.current().period() {
            Some(period) => timer.arm(period),
            None => timer.disarm(),
        }
    }

    pub fn stats(&self) -> &SharedModuleStats {
        &self.stats
    }

    fn config_store(&self) -> MutexGuard<'_, ConfigStore> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Thread-safe shared module state.
pub type SharedModuleState = Arc<ModuleState>;

/// A sample taken outside the cycle bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub sample: Sample,
    /// Whether this sample alone would count as significant tilt
    pub is_alert: bool,
}

/// Reply slot for a probe request.
pub type ProbeRequest = Sender<Result<Probe, SensorError>>;

/// The sampling worker.
pub struct Scheduler {
    sensor: SensorAdapter,
    status: AlertStatus,
    state: SharedModuleState,
    uplink: Arc<dyn Uplink>,
    timer: Arc<dyn Timer>,
}

impl Scheduler {
    /// `sensor` must already be initialized.
    pub fn new(
        sensor: SensorAdapter,
        state: SharedModuleState,
        uplink: Arc<dyn Uplink>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        Self {
            sensor,
            status: AlertStatus::default(),
            state,
            uplink,
            timer,
        }
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    /// Run one full cycle. Returns the notification sent, if any.
    ///
    /// A failed sample leaves the alert status untouched and reports a
    /// `Fault` through the uplink.
    pub fn run_cycle(&mut self) -> Option<Notification> {
        let is_acknowledgement = self.state.take_poll();
        let stats = self.state.stats().clone();
        stats.record_cycle();

        let notification = match self.sensor.acquire_sample() {
            Ok(sample) => {
                let transition = self.status.evaluate(sample.tilt_angle);
                self.status = transition.status;

                match transition.emission {
                    Emission::NewAlert => {
                        tracing::info!("Significant tilt detected: {}", sample.tilt_angle);
                        stats.record_alert();
                    }
                    Emission::Heartbeat => {
                        tracing::info!(
                            "Tilt still significant after {} cycles: {}",
                            self.status.active_duration_ticks,
                            sample.tilt_angle
                        );
                        stats.record_heartbeat();
                    }
                    Emission::None => {}
                }

                let result = ModuleResult::new(self.status.active, is_acknowledgement);
                (transition.emission.emits() || is_acknowledgement)
                    .then_some(Notification::Report(result))
            }
            Err(e) => {
                tracing::warn!("Sample failed, alert state unchanged: {}", e);
                stats.record_sample_failure();
                Some(Notification::fault(is_acknowledgement))
            }
        };

        if let Some(ref notification) = notification {
            self.uplink.notify(notification);
            stats.record_notification();
        }

        self.rearm();
        notification
    }

    /// Take a sample without touching alert status, poll flag or uplink.
    pub fn probe(&mut self) -> Result<Probe, SensorError> {
        let sample = self.sensor.acquire_sample()?;
        Ok(Probe {
            sample,
            is_alert: is_significant(sample.tilt_angle),
        })
    }

    fn rearm(&self) {
        self.state.rearm(self.timer.as_ref());
    }

    /// Worker loop. Returns when `running` is cleared and a signal arrives,
    /// or when either channel disconnects.
    pub fn run(mut self, wake: Receiver<()>, probes: Receiver<ProbeRequest>, running: Arc<AtomicBool>) {
        tracing::info!("Periodic sampling worker started");

        loop {
            select! {
                recv(wake) -> signal => {
                    if signal.is_err() || !running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.run_cycle();
                }
                recv(probes) -> request => match request {
                    Ok(reply) => {
                        let _ = reply.send(self.probe());
                    }
                    Err(_) => break,
                },
            }
        }

        tracing::info!("Periodic sampling worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Dispatcher;
    use crate::core::signal::signal_queue;
    use crate::core::timer::{ManualTimer, TimerEvent};
    use crate::sensor::{Axes, SimulatedAccelerometer};
    use crate::stats::create_shared_stats;
    use crate::storage::MemoryStorage;
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Duration;

    const LEVEL: Axes = Axes::new(0, 0, 1000);
    const TILTED: Axes = Axes::new(364, 0, 1000);

    struct Fixture {
        scheduler: Scheduler,
        sim: SimulatedAccelerometer,
        state: SharedModuleState,
        timer: Arc<ManualTimer>,
        seen: Arc<Mutex<Vec<Notification>>>,
    }

    fn fixture(period: u8) -> Fixture {
        let sim = SimulatedAccelerometer::new(LEVEL);
        let mut sensor = SensorAdapter::new(sim.clone()).with_settle_delay(Duration::ZERO);
        sensor.initialize().unwrap();

        let mut store = ConfigStore::new(Box::new(MemoryStorage::new()));
        store.load();
        store.set_period(period);
        let state = Arc::new(ModuleState::new(store, create_shared_stats()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let uplink: Arc<dyn Uplink> =
            Arc::new(move |n: &Notification| sink.lock().unwrap().push(*n));
        let timer = Arc::new(ManualTimer::new());

        let scheduler = Scheduler::new(sensor, state.clone(), uplink, timer.clone());
        Fixture {
            scheduler,
            sim,
            state,
            timer,
            seen,
        }
    }

    #[test]
    fn test_level_cycle_is_silent() {
        let mut f = fixture(10);
        assert!(f.scheduler.run_cycle().is_none());
        assert!(f.seen.lock().unwrap().is_empty());
        assert_eq!(f.timer.armed(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_alert_on_third_sample() {
        let mut f = fixture(10);
        f.sim.push_reading(LEVEL);
        f.sim.push_reading(LEVEL);
        f.sim.push_reading(TILTED);

        f.scheduler.run_cycle();
        f.scheduler.run_cycle();
        let notification = f.scheduler.run_cycle();

        let expected = Notification::Report(ModuleResult::new(true, false));
        assert_eq!(notification, Some(expected));
        assert_eq!(*f.seen.lock().unwrap(), vec![expected]);
        assert!(f.scheduler.status().active);
        assert_eq!(f.state.stats().stats().alerts_raised, 1);
    }

    #[test]
    fn test_sustained_tilt_emits_once_until_heartbeat() {
        let mut f = fixture(1);
        f.sim.set_axes(TILTED);

        for _ in 0..300 {
            f.scheduler.run_cycle();
        }
        assert_eq!(f.seen.lock().unwrap().len(), 1);

        f.scheduler.run_cycle();
        assert_eq!(f.seen.lock().unwrap().len(), 2);
        assert_eq!(f.state.stats().stats().heartbeats, 1);
    }

    #[test]
    fn test_poll_acknowledged_while_inactive() {
        let mut f = fixture(10);
        f.state.request_poll();

        let notification = f.scheduler.run_cycle();
        assert_eq!(
            notification,
            Some(Notification::Report(ModuleResult::new(false, true)))
        );
        assert!(!f.state.poll_pending());

        // Flag consumed: the next cycle is autonomous again
        assert!(f.scheduler.run_cycle().is_none());
    }

    #[test]
    fn test_poll_and_new_alert_notify_once() {
        let mut f = fixture(10);
        f.sim.set_axes(TILTED);
        f.state.request_poll();

        f.scheduler.run_cycle();
        assert_eq!(
            *f.seen.lock().unwrap(),
            vec![Notification::Report(ModuleResult::new(true, true))]
        );
    }

    #[test]
    fn test_zero_period_leaves_timer_disarmed() {
        let mut f = fixture(0);
        f.scheduler.run_cycle();
        assert!(f.timer.armed().is_none());
        assert_eq!(f.timer.history().last(), Some(&TimerEvent::Disarmed));
    }

    #[test]
    fn test_sample_failure_keeps_alert_state() {
        let mut f = fixture(10);
        f.sim.set_axes(TILTED);
        f.scheduler.run_cycle();
        let before = f.scheduler.status();

        f.sim.push_fault("arbitration lost");
        assert_eq!(f.scheduler.run_cycle(), Some(Notification::fault(false)));
        assert_eq!(f.scheduler.status(), before);
        assert_eq!(f.state.stats().stats().sample_failures, 1);
        assert_eq!(f.timer.armed(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_sample_failure_on_poll_reports_fault() {
        let mut f = fixture(10);
        f.state.request_poll();
        f.sim.push_fault("nack");

        assert_eq!(f.scheduler.run_cycle(), Some(Notification::fault(true)));
    }

    #[test]
    fn test_probe_has_no_side_effects() {
        let mut f = fixture(10);
        f.sim.set_axes(TILTED);
        f.state.request_poll();

        let probe = f.scheduler.probe().unwrap();
        assert!(probe.is_alert);
        assert_eq!(probe.sample.tilt_angle, 200);
        assert!(!f.scheduler.status().active);
        assert!(f.state.poll_pending());
        assert!(f.seen.lock().unwrap().is_empty());
        assert!(f.timer.history().is_empty());
    }

    /// Timer whose first `arm` blocks until released.
    struct GateTimer {
        armed: Mutex<Option<Duration>>,
        gated: AtomicBool,
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl Timer for GateTimer {
        fn arm(&self, delay: Duration) {
            if self.gated.swap(false, Ordering::SeqCst) {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            *self.armed.lock().unwrap() = Some(delay);
        }

        fn disarm(&self) {
            *self.armed.lock().unwrap() = None;
        }
    }

    #[test]
    fn test_period_zero_is_not_overtaken_by_cycle_rearm() {
        let sim = SimulatedAccelerometer::new(LEVEL);
        let mut sensor = SensorAdapter::new(sim).with_settle_delay(Duration::ZERO);
        sensor.initialize().unwrap();

        let mut store = ConfigStore::new(Box::new(MemoryStorage::new()));
        store.load();
        store.set_period(10);
        let state = Arc::new(ModuleState::new(store, create_shared_stats()));

        let (entered_tx, entered) = bounded(1);
        let (release, release_rx) = bounded(1);
        let timer = Arc::new(GateTimer {
            armed: Mutex::new(None),
            gated: AtomicBool::new(true),
            entered: entered_tx,
            release: release_rx,
        });
        let uplink: Arc<dyn Uplink> = Arc::new(|_: &Notification| {});

        let mut scheduler = Scheduler::new(sensor, state.clone(), uplink, timer.clone());
        let worker = thread::spawn(move || {
            scheduler.run_cycle();
        });
        entered.recv_timeout(Duration::from_secs(2)).unwrap();

        // The cycle is now stuck re-arming for the old period
        let (waker, _wake) = signal_queue(state.stats().clone());
        let dispatcher = Dispatcher::new(state.clone(), timer.clone(), waker);
        let control = thread::spawn(move || dispatcher.dispatch(&[0x00, 0]));

        thread::sleep(Duration::from_millis(50));
        release.send(()).unwrap();
        worker.join().unwrap();
        let reply = control.join().unwrap().unwrap();

        assert!(reply.is_success());
        assert_eq!(state.config().sampling_period_secs, 0);
        assert!(timer.armed.lock().unwrap().is_none());
    }
}
