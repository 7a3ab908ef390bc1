//! One-shot re-armable timers targeting the wake queue.

use crate::core::signal::Waker;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timer primitive. Arming replaces any pending expiry.
pub trait Timer: Send + Sync {
    fn arm(&self, delay: Duration);
    fn disarm(&self);
}

enum TimerCommand {
    Arm(Instant),
    Disarm,
    Stop,
}

/// Host timer: a small thread that signals the wake queue on expiry.
pub struct WakeTimer {
    control: Sender<TimerCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WakeTimer {
    /// Start the timer thread. The timer begins disarmed.
    pub fn spawn(target: Waker) -> std::io::Result<Self> {
        let (control, commands) = unbounded();
        let handle = thread::Builder::new()
            .name("tilt-timer".into())
            .spawn(move || run_timer(commands, target))?;

        Ok(Self {
            control,
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl Timer for WakeTimer {
    fn arm(&self, delay: Duration) {
        let _ = self.control.send(TimerCommand::Arm(Instant::now() + delay));
    }

    fn disarm(&self) {
        let _ = self.control.send(TimerCommand::Disarm);
    }
}

impl Drop for WakeTimer {
    fn drop(&mut self) {
        let _ = self.control.send(TimerCommand::Stop);
        let handle = self.handle.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run_timer(commands: Receiver<TimerCommand>, target: Waker) {
    let mut deadline: Option<Instant> = None;

    loop {
        let expiry = match deadline {
            Some(at) => crossbeam_channel::at(at),
            None => crossbeam_channel::never(),
        };

        select! {
            recv(commands) -> command => match command {
                Ok(TimerCommand::Arm(at)) => deadline = Some(at),
                Ok(TimerCommand::Disarm) => deadline = None,
                Ok(TimerCommand::Stop) | Err(_) => break,
            },
            recv(expiry) -> _ => {
                deadline = None;
                target.signal();
            }
        }
    }
}

/// Something that happened to a [`ManualTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Armed(Duration),
    Disarmed,
}

/// Timer that only records requests. Expiry is triggered by hand.
#[derive(Debug, Default)]
pub struct ManualTimer {
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    armed: Option<Duration>,
    history: Vec<TimerEvent>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The delay of the pending expiry, if armed.
    pub fn armed(&self) -> Option<Duration> {
        self.lock().armed
    }

    pub fn history(&self) -> Vec<TimerEvent> {
        self.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Fire the pending expiry into `target`. Returns false if not armed.
    pub fn expire(&self, target: &Waker) -> bool {
        if self.lock().armed.take().is_none() {
            return false;
        }
        target.signal();
        true
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Timer for ManualTimer {
    fn arm(&self, delay: Duration) {
        let mut state = self.lock();
        state.armed = Some(delay);
        state.history.push(TimerEvent::Armed(delay));
    }

    fn disarm(&self) {
        let mut state = self.lock();
        state.armed = None;
        state.history.push(TimerEvent::Disarmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signal::signal_queue;
    use crate::stats::create_shared_stats;

    #[test]
    fn test_wake_timer_fires_once() {
        let (waker, receiver) = signal_queue(create_shared_stats());
        let timer = WakeTimer::spawn(waker).unwrap();

        timer.arm(Duration::from_millis(10));
        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(receiver.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_wake_timer_disarm_cancels() {
        let (waker, receiver) = signal_queue(create_shared_stats());
        let timer = WakeTimer::spawn(waker).unwrap();

        timer.arm(Duration::from_millis(50));
        timer.disarm();
        assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_wake_timer_rearm_replaces_deadline() {
        let (waker, receiver) = signal_queue(create_shared_stats());
        let timer = WakeTimer::spawn(waker).unwrap();

        timer.arm(Duration::from_secs(60));
        timer.arm(Duration::from_millis(10));
        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_manual_timer_records() {
        let (waker, receiver) = signal_queue(create_shared_stats());
        let timer = ManualTimer::new();

        assert!(!timer.expire(&waker));
        timer.arm(Duration::from_secs(5));
        assert_eq!(timer.armed(), Some(Duration::from_secs(5)));
        assert!(timer.expire(&waker));
        assert!(timer.armed().is_none());
        assert!(receiver.try_recv().is_ok());

        timer.disarm();
        assert_eq!(
            timer.history(),
            vec![TimerEvent::Armed(Duration::from_secs(5)), TimerEvent::Disarmed]
        );
    }
}
