//! Binary command protocol.
//!
//! | Byte 0            | Byte 1          | Effect                             |
//! |-------------------|-----------------|------------------------------------|
//! | `OPCODE_SET_PERIOD` | period seconds | set sampling period, reply status |
//! | `OPCODE_POLL`     | (ignored)       | sample now, no synchronous reply   |
//!
//! Replies are `[MODULE_ID, status]` with `STATUS_OK` or `STATUS_FAIL`.
//! A poll is answered later by the worker through the uplink, marked as an
//! acknowledgement.

use crate::config::{ConfigStore, ModuleConfig};
use crate::core::{SharedModuleState, Timer, Waker};
use crate::MODULE_ID;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const OPCODE_SET_PERIOD: u8 = 0x00;
pub const OPCODE_POLL: u8 = 0x01;

pub const STATUS_OK: u8 = 0;
pub const STATUS_FAIL: u8 = 255;

/// A decoded inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetPeriod(u8),
    Poll,
}

impl Command {
    /// Decode a raw frame. Unknown opcodes, empty frames and a
    /// `SET_PERIOD` of the wrong length all yield `None`.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        match frame {
            [OPCODE_SET_PERIOD, period] => Some(Command::SetPeriod(*period)),
            [OPCODE_POLL, ..] => Some(Command::Poll),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::SetPeriod(period) => vec![OPCODE_SET_PERIOD, *period],
            Command::Poll => vec![OPCODE_POLL],
        }
    }
}

/// Synchronous reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub module_id: u8,
    pub status: u8,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            module_id: MODULE_ID,
            status: STATUS_OK,
        }
    }

    pub fn failure() -> Self {
        Self {
            module_id: MODULE_ID,
            status: STATUS_FAIL,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [self.module_id, self.status]
    }
}

/// Turns commands into configuration changes and wake signals.
///
/// Never touches the sensor.
#[derive(Clone)]
pub struct Dispatcher {
    state: SharedModuleState,
    timer: Arc<dyn Timer>,
    waker: Waker,
}

impl Dispatcher {
    pub fn new(state: SharedModuleState, timer: Arc<dyn Timer>, waker: Waker) -> Self {
        Self {
            state,
            timer,
            waker,
        }
    }

    /// Handle one raw frame. `None` means no synchronous reply is due.
    pub fn dispatch(&self, frame: &[u8]) -> Option<Reply> {
        match Command::decode(frame) {
            Some(Command::SetPeriod(period)) => {
                self.set_period(period);
                Some(Reply::ok())
            }
            Some(Command::Poll) => {
                self.request_poll();
                None
            }
            None => {
                tracing::debug!("Rejected command frame {:02x?}", frame);
                Some(Reply::failure())
            }
        }
    }

    /// Cancel the pending expiry, persist the new period and re-arm.
    pub fn set_period(&self, secs: u8) -> ModuleConfig {
        self.update_config(|store| store.set_period(secs))
    }

    /// Restore and persist the default configuration.
    pub fn reset_config(&self) -> ModuleConfig {
        self.update_config(|store| {
            store.reset_to_default();
            store.save();
        })
    }

    /// Run a cycle now and answer it as an acknowledgement.
    pub fn request_poll(&self) {
        self.state.request_poll();
        self.state.stats().record_poll();
        self.waker.signal();
    }

    pub fn state(&self) -> &SharedModuleState {
        &self.state
    }

    pub(crate) fn waker(&self) -> &Waker {
        &self.waker
    }

    /// Timer calls happen under the configuration lock, ordered against
    /// the worker's end-of-cycle re-arm.
    fn update_config(&self, f: impl FnOnce(&mut ConfigStore)) -> ModuleConfig {
        let config = self.state.with_config(|store| {
            self.timer.disarm();
            f(store);
            let config = store.current();
            if let Some(period) = config.period() {
                self.timer.arm(period);
            }
            config
        });

        match config.period() {
            Some(_) => tracing::info!("Period set to {} sec", config.sampling_period_secs),
            None => tracing::info!("Timer stopped"),
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PERIOD_SECS;
    use crate::core::{signal_queue, ManualTimer, ModuleState, TimerEvent};
    use crate::stats::create_shared_stats;
    use crate::storage::MemoryStorage;
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    fn dispatcher() -> (Dispatcher, Arc<ManualTimer>, Receiver<()>) {
        let stats = create_shared_stats();
        let mut store = ConfigStore::new(Box::new(MemoryStorage::new()));
        store.load();
        let state = Arc::new(ModuleState::new(store, stats.clone()));
        let (waker, wake) = signal_queue(stats);
        let timer = Arc::new(ManualTimer::new());
        (Dispatcher::new(state, timer.clone(), waker), timer, wake)
    }

    #[test]
    fn test_decode() {
        assert_eq!(Command::decode(&[0x00, 30]), Some(Command::SetPeriod(30)));
        assert_eq!(Command::decode(&[0x01]), Some(Command::Poll));
        assert_eq!(Command::decode(&[0x01, 0xff]), Some(Command::Poll));
        assert_eq!(Command::decode(&[]), None);
        assert_eq!(Command::decode(&[0x00]), None);
        assert_eq!(Command::decode(&[0x00, 1, 2]), None);
        assert_eq!(Command::decode(&[0x7f, 1]), None);
    }

    #[test]
    fn test_encode_matches_decode() {
        for command in [Command::SetPeriod(200), Command::Poll] {
            assert_eq!(Command::decode(&command.encode()), Some(command));
        }
    }

    #[test]
    fn test_set_period_replies_ok_and_persists() {
        let (dispatcher, timer, _wake) = dispatcher();

        let reply = dispatcher.dispatch(&[OPCODE_SET_PERIOD, 30]).unwrap();
        assert_eq!(reply.to_bytes(), [MODULE_ID, STATUS_OK]);
        assert_eq!(dispatcher.state().config().sampling_period_secs, 30);
        assert_eq!(
            timer.history(),
            vec![
                TimerEvent::Disarmed,
                TimerEvent::Armed(Duration::from_secs(30))
            ]
        );

        // Reload from the same storage through the store
        let reloaded = dispatcher.state().with_config(|store| store.load());
        assert_eq!(reloaded.sampling_period_secs, 30);
    }

    #[test]
    fn test_set_period_zero_stops_timer() {
        let (dispatcher, timer, _wake) = dispatcher();
        dispatcher.dispatch(&[OPCODE_SET_PERIOD, 0]);
        assert!(timer.armed().is_none());
        assert_eq!(timer.history(), vec![TimerEvent::Disarmed]);
    }

    #[test]
    fn test_wrong_length_leaves_config_unchanged() {
        let (dispatcher, timer, _wake) = dispatcher();

        let reply = dispatcher.dispatch(&[OPCODE_SET_PERIOD, 30, 0]).unwrap();
        assert_eq!(reply.status, STATUS_FAIL);
        assert!(!reply.is_success());
        assert_eq!(
            dispatcher.state().config().sampling_period_secs,
            DEFAULT_PERIOD_SECS
        );
        assert!(timer.history().is_empty());
    }

    #[test]
    fn test_unknown_and_empty_frames_fail() {
        let (dispatcher, _timer, wake) = dispatcher();
        assert_eq!(dispatcher.dispatch(&[]), Some(Reply::failure()));
        assert_eq!(dispatcher.dispatch(&[0x42]), Some(Reply::failure()));
        assert!(wake.try_recv().is_err());
    }

    #[test]
    fn test_poll_has_no_reply_and_signals() {
        let (dispatcher, _timer, wake) = dispatcher();

        assert_eq!(dispatcher.dispatch(&[OPCODE_POLL]), None);
        assert!(dispatcher.state().poll_pending());
        assert!(wake.try_recv().is_ok());
        assert_eq!(dispatcher.state().stats().stats().polls, 1);
    }

    #[test]
    fn test_reset_restores_default_and_rearms() {
        let (dispatcher, timer, _wake) = dispatcher();
        dispatcher.set_period(0);
        timer.clear_history();

        let config = dispatcher.reset_config();
        assert_eq!(config.sampling_period_secs, DEFAULT_PERIOD_SECS);
        assert_eq!(
            timer.armed(),
            Some(Duration::from_secs(u64::from(DEFAULT_PERIOD_SECS)))
        );
    }
}
