//! Local control surface: console commands and the physical button.
//!
//! Console commands reuse the dispatcher's actions. `get` is the exception:
//! it asks the worker for a one-off probe so that only the worker ever talks
//! to the sensor.

use crate::config::ModuleConfig;
use crate::control::dispatcher::Dispatcher;
use crate::core::{Probe, ProbeRequest};
use crate::module::ModuleError;
use crate::MODULE_NAME;
use crossbeam_channel::{bounded, Sender};

/// Usage text printed for a bare invocation.
pub const USAGE: &str = concat!(
    "tilt get - get results now\n",
    "tilt send - get and send results now\n",
    "tilt period <N> - set period to N seconds\n",
    "tilt reset - reset settings to default"
);

/// A console command, already parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Bare invocation
    Usage,
    /// Sample now and print, without sending
    Get,
    /// Sample now and send as an acknowledgement
    Send,
    Period(u8),
    Reset,
}

/// What a console command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Usage(&'static str),
    Sampled(Probe),
    /// The worker was signalled; the result goes out through the uplink
    Queued,
    Configured(ModuleConfig),
}

/// Console and button entry points.
#[derive(Clone)]
pub struct LocalControl {
    dispatcher: Dispatcher,
    probes: Sender<ProbeRequest>,
}

impl LocalControl {
    pub fn new(dispatcher: Dispatcher, probes: Sender<ProbeRequest>) -> Self {
        Self {
            dispatcher,
            probes,
        }
    }

    pub fn execute(&self, command: ConsoleCommand) -> Result<ConsoleOutcome, ModuleError> {
        match command {
            ConsoleCommand::Usage => Ok(ConsoleOutcome::Usage(USAGE)),
            ConsoleCommand::Get => self.probe().map(ConsoleOutcome::Sampled),
            ConsoleCommand::Send => {
                self.dispatcher.request_poll();
                Ok(ConsoleOutcome::Queued)
            }
            ConsoleCommand::Period(secs) => {
                Ok(ConsoleOutcome::Configured(self.dispatcher.set_period(secs)))
            }
            ConsoleCommand::Reset => Ok(ConsoleOutcome::Configured(self.dispatcher.reset_config())),
        }
    }

    /// Button interrupt: an unsolicited sample, never an acknowledgement.
    pub fn press_button(&self) {
        let state = self.dispatcher.state();
        state.clear_poll();
        state.stats().record_button_press();
        tracing::debug!("[{}] Button pressed", MODULE_NAME);
        self.dispatcher.waker().signal();
    }

    fn probe(&self) -> Result<Probe, ModuleError> {
        let (reply, response) = bounded(1);
        self.probes.send(reply).map_err(|_| ModuleError::Stopped)?;
        response
            .recv()
            .map_err(|_| ModuleError::Stopped)?
            .map_err(ModuleError::Sensor)
    }
}
