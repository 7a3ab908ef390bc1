//! Result records and the uplink they are delivered through.

use crate::MODULE_ID;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// Status byte carried in place of the alert flag when a sample failed.
pub const FAULT_FLAG: u8 = 255;

/// Outcome of one sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub module_id: u8,
    /// Tilt currently beyond the alert threshold
    pub is_alert: bool,
    /// Produced in answer to an explicit poll
    pub is_acknowledgement: bool,
}

impl ModuleResult {
    pub fn new(is_alert: bool, is_acknowledgement: bool) -> Self {
        Self {
            module_id: MODULE_ID,
            is_alert,
            is_acknowledgement,
        }
    }

    /// Wire payload: `[module_id, alert_flag]`.
    pub fn payload(&self) -> [u8; 2] {
        [self.module_id, u8::from(self.is_alert)]
    }
}

/// What the scheduler hands to the uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Report(ModuleResult),
    /// The sensor could not be read for a polled cycle
    Fault {
        module_id: u8,
        is_acknowledgement: bool,
    },
}

impl Notification {
    pub fn fault(is_acknowledgement: bool) -> Self {
        Notification::Fault {
            module_id: MODULE_ID,
            is_acknowledgement,
        }
    }

    pub fn payload(&self) -> [u8; 2] {
        match self {
            Notification::Report(result) => result.payload(),
            Notification::Fault { module_id, .. } => [*module_id, FAULT_FLAG],
        }
    }

    pub fn is_acknowledgement(&self) -> bool {
        match self {
            Notification::Report(result) => result.is_acknowledgement,
            Notification::Fault {
                is_acknowledgement, ..
            } => *is_acknowledgement,
        }
    }

    /// The carried result, if this is not a fault.
    pub fn result(&self) -> Option<&ModuleResult> {
        match self {
            Notification::Report(result) => Some(result),
            Notification::Fault { .. } => None,
        }
    }
}

/// Destination for notifications leaving the module.
///
/// Called on the sampling worker; implementations should not block for long.
pub trait Uplink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> Uplink for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Uplink that forwards notifications into a channel.
#[derive(Debug, Clone)]
pub struct ChannelUplink {
    sender: Sender<Notification>,
}

impl ChannelUplink {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self { sender }
    }
}

impl Uplink for ChannelUplink {
    fn notify(&self, notification: &Notification) {
        if self.sender.try_send(*notification).is_err() {
            tracing::warn!("Uplink channel unavailable, dropping {:?}", notification);
        }
    }
}
