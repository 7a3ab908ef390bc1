//! Debounced tilt alert state machine.
//!
//! The machine has two states, inactive and active. Entering the active
//! state always emits; leaving it never does. While the tilt persists, a
//! heartbeat re-alert fires every [`HEARTBEAT_CYCLES`] cycles. The heartbeat
//! counts cycles, not wall-clock time, so its real period scales with the
//! configured sampling period.

use serde::{Deserialize, Serialize};

/// Tilt beyond this many tenths of a degree (either sign) is significant.
pub const ALERT_THRESHOLD: i32 = 150;

/// Active cycles between heartbeat re-alerts.
pub const HEARTBEAT_CYCLES: u32 = 300;

/// Alert state carried between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub active: bool,
    /// Consecutive active cycles after the one that raised the alert.
    /// Only meaningful while `active` is true.
    pub active_duration_ticks: u32,
}

/// Why a cycle must notify the uplink, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    None,
    /// Inactive to active edge
    NewAlert,
    /// Periodic re-alert while still active
    Heartbeat,
}

impl Emission {
    pub fn emits(&self) -> bool {
        !matches!(self, Emission::None)
    }

    pub fn is_new_alert(&self) -> bool {
        matches!(self, Emission::NewAlert)
    }
}

/// Result of feeding one tilt angle into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTransition {
    pub status: AlertStatus,
    pub emission: Emission,
}

/// Whether `tilt_angle` (tenths of a degree) crosses the alert threshold.
pub fn is_significant(tilt_angle: i32) -> bool {
    tilt_angle.unsigned_abs() > ALERT_THRESHOLD.unsigned_abs()
}

impl AlertStatus {
    /// Compute the next status for a new tilt sample.
    pub fn evaluate(self, tilt_angle: i32) -> AlertTransition {
        let significant = is_significant(tilt_angle);

        match (self.active, significant) {
            (false, true) => AlertTransition {
                status: AlertStatus {
                    active: true,
                    active_duration_ticks: 0,
                },
                emission: Emission::NewAlert,
            },
            (true, false) => AlertTransition {
                status: AlertStatus::default(),
                emission: Emission::None,
            },
            (true, true) => {
                // On overflow keep the residue so heartbeats stay on cadence
                let ticks = match self.active_duration_ticks.checked_add(1) {
                    Some(ticks) => ticks,
                    None => self.active_duration_ticks % HEARTBEAT_CYCLES + 1,
                };
                AlertTransition {
                    status: AlertStatus {
                        active: true,
                        active_duration_ticks: ticks,
                    },
                    emission: if ticks % HEARTBEAT_CYCLES == 0 {
                        Emission::Heartbeat
                    } else {
                        Emission::None
                    },
                }
            }
            (false, false) => AlertTransition {
                status: self,
                emission: Emission::None,
            },
        }
    }
}
