//! Bounded wake-up queue feeding the sampling worker.
//!
//! Signals carry no payload. Every cycle input is read from shared module
//! state when the cycle starts, so a signal dropped because the queue is full
//! loses nothing: a pending signal is already guaranteed to run a cycle.

use crate::stats::SharedModuleStats;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Outstanding wake-ups the queue holds before coalescing.
pub const SIGNAL_QUEUE_CAPACITY: usize = 4;

/// Result of a wake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Queued,
    /// Queue full; an earlier pending signal will serve this one
    Coalesced,
    /// The worker is gone
    Closed,
}

/// Producer handle for the wake queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Waker {
    sender: Sender<()>,
    stats: SharedModuleStats,
}

/// Create the wake queue.
pub fn signal_queue(stats: SharedModuleStats) -> (Waker, Receiver<()>) {
    let (sender, receiver) = bounded(SIGNAL_QUEUE_CAPACITY);
    (Waker { sender, stats }, receiver)
}

impl Waker {
    /// Ask the worker to run a cycle. Never blocks.
    pub fn signal(&self) -> SignalOutcome {
        match self.sender.try_send(()) {
            Ok(()) => SignalOutcome::Queued,
            Err(TrySendError::Full(())) => {
                self.stats.record_signal_coalesced();
                tracing::debug!("Wake queue saturated, coalescing signal");
                SignalOutcome::Coalesced
            }
            Err(TrySendError::Disconnected(())) => SignalOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;

    #[test]
    fn test_saturated_queue_coalesces() {
        let stats = create_shared_stats();
        let (waker, receiver) = signal_queue(stats.clone());

        for _ in 0..SIGNAL_QUEUE_CAPACITY {
            assert_eq!(waker.signal(), SignalOutcome::Queued);
        }
        assert_eq!(waker.signal(), SignalOutcome::Coalesced);
        assert_eq!(receiver.len(), SIGNAL_QUEUE_CAPACITY);
        assert_eq!(stats.stats().signals_coalesced, 1);
    }

    #[test]
    fn test_closed_queue() {
        let (waker, receiver) = signal_queue(create_shared_stats());
        drop(receiver);
        assert_eq!(waker.signal(), SignalOutcome::Closed);
    }
}
