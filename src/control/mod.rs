//! Inbound control paths: the binary command protocol and the local
//! console/button surface. Both only write configuration or wake the worker.

pub mod console;
pub mod dispatcher;

pub use console::{ConsoleCommand, ConsoleOutcome, LocalControl, USAGE};
pub use dispatcher::{
    Command, Dispatcher, Reply, OPCODE_POLL, OPCODE_SET_PERIOD, STATUS_FAIL, STATUS_OK,
};
