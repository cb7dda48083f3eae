//! Logger initialization.
//!
//! The library itself only talks to the `log` facade; binaries and tests that
//! want output call [`init_logging`] once.

mod init;

pub use init::{LoggingConfig, init_logging};
