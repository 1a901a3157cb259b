//! Library surface of the `webscout` binary.
//!
//! Split out so integration tests can drive the command server and client
//! directly.

pub mod cli;
pub mod commands;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod session;
pub mod tools;
