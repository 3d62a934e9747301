//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod dump;
pub mod init;
pub mod signatures;
