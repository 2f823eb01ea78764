//! Mixcraft terminal host
//!
//! Drives a [`mixcraft_core::Session`] from stdin line commands and a live
//! server connection, printing what changes.

pub mod commands;

#[cfg(not(target_arch = "wasm32"))]
mod runner;

pub use commands::{Command, CommandError};

#[cfg(not(target_arch = "wasm32"))]
pub use runner::{Host, RunError, describe_effect, load_config, run};
