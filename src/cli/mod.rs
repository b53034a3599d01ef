//! Command-line interface.

pub mod commands;
mod progress;

pub use commands::{is_verbose, run};
