//! Command-line interface for courseharvest.

mod commands;
pub mod helpers;

pub use commands::{is_verbose, run};
