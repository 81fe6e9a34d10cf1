//! Command-line interface for hwextract.

mod commands;

pub use commands::{is_verbose, run};
