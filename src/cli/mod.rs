pub mod args;
pub mod commands;

pub use args::CliArgs;
pub use commands::{execute, run_locked, CommandContext, Operation};
