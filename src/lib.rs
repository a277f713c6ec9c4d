//! Thermostat Modbus RTU utility library
//!
//! Register-level reads and writes, bus discovery, address reassignment and
//! profile verification for TSTAT controllers on a shared RTU serial line.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use cli::{CliArgs, Operation};
pub use config::Config;
pub use devices::{ProfileRegistry, RegisterEntry, RegisterProfile};
pub use modbus::{ModbusClient, ModbusSession};
pub use output::{ConsoleFormatter, JsonFormatter, ReportFormatter};
pub use utils::error::{TstatError, TstatResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
