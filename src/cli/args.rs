use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::config::settings::OutputFormat;

/// Command-line surface. Exactly one operation flag may be given per run.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tstat-util",
    version,
    about = "utility for reading and writing to tstats"
)]
#[command(group(
    ArgGroup::new("operation")
        .multiple(false)
        .args([
            "scan", "move_to", "set", "readrange", "readone", "readfile",
            "writeone", "set_time", "relay", "verify", "list_ports", "list_profiles",
        ])
))]
pub struct CliArgs {
    /// Serial port for communication
    #[arg(short = 'd', long, value_name = "DEV_MGR")]
    pub device: Option<String>,

    /// Baudrate for serial [default: 19200]
    #[arg(long, value_name = "BAUD")]
    pub baudrate: Option<u32>,

    /// ID of tstat to read/write
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=254))]
    pub id: Option<u8>,

    /// Read one register
    #[arg(long, value_name = "REG")]
    pub readone: Option<u16>,

    /// Write one register
    #[arg(long, num_args = 2, value_names = ["REG", "VAL"])]
    pub writeone: Option<Vec<u16>>,

    /// Read a range of registers
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub readrange: Option<Vec<u16>>,

    /// Write the registers listed in a register file
    #[arg(long, value_name = "FILE")]
    pub readfile: Option<PathBuf>,

    /// Scan for tstats in a range
    #[arg(long, num_args = 2, value_names = ["B", "E"])]
    pub scan: Option<Vec<u16>>,

    /// Move a tstat to a new ID
    #[arg(long = "move", value_name = "NEW")]
    pub move_to: Option<u16>,

    /// Set the relay state
    #[arg(long, value_name = "SET")]
    pub relay: Option<u16>,

    /// Set the setpoint
    #[arg(long, value_name = "TEMP")]
    pub set: Option<u16>,

    /// Set the time
    #[arg(long = "setTime", value_name = "HH:MM")]
    pub set_time: Option<String>,

    /// Verify the registers against a profile
    #[arg(long)]
    pub verify: bool,

    /// Fix the registers (with --verify)
    #[arg(long, requires = "verify")]
    pub fix: bool,

    /// Use the core register profile (with --verify)
    #[arg(long, requires = "verify", conflicts_with = "profile")]
    pub core: bool,

    /// Register profile used by --verify/--fix [default: tstat7]
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Timeout for serial, in seconds [default: 1]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Enable debug output
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// TOML file with connection defaults
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// List available serial ports
    #[arg(long)]
    pub list_ports: bool,

    /// List the built-in register profiles
    #[arg(long)]
    pub list_profiles: bool,
}
