use log::{info, warn};
use std::future::Future;
use std::path::PathBuf;

use crate::cli::args::CliArgs;
use crate::config::settings::{Config, OutputFormat};
use crate::devices::profiles::{ProfileRegistry, CORE_PROFILE};
use crate::modbus::{list_serial_ports, Connector};
use crate::output::ReportFormatter;
use crate::services::{self, discovery, registers, Confirm};
use crate::utils::error::{TstatError, TstatResult};
use crate::utils::InstanceLock;

/// The single operation selected on the command line, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ListPorts,
    ListProfiles,
    Scan { start: u8, end: u8 },
    Move { slave: u8, new_id: u8 },
    SetTemperature { slave: u8, setpoint: u16 },
    ReadRange { slave: u8, start: u16, end: u16 },
    ReadOne { slave: u8, register: u16 },
    ReadFile { slave: u8, path: PathBuf },
    WriteOne { slave: u8, register: u16, value: u16 },
    SetTime { slave: u8, time: String },
    Relay { slave: u8, state: u16 },
    Verify { slave: u8, profile: String },
    Fix { slave: u8, profile: String },
}

impl Operation {
    /// Validates everything that can be checked without touching the bus.
    pub fn from_args(args: &CliArgs, config: &Config, profiles: &ProfileRegistry) -> TstatResult<Self> {
        if args.list_ports {
            return Ok(Self::ListPorts);
        }
        if args.list_profiles {
            return Ok(Self::ListProfiles);
        }
        if let Some(range) = &args.scan {
            let (start, end) = discovery::validate_scan_range(range[0], range[1])?;
            return Ok(Self::Scan { start, end });
        }

        let selected = args.move_to.is_some()
            || args.set.is_some()
            || args.readrange.is_some()
            || args.readone.is_some()
            || args.readfile.is_some()
            || args.writeone.is_some()
            || args.set_time.is_some()
            || args.relay.is_some()
            || args.verify;
        if !selected {
            return Err(TstatError::NoOperation);
        }

        let slave = config.require_slave_id()?;

        if let Some(new_id) = args.move_to {
            let new_id = discovery::validate_move_target(new_id)?;
            return Ok(Self::Move { slave, new_id });
        }
        if let Some(setpoint) = args.set {
            return Ok(Self::SetTemperature { slave, setpoint });
        }
        if let Some(range) = &args.readrange {
            if range[0] > range[1] {
                return Err(TstatError::InvalidInput(format!(
                    "Range start {} is after end {}",
                    range[0], range[1]
                )));
            }
            return Ok(Self::ReadRange {
                slave,
                start: range[0],
                end: range[1],
            });
        }
        if let Some(register) = args.readone {
            return Ok(Self::ReadOne { slave, register });
        }
        if let Some(path) = &args.readfile {
            return Ok(Self::ReadFile {
                slave,
                path: path.clone(),
            });
        }
        if let Some(pair) = &args.writeone {
            return Ok(Self::WriteOne {
                slave,
                register: pair[0],
                value: pair[1],
            });
        }
        if let Some(time) = &args.set_time {
            registers::parse_clock(time)?;
            return Ok(Self::SetTime {
                slave,
                time: time.clone(),
            });
        }
        if let Some(state) = args.relay {
            return Ok(Self::Relay { slave, state });
        }

        // Only --verify is left
        let profile = if args.core {
            warn!(
                "--core selects the '{}' profile; whether it should replace the full table needs product clarification",
                CORE_PROFILE
            );
            CORE_PROFILE.to_string()
        } else {
            config.profile.clone()
        };
        profiles.get(&profile)?;

        if args.fix {
            Ok(Self::Fix { slave, profile })
        } else {
            Ok(Self::Verify { slave, profile })
        }
    }

    /// Listing operations run without the instance lock.
    pub fn needs_bus(&self) -> bool {
        !matches!(self, Self::ListPorts | Self::ListProfiles)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPorts => "list ports",
            Self::ListProfiles => "list profiles",
            Self::Scan { .. } => "scan",
            Self::Move { .. } => "move",
            Self::SetTemperature { .. } => "set temperature",
            Self::ReadRange { .. } => "read range",
            Self::ReadOne { .. } => "read one",
            Self::ReadFile { .. } => "read file",
            Self::WriteOne { .. } => "write one",
            Self::SetTime { .. } => "set time",
            Self::Relay { .. } => "relay",
            Self::Verify { .. } => "verify",
            Self::Fix { .. } => "fix",
        }
    }
}

/// Everything an operation needs besides the bus settings.
pub struct CommandContext<'a> {
    pub connector: &'a dyn Connector,
    pub confirm: &'a dyn Confirm,
    pub profiles: &'a ProfileRegistry,
    pub formatter: &'a dyn ReportFormatter,
}

/// Runs one operation and returns its rendered result.
pub async fn execute(operation: &Operation, config: &Config, ctx: &CommandContext<'_>) -> TstatResult<String> {
    info!("Executing {}", operation.name());
    let f = ctx.formatter;

    match operation {
        Operation::ListPorts => Ok(f.format_ports(&list_serial_ports()?)),
        Operation::ListProfiles => {
            let profiles: Vec<_> = ctx.profiles.iter().collect();
            Ok(f.format_profiles(&profiles))
        }
        Operation::Scan { start, end } => {
            let report = services::scan(ctx.connector, config, *start, *end).await?;
            Ok(f.format_scan(&report))
        }
        Operation::Move { slave, new_id } => {
            let outcome = services::move_device(ctx.connector, config, ctx.confirm, *slave, *new_id).await?;
            Ok(f.format_move(&outcome))
        }
        Operation::SetTemperature { slave, setpoint } => {
            let summary = services::set_temperature(ctx.connector, config, *slave, *setpoint).await?;
            Ok(f.format_write(&summary))
        }
        Operation::ReadRange { slave, start, end } => {
            let results = services::read_range(ctx.connector, config, *slave, *start, *end).await?;
            Ok(f.format_reads(*slave, &results))
        }
        Operation::ReadOne { slave, register } => {
            let result = services::read_one(ctx.connector, config, *slave, *register).await?;
            Ok(f.format_reads(*slave, std::slice::from_ref(&result)))
        }
        Operation::ReadFile { slave, path } => {
            let report = services::write_from_file(ctx.connector, config, *slave, path).await?;
            Ok(f.format_file_write(*slave, &report))
        }
        Operation::WriteOne { slave, register, value } => {
            let summary = services::write_one(ctx.connector, config, *slave, *register, *value).await?;
            Ok(f.format_write(&summary))
        }
        Operation::SetTime { slave, time } => {
            let summary = services::set_time(ctx.connector, config, *slave, time).await?;
            Ok(f.format_write(&summary))
        }
        Operation::Relay { slave, state } => {
            let summary = services::set_relay(ctx.connector, config, *slave, *state).await?;
            Ok(f.format_write(&summary))
        }
        Operation::Verify { slave, profile } => {
            let profile = ctx.profiles.get(profile)?;
            let report = services::verify(ctx.connector, config, *slave, profile).await?;
            Ok(f.format_verify(&report))
        }
        Operation::Fix { slave, profile } => {
            let profile = ctx.profiles.get(profile)?;
            let report = services::fix(ctx.connector, config, *slave, profile).await?;
            Ok(f.format_fix(&report))
        }
    }
}

/// Runs a bus operation under the instance lock.
///
/// Returns `Ok(None)` when `shutdown` resolves first. The operation future,
/// and with it any open session, is dropped before the lock is released.
pub async fn run_locked<F: Future>(
    operation: &Operation,
    config: &Config,
    ctx: &CommandContext<'_>,
    shutdown: F,
) -> TstatResult<Option<String>> {
    let lock = InstanceLock::acquire(&config.lock_path).await?;

    match config.format {
        OutputFormat::Console => print!("{}", config.settings_summary()),
        OutputFormat::Json => info!("{}", config.settings_summary().trim()),
    }

    let result = tokio::select! {
        biased;
        _ = shutdown => None,
        result = execute(operation, config, ctx) => Some(result),
    };

    drop(lock);

    match result {
        Some(result) => result.map(Some),
        None => {
            warn!("Interrupted, lock released");
            Ok(None)
        }
    }
}
