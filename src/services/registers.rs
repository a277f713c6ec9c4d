//! Register-level read and write operations on one thermostat.

use chrono::{NaiveTime, Timelike};
use log::{error, info, warn};
use serde::Serialize;
use std::path::Path;

use crate::config::settings::Config;
use crate::devices::profiles::{parse_register_lines, RegisterEntry, SkippedLine};
use crate::devices::tstat7;
use crate::modbus::{Connector, ModbusSession};
use crate::utils::error::{TstatError, TstatResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterReadResult {
    pub address: u16,
    pub values: Vec<u16>,
    pub error: Option<String>,
}

impl RegisterReadResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Registers written by a short write sequence, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub slave_id: u8,
    pub action: String,
    pub writes: Vec<RegisterEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileWriteReport {
    pub path: String,
    pub written: Vec<RegisterEntry>,
    pub failed: Vec<RegisterEntry>,
    pub skipped: Vec<SkippedLine>,
}

pub async fn read_one(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    register: u16,
) -> TstatResult<RegisterReadResult> {
    info!("Reading register {} from tstat {}", register, slave_id);

    let mut session = ModbusSession::open(connector, config).await?;
    let result = session.read_registers(register, 1, slave_id).await;
    session.close().await;

    let values = result.map_err(|e| {
        error!("Error reading register {}: {}", register, e);
        e
    })?;
    Ok(RegisterReadResult {
        address: register,
        values,
        error: None,
    })
}

/// Reads `start..=end` one register at a time; unreadable registers are recorded, not fatal.
pub async fn read_range(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    start: u16,
    end: u16,
) -> TstatResult<Vec<RegisterReadResult>> {
    if start > end {
        return Err(TstatError::InvalidInput(format!(
            "Range start {} is after end {}",
            start, end
        )));
    }
    info!("Reading range {} to {} from tstat {}", start, end, slave_id);

    let mut session = ModbusSession::open(connector, config).await?;
    let mut results = Vec::with_capacity((end - start) as usize + 1);

    for address in start..=end {
        match session.read_registers(address, 1, slave_id).await {
            Ok(values) => results.push(RegisterReadResult {
                address,
                values,
                error: None,
            }),
            Err(e) => {
                warn!("Error reading register {}: {}", address, e);
                results.push(RegisterReadResult {
                    address,
                    values: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        }
        if address < end {
            session.pause().await;
        }
    }

    session.close().await;
    Ok(results)
}

pub async fn write_one(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    register: u16,
    value: u16,
) -> TstatResult<WriteSummary> {
    info!("Writing {} to register {} on tstat {}", value, register, slave_id);
    write_sequence(
        connector,
        config,
        slave_id,
        "write register",
        &[RegisterEntry::new(register, value)],
    )
    .await
}

/// Same setpoint to the heating and cooling registers.
pub async fn set_temperature(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    setpoint: u16,
) -> TstatResult<WriteSummary> {
    info!("Updating setpoint for tstat {} to {}", slave_id, setpoint);
    write_sequence(
        connector,
        config,
        slave_id,
        "set temperature",
        &[
            RegisterEntry::new(tstat7::HEATING_SETPOINT, setpoint),
            RegisterEntry::new(tstat7::COOLING_SETPOINT, setpoint),
        ],
    )
    .await
}

/// Arms manual output control, then sets the relay bitmap. The firmware
/// ignores the bitmap unless manual control is armed first.
pub async fn set_relay(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    state: u16,
) -> TstatResult<WriteSummary> {
    info!("Updating relay for tstat {} to {}", slave_id, state);
    write_sequence(
        connector,
        config,
        slave_id,
        "set relay",
        &[
            RegisterEntry::new(tstat7::OUTPUT_MANUAL_ENABLE, tstat7::MANUAL_OUTPUTS_ALL),
            RegisterEntry::new(tstat7::DIGITAL_OUTPUT_STATUS, state),
        ],
    )
    .await
}

// Ordered writes; the first failure stops the sequence.
async fn write_sequence(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    action: &str,
    entries: &[RegisterEntry],
) -> TstatResult<WriteSummary> {
    let mut session = ModbusSession::open(connector, config).await?;
    let mut written = Vec::with_capacity(entries.len());
    let mut outcome = Ok(());

    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            session.pause().await;
        }
        if let Err(e) = session.write_register(entry.address, entry.value, slave_id).await {
            error!("Error writing register {}: {}", entry.address, e);
            outcome = Err(e);
            break;
        }
        written.push(*entry);
    }

    session.close().await;
    outcome?;

    Ok(WriteSummary {
        slave_id,
        action: action.to_string(),
        writes: written,
    })
}

/// Parses `HH:MM` into hour and minute.
pub fn parse_clock(text: &str) -> TstatResult<(u16, u16)> {
    let time = NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|e| TstatError::InvalidInput(format!("Invalid time '{}', expected HH:MM: {}", text, e)))?;
    Ok((time.hour() as u16, time.minute() as u16))
}

/// Sets the device clock. Each register is read back before moving on, so a
/// wrong hour stops the minute from being written.
pub async fn set_time(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    time: &str,
) -> TstatResult<WriteSummary> {
    let (hour, minute) = parse_clock(time)?;
    info!("Updating time for tstat {} to {:02}:{:02}", slave_id, hour, minute);

    let mut session = ModbusSession::open(connector, config).await?;
    let mut written = Vec::with_capacity(2);
    let mut outcome = Ok(());

    for (index, entry) in [
        RegisterEntry::new(tstat7::CLOCK_HOUR, hour),
        RegisterEntry::new(tstat7::CLOCK_MINUTE, minute),
    ]
    .into_iter()
    .enumerate()
    {
        if index > 0 {
            session.pause().await;
        }
        if let Err(e) = write_and_confirm(&mut session, slave_id, entry).await {
            error!("Error updating register {}: {}", entry.address, e);
            outcome = Err(e);
            break;
        }
        written.push(entry);
    }

    session.close().await;
    outcome?;

    Ok(WriteSummary {
        slave_id,
        action: "set time".to_string(),
        writes: written,
    })
}

async fn write_and_confirm(session: &mut ModbusSession, slave_id: u8, entry: RegisterEntry) -> TstatResult<()> {
    session.write_register(entry.address, entry.value, slave_id).await?;
    session.pause().await;

    let actual = session.read_register(entry.address, slave_id).await?;
    if actual != entry.value {
        return Err(TstatError::ReadbackMismatch {
            register: entry.address,
            expected: entry.value,
            actual,
        });
    }
    Ok(())
}

/// Writes every `address,value` line of a register file. Malformed lines and
/// failed writes are reported and skipped.
pub async fn write_from_file(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    path: &Path,
) -> TstatResult<FileWriteReport> {
    if !path.is_file() {
        return Err(TstatError::ProfileFile(format!("File {} not found", path.display())));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| TstatError::ProfileFile(format!("Cannot read {}: {}", path.display(), e)))?;
    let parsed = parse_register_lines(&text);

    info!("Reading registers from {}", path.display());

    let mut report = FileWriteReport {
        path: path.display().to_string(),
        skipped: parsed.skipped,
        ..FileWriteReport::default()
    };

    let mut session = ModbusSession::open(connector, config).await?;

    for (index, entry) in parsed.entries.iter().enumerate() {
        if index > 0 {
            session.pause().await;
        }
        info!("Writing {} to Address {}", entry.value, entry.address);
        match session.write_register(entry.address, entry.value, slave_id).await {
            Ok(()) => report.written.push(*entry),
            Err(e) => {
                warn!("Error writing register {}: {}", entry.address, e);
                report.failed.push(*entry);
            }
        }
    }

    session.close().await;
    Ok(report)
}
