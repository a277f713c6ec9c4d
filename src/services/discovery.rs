//! Bus discovery and device address reassignment.

use log::{debug, error, info};
use serde::Serialize;
use std::time::Instant;

use super::Confirm;
use crate::config::settings::Config;
use crate::devices::tstat7::{self, ThermostatModel};
use crate::modbus::{Connector, ModbusSession};
use crate::utils::error::{TstatError, TstatResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanHit {
    pub address: u8,
    pub model_code: u16,
    pub model: Option<ThermostatModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub start: u8,
    pub end: u8,
    pub found: Vec<ScanHit>,
    pub free: Vec<u8>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved { from: u8, to: u8 },
    Aborted { from: u8, to: u8 },
}

pub fn validate_scan_range(start: u16, end: u16) -> TstatResult<(u8, u8)> {
    if !tstat7::is_valid_slave_id(start) || !tstat7::is_valid_slave_id(end) {
        return Err(TstatError::InvalidInput(format!(
            "Scan range {}-{} must lie within {}-{}",
            start,
            end,
            tstat7::MIN_SLAVE_ID,
            tstat7::MAX_SLAVE_ID
        )));
    }
    if start > end {
        return Err(TstatError::InvalidInput(format!(
            "Scan start {} is after end {}",
            start, end
        )));
    }
    Ok((start as u8, end as u8))
}

pub fn validate_move_target(new_id: u16) -> TstatResult<u8> {
    if !tstat7::is_valid_slave_id(new_id) {
        return Err(TstatError::InvalidInput(format!("Invalid ID {}", new_id)));
    }
    Ok(new_id as u8)
}

/// Probes the model register of every address in `start..=end`.
pub async fn scan(connector: &dyn Connector, config: &Config, start: u8, end: u8) -> TstatResult<ScanReport> {
    let started = Instant::now();
    info!(
        "Starting SCAN for tstats on device {}, addr range: {}-{}, register: {}",
        config.device,
        start,
        end,
        tstat7::MODEL_IDENTIFIER
    );

    let mut session = ModbusSession::open(connector, config).await?;
    let mut found = Vec::new();
    let mut free = Vec::new();

    for address in start..=end {
        match session.read_register(tstat7::MODEL_IDENTIFIER, address).await {
            Ok(code) => {
                info!("Addr: {}    Value: {} ({})", address, code, tstat7::describe_model(code));
                found.push(ScanHit {
                    address,
                    model_code: code,
                    model: ThermostatModel::from_code(code),
                });
            }
            Err(e) => {
                info!("Addr: {}    Not Found", address);
                debug!("Probe of {} failed: {}", address, e);
                free.push(address);
            }
        }
        if address < end {
            session.pause().await;
        }
    }

    session.close().await;

    Ok(ScanReport {
        start,
        end,
        found,
        free,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

/// Reassigns the device at `old_id` to `new_id` after operator confirmation.
///
/// Refuses when anything answers at `new_id`. After the write only the new
/// address is checked; the old one is not probed again.
pub async fn move_device(
    connector: &dyn Connector,
    config: &Config,
    confirm: &dyn Confirm,
    old_id: u8,
    new_id: u8,
) -> TstatResult<MoveOutcome> {
    let mut session = ModbusSession::open(connector, config).await?;
    let result = relocate(&mut session, confirm, old_id, new_id).await;
    session.close().await;
    result
}

async fn relocate(
    session: &mut ModbusSession,
    confirm: &dyn Confirm,
    old_id: u8,
    new_id: u8,
) -> TstatResult<MoveOutcome> {
    info!("Moving tstat {} to {}", old_id, new_id);

    if let Err(e) = session.read_register(tstat7::MODBUS_ADDRESS, old_id).await {
        error!("No device found at ID {}: {}", old_id, e);
        return Err(TstatError::DeviceNotFound(old_id));
    }
    session.pause().await;

    match session.read_register(tstat7::MODEL_IDENTIFIER, new_id).await {
        Ok(code) => {
            error!("Address is not free at ID {} (model {})", new_id, code);
            return Err(TstatError::AddressOccupied(new_id));
        }
        Err(_) => info!("Address is free at ID {}. Moving on", new_id),
    }

    let prompt = format!("Are you sure you want to move tstat {} to {}? (y/n) ", old_id, new_id);
    if !confirm.confirm(&prompt).await? {
        info!("Aborting");
        return Ok(MoveOutcome::Aborted { from: old_id, to: new_id });
    }

    info!("Moving tstat...");
    session
        .write_register(tstat7::MODBUS_ADDRESS, new_id as u16, old_id)
        .await
        .map_err(|e| {
            error!("Error moving tstat: {}", e);
            e
        })?;
    session.pause().await;

    let reported = session
        .read_register(tstat7::MODBUS_ADDRESS, new_id)
        .await
        .map_err(|e| {
            error!("Error moving tstat, no answer at ID {}: {}", new_id, e);
            TstatError::DeviceNotFound(new_id)
        })?;
    if reported != new_id as u16 {
        return Err(TstatError::ReadbackMismatch {
            register: tstat7::MODBUS_ADDRESS,
            expected: new_id as u16,
            actual: reported,
        });
    }

    Ok(MoveOutcome::Moved { from: old_id, to: new_id })
}
