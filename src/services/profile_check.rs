//! Comparison of a thermostat against a register profile, and reapplying it.

use log::{error, info, warn};
use serde::Serialize;

use crate::config::settings::Config;
use crate::devices::profiles::{RegisterEntry, RegisterProfile};
use crate::modbus::{Connector, ModbusSession};
use crate::utils::error::TstatResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub address: u16,
    pub expected: u16,
    pub actual: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unreadable {
    pub address: u16,
    pub expected: u16,
    pub error: String,
}

/// Outcome of a verification pass. Entries keep profile order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub profile: String,
    pub slave_id: u8,
    pub matching: Vec<RegisterEntry>,
    pub non_matching: Vec<Mismatch>,
    pub unreadable: Vec<Unreadable>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.non_matching.is_empty() && self.unreadable.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub profile: String,
    pub slave_id: u8,
    pub written: Vec<RegisterEntry>,
    pub failed: Vec<RegisterEntry>,
}

/// Reads every profile register and sorts it into matching, non-matching or unreadable.
pub async fn verify(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    profile: &RegisterProfile,
) -> TstatResult<VerifyReport> {
    info!(
        "Verifying tstat {} against profile {} ({} registers)",
        slave_id,
        profile.name,
        profile.len()
    );

    let mut report = VerifyReport {
        profile: profile.name.clone(),
        slave_id,
        matching: Vec::new(),
        non_matching: Vec::new(),
        unreadable: Vec::new(),
    };

    let mut session = ModbusSession::open(connector, config).await?;

    for (index, entry) in profile.entries.iter().enumerate() {
        if index > 0 {
            session.pause().await;
        }
        match session.read_register(entry.address, slave_id).await {
            Ok(actual) if actual == entry.value => report.matching.push(*entry),
            Ok(actual) => report.non_matching.push(Mismatch {
                address: entry.address,
                expected: entry.value,
                actual,
            }),
            Err(e) => {
                warn!("Error reading register {}: {}", entry.address, e);
                report.unreadable.push(Unreadable {
                    address: entry.address,
                    expected: entry.value,
                    error: e.to_string(),
                });
            }
        }
    }

    session.close().await;
    Ok(report)
}

/// Writes every profile entry, whether or not it already matches.
pub async fn fix(
    connector: &dyn Connector,
    config: &Config,
    slave_id: u8,
    profile: &RegisterProfile,
) -> TstatResult<FixReport> {
    info!("Fixing tstat {} with profile {}", slave_id, profile.name);

    let mut report = FixReport {
        profile: profile.name.clone(),
        slave_id,
        written: Vec::with_capacity(profile.len()),
        failed: Vec::new(),
    };

    let mut session = ModbusSession::open(connector, config).await?;

    for (index, entry) in profile.entries.iter().enumerate() {
        if index > 0 {
            session.pause().await;
        }
        info!("Writing {}", entry);
        match session.write_register(entry.address, entry.value, slave_id).await {
            Ok(()) => report.written.push(*entry),
            Err(e) => {
                error!("Error writing register {}: {}", entry.address, e);
                report.failed.push(*entry);
            }
        }
    }

    session.close().await;
    Ok(report)
}
