//! Scripted in-memory bus for exercising operations without hardware.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::client::{Connector, ModbusClientTrait};
use crate::config::settings::Config;
use crate::devices::tstat7;
use crate::utils::error::{TstatError, TstatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read { slave: u8, address: u16, count: u16 },
    Write { slave: u8, address: u16, value: u16 },
}

#[derive(Debug, Default)]
struct BusState {
    registers: HashMap<(u8, u16), u16>,
    frozen: HashMap<(u8, u16), u16>,
    failing_reads: HashSet<(u8, u16)>,
    failing_writes: HashSet<(u8, u16)>,
    failing_write_attempts: HashMap<(u8, u16), Vec<usize>>,
    write_attempts: HashMap<(u8, u16), usize>,
    pending_move: Option<(u8, u8)>,
    requests: Vec<Request>,
    refuse_connect: bool,
    connects: usize,
    disconnects: usize,
}

impl BusState {
    fn responds(&self, slave: u8) -> bool {
        self.registers.keys().any(|(s, _)| *s == slave)
    }

    // A relocated device answers on its new address once the write exchange is over.
    fn apply_pending_move(&mut self) {
        if let Some((from, to)) = self.pending_move.take() {
            let moved: Vec<((u8, u16), u16)> = self
                .registers
                .iter()
                .filter(|((s, _), _)| *s == from)
                .map(|(k, v)| (*k, *v))
                .collect();
            for ((_, address), value) in moved {
                self.registers.remove(&(from, address));
                self.registers.insert((to, address), value);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap()
    }

    /// Adds a device answering at `slave` with the given registers.
    pub fn with_device(self, slave: u8, registers: &[(u16, u16)]) -> Self {
        {
            let mut state = self.state();
            for &(address, value) in registers {
                state.registers.insert((slave, address), value);
            }
        }
        self
    }

    /// The register keeps reading `value` whatever is written to it.
    pub fn freeze(&self, slave: u8, address: u16, value: u16) {
        self.state().frozen.insert((slave, address), value);
    }

    pub fn fail_reads(&self, slave: u8, address: u16) {
        self.state().failing_reads.insert((slave, address));
    }

    pub fn fail_writes(&self, slave: u8, address: u16) {
        self.state().failing_writes.insert((slave, address));
    }

    /// Fails only the given physical write attempts (1-based) to a register.
    pub fn fail_write_attempts(&self, slave: u8, address: u16, attempts: &[usize]) {
        self.state()
            .failing_write_attempts
            .insert((slave, address), attempts.to_vec());
    }

    pub fn refuse_connect(&self) {
        self.state().refuse_connect = true;
    }

    pub fn value(&self, slave: u8, address: u16) -> Option<u16> {
        self.state().registers.get(&(slave, address)).copied()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    pub fn writes(&self) -> Vec<(u8, u16, u16)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Write { slave, address, value } => Some((slave, address, value)),
                Request::Read { .. } => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u8, u16)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Read { slave, address, .. } => Some((slave, address)),
                Request::Write { .. } => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector { bus: self.clone() }
    }
}

pub struct MockClient {
    bus: MockBus,
}

#[async_trait]
impl ModbusClientTrait for MockClient {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> TstatResult<Vec<u16>> {
        let mut state = self.bus.state();
        state.apply_pending_move();
        state.requests.push(Request::Read {
            slave: slave_id,
            address: start_addr,
            count,
        });

        if !state.responds(slave_id) {
            return Err(TstatError::Timeout);
        }

        let mut values = Vec::with_capacity(count as usize);
        for address in start_addr..start_addr.saturating_add(count) {
            if state.failing_reads.contains(&(slave_id, address)) {
                return Err(TstatError::Timeout);
            }
            let value = match state.frozen.get(&(slave_id, address)) {
                Some(v) => *v,
                None => *state.registers.get(&(slave_id, address)).ok_or_else(|| {
                    TstatError::ExceptionResponse {
                        slave: slave_id,
                        code: "IllegalDataAddress".to_string(),
                    }
                })?,
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn write_single_register(
        &mut self,
        slave_id: u8,
        register_addr: u16,
        value: u16,
    ) -> TstatResult<()> {
        let mut state = self.bus.state();
        state.requests.push(Request::Write {
            slave: slave_id,
            address: register_addr,
            value,
        });

        let key = (slave_id, register_addr);
        let attempt = {
            let counter = state.write_attempts.entry(key).or_insert(0);
            *counter += 1;
            *counter
        };

        if !state.responds(slave_id) || state.failing_writes.contains(&key) {
            return Err(TstatError::Timeout);
        }
        if state
            .failing_write_attempts
            .get(&key)
            .map_or(false, |attempts| attempts.contains(&attempt))
        {
            return Err(TstatError::Timeout);
        }

        if register_addr == tstat7::MODBUS_ADDRESS {
            state.pending_move = Some((slave_id, value as u8));
        }
        state.registers.insert(key, value);
        Ok(())
    }

    async fn disconnect(&mut self) -> TstatResult<()> {
        self.bus.state().disconnects += 1;
        Ok(())
    }
}

pub struct MockConnector {
    bus: MockBus,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &Config) -> TstatResult<Box<dyn ModbusClientTrait>> {
        {
            let mut state = self.bus.state();
            if state.refuse_connect {
                return Err(TstatError::ConnectionError("Failed to open port".to_string()));
            }
            state.connects += 1;
        }
        Ok(Box::new(MockClient {
            bus: self.bus.clone(),
        }))
    }
}

/// Test configuration with bus pacing disabled.
pub fn test_config(slave_id: Option<u8>) -> Config {
    Config {
        slave_id,
        pacing_ms: 0,
        ..Config::default()
    }
}
