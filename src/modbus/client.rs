use async_trait::async_trait;
use log::{debug, error, info};
use serde::Serialize;
use std::time::Duration;
use tokio_modbus::prelude::*;
use tokio_serial::SerialStream;

use crate::config::settings::{Config, ParityConfig};
use crate::utils::error::{TstatError, TstatResult};

/// Physical request layer. One call is one frame on the wire.
#[async_trait]
pub trait ModbusClientTrait: Send {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> TstatResult<Vec<u16>>;

    async fn write_single_register(
        &mut self,
        slave_id: u8,
        register_addr: u16,
        value: u16,
    ) -> TstatResult<()>;

    async fn disconnect(&mut self) -> TstatResult<()>;
}

/// Opens a client for one operation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &Config) -> TstatResult<Box<dyn ModbusClientTrait>>;
}

/// RTU client over a local serial port.
pub struct ModbusClient {
    ctx: client::Context,
    timeout: Duration,
}

impl ModbusClient {
    pub fn new(config: &Config) -> TstatResult<Self> {
        info!("Connecting to Modbus RTU port: {}", config.device);
        debug!(
            "Configuration: {} baud, 8 data bits, 1 stop bit, parity {:?}",
            config.baud_rate, config.parity
        );

        let serial_parity = match config.parity {
            ParityConfig::None => tokio_serial::Parity::None,
            ParityConfig::Even => tokio_serial::Parity::Even,
            ParityConfig::Odd => tokio_serial::Parity::Odd,
        };

        let builder = tokio_serial::new(&config.device, config.baud_rate)
            .timeout(config.timeout())
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(serial_parity);

        let port = SerialStream::open(&builder).map_err(|e| {
            error!("Failed to open serial port {}: {}", config.device, e);
            TstatError::ConnectionError(format!("Failed to open port {}: {}", config.device, e))
        })?;

        Ok(Self {
            ctx: rtu::attach(port),
            timeout: config.timeout(),
        })
    }
}

fn flatten<T>(slave_id: u8, response: tokio_modbus::Result<T>) -> TstatResult<T> {
    match response {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(TstatError::ExceptionResponse {
            slave: slave_id,
            code: format!("{:?}", code),
        }),
        Err(e) => Err(TstatError::CommunicationError(e.to_string())),
    }
}

#[async_trait]
impl ModbusClientTrait for ModbusClient {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> TstatResult<Vec<u16>> {
        debug!("FC03 slave={} addr={} count={}", slave_id, start_addr, count);
        self.ctx.set_slave(Slave(slave_id));
        let response =
            tokio::time::timeout(self.timeout, self.ctx.read_holding_registers(start_addr, count)).await?;
        flatten(slave_id, response)
    }

    async fn write_single_register(
        &mut self,
        slave_id: u8,
        register_addr: u16,
        value: u16,
    ) -> TstatResult<()> {
        debug!("FC06 slave={} addr={} value={}", slave_id, register_addr, value);
        self.ctx.set_slave(Slave(slave_id));
        let response =
            tokio::time::timeout(self.timeout, self.ctx.write_single_register(register_addr, value)).await?;
        flatten(slave_id, response)
    }

    async fn disconnect(&mut self) -> TstatResult<()> {
        self.ctx
            .disconnect()
            .await
            .map_err(|e| TstatError::CommunicationError(format!("Disconnect failed: {}", e)))
    }
}

pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self, config: &Config) -> TstatResult<Box<dyn ModbusClientTrait>> {
        Ok(Box::new(ModbusClient::new(config)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

pub fn list_serial_ports() -> TstatResult<Vec<PortSummary>> {
    let ports = serialport::available_ports()
        .map_err(|e| TstatError::ConnectionError(format!("Cannot enumerate serial ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => PortSummary {
                name: port.port_name,
                kind: "usb".to_string(),
                manufacturer: usb.manufacturer,
                serial_number: usb.serial_number,
            },
            serialport::SerialPortType::PciPort => PortSummary {
                name: port.port_name,
                kind: "pci".to_string(),
                manufacturer: None,
                serial_number: None,
            },
            serialport::SerialPortType::BluetoothPort => PortSummary {
                name: port.port_name,
                kind: "bluetooth".to_string(),
                manufacturer: None,
                serial_number: None,
            },
            serialport::SerialPortType::Unknown => PortSummary {
                name: port.port_name,
                kind: "unknown".to_string(),
                manufacturer: None,
                serial_number: None,
            },
        })
        .collect())
}
