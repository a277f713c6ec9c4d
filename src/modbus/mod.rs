pub mod client;
pub mod session;

#[cfg(test)]
pub mod mock;

pub use client::{list_serial_ports, Connector, ModbusClient, ModbusClientTrait, PortSummary, SerialConnector};
pub use session::ModbusSession;
