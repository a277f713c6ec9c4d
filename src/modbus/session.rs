use log::{debug, warn};
use std::time::Duration;

use super::client::{Connector, ModbusClientTrait};
use crate::config::settings::Config;
use crate::utils::error::{TstatError, TstatResult};

/// One serial connection, open for the duration of a single operation.
///
/// Every logical write is sent twice back to back and only the second
/// acknowledgement decides the outcome; RTU noise on the shared line drops
/// single writes often enough that the field tools always did this.
///
/// `close` disconnects cleanly. If a session is dropped without it (early
/// return, cancellation) the client and its serial port are still released.
pub struct ModbusSession {
    client: Option<Box<dyn ModbusClientTrait>>,
    pacing: Duration,
}

impl ModbusSession {
    pub async fn open(connector: &dyn Connector, config: &Config) -> TstatResult<Self> {
        let client = connector.connect(config).await?;
        debug!("Session opened on {}", config.device);
        Ok(Self {
            client: Some(client),
            pacing: config.pacing(),
        })
    }

    fn client(&mut self) -> TstatResult<&mut Box<dyn ModbusClientTrait>> {
        self.client
            .as_mut()
            .ok_or_else(|| TstatError::ConnectionError("Session already closed".to_string()))
    }

    pub async fn read_register(&mut self, address: u16, slave_id: u8) -> TstatResult<u16> {
        let values = self.read_registers(address, 1, slave_id).await?;
        values.first().copied().ok_or_else(|| {
            TstatError::CommunicationError(format!("Empty response reading register {}", address))
        })
    }

    pub async fn read_registers(&mut self, address: u16, count: u16, slave_id: u8) -> TstatResult<Vec<u16>> {
        self.client()?.read_holding_registers(slave_id, address, count).await
    }

    pub async fn write_register(&mut self, address: u16, value: u16, slave_id: u8) -> TstatResult<()> {
        let client = self.client()?;
        if let Err(e) = client.write_single_register(slave_id, address, value).await {
            debug!("First write of {} to register {} not acknowledged: {}", value, address, e);
        }
        client.write_single_register(slave_id, address, value).await
    }

    /// Bus turnaround delay between consecutive requests.
    pub async fn pause(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }

    pub async fn close(mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                warn!("Error closing session: {}", e);
            }
            debug!("Session closed");
        }
    }
}

impl Drop for ModbusSession {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            debug!("Session dropped before close, serial port released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::mock::{test_config, MockBus, Request};

    #[tokio::test]
    async fn test_write_is_sent_twice() {
        let bus = MockBus::new().with_device(5, &[(100, 0)]);
        let mut session = ModbusSession::open(&bus.connector(), &test_config(Some(5))).await.unwrap();

        session.write_register(100, 42, 5).await.unwrap();
        session.close().await;

        assert_eq!(bus.writes(), vec![(5, 100, 42), (5, 100, 42)]);
        assert_eq!(bus.value(5, 100), Some(42));
        assert_eq!(bus.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_only_second_write_decides() {
        let bus = MockBus::new().with_device(5, &[(100, 0), (101, 0)]);
        bus.fail_write_attempts(5, 100, &[1]);
        bus.fail_write_attempts(5, 101, &[2]);
        let mut session = ModbusSession::open(&bus.connector(), &test_config(Some(5))).await.unwrap();

        assert!(session.write_register(100, 1, 5).await.is_ok());
        assert!(session.write_register(101, 1, 5).await.is_err());
        session.close().await;

        assert_eq!(bus.writes().len(), 4);
    }

    #[tokio::test]
    async fn test_read_register() {
        let bus = MockBus::new().with_device(9, &[(7, 93)]);
        let mut session = ModbusSession::open(&bus.connector(), &test_config(Some(9))).await.unwrap();

        assert_eq!(session.read_register(7, 9).await.unwrap(), 93);
        assert!(matches!(session.read_register(7, 10).await, Err(TstatError::Timeout)));
        assert!(matches!(
            session.read_register(8, 9).await,
            Err(TstatError::ExceptionResponse { slave: 9, .. })
        ));
        session.close().await;

        assert_eq!(
            bus.requests()[0],
            Request::Read { slave: 9, address: 7, count: 1 }
        );
    }

    #[tokio::test]
    async fn test_dropped_session_releases_client() {
        let bus = MockBus::new().with_device(1, &[(7, 93)]);
        {
            let _session = ModbusSession::open(&bus.connector(), &test_config(Some(1))).await.unwrap();
        }
        assert_eq!(bus.connects(), 1);
        assert_eq!(bus.disconnects(), 0);
    }
}
