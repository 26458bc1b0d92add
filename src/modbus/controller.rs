use std::io;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_modbus::client::{tcp, Context as ModbusClient, Reader, Writer};
use tokio_modbus::slave::Slave;
use tracing::{debug, warn};

use super::variable::{ModbusVariable, Value};
use super::variables;
use crate::bridge::ConfigEntry;
use crate::mac::MacAddress;
use crate::Error;

/// Wire access to one unit's holding registers. Production code uses the
/// tokio-modbus TCP context; tests substitute recording fakes.
#[async_trait]
pub trait Transport: Send {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>>;
    async fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> io::Result<()>;
}

#[async_trait]
impl Transport for ModbusClient {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        Reader::read_holding_registers(self, address, count).await
    }

    async fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> io::Result<()> {
        Writer::write_multiple_registers(self, address, words).await
    }
}

/// Owns the single Modbus-TCP connection to one ventilation unit.
///
/// Every entity of the unit polls through the same controller; the mutex
/// around the transport serializes their register traffic so request and
/// response pairs never interleave on the shared connection.
pub struct Controller {
    device_name: String,
    host: String,
    mac: MacAddress,
    serial_number: String,
    model: String,
    version: String,
    transport: Mutex<Box<dyn Transport>>,
}

impl Controller {
    /// Opens the connection and reads the identity registers once. Fails if
    /// the unit is unreachable or its identity data is malformed; nothing may
    /// poll a controller that did not finish this.
    pub async fn connect(entry: &ConfigEntry) -> crate::Result<Self> {
        let socket_addr = format!("{}:{}", entry.host, entry.port).parse()?;
        let client = tcp::connect_slave(socket_addr, Slave(entry.unit)).await?;
        Self::init(
            entry.name.clone(),
            entry.host.clone(),
            entry.mac,
            Box::new(client),
        )
        .await
    }

    pub(crate) async fn init(
        device_name: String,
        host: String,
        mac: MacAddress,
        mut transport: Box<dyn Transport>,
    ) -> crate::Result<Self> {
        let model = read_identity(transport.as_mut(), &variables::MODEL).await?;
        let serial_number = read_identity(transport.as_mut(), &variables::SERIAL_NUMBER).await?;
        let version = read_identity(transport.as_mut(), &variables::FIRMWARE_VERSION).await?;

        Ok(Self {
            device_name,
            host,
            mac,
            serial_number,
            model,
            version,
            transport: Mutex::new(transport),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads and decodes a variable. Transport and decode failures degrade to
    /// `None`; a poll that misses a cycle is not an error worth raising.
    pub async fn get_variable(&self, variable: &ModbusVariable) -> Option<Value> {
        let words = {
            let mut transport = self.transport.lock().await;
            match transport
                .read_holding_registers(variable.address(), variable.size())
                .await
            {
                Ok(words) => words,
                Err(error) => {
                    debug!(address = variable.address(), %error, "register read failed");
                    return None;
                }
            }
        };

        match variable.decode(&words) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(address = variable.address(), %error, "register decode failed");
                None
            }
        }
    }

    /// Encodes and writes a variable. Unlike polling, a commanded write that
    /// fails is reported to the caller.
    pub async fn set_variable(
        &self,
        variable: &ModbusVariable,
        value: &Value,
    ) -> crate::Result<()> {
        let words = variable.encode(value)?;

        let mut transport = self.transport.lock().await;
        transport
            .write_multiple_registers(variable.address(), &words)
            .await?;
        Ok(())
    }
}

async fn read_identity(
    transport: &mut dyn Transport,
    variable: &ModbusVariable,
) -> crate::Result<String> {
    let words = transport
        .read_holding_registers(variable.address(), variable.size())
        .await?;

    let value = variable.decode(&words).map_err(|error| {
        Error::Identity(format!("identity register {}: {error}", variable.address()).into())
    })?;

    match value.as_str() {
        Some(identity) if !identity.is_empty() => Ok(identity.to_owned()),
        _ => Err(Error::Identity(
            format!("identity register {} is empty", variable.address()).into(),
        )),
    }
}
