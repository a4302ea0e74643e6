//! Modbus TCP 设备驱动
//!
//! 点位名即线上地址（`hr:100`、`ir:3`、`coil:5`、`di:2`），声明类型决定寄存器数量与解码方式。
//! Modbus 不支持任意地址的单次批量读取，同批点位按顺序逐个请求。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let registry = DriverRegistry::new()
//!     .with(ControllerFamily::ModbusTcp, Arc::new(ModbusTcpDriver::default()));
//! ```

use crate::driver::{DeviceDriver, DeviceLink, TagOutcome, TagRequest};
use crate::error::ProtocolError;
use crate::types::{ModbusAddress, ModbusArea, decode_bits, decode_registers, register_count};
use async_trait::async_trait;
use domain::{ConnectionDescriptor, DataType};
use std::net::SocketAddr;
use tokio_modbus::prelude::*;
use tracing::debug;

fn default_modbus_port() -> u16 {
    502
}

/// Modbus TCP 驱动
#[derive(Debug, Clone)]
pub struct ModbusTcpDriver {
    default_port: u16,
}

impl ModbusTcpDriver {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

impl Default for ModbusTcpDriver {
    fn default() -> Self {
        Self::new(default_modbus_port())
    }
}

async fn resolve(address: &str, default_port: u16) -> Result<SocketAddr, ProtocolError> {
    let target = if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, default_port)
    };
    tokio::net::lookup_host(&target)
        .await?
        .next()
        .ok_or_else(|| ProtocolError::ConfigParse(format!("invalid address: {}", target)))
}

#[async_trait]
impl DeviceDriver for ModbusTcpDriver {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DeviceLink>, ProtocolError> {
        let addr = resolve(&descriptor.address, self.default_port).await?;
        let unit = descriptor.effective_slot().unwrap_or(1);
        let ctx = tcp::connect_slave(addr, Slave(unit))
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        debug!(target: "plc.session", %addr, unit, "modbus link established");
        Ok(Box::new(ModbusLink { ctx }))
    }
}

struct ModbusLink {
    ctx: tokio_modbus::client::Context,
}

impl ModbusLink {
    /// 外层 `Err` 为传输失败（整条链路失效），内层为点位级结果。
    async fn read_one(
        &mut self,
        address: ModbusAddress,
        data_type: DataType,
    ) -> Result<TagOutcome, ProtocolError> {
        match address.area {
            ModbusArea::HoldingRegister | ModbusArea::InputRegister => {
                let count = match register_count(data_type) {
                    Ok(count) => count,
                    Err(reason) => return Ok(Err(reason)),
                };
                let response = if address.area == ModbusArea::HoldingRegister {
                    self.ctx.read_holding_registers(address.address, count).await
                } else {
                    self.ctx.read_input_registers(address.address, count).await
                };
                match response.map_err(|e| ProtocolError::Modbus(e.to_string()))? {
                    Ok(registers) => Ok(decode_registers(&registers, data_type)),
                    Err(exception) => Ok(Err(format!("exception: {:?}", exception))),
                }
            }
            ModbusArea::Coil | ModbusArea::DiscreteInput => {
                let response = if address.area == ModbusArea::Coil {
                    self.ctx.read_coils(address.address, 1).await
                } else {
                    self.ctx.read_discrete_inputs(address.address, 1).await
                };
                match response.map_err(|e| ProtocolError::Modbus(e.to_string()))? {
                    Ok(bits) => Ok(decode_bits(&bits, data_type)),
                    Err(exception) => Ok(Err(format!("exception: {:?}", exception))),
                }
            }
        }
    }
}

#[async_trait]
impl DeviceLink for ModbusLink {
    async fn read_batch(
        &mut self,
        tags: &[TagRequest],
    ) -> Result<Vec<(String, TagOutcome)>, ProtocolError> {
        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let address = match tag.name.parse::<ModbusAddress>() {
                Ok(address) => address,
                Err(err) => {
                    results.push((tag.name.clone(), Err(err.to_string())));
                    continue;
                }
            };
            let outcome = self.read_one(address, tag.data_type).await?;
            results.push((tag.name.clone(), outcome));
        }
        Ok(results)
    }

    async fn ping(&mut self) -> Result<(), ProtocolError> {
        // 异常响应同样说明从站在线
        let _response = self
            .ctx
            .read_holding_registers(0, 1)
            .await
            .map_err(|e| ProtocolError::Modbus(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        if let Err(err) = self.ctx.disconnect().await {
            debug!(target: "plc.session", error = %err, "modbus disconnect failed");
        }
        Ok(())
    }
}
