//! Modbus 点位寻址与寄存器解码

use crate::error::ProtocolError;
use domain::{DataType, TagValue};
use std::str::FromStr;

/// Modbus 数据区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusArea {
    /// 线圈 (0x01)
    Coil,
    /// 离散输入 (0x02)
    DiscreteInput,
    /// 保持寄存器 (0x03)
    HoldingRegister,
    /// 输入寄存器 (0x04)
    InputRegister,
}

impl ModbusArea {
    pub fn is_bit(&self) -> bool {
        matches!(self, ModbusArea::Coil | ModbusArea::DiscreteInput)
    }
}

/// Modbus 点位地址：点位名即 `<area>:<address>`，如 `hr:100`、`coil:5`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusAddress {
    pub area: ModbusArea,
    pub address: u16,
}

impl FromStr for ModbusAddress {
    type Err = ProtocolError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let (area, address) = tag
            .split_once(':')
            .ok_or_else(|| ProtocolError::ConfigParse(format!("expected <area>:<address>, got {}", tag)))?;
        let area = match area.trim().to_ascii_lowercase().as_str() {
            "hr" => ModbusArea::HoldingRegister,
            "ir" => ModbusArea::InputRegister,
            "coil" => ModbusArea::Coil,
            "di" => ModbusArea::DiscreteInput,
            other => {
                return Err(ProtocolError::ConfigParse(format!(
                    "unknown modbus area: {}",
                    other
                )));
            }
        };
        let address = address
            .trim()
            .parse::<u16>()
            .map_err(|e| ProtocolError::ConfigParse(format!("invalid address {}: {}", address, e)))?;
        Ok(Self { area, address })
    }
}

/// 声明类型所需的寄存器数量。
pub fn register_count(data_type: DataType) -> Result<u16, String> {
    match data_type {
        DataType::Auto | DataType::Bool | DataType::Int16 | DataType::Uint16 => Ok(1),
        DataType::Int32 | DataType::Uint32 | DataType::Float32 => Ok(2),
        DataType::Int64 | DataType::Float64 => Ok(4),
        DataType::String => Err("string tags are not supported over modbus".to_string()),
    }
}

/// 按声明类型解码寄存器（大端字序，高位寄存器在前）。
pub fn decode_registers(registers: &[u16], data_type: DataType) -> Result<TagValue, String> {
    let needed = register_count(data_type)? as usize;
    if registers.len() < needed {
        return Err(format!(
            "need {} registers for {:?}, got {}",
            needed,
            data_type,
            registers.len()
        ));
    }

    let value = match data_type {
        DataType::Auto | DataType::Int16 => TagValue::Integer(registers[0] as i16 as i64),
        DataType::Uint16 => TagValue::Integer(registers[0] as i64),
        DataType::Bool => TagValue::Boolean(registers[0] != 0),
        DataType::Int32 => TagValue::Integer(join_u32(registers) as i32 as i64),
        DataType::Uint32 => TagValue::Integer(join_u32(registers) as i64),
        DataType::Float32 => TagValue::Float(f32::from_bits(join_u32(registers)) as f64),
        DataType::Int64 => TagValue::Integer(join_u64(registers) as i64),
        DataType::Float64 => TagValue::Float(f64::from_bits(join_u64(registers))),
        DataType::String => {
            return Err("string tags are not supported over modbus".to_string());
        }
    };
    Ok(value)
}

/// 位区（线圈 / 离散输入）只能解码为布尔。
pub fn decode_bits(bits: &[bool], data_type: DataType) -> Result<TagValue, String> {
    match data_type {
        DataType::Auto | DataType::Bool => bits
            .first()
            .map(|bit| TagValue::Boolean(*bit))
            .ok_or_else(|| "empty response".to_string()),
        other => Err(format!("{:?} is not valid for a bit area", other)),
    }
}

fn join_u32(registers: &[u16]) -> u32 {
    ((registers[0] as u32) << 16) | registers[1] as u32
}

fn join_u64(registers: &[u16]) -> u64 {
    ((registers[0] as u64) << 48)
        | ((registers[1] as u64) << 32)
        | ((registers[2] as u64) << 16)
        | registers[3] as u64
}
