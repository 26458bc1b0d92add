use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal::prelude::ToPrimitive;

use crate::Error;

/// How the registers behind a variable are decoded and encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// One register, `0` is off, anything else is on.
    Bool,
    /// One signed register scaled by a power of ten
    /// (`scale: -1` means the register holds tenths).
    Numeric { scale: i8 },
    /// `length` registers of NUL-padded big-endian ASCII.
    String { length: u16 },
}

impl ValueType {
    fn kind(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Numeric { .. } => "numeric",
            ValueType::String { .. } => "string",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Numeric(Decimal),
    String(String),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Numeric(_) => "numeric",
            Value::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Immutable descriptor of one logical variable of the ventilation unit:
/// where it lives in the holding register space and how to decode it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModbusVariable {
    address: u16,
    value_type: ValueType,
}

impl ModbusVariable {
    pub const fn new(address: u16, value_type: ValueType) -> Self {
        Self {
            address,
            value_type,
        }
    }

    pub const fn bool(address: u16) -> Self {
        Self::new(address, ValueType::Bool)
    }

    pub const fn numeric(address: u16, scale: i8) -> Self {
        Self::new(address, ValueType::Numeric { scale })
    }

    pub const fn string(address: u16, length: u16) -> Self {
        Self::new(address, ValueType::String { length })
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Number of registers to read or write for this variable.
    pub fn size(&self) -> u16 {
        match self.value_type {
            ValueType::Bool | ValueType::Numeric { .. } => 1,
            ValueType::String { length } => length,
        }
    }

    pub fn decode(&self, words: &[u16]) -> crate::Result<Value> {
        if words.len() < self.size() as usize {
            return Err(Error::Decode(
                format!(
                    "short read at {}: got {} of {} registers",
                    self.address,
                    words.len(),
                    self.size()
                )
                .into(),
            ));
        }

        match self.value_type {
            ValueType::Bool => Ok(Value::Bool(words[0] != 0)),
            ValueType::Numeric { scale } => {
                let scale = Decimal::TEN.powi(scale.into()).normalize();
                let raw = Decimal::from(words[0] as i16);
                Ok(Value::Numeric((raw * scale).normalize()))
            }
            ValueType::String { length } => {
                let mut bytes: Vec<u8> = words[..length as usize]
                    .iter()
                    .flat_map(|word| word.to_be_bytes())
                    .collect();
                let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
                bytes.truncate(end);

                if !bytes.is_ascii() {
                    return Err(Error::Decode(
                        format!("non-ASCII string register at {}", self.address).into(),
                    ));
                }
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|_| Error::Decode("invalid string register".into()))
            }
        }
    }

    pub fn encode(&self, value: &Value) -> crate::Result<Vec<u16>> {
        match (self.value_type, value) {
            (ValueType::Bool, Value::Bool(value)) => Ok(vec![u16::from(*value)]),
            (ValueType::Numeric { scale }, Value::Numeric(value)) => {
                let scale = Decimal::TEN.powi(scale.into()).normalize();
                let raw = (*value / scale).round().to_i16().ok_or_else(|| {
                    Error::Decode(
                        format!("value {value} out of range for register {}", self.address).into(),
                    )
                })?;
                Ok(vec![raw as u16])
            }
            (ValueType::String { length }, Value::String(value)) => {
                if !value.is_ascii() {
                    return Err(Error::Decode("string registers are ASCII only".into()));
                }
                let capacity = usize::from(length) * 2;
                if value.len() > capacity {
                    return Err(Error::Decode(
                        format!(
                            "string of {} bytes exceeds the {capacity} byte register window",
                            value.len()
                        )
                        .into(),
                    ));
                }

                let mut bytes = value.as_bytes().to_vec();
                bytes.resize(capacity, 0);
                Ok(bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect())
            }
            (expected, got) => Err(Error::ValueKind {
                expected: expected.kind(),
                got: got.kind(),
            }),
        }
    }
}
