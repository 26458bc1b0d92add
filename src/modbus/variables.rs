//! Register map of the EasyControls ventilation unit.

use super::variable::ModbusVariable;

// Identity registers, read once when a controller connects.
pub const MODEL: ModbusVariable = ModbusVariable::string(0, 16);
pub const SERIAL_NUMBER: ModbusVariable = ModbusVariable::string(303, 8);
pub const FIRMWARE_VERSION: ModbusVariable = ModbusVariable::string(1101, 8);

pub const PARTY_MODE: ModbusVariable = ModbusVariable::bool(94);

/// Current fan stage, 0 (off) to [`MAX_FAN_STAGE`].
pub const FAN_STAGE: ModbusVariable = ModbusVariable::numeric(102, 0);
pub const MAX_FAN_STAGE: u8 = 4;

// Temperatures are reported in tenths of a degree.
pub const OUTSIDE_AIR_TEMPERATURE: ModbusVariable = ModbusVariable::numeric(104, -1);
pub const SUPPLY_AIR_TEMPERATURE: ModbusVariable = ModbusVariable::numeric(105, -1);
pub const EXTRACT_AIR_TEMPERATURE: ModbusVariable = ModbusVariable::numeric(106, -1);
pub const EXHAUST_AIR_TEMPERATURE: ModbusVariable = ModbusVariable::numeric(107, -1);

/// Set while the unit is asking for a filter change.
pub const FILTER_CHANGE: ModbusVariable = ModbusVariable::bool(1033);

/// Set while the summer bypass flap is open.
pub const BYPASS: ModbusVariable = ModbusVariable::bool(2119);
