pub mod controller;
pub mod variable;
pub mod variables;

pub type UnitId = tokio_modbus::prelude::SlaveId;
