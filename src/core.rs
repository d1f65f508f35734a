pub mod charge_discharge;
pub mod cid;
pub mod inverter;
pub mod storage_mode;
pub mod time_range;
