pub mod convert_use_case;
pub mod ports;
