pub mod carrier_sync;
pub mod costas;
pub mod detector;
pub mod error;
pub mod lut;
pub mod psk;

pub use costas::{CostasConfig, CostasLoop};
pub use detector::Order;
pub use error::ConfigError;
