pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileRevenueLog, ManualClock, SystemClock};
pub use config::Settings;
pub use crate::core::{ParkSnapshot, ParkingLot};
pub use domain::model::{Transaction, Vehicle, VehicleCategory, VehicleId};
pub use domain::pricing::PricingTable;
pub use utils::error::{ParkingError, Result};
