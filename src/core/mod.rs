pub mod parking;
pub(crate) mod scheduler;

pub use crate::domain::model::{Transaction, Vehicle, VehicleCategory, VehicleId};
pub use crate::domain::ports::{Clock, RevenueLog};
pub use crate::utils::error::Result;
pub use parking::{FlushReport, ParkSnapshot, ParkingLot, TickReport};
