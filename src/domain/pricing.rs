use crate::domain::model::VehicleCategory;
use crate::utils::error::{ParkingError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Per-tick price for each vehicle category.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    prices: HashMap<VehicleCategory, Decimal>,
}

impl PricingTable {
    pub fn new(prices: HashMap<VehicleCategory, Decimal>) -> Self {
        Self { prices }
    }

    /// Returns the tick price, or `UnknownCategory` if the table has no entry.
    pub fn price_for(&self, category: VehicleCategory) -> Result<Decimal> {
        self.prices
            .get(&category)
            .copied()
            .ok_or(ParkingError::UnknownCategory { category })
    }

    pub fn iter(&self) -> impl Iterator<Item = (VehicleCategory, Decimal)> + '_ {
        VehicleCategory::ALL
            .into_iter()
            .filter_map(|c| self.prices.get(&c).map(|p| (c, *p)))
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new(HashMap::from([
            (VehicleCategory::Truck, dec!(5)),
            (VehicleCategory::Passenger, dec!(3)),
            (VehicleCategory::Bus, dec!(2)),
            (VehicleCategory::Motorcycle, dec!(1)),
        ]))
    }
}
