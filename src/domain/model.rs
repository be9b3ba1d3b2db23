use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type VehicleId = u64;

/// 顯示金額時保留的最大小數位數
const DISPLAY_SCALE: u32 = 10;

pub fn display_amount(amount: Decimal) -> Decimal {
    amount.round_dp(DISPLAY_SCALE).normalize()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Passenger,
    Truck,
    Bus,
    Motorcycle,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 4] = [
        VehicleCategory::Passenger,
        VehicleCategory::Truck,
        VehicleCategory::Bus,
        VehicleCategory::Motorcycle,
    ];

    /// Numeric code used by the menu (1 = passenger ... 4 = motorcycle).
    pub fn code(self) -> u8 {
        match self {
            VehicleCategory::Passenger => 1,
            VehicleCategory::Truck => 2,
            VehicleCategory::Bus => 3,
            VehicleCategory::Motorcycle => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VehicleCategory::Passenger => "passenger",
            VehicleCategory::Truck => "truck",
            VehicleCategory::Bus => "bus",
            VehicleCategory::Motorcycle => "motorcycle",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for VehicleCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        VehicleCategory::ALL
            .into_iter()
            .find(|c| c.name() == needle || c.code().to_string() == needle)
            .ok_or_else(|| {
                format!(
                    "unknown vehicle category '{}' (expected passenger, truck, bus, motorcycle or 1-4)",
                    s.trim()
                )
            })
    }
}

/// A vehicle currently parked. A negative balance is an unpaid fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub balance: Decimal,
    pub category: VehicleCategory,
}

impl Vehicle {
    pub fn new(id: VehicleId, category: VehicleCategory, balance: Decimal) -> Self {
        Self {
            id,
            balance,
            category,
        }
    }

    pub fn has_debt(&self) -> bool {
        self.balance < Decimal::ZERO
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} Balance: {} Category: {}",
            self.id,
            display_amount(self.balance),
            self.category
        )
    }
}

/// One successful tick charge. Fines never produce a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    timestamp: DateTime<Local>,
    vehicle_id: VehicleId,
    amount: Decimal,
}

impl Transaction {
    /// Returns `None` for a negative amount.
    pub fn new(timestamp: DateTime<Local>, vehicle_id: VehicleId, amount: Decimal) -> Option<Self> {
        if amount < Decimal::ZERO {
            return None;
        }
        Some(Self {
            timestamp,
            vehicle_id,
            amount,
        })
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time: {} Vehicle ID: {} Debited: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.vehicle_id,
            display_amount(self.amount)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_parses_names_and_codes() {
        assert_eq!("Truck".parse::<VehicleCategory>().unwrap(), VehicleCategory::Truck);
        assert_eq!(" bus ".parse::<VehicleCategory>().unwrap(), VehicleCategory::Bus);
        assert_eq!("4".parse::<VehicleCategory>().unwrap(), VehicleCategory::Motorcycle);
        assert!("tractor".parse::<VehicleCategory>().is_err());
        assert!("5".parse::<VehicleCategory>().is_err());
    }

    #[test]
    fn test_vehicle_debt() {
        assert!(Vehicle::new(1, VehicleCategory::Passenger, dec!(-1.15)).has_debt());
        assert!(!Vehicle::new(2, VehicleCategory::Passenger, dec!(0)).has_debt());
        assert!(!Vehicle::new(3, VehicleCategory::Passenger, dec!(-0.00)).has_debt());
    }

    #[test]
    fn test_transaction_rejects_negative_amount() {
        let now = Local::now();
        assert!(Transaction::new(now, 1, dec!(-3)).is_none());
        let tx = Transaction::new(now, 1, dec!(3)).unwrap();
        assert_eq!(tx.vehicle_id(), 1);
        assert_eq!(tx.amount(), dec!(3));
    }

    #[test]
    fn test_vehicle_display_normalizes_balance() {
        let vehicle = Vehicle::new(5, VehicleCategory::Bus, dec!(0.8500));
        assert_eq!(vehicle.to_string(), "ID: 5 Balance: 0.85 Category: bus");
    }
}
