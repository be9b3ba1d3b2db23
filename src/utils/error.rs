use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::model::{VehicleCategory, VehicleId};

#[derive(Error, Debug)]
pub enum ParkingError {
    #[error("Parking is full: all {capacity} spaces are occupied")]
    CapacityExceeded { capacity: usize },

    #[error("Invalid recharge amount: {amount} (must be greater than zero)")]
    InvalidAmount { amount: Decimal },

    #[error("Invalid initial balance: {balance} (must be zero or more)")]
    InvalidInitialBalance { balance: Decimal },

    #[error("Balance of vehicle {id} would overflow")]
    BalanceOverflow { id: VehicleId },

    #[error("Total revenue would overflow")]
    RevenueOverflow,

    #[error("Vehicle {id} has an outstanding balance of {balance}")]
    OutstandingBalance { id: VehicleId, balance: Decimal },

    #[error("No parking price configured for category {category}")]
    UnknownCategory { category: VehicleCategory },

    #[error("Parking engine must be started inside a tokio runtime")]
    RuntimeUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parking,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ParkingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ParkingError::CapacityExceeded { .. }
            | ParkingError::InvalidAmount { .. }
            | ParkingError::InvalidInitialBalance { .. }
            | ParkingError::BalanceOverflow { .. }
            | ParkingError::RevenueOverflow
            | ParkingError::OutstandingBalance { .. }
            | ParkingError::UnknownCategory { .. } => ErrorCategory::Parking,
            ParkingError::ConfigError { .. }
            | ParkingError::InvalidConfigValueError { .. }
            | ParkingError::MissingConfigError { .. }
            | ParkingError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ParkingError::RuntimeUnavailable | ParkingError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 使用者可以自行修正後重試
            ParkingError::CapacityExceeded { .. }
            | ParkingError::InvalidAmount { .. }
            | ParkingError::InvalidInitialBalance { .. }
            | ParkingError::BalanceOverflow { .. }
            | ParkingError::OutstandingBalance { .. } => ErrorSeverity::Low,
            ParkingError::RevenueOverflow => ErrorSeverity::High,
            ParkingError::ConfigError { .. }
            | ParkingError::InvalidConfigValueError { .. }
            | ParkingError::MissingConfigError { .. }
            | ParkingError::ConfigValidationError { .. } => ErrorSeverity::High,
            ParkingError::IoError(_) => ErrorSeverity::Medium,
            // 定價表缺項屬於程式不變量被破壞
            ParkingError::UnknownCategory { .. } | ParkingError::RuntimeUnavailable => {
                ErrorSeverity::Critical
            }
        }
    }

    /// 是否為呼叫端可以修正後重試的錯誤
    pub fn is_recoverable(&self) -> bool {
        self.severity() == ErrorSeverity::Low
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ParkingError::CapacityExceeded { .. } => {
                "Wait for a vehicle to leave before admitting a new one"
            }
            ParkingError::InvalidAmount { .. } => "Enter a recharge amount greater than zero",
            ParkingError::InvalidInitialBalance { .. } => "Enter a starting balance of zero or more",
            ParkingError::BalanceOverflow { .. } => "Use a smaller amount",
            ParkingError::RevenueOverflow => "Restart the engine to reset the revenue total",
            ParkingError::OutstandingBalance { .. } => {
                "Recharge the vehicle until its balance is zero or more, then remove it"
            }
            ParkingError::UnknownCategory { .. } => {
                "Add a price for every vehicle category in the [prices] table"
            }
            ParkingError::RuntimeUnavailable => "Start the engine from within a tokio runtime",
            ParkingError::IoError(_) => "Check that the file exists and is readable",
            ParkingError::ConfigError { .. }
            | ParkingError::InvalidConfigValueError { .. }
            | ParkingError::MissingConfigError { .. }
            | ParkingError::ConfigValidationError { .. } => {
                "Fix the configuration file and restart"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ParkingError::CapacityExceeded { capacity } => {
                format!("There are no free spaces left (capacity {})", capacity)
            }
            ParkingError::InvalidAmount { .. } => {
                "The recharge amount must be greater than zero".to_string()
            }
            ParkingError::InvalidInitialBalance { .. } => {
                "The starting balance cannot be negative".to_string()
            }
            ParkingError::BalanceOverflow { id } => {
                format!("The balance of vehicle {} cannot grow that large", id)
            }
            ParkingError::OutstandingBalance { id, balance } => format!(
                "Vehicle {} cannot leave until its debt of {} is paid",
                id,
                balance.abs().normalize()
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParkingError>;
