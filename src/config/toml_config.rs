use crate::domain::model::VehicleCategory;
use crate::domain::pricing::PricingTable;
use crate::utils::error::{ParkingError, Result};
use crate::utils::validation::{self, Validate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CAPACITY: u64 = 50;
pub const DEFAULT_TICK_INTERVAL_SECONDS: u64 = 3;
pub const DEFAULT_FLUSH_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_FINE_MULTIPLIER: Decimal = dec!(1.05);
pub const DEFAULT_LOG_PATH: &str = "Transactions.log";

/// Raw TOML layout. Every section and key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub parking: Option<ParkingSection>,
    pub prices: Option<PricesSection>,
    pub log: Option<LogSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParkingSection {
    pub capacity: Option<u64>,
    pub tick_interval_seconds: Option<u64>,
    pub fine_multiplier: Option<Decimal>,
}

/// 若有 `[prices]` 區段，四種車型都必須給價格
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricesSection {
    pub passenger: Option<Decimal>,
    pub truck: Option<Decimal>,
    pub bus: Option<Decimal>,
    pub motorcycle: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    pub path: Option<String>,
    pub flush_interval_seconds: Option<u64>,
}

/// Validated engine settings. Static for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub capacity: usize,
    pub tick_interval: Duration,
    pub fine_multiplier: Decimal,
    pub pricing: PricingTable,
    pub log_path: PathBuf,
    pub flush_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY as usize,
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECONDS),
            fine_multiplier: DEFAULT_FINE_MULTIPLIER,
            pricing: PricingTable::default(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECONDS),
        }
    }
}

impl Settings {
    /// 從 TOML 檔案載入並驗證
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        TomlConfig::from_file(path)?.into_settings()
    }
}

/// 週期以毫秒計，零週期會讓 tokio interval panic
fn validate_period(field_name: &str, period: Duration) -> Result<()> {
    let millis = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
    validation::validate_positive_number(field_name, millis, 1)
}

/// Rechecks settings that may have been built in code rather than parsed.
/// Categories without a price pass here and fail the billing tick instead.
impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("parking.capacity", self.capacity as u64, 1)?;
        validate_period("parking.tick_interval", self.tick_interval)?;
        validation::validate_decimal_above(
            "parking.fine_multiplier",
            self.fine_multiplier,
            Decimal::ONE,
        )?;
        for (category, price) in self.pricing.iter() {
            validation::validate_decimal_above(
                &format!("prices.{}", category.name()),
                price,
                Decimal::ZERO,
            )?;
        }
        validation::validate_path("log.path", &self.log_path.to_string_lossy())?;
        validate_period("log.flush_interval", self.flush_interval)?;
        Ok(())
    }
}

impl PricesSection {
    fn price(&self, category: VehicleCategory) -> &Option<Decimal> {
        match category {
            VehicleCategory::Passenger => &self.passenger,
            VehicleCategory::Truck => &self.truck,
            VehicleCategory::Bus => &self.bus,
            VehicleCategory::Motorcycle => &self.motorcycle,
        }
    }

    fn to_pricing_table(&self) -> Result<PricingTable> {
        let mut prices = HashMap::new();
        for category in VehicleCategory::ALL {
            let field = format!("prices.{}", category.name());
            let price = *validation::validate_required_field(&field, self.price(category))?;
            validation::validate_decimal_above(&field, price, Decimal::ZERO)?;
            prices.insert(category, price);
        }
        Ok(PricingTable::new(prices))
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ParkingError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ParkingError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PARKING_CAPACITY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ParkingError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn capacity(&self) -> u64 {
        self.parking
            .as_ref()
            .and_then(|p| p.capacity)
            .unwrap_or(DEFAULT_CAPACITY)
    }

    fn tick_interval_seconds(&self) -> u64 {
        self.parking
            .as_ref()
            .and_then(|p| p.tick_interval_seconds)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECONDS)
    }

    fn fine_multiplier(&self) -> Decimal {
        self.parking
            .as_ref()
            .and_then(|p| p.fine_multiplier)
            .unwrap_or(DEFAULT_FINE_MULTIPLIER)
    }

    fn log_path(&self) -> &str {
        self.log
            .as_ref()
            .and_then(|l| l.path.as_deref())
            .unwrap_or(DEFAULT_LOG_PATH)
    }

    fn flush_interval_seconds(&self) -> u64 {
        self.log
            .as_ref()
            .and_then(|l| l.flush_interval_seconds)
            .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECONDS)
    }

    fn pricing_table(&self) -> Result<PricingTable> {
        match &self.prices {
            Some(section) => section.to_pricing_table(),
            None => Ok(PricingTable::default()),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number("parking.capacity", self.capacity(), 1)?;
        validation::validate_positive_number(
            "parking.tick_interval_seconds",
            self.tick_interval_seconds(),
            1,
        )?;
        validation::validate_decimal_above(
            "parking.fine_multiplier",
            self.fine_multiplier(),
            Decimal::ONE,
        )?;
        validation::validate_path("log.path", self.log_path())?;
        validation::validate_positive_number(
            "log.flush_interval_seconds",
            self.flush_interval_seconds(),
            1,
        )?;
        self.pricing_table()?;
        Ok(())
    }

    pub fn into_settings(self) -> Result<Settings> {
        self.validate_config()?;
        let capacity =
            usize::try_from(self.capacity()).map_err(|_| ParkingError::InvalidConfigValueError {
                field: "parking.capacity".to_string(),
                value: self.capacity().to_string(),
                reason: "Value does not fit this platform".to_string(),
            })?;

        Ok(Settings {
            capacity,
            tick_interval: Duration::from_secs(self.tick_interval_seconds()),
            fine_multiplier: self.fine_multiplier(),
            pricing: self.pricing_table()?,
            log_path: PathBuf::from(self.log_path()),
            flush_interval: Duration::from_secs(self.flush_interval_seconds()),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = TomlConfig::from_toml_str("").unwrap().into_settings().unwrap();

        assert_eq!(settings.capacity, 50);
        assert_eq!(settings.tick_interval, Duration::from_secs(3));
        assert_eq!(settings.fine_multiplier, dec!(1.05));
        assert_eq!(settings.flush_interval, Duration::from_secs(60));
        assert_eq!(settings.log_path, PathBuf::from("Transactions.log"));
        assert_eq!(
            settings.pricing.price_for(VehicleCategory::Truck).unwrap(),
            dec!(5)
        );
    }

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[parking]
capacity = 2
tick_interval_seconds = 5
fine_multiplier = "1.5"

[prices]
passenger = 4
truck = "6.5"
bus = 3
motorcycle = 1.25

[log]
path = "./revenue.log"
flush_interval_seconds = 30
"#;

        let settings = TomlConfig::from_toml_str(toml_content)
            .unwrap()
            .into_settings()
            .unwrap();

        assert_eq!(settings.capacity, 2);
        assert_eq!(settings.tick_interval, Duration::from_secs(5));
        assert_eq!(settings.fine_multiplier, dec!(1.5));
        assert_eq!(
            settings.pricing.price_for(VehicleCategory::Truck).unwrap(),
            dec!(6.5)
        );
        assert_eq!(
            settings.pricing.price_for(VehicleCategory::Motorcycle).unwrap(),
            dec!(1.25)
        );
        assert_eq!(settings.log_path, PathBuf::from("./revenue.log"));
        assert_eq!(settings.flush_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_PARKING_CAPACITY", "7");

        let toml_content = r#"
[parking]
capacity = ${TEST_PARKING_CAPACITY}
"#;

        let settings = TomlConfig::from_toml_str(toml_content)
            .unwrap()
            .into_settings()
            .unwrap();
        assert_eq!(settings.capacity, 7);

        std::env::remove_var("TEST_PARKING_CAPACITY");
    }

    #[test]
    fn test_config_validation() {
        let zero_capacity = TomlConfig::from_toml_str("[parking]\ncapacity = 0\n").unwrap();
        assert!(zero_capacity.validate().is_err());

        let cheap_fine = TomlConfig::from_toml_str("[parking]\nfine_multiplier = 1\n").unwrap();
        assert!(cheap_fine.validate().is_err());

        let free_bus = TomlConfig::from_toml_str(
            "[prices]\npassenger = 3\ntruck = 5\nbus = 0\nmotorcycle = 1\n",
        )
        .unwrap();
        assert!(free_bus.validate().is_err());
    }

    #[test]
    fn test_settings_validation() {
        assert!(Settings::default().validate().is_ok());

        let no_ticks = Settings {
            tick_interval: Duration::ZERO,
            ..Settings::default()
        };
        assert!(matches!(
            no_ticks.validate(),
            Err(ParkingError::InvalidConfigValueError { field, .. }) if field == "parking.tick_interval"
        ));

        let no_flush = Settings {
            flush_interval: Duration::from_micros(10),
            ..Settings::default()
        };
        assert!(matches!(
            no_flush.validate(),
            Err(ParkingError::InvalidConfigValueError { field, .. }) if field == "log.flush_interval"
        ));

        let no_spaces = Settings {
            capacity: 0,
            ..Settings::default()
        };
        assert!(no_spaces.validate().is_err());

        let no_fine = Settings {
            fine_multiplier: Decimal::ONE,
            ..Settings::default()
        };
        assert!(no_fine.validate().is_err());

        let free_truck = Settings {
            pricing: PricingTable::new([(VehicleCategory::Truck, dec!(0))].into_iter().collect()),
            ..Settings::default()
        };
        assert!(matches!(
            free_truck.validate(),
            Err(ParkingError::InvalidConfigValueError { field, .. }) if field == "prices.truck"
        ));
    }

    #[test]
    fn test_partial_price_table_is_rejected() {
        let config = TomlConfig::from_toml_str("[prices]\npassenger = 3\n").unwrap();
        assert!(matches!(
            config.into_settings(),
            Err(ParkingError::MissingConfigError { field }) if field == "prices.truck"
        ));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(matches!(
            TomlConfig::from_toml_str("[parking\ncapacity = 1"),
            Err(ParkingError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[parking]\ncapacity = 12\n")
            .unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.capacity, 12);
    }
}
