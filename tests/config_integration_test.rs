use car_park_ledger::config::TomlConfig;
use car_park_ledger::utils::validation::Validate;
use car_park_ledger::{ParkingError, ParkingLot, Settings, VehicleCategory};
use rust_decimal_macros::dec;
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

#[tokio::test]
async fn test_engine_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("revenue.log");
    let toml_content = format!(
        r#"
[parking]
capacity = 1
tick_interval_seconds = 10
fine_multiplier = "1.10"

[prices]
passenger = "2.5"
truck = 4
bus = 3
motorcycle = 1

[log]
path = "{}"
flush_interval_seconds = 120
"#,
        log_path.display()
    );

    let mut config_file = NamedTempFile::new().unwrap();
    config_file.write_all(toml_content.as_bytes()).unwrap();

    let settings = Settings::from_file(config_file.path()).unwrap();
    assert_eq!(settings.tick_interval, Duration::from_secs(10));
    assert_eq!(settings.flush_interval, Duration::from_secs(120));

    let lot = ParkingLot::from_settings(settings).unwrap();
    assert_eq!(lot.capacity(), 1);

    let car = lot.add_vehicle(VehicleCategory::Passenger, dec!(3)).unwrap();
    lot.bill_once().unwrap();
    lot.bill_once().unwrap();
    // 3 - 2.5 = 0.5，第二次 0.5 - 2.5 * 1.10
    assert_eq!(lot.get_vehicle(car.id).unwrap().balance, dec!(-2.25));

    lot.flush_once();
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.trim_end().ends_with("]: 2.5"));
    assert_eq!(lot.read_log(), log);
}

#[test]
fn test_invalid_values_are_reported_with_field() {
    let config = TomlConfig::from_toml_str("[log]\nflush_interval_seconds = 0\n").unwrap();
    match config.validate() {
        Err(ParkingError::InvalidConfigValueError { field, .. }) => {
            assert_eq!(field, "log.flush_interval_seconds")
        }
        other => panic!("expected InvalidConfigValueError, got {:?}", other),
    }
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        Settings::from_file("/no/such/parking.toml"),
        Err(ParkingError::IoError(_))
    ));
}
