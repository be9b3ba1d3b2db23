use crate::config::toml_config::Settings;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "car-park")]
#[command(about = "Car park ledger: billing ticks, balances and a rolling revenue log")]
pub struct CliConfig {
    /// Path to a TOML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the revenue log path from the configuration
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    pub fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(log_path) = &self.log_path {
            crate::utils::validation::validate_path("--log-path", &log_path.to_string_lossy())?;
            settings.log_path = log_path.clone();
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cli = CliConfig::parse_from(["car-park"]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.capacity, 50);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_log_path_override() {
        let cli = CliConfig::parse_from(["car-park", "--log-path", "/tmp/revenue.log", "-v"]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.log_path, PathBuf::from("/tmp/revenue.log"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let cli = CliConfig::parse_from(["car-park", "--config", "/definitely/not/here.toml"]);
        assert!(matches!(
            cli.load_settings(),
            Err(crate::utils::error::ParkingError::IoError(_))
        ));
    }
}
