// src/config.rs
use crate::domain::account::Account;
use crate::domain::errors::{AppError, AppResult};
use crate::domain::instrument::Instrument;
use crate::domain::models::Environment;
use chrono::Duration;
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Terminal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Connector selection
    pub connector: ConnectorConfig,

    /// Account and its instruments
    pub account: AccountConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name (e.g., "paper")
    pub name: String,

    /// Paper or live
    #[serde(default)]
    pub mode: Environment,

    /// JSON file of quotes to replay after subscribing
    #[serde(default)]
    pub replay_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
    #[serde(default)]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub step_size: Decimal,
    pub step_value: Decimal,
    #[serde(default)]
    pub commission: Option<Decimal>,
    /// Bar length in seconds; one bar per point when absent
    #[serde(default)]
    pub time_frame_secs: Option<i64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl AccountConfig {
    /// Build the account with all configured instruments
    pub fn build(&self) -> Account {
        let mut account = Account::new(&self.name, self.balance).with_currency(&self.currency);
        if let Some(leverage) = self.leverage {
            account = account.with_leverage(leverage);
        }

        for instrument in &self.instruments {
            account.add_instrument(instrument.build());
        }

        account
    }
}

impl InstrumentConfig {
    pub fn build(&self) -> Instrument {
        let mut instrument = Instrument::new(&self.name).with_step(self.step_size, self.step_value);

        if let Some(commission) = self.commission {
            instrument = instrument.with_commission(commission);
        }
        if let Some(secs) = self.time_frame_secs.filter(|secs| *secs > 0) {
            instrument = instrument.with_time_frame(Duration::seconds(secs));
        }

        instrument
    }

    /// Parse `NAME:STEP_SIZE:STEP_VALUE[:COMMISSION[:TIME_FRAME_SECS]]`
    pub fn parse(spec: &str) -> AppResult<Self> {
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        if parts.len() < 3 || parts[0].is_empty() {
            return Err(AppError::Config(format!(
                "Invalid instrument '{}', expected NAME:STEP_SIZE:STEP_VALUE",
                spec
            )));
        }

        let decimal = |value: &str| {
            Decimal::from_str(value).map_err(|e| {
                AppError::Config(format!("Invalid number '{}' in instrument '{}': {}", value, spec, e))
            })
        };

        Ok(Self {
            name: parts[0].to_string(),
            step_size: decimal(parts[1])?,
            step_value: decimal(parts[2])?,
            commission: parts.get(3).copied().map(|value| decimal(value)).transpose()?,
            time_frame_secs: parts
                .get(4)
                .copied()
                .map(|value| {
                    value.parse::<i64>().map_err(|e| {
                        AppError::Config(format!("Invalid time frame in '{}': {}", spec, e))
                    })
                })
                .transpose()?,
        })
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let mode = match env::var("CONNECTOR_MODE") {
            Ok(value) => match value.to_lowercase().as_str() {
                "paper" => Environment::Paper,
                "live" => Environment::Live,
                other => {
                    return Err(AppError::Config(format!("Unknown connector mode: {}", other)))
                }
            },
            Err(_) => Environment::Paper,
        };

        let connector_config = ConnectorConfig {
            name: env::var("CONNECTOR_NAME").unwrap_or(defaults.connector.name),
            mode,
            replay_file: env::var("REPLAY_FILE").ok(),
        };

        let instruments = match env::var("INSTRUMENTS") {
            Ok(value) => value
                .split(',')
                .filter(|spec| !spec.trim().is_empty())
                .map(InstrumentConfig::parse)
                .collect::<AppResult<Vec<_>>>()?,
            Err(_) => defaults.account.instruments,
        };

        let account_config = AccountConfig {
            name: env::var("ACCOUNT_NAME").unwrap_or(defaults.account.name),
            currency: env::var("ACCOUNT_CURRENCY").unwrap_or(defaults.account.currency),
            balance: env_decimal("ACCOUNT_BALANCE")?.unwrap_or(defaults.account.balance),
            leverage: env_decimal("ACCOUNT_LEVERAGE")?.or(defaults.account.leverage),
            instruments,
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            connector: connector_config,
            account: account_config,
            logging: logging_config,
        })
    }

    /// Load a JSON terminal configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read terminal config {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Invalid terminal config {}: {}", path.display(), e))
        })
    }

    /// Write the configuration as pretty JSON, e.g. to seed a config file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;

        fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Cannot write terminal config {}: {}", path.display(), e))
        })
    }

    /// Log level filter for the configured level name
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.level_filter());

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = fs::File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))
    }
}

fn env_decimal(key: &str) -> AppResult<Option<Decimal>> {
    match env::var(key) {
        Ok(value) => Decimal::from_str(value.trim())
            .map(Some)
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connector: ConnectorConfig {
                name: "paper".to_string(),
                mode: Environment::Paper,
                replay_file: None,
            },
            account: AccountConfig {
                name: "paper".to_string(),
                currency: "USD".to_string(),
                balance: Decimal::new(10_000, 0),
                leverage: Some(Decimal::ONE),
                instruments: vec![InstrumentConfig {
                    name: "ES".to_string(),
                    step_size: Decimal::new(25, 2),
                    step_value: Decimal::new(1250, 2),
                    commission: None,
                    time_frame_secs: Some(60),
                }],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
