use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::fees::GatewayFeeSchedule;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub withdrawal: WithdrawalConfig,
    #[serde(default)]
    pub credit: CreditConfig,
    /// PostgreSQL connection URL for the durable store
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "sokoni.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CurrencyConfig {
    /// ISO 4217 code for the marketplace's settlement currency
    pub code: String,
    /// Decimal places of the minor unit (2 for GHS, 0 for XAF)
    pub minor_units: u32,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: "GHS".to_string(),
            minor_units: 2,
        }
    }
}

/// Gateway fee schedule: flat component plus a rate on the gross.
/// Configuration-supplied; nothing in the engine hardcodes fee numbers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeeConfig {
    pub gateway_flat: Decimal,
    pub gateway_rate: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            gateway_flat: Decimal::new(200, 2), // 2.00
            gateway_rate: Decimal::ZERO,
        }
    }
}

impl FeeConfig {
    pub fn gateway_schedule(&self) -> GatewayFeeSchedule {
        GatewayFeeSchedule {
            flat: self.gateway_flat,
            rate: self.gateway_rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Length of a settlement period; batches run once per period
    pub period_days: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { period_days: 7 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalConfig {
    /// Smallest withdrawal a vendor may request
    pub min_amount: Decimal,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::new(1000, 2), // 10.00
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreditConfig {
    /// Limit granted on a first successful credit application
    pub default_limit: Decimal,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            default_limit: Decimal::new(50000, 2), // 500.00
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
