use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ledger::{Instrument, MarketClass};
use crate::api::client::RateLimitConfig;
use crate::api::okx::client::DEFAULT_BASE_URL;
use crate::billing::error::BillingError;

/// Instruments tracked per market class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackedInstruments {
    pub spot: Vec<String>,
    pub linear_perpetual: Vec<String>,
    pub inverse_perpetual: Vec<String>,
}

impl Default for TrackedInstruments {
    fn default() -> Self {
        Self {
            spot: vec!["BTC-USDT".to_string(), "ETH-USDT".to_string()],
            linear_perpetual: vec!["BTC-USDT-SWAP".to_string(), "ETH-USDT-SWAP".to_string()],
            inverse_perpetual: vec!["BTC-USD-SWAP".to_string(), "ETH-USD-SWAP".to_string()],
        }
    }
}

impl TrackedInstruments {
    /// Flatten into the fixed fetch list, grouped by class
    pub fn instruments(&self) -> Vec<Instrument> {
        let groups = [
            (MarketClass::Spot, &self.spot),
            (MarketClass::LinearPerpetual, &self.linear_perpetual),
            (MarketClass::InversePerpetual, &self.inverse_perpetual),
        ];

        groups
            .iter()
            .flat_map(|(class, ids)| ids.iter().map(move |id| Instrument::new(id.clone(), *class)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        // OKX bills endpoints: 5 requests per second
        Self {
            requests_per_second: 5,
            burst_size: 5,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        RateLimitConfig {
            requests_per_second: settings.requests_per_second,
            burst_size: settings.burst_size,
        }
    }
}

/// Run configuration, loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub report_name: String,
    pub base_url: String,
    pub bills_path: String,
    pub balance_path: String,
    pub positions_path: String,
    pub page_limit: u32,
    pub max_pages: u32,
    pub lookback_days: u32,
    pub fee_rate: Decimal,
    pub timezone: String,
    pub currencies: Vec<String>,
    pub instruments: TrackedInstruments,
    pub rate_limit: RateLimitSettings,
    /// Sends the demo-trading header on every request
    pub simulated: bool,
    pub output_dir: PathBuf,
    pub database_path: PathBuf,
    pub credential_store_dir: PathBuf,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            report_name: "billing_report".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            bills_path: "/api/v5/account/bills-archive".to_string(),
            balance_path: "/api/v5/account/balance".to_string(),
            positions_path: "/api/v5/account/positions".to_string(),
            page_limit: 100,
            max_pages: 500,
            lookback_days: 30,
            fee_rate: dec!(0.25),
            timezone: "Europe/Dublin".to_string(),
            currencies: vec!["BTC".to_string(), "ETH".to_string(), "USDT".to_string()],
            instruments: TrackedInstruments::default(),
            rate_limit: RateLimitSettings::default(),
            simulated: false,
            output_dir: PathBuf::from("reports"),
            database_path: PathBuf::from("billing.db"),
            credential_store_dir: PathBuf::from("."),
        }
    }
}

/// Optional command-line overrides applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub report_name: Option<String>,
    pub lookback_days: Option<u32>,
    pub fee_rate: Option<Decimal>,
    pub timezone: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub credential_store_dir: Option<PathBuf>,
    pub simulated: Option<bool>,
}

impl BillingSettings {
    /// Load settings from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, BillingError> {
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let settings: BillingSettings = toml::from_str(&text)
            .map_err(|e| BillingError::Config(format!("{}: {}", path.display(), e)))?;

        Ok(settings)
    }

    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(val) = overrides.report_name {
            self.report_name = val;
        }
        if let Some(val) = overrides.lookback_days {
            self.lookback_days = val;
        }
        if let Some(val) = overrides.fee_rate {
            self.fee_rate = val;
        }
        if let Some(val) = overrides.timezone {
            self.timezone = val;
        }
        if let Some(val) = overrides.output_dir {
            self.output_dir = val;
        }
        if let Some(val) = overrides.database_path {
            self.database_path = val;
        }
        if let Some(val) = overrides.credential_store_dir {
            self.credential_store_dir = val;
        }
        if let Some(val) = overrides.simulated {
            self.simulated = val;
        }
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if self.page_limit == 0 || self.page_limit > 100 {
            return Err(BillingError::Config(format!(
                "page_limit must be between 1 and 100, got {}",
                self.page_limit
            )));
        }
        if self.max_pages == 0 {
            return Err(BillingError::Config("max_pages must be positive".to_string()));
        }
        if self.fee_rate.is_sign_negative() {
            return Err(BillingError::Config(format!(
                "fee_rate must not be negative, got {}",
                self.fee_rate
            )));
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(BillingError::InvalidTimezone(self.timezone.clone()));
        }
        if self.instruments.instruments().is_empty() {
            return Err(BillingError::Config("no instruments are tracked".to_string()));
        }
        Ok(())
    }

    /// Lookback window in milliseconds
    pub fn lookback_millis(&self) -> i64 {
        i64::from(self.lookback_days) * 24 * 60 * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_track_six_instruments() {
        let settings = BillingSettings::default();
        let instruments = settings.instruments.instruments();

        assert_eq!(instruments.len(), 6);
        assert_eq!(settings.base_url, "https://www.okx.com");
        assert_eq!(instruments[0], Instrument::new("BTC-USDT", MarketClass::Spot));
        assert_eq!(
            instruments[5],
            Instrument::new("ETH-USD-SWAP", MarketClass::InversePerpetual)
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: BillingSettings = toml::from_str(
            r#"
            lookback_days = 7
            fee_rate = "0.2"
            timezone = "UTC"

            [instruments]
            spot = ["SOL-USDT"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.lookback_days, 7);
        assert_eq!(settings.fee_rate, dec!(0.2));
        assert_eq!(settings.instruments.spot, vec!["SOL-USDT".to_string()]);
        // Unspecified class lists keep their defaults
        assert_eq!(settings.instruments.linear_perpetual.len(), 2);
        assert_eq!(settings.page_limit, 100);
    }

    #[test]
    fn test_validate_rejects_unknown_timezone() {
        let settings = BillingSettings {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(BillingError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut settings = BillingSettings::default();
        settings.apply(SettingsOverrides {
            lookback_days: Some(14),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        });

        assert_eq!(settings.lookback_days, 14);
        assert_eq!(settings.timezone, "UTC");
        assert_eq!(settings.lookback_millis(), 14 * 86_400_000);
    }
}
