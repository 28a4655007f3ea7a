use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::account::AccountIdentity;
use super::ledger::MarketClass;

/// Accumulated realized PnL of one market class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTotal {
    pub pnl: Decimal,
    /// Set when at least one instrument of the class failed to fetch
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_instruments: Vec<String>,
}

/// Per-class PnL for one account and one reporting window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PnlTotals {
    classes: BTreeMap<MarketClass, ClassTotal>,
}

impl PnlTotals {
    pub fn from_classes(classes: BTreeMap<MarketClass, ClassTotal>) -> Self {
        Self { classes }
    }

    /// Total for a class; classes with no instruments are exactly zero
    pub fn get(&self, class: MarketClass) -> ClassTotal {
        self.classes.get(&class).cloned().unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.classes.values().all(|total| !total.incomplete)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MarketClass, &ClassTotal)> {
        self.classes.iter()
    }
}

/// Fee owed on one market class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFee {
    pub fee: Decimal,
    pub incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeTotals {
    classes: BTreeMap<MarketClass, ClassFee>,
}

impl FeeTotals {
    pub fn from_classes(classes: BTreeMap<MarketClass, ClassFee>) -> Self {
        Self { classes }
    }

    pub fn get(&self, class: MarketClass) -> ClassFee {
        self.classes.get(&class).cloned().unwrap_or_default()
    }
}

/// Per-currency balance line, verbatim from the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub currency: String,
    pub equity: String,
    pub usd_value: String,
    pub available: String,
}

impl BalanceDetail {
    pub fn zero(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            equity: "0".to_string(),
            usd_value: "0".to_string(),
            available: "0".to_string(),
        }
    }
}

/// Result of the balance query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub total_equity: Option<String>,
    pub update_time: Option<String>,
    pub details: Vec<BalanceDetail>,
}

/// Human-readable line for an open (nonzero) position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub instrument_id: String,
    pub side: String,
    pub size: String,
    pub average_price: Option<String>,
    pub unrealized_pnl: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// False if any PnL class is incomplete or a query was unavailable
    pub complete: bool,
    pub open_positions: Vec<PositionSummary>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub total_equity: String,
    pub update_time: Option<String>,
    pub balances_available: bool,
    pub positions_available: bool,
}

/// Fetch outcome for one tracked instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentPnl {
    pub instrument_id: String,
    pub market_class: MarketClass,
    pub entry_count: usize,
    pub pnl: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingActivity {
    /// Unix milliseconds, inclusive
    pub window_start: i64,
    pub window_end: i64,
    pub instruments: Vec<InstrumentPnl>,
    pub totals: PnlTotals,
    pub fees: FeeTotals,
}

/// Everything known about one account for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub user: AccountIdentity,
    pub summary: AccountSummary,
    pub account_info: AccountInfo,
    pub balances: Vec<BalanceDetail>,
    /// Raw exchange position rows, kept for audit
    pub positions: Vec<serde_json::Value>,
    pub trading: TradingActivity,
}

/// Column order of the billing table
pub const BILLING_COLUMNS: [&str; 18] = [
    "date",
    "time",
    "name",
    "email",
    "spot_pnl",
    "perps_pnl",
    "invperps_pnl",
    "btc_equity",
    "btc_usd_value",
    "btc_available",
    "eth_equity",
    "eth_usd_value",
    "eth_available",
    "usdt_equity",
    "usdt_usd_value",
    "usdt_available",
    "perps_fee",
    "invperps_fee",
];

/// Flattened billing row; field order is the column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub date: String,
    pub time: String,
    pub name: String,
    pub email: String,
    pub spot_pnl: String,
    pub perps_pnl: String,
    pub invperps_pnl: String,
    pub btc_equity: String,
    pub btc_usd_value: String,
    pub btc_available: String,
    pub eth_equity: String,
    pub eth_usd_value: String,
    pub eth_available: String,
    pub usdt_equity: String,
    pub usdt_usd_value: String,
    pub usdt_available: String,
    pub perps_fee: String,
    pub invperps_fee: String,
}

impl BillingRecord {
    /// Cell values in `BILLING_COLUMNS` order
    pub fn values(&self) -> [&str; 18] {
        [
            &self.date,
            &self.time,
            &self.name,
            &self.email,
            &self.spot_pnl,
            &self.perps_pnl,
            &self.invperps_pnl,
            &self.btc_equity,
            &self.btc_usd_value,
            &self.btc_available,
            &self.eth_equity,
            &self.eth_usd_value,
            &self.eth_available,
            &self.usdt_equity,
            &self.usdt_usd_value,
            &self.usdt_available,
            &self.perps_fee,
            &self.invperps_fee,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAccount {
    pub id: String,
    pub reason: String,
}

/// Raw aggregate of one billing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub report_name: String,
    pub total_accounts: usize,
    #[serde(default)]
    pub skipped_accounts: Vec<SkippedAccount>,
    pub accounts: Vec<AccountSnapshot>,
}

/// Outcome of a stored billing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every account billed with complete data
    Complete,
    /// An account was skipped or billed with missing data
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(RunStatus::Complete),
            "partial" => Ok(RunStatus::Partial),
            other => Err(format!("Unknown run status: {}", other)),
        }
    }
}

/// Stored history row of one billing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRunSummary {
    pub id: String,
    pub report_name: String,
    pub run_timestamp: i64,
    pub window_start: i64,
    pub window_end: i64,
    pub status: RunStatus,
    pub total_accounts: usize,
    pub skipped_accounts: Vec<SkippedAccount>,
}
