use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading category an instrument belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarketClass {
    Spot,
    LinearPerpetual,
    InversePerpetual,
}

impl MarketClass {
    pub const ALL: [MarketClass; 3] = [
        MarketClass::Spot,
        MarketClass::LinearPerpetual,
        MarketClass::InversePerpetual,
    ];

    /// Only perpetual classes carry the profit-share fee
    pub fn is_fee_bearing(&self) -> bool {
        !matches!(self, MarketClass::Spot)
    }
}

impl fmt::Display for MarketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarketClass::Spot => "Spot",
            MarketClass::LinearPerpetual => "LinearPerpetual",
            MarketClass::InversePerpetual => "InversePerpetual",
        };
        f.write_str(name)
    }
}

/// A tracked tradable pair (e.g. "BTC-USDT-SWAP")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: String,
    pub market_class: MarketClass,
}

impl Instrument {
    pub fn new(id: impl Into<String>, market_class: MarketClass) -> Self {
        Self {
            id: id.into(),
            market_class,
        }
    }
}

/// One exchange bill line, as fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub instrument_id: String,
    /// Unix milliseconds
    pub timestamp_millis: i64,
    /// Pagination cursor, strictly decreasing with time per account+instrument
    pub bill_id: String,
    /// Raw PnL as reported; absent or unparseable counts as zero
    pub pnl: Option<String>,
}
