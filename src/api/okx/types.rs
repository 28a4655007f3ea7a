use serde::{Deserialize, Serialize};

/// OKX v5 response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Option<Vec<T>>,
}

/// Account bill (ledger line)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkxBill {
    /// Instrument ID (e.g., "BTC-USDT-SWAP"); empty for transfers
    #[serde(rename = "instId", default)]
    pub inst_id: String,

    /// Bill ID, used as the `after` cursor
    #[serde(rename = "billId")]
    pub bill_id: String,

    /// Creation time (Unix milliseconds)
    pub ts: String,

    /// Realized profit and loss; "" when not applicable
    #[serde(default)]
    pub pnl: Option<String>,
}

/// One entry of `/account/balance` data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkxBalance {
    /// Total equity in USD
    #[serde(rename = "totalEq", default)]
    pub total_eq: Option<String>,

    #[serde(rename = "uTime", default)]
    pub u_time: Option<String>,

    #[serde(default)]
    pub details: Vec<OkxBalanceDetail>,
}

/// Per-currency balance detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkxBalanceDetail {
    pub ccy: String,

    /// Equity of currency
    #[serde(default)]
    pub eq: Option<String>,

    /// Equity in USD
    #[serde(rename = "eqUsd", default)]
    pub eq_usd: Option<String>,

    /// Available balance (spot / simple mode)
    #[serde(rename = "availBal", default)]
    pub avail_bal: Option<String>,

    /// Available equity (margin modes)
    #[serde(rename = "availEq", default)]
    pub avail_eq: Option<String>,
}

/// Parameters of a bills page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillsRequest {
    pub inst_id: String,
    /// Return records earlier than this bill ID
    pub after: Option<String>,
    /// Page size (max 100)
    pub limit: u32,
}
