use serde_json::Value;

use super::types::{OkxBalance, OkxBill};
use crate::models::{BalanceDetail, BalanceSnapshot, LedgerEntry, PositionSummary};

/// Map an OKX bill to a ledger entry
pub fn map_bill_to_entry(bill: &OkxBill, requested_inst_id: &str) -> Result<LedgerEntry, String> {
    let timestamp_millis = bill
        .ts
        .parse::<i64>()
        .map_err(|e| format!("Invalid timestamp '{}' on bill {}: {}", bill.ts, bill.bill_id, e))?;

    if bill.bill_id.is_empty() {
        return Err("Bill without billId".to_string());
    }

    // Empty strings mean "not applicable", not malformed
    let pnl = bill
        .pnl
        .as_ref()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let instrument_id = if bill.inst_id.is_empty() {
        requested_inst_id.to_string()
    } else {
        bill.inst_id.clone()
    };

    Ok(LedgerEntry {
        instrument_id,
        timestamp_millis,
        bill_id: bill.bill_id.clone(),
        pnl,
    })
}

/// Keep the tracked currencies only, values verbatim
pub fn map_balance(balance: &OkxBalance, currencies: &[String]) -> BalanceSnapshot {
    let details = balance
        .details
        .iter()
        .filter(|d| currencies.iter().any(|c| c.eq_ignore_ascii_case(&d.ccy)))
        .map(|d| BalanceDetail {
            currency: d.ccy.to_uppercase(),
            equity: first_non_empty(&[&d.eq]),
            usd_value: first_non_empty(&[&d.eq_usd]),
            available: first_non_empty(&[&d.avail_bal, &d.avail_eq]),
        })
        .collect();

    BalanceSnapshot {
        total_equity: balance.total_eq.clone().filter(|v| !v.is_empty()),
        update_time: balance.u_time.clone().filter(|v| !v.is_empty()),
        details,
    }
}

/// Summarize a raw position row; `None` for zero-size positions
pub fn summarize_position(raw: &Value) -> Option<PositionSummary> {
    let size = raw.get("pos").and_then(Value::as_str).unwrap_or("0");
    let is_open = size
        .parse::<rust_decimal::Decimal>()
        .map(|d| !d.is_zero())
        .unwrap_or(false);
    if !is_open {
        return None;
    }

    let text = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(PositionSummary {
        instrument_id: text("instId").unwrap_or_default(),
        side: text("posSide").unwrap_or_else(|| "net".to_string()),
        size: size.to_string(),
        average_price: text("avgPx"),
        unrealized_pnl: text("upl"),
    })
}

/// First present, non-blank value, or "0"
fn first_non_empty(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|v| !v.trim().is_empty())
        .unwrap_or("0")
        .to_string()
}
