//! Typed account queries over a `SignedTransport`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::mapper::map_balance;
use super::types::{BillsRequest, OkxBalance, OkxBill, OkxResponse};
use crate::api::client::{build_query, HttpMethod, SignedTransport};
use crate::api::error::ApiError;
use crate::models::BalanceSnapshot;

/// Check the `{code, msg, data}` envelope and return its rows
pub fn parse_envelope<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
    // Error envelopes carry rows of a different shape; check the code first
    let code = value.get("code").and_then(Value::as_str);
    if let Some(code) = code.filter(|c| *c != "0") {
        return Err(ApiError::ExchangeError {
            code: code.to_string(),
            message: value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let response: OkxResponse<T> = serde_json::from_value(value)
        .map_err(|e| ApiError::ParseError(format!("Unexpected response shape: {}", e)))?;

    Ok(response.data.unwrap_or_default())
}

/// One page of bills, newest first
pub async fn fetch_bills_page(
    transport: &dyn SignedTransport,
    bills_path: &str,
    request: &BillsRequest,
) -> Result<Vec<OkxBill>, ApiError> {
    let limit = request.limit.to_string();
    let query = build_query(&[
        ("instId", Some(request.inst_id.as_str())),
        ("limit", Some(limit.as_str())),
        ("after", request.after.as_deref()),
    ]);

    let value = transport
        .send(HttpMethod::Get, &format!("{}{}", bills_path, query), None)
        .await?;

    parse_envelope(value)
}

/// Account balance restricted to `currencies`
pub async fn fetch_balance(
    transport: &dyn SignedTransport,
    balance_path: &str,
    currencies: &[String],
) -> Result<BalanceSnapshot, ApiError> {
    let query = build_query(&[("ccy", Some(currencies.join(",").as_str()))]);
    let value = transport
        .send(HttpMethod::Get, &format!("{}{}", balance_path, query), None)
        .await?;

    let balances: Vec<OkxBalance> = parse_envelope(value)?;
    let balance = balances
        .first()
        .ok_or_else(|| ApiError::ParseError("Balance response has no data".to_string()))?;

    Ok(map_balance(balance, currencies))
}

/// Raw position rows, unmodified
pub async fn fetch_positions(
    transport: &dyn SignedTransport,
    positions_path: &str,
) -> Result<Vec<Value>, ApiError> {
    let value = transport.send(HttpMethod::Get, positions_path, None).await?;
    parse_envelope(value)
}
