use serde_json::Value;

use super::error::BillingError;
use crate::api::okx::mapper::summarize_position;
use crate::models::{
    AccountIdentity, AccountInfo, AccountSnapshot, AccountSummary, BalanceDetail, BalanceSnapshot,
    TradingActivity,
};

/// Assembles the per-account snapshot from already computed parts.
///
/// Balance and position failures are folded into defaults plus a warning;
/// building never fails.
#[derive(Debug, Clone)]
pub struct AccountSnapshotBuilder {
    currencies: Vec<String>,
}

impl AccountSnapshotBuilder {
    pub fn new(currencies: &[String]) -> Self {
        Self {
            currencies: currencies.to_vec(),
        }
    }

    pub fn build(
        &self,
        identity: AccountIdentity,
        balances: Result<BalanceSnapshot, BillingError>,
        positions: Result<Vec<Value>, BillingError>,
        trading: TradingActivity,
    ) -> AccountSnapshot {
        let mut warnings = Vec::new();

        for (class, total) in trading.totals.iter() {
            if total.incomplete {
                warnings.push(format!(
                    "{} PnL incomplete: {} failed",
                    class,
                    total.failed_instruments.join(", ")
                ));
            }
        }

        let (balance, balances_available) = match balances {
            Ok(snapshot) => (snapshot, true),
            Err(e) => {
                log::warn!("{}: {}", identity.id, e);
                warnings.push(e.to_string());
                (self.empty_balance(), false)
            }
        };

        let (positions, positions_available) = match positions {
            Ok(rows) => (rows, true),
            Err(e) => {
                log::warn!("{}: {}", identity.id, e);
                warnings.push(e.to_string());
                (Vec::new(), false)
            }
        };

        let open_positions = positions.iter().filter_map(summarize_position).collect();

        let complete = trading.totals.is_complete() && balances_available && positions_available;

        AccountSnapshot {
            user: identity,
            summary: AccountSummary {
                complete,
                open_positions,
                warnings,
            },
            account_info: AccountInfo {
                total_equity: balance.total_equity.unwrap_or_else(|| "0".to_string()),
                update_time: balance.update_time,
                balances_available,
                positions_available,
            },
            balances: balance.details,
            positions,
            trading,
        }
    }

    fn empty_balance(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            total_equity: None,
            update_time: None,
            details: self.currencies.iter().map(|c| BalanceDetail::zero(c)).collect(),
        }
    }
}
