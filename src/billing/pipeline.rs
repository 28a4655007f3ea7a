use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use super::aggregator::{aggregate, InstrumentBills};
use super::error::BillingError;
use super::fees::FeeCalculator;
use super::fetcher::BillFetcher;
use super::formatter;
use super::snapshot::AccountSnapshotBuilder;
use crate::api::okx::account::{fetch_balance, fetch_positions};
use crate::api::{CredentialProvider, SignedTransport, TransportFactory};
use crate::models::{
    AccountIdentity, AccountSnapshot, BillingRecord, BillingSettings, Credentials, Report,
    SkippedAccount, TradingActivity,
};

/// Report plus the flattened rows derived from it
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub records: Vec<BillingRecord>,
    pub as_of: DateTime<Utc>,
}

/// One billing pass over a set of accounts
pub struct BillingRun {
    settings: BillingSettings,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportFactory>,
    fetcher: BillFetcher,
    fees: FeeCalculator,
    snapshots: AccountSnapshotBuilder,
}

impl BillingRun {
    pub fn new(
        settings: BillingSettings,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn TransportFactory>,
    ) -> Result<Self, BillingError> {
        settings.validate()?;

        Ok(Self {
            fetcher: BillFetcher::from_settings(&settings),
            fees: FeeCalculator::new(settings.fee_rate),
            snapshots: AccountSnapshotBuilder::new(&settings.currencies),
            settings,
            credentials,
            connector,
        })
    }

    /// Bill every account with usable credentials as of `as_of`.
    ///
    /// Accounts without credentials are skipped and listed in the report;
    /// if none has any, the run fails with `NoCredentials`.
    pub async fn run(
        &self,
        accounts: &[AccountIdentity],
        as_of: DateTime<Utc>,
    ) -> Result<RunOutcome, BillingError> {
        let window_end = as_of.timestamp_millis();
        let window_start = window_end - self.settings.lookback_millis();

        let mut billable = Vec::new();
        let mut skipped = Vec::new();
        for identity in accounts {
            match self.resolve_credentials(&identity.id) {
                Ok(credentials) => billable.push((identity, credentials)),
                Err(e) => {
                    log::warn!("Skipping account {}: {}", identity.id, e);
                    skipped.push(SkippedAccount {
                        id: identity.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if billable.is_empty() {
            return Err(BillingError::NoCredentials);
        }

        log::info!(
            "Billing {} account(s) via {} over the last {} day(s)",
            billable.len(),
            self.connector.exchange_name(),
            self.settings.lookback_days
        );

        let mut snapshots = Vec::with_capacity(billable.len());
        let mut records = Vec::with_capacity(billable.len());
        for (identity, credentials) in billable {
            let transport = self.connector.connect(credentials);
            let snapshot = self
                .bill_account(identity.clone(), transport.as_ref(), window_start, window_end)
                .await;

            records.push(formatter::format(&snapshot, as_of, &self.settings.timezone)?);
            snapshots.push(snapshot);
        }

        let report = Report {
            timestamp: as_of.to_rfc3339(),
            report_name: self.settings.report_name.clone(),
            total_accounts: snapshots.len(),
            skipped_accounts: skipped,
            accounts: snapshots,
        };

        Ok(RunOutcome {
            report,
            records,
            as_of,
        })
    }

    fn resolve_credentials(&self, account_id: &str) -> Result<Credentials, BillingError> {
        let missing = || BillingError::MissingCredentials {
            account_id: account_id.to_string(),
        };

        match self.credentials.credentials_for(account_id)? {
            Some(credentials) if credentials.is_usable() => Ok(credentials),
            _ => Err(missing()),
        }
    }

    async fn bill_account(
        &self,
        identity: AccountIdentity,
        transport: &dyn SignedTransport,
        window_start: i64,
        window_end: i64,
    ) -> AccountSnapshot {
        let instruments = self.settings.instruments.instruments();

        let fetches = instruments
            .iter()
            .map(|instrument| self.fetcher.fetch_bills(transport, &instrument.id, window_start));
        let results = join_all(fetches).await;

        let bills: Vec<InstrumentBills> = instruments.into_iter().zip(results).collect();
        for (instrument, result) in &bills {
            if let Err(e) = result {
                log::error!("{}: {} failed: {}", identity.id, instrument.id, e);
            }
        }

        let (rows, totals) = aggregate(&bills);
        let fees = self.fees.fees_for(&totals);

        let balances = fetch_balance(transport, &self.settings.balance_path, &self.settings.currencies)
            .await
            .map_err(BillingError::BalanceUnavailable);
        let positions = fetch_positions(transport, &self.settings.positions_path)
            .await
            .map_err(BillingError::PositionsUnavailable);

        let snapshot = self.snapshots.build(
            identity,
            balances,
            positions,
            TradingActivity {
                window_start,
                window_end,
                instruments: rows,
                totals,
                fees,
            },
        );

        log::info!(
            "{}: billed (complete: {}, warnings: {})",
            snapshot.user.id,
            snapshot.summary.complete,
            snapshot.summary.warnings.len()
        );

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::formatter::INCOMPLETE;
    use crate::billing::testing::{MockConnector, MockExchange, StaticCredentials};
    use crate::models::MarketClass;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const HOUR: i64 = 3_600_000;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn identity(id: &str, name: &str) -> AccountIdentity {
        AccountIdentity {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", id),
            label: String::new(),
        }
    }

    /// Spot +10.5/-2.25, linear swap +100, nothing on inverse swaps
    fn reference_exchange() -> MockExchange {
        let now = as_of().timestamp_millis();
        let mut exchange = MockExchange::new();
        exchange.add_bill("BTC-USDT", now - HOUR, Some("10.5"));
        exchange.add_bill("BTC-USDT", now - 2 * HOUR, Some("-2.25"));
        exchange.add_bill("BTC-USDT", now - 40 * 24 * HOUR, Some("999"));
        exchange.add_bill("BTC-USDT-SWAP", now - 3 * HOUR, Some("100"));
        exchange.set_balance(json!([
            {"ccy": "BTC", "eq": "1.0", "eqUsd": "60000", "availBal": "0.8"},
            {"ccy": "USDT", "eq": "1000", "eqUsd": "1000", "availBal": "1000"}
        ]));
        exchange.set_positions(json!([
            {"instId": "BTC-USDT-SWAP", "pos": "1", "posSide": "long", "avgPx": "42000"}
        ]));
        exchange
    }

    fn run_with(exchanges: Vec<(&str, &str, MockExchange)>) -> BillingRun {
        let credentials = StaticCredentials::default();
        let mut connector = MockConnector::default();
        for (account_id, api_key, exchange) in exchanges {
            credentials.insert(account_id, api_key);
            connector.insert(api_key, exchange);
        }

        BillingRun::new(BillingSettings::default(), Arc::new(credentials), Arc::new(connector)).unwrap()
    }

    #[tokio::test]
    async fn test_reference_account_end_to_end() {
        let run = run_with(vec![("acct-1", "key-1", reference_exchange())]);

        let outcome = run.run(&[identity("acct-1", "Alice")], as_of()).await.unwrap();

        assert_eq!(outcome.report.total_accounts, 1);
        assert!(outcome.report.skipped_accounts.is_empty());
        assert!(outcome.report.accounts[0].summary.complete);

        let record = &outcome.records[0];
        assert_eq!(record.spot_pnl, "8.25000000");
        assert_eq!(record.perps_pnl, "100.00000000");
        assert_eq!(record.perps_fee, "25.00000000");
        assert_eq!(record.invperps_pnl, "0.00000000");
        assert_eq!(record.invperps_fee, "0.00000000");
        assert_eq!(record.btc_equity, "1.0");
        assert_eq!(record.eth_equity, "0");
        assert_eq!(record.usdt_available, "1000");
        assert_eq!(record.date, "15/01/2024");
        assert_eq!(record.time, "12:00");
    }

    #[tokio::test]
    async fn test_partial_spot_failure_only_flags_spot() {
        let mut exchange = reference_exchange();
        exchange.fail_instrument("ETH-USDT");
        let run = run_with(vec![("acct-1", "key-1", exchange)]);

        let outcome = run.run(&[identity("acct-1", "Alice")], as_of()).await.unwrap();
        let snapshot = &outcome.report.accounts[0];
        let spot = snapshot.trading.totals.get(MarketClass::Spot);

        assert!(spot.incomplete);
        assert_eq!(spot.failed_instruments, vec!["ETH-USDT".to_string()]);
        assert_eq!(spot.pnl, dec!(8.25));
        assert!(!snapshot.summary.complete);

        let record = &outcome.records[0];
        assert_eq!(record.spot_pnl, INCOMPLETE);
        assert_eq!(record.perps_pnl, "100.00000000");
        assert_eq!(record.perps_fee, "25.00000000");
    }

    #[tokio::test]
    async fn test_account_without_credentials_is_skipped() {
        let run = run_with(vec![("acct-1", "key-1", reference_exchange())]);

        let outcome = run
            .run(&[identity("acct-1", "Alice"), identity("acct-2", "Bob")], as_of())
            .await
            .unwrap();

        assert_eq!(outcome.report.total_accounts, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name, "Alice");
        assert_eq!(outcome.report.skipped_accounts.len(), 1);
        assert_eq!(outcome.report.skipped_accounts[0].id, "acct-2");
    }

    #[tokio::test]
    async fn test_no_credentials_anywhere_is_fatal() {
        let run = run_with(vec![]);

        let result = run
            .run(&[identity("acct-1", "Alice"), identity("acct-2", "Bob")], as_of())
            .await;

        assert!(matches!(result, Err(BillingError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_unavailable_balance_still_produces_row() {
        let now = as_of().timestamp_millis();
        let mut exchange = MockExchange::new();
        exchange.add_bill("ETH-USD-SWAP", now - HOUR, Some("4"));
        let run = run_with(vec![("acct-1", "key-1", exchange)]);

        let outcome = run.run(&[identity("acct-1", "Alice")], as_of()).await.unwrap();
        let snapshot = &outcome.report.accounts[0];

        assert!(!snapshot.account_info.balances_available);
        assert!(!snapshot.account_info.positions_available);
        assert_eq!(snapshot.summary.warnings.len(), 2);

        let record = &outcome.records[0];
        assert_eq!(record.invperps_pnl, "4.00000000");
        assert_eq!(record.invperps_fee, "1.00000000");
        assert_eq!(record.btc_equity, "0");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let settings = BillingSettings {
            timezone: "Nowhere/Special".to_string(),
            ..Default::default()
        };

        let result = BillingRun::new(
            settings,
            Arc::new(StaticCredentials::default()),
            Arc::new(MockConnector::default()),
        );
        assert!(matches!(result, Err(BillingError::InvalidTimezone(_))));
    }
}
