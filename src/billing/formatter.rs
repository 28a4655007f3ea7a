use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::BillingError;
use crate::models::{AccountSnapshot, BalanceDetail, BillingRecord, MarketClass};

/// Cell value of a PnL or fee column whose class failed to fetch
pub const INCOMPLETE: &str = "INCOMPLETE";

const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMAT: &str = "%H:%M";
const DECIMAL_PLACES: u32 = 8;

/// Fixed point with exactly 8 fractional digits, half away from zero.
///
/// `rescale` keeps the 96-bit mantissa in range by lowering the scale, so
/// magnitudes of about 7.9e20 and above print with fewer than 8 digits.
pub fn format_decimal(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    rounded.rescale(DECIMAL_PLACES);
    rounded.to_string()
}

pub fn parse_timezone(name: &str) -> Result<Tz, BillingError> {
    name.parse::<Tz>()
        .map_err(|_| BillingError::InvalidTimezone(name.to_string()))
}

/// Flatten a snapshot into the 18-column billing row
pub fn format(
    snapshot: &AccountSnapshot,
    as_of: DateTime<Utc>,
    timezone_name: &str,
) -> Result<BillingRecord, BillingError> {
    let tz = parse_timezone(timezone_name)?;
    let local = as_of.with_timezone(&tz);

    let totals = &snapshot.trading.totals;
    let fees = &snapshot.trading.fees;

    let pnl_cell = |class: MarketClass| {
        let total = totals.get(class);
        if total.incomplete {
            INCOMPLETE.to_string()
        } else {
            format_decimal(total.pnl)
        }
    };
    let fee_cell = |class: MarketClass| {
        let fee = fees.get(class);
        if fee.incomplete || totals.get(class).incomplete {
            INCOMPLETE.to_string()
        } else {
            format_decimal(fee.fee)
        }
    };

    let btc = balance_for(&snapshot.balances, "BTC");
    let eth = balance_for(&snapshot.balances, "ETH");
    let usdt = balance_for(&snapshot.balances, "USDT");

    Ok(BillingRecord {
        date: local.format(DATE_FORMAT).to_string(),
        time: local.format(TIME_FORMAT).to_string(),
        name: snapshot.user.name.clone(),
        email: snapshot.user.email.clone(),
        spot_pnl: pnl_cell(MarketClass::Spot),
        perps_pnl: pnl_cell(MarketClass::LinearPerpetual),
        invperps_pnl: pnl_cell(MarketClass::InversePerpetual),
        btc_equity: btc.equity,
        btc_usd_value: btc.usd_value,
        btc_available: btc.available,
        eth_equity: eth.equity,
        eth_usd_value: eth.usd_value,
        eth_available: eth.available,
        usdt_equity: usdt.equity,
        usdt_usd_value: usdt.usd_value,
        usdt_available: usdt.available,
        perps_fee: fee_cell(MarketClass::LinearPerpetual),
        invperps_fee: fee_cell(MarketClass::InversePerpetual),
    })
}

fn balance_for(balances: &[BalanceDetail], currency: &str) -> BalanceDetail {
    balances
        .iter()
        .find(|b| b.currency.eq_ignore_ascii_case(currency))
        .cloned()
        .unwrap_or_else(|| BalanceDetail::zero(currency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::fees::FeeCalculator;
    use crate::models::{
        AccountIdentity, AccountInfo, AccountSummary, ClassTotal, PnlTotals, TradingActivity,
        BILLING_COLUMNS,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn snapshot(classes: BTreeMap<MarketClass, ClassTotal>, balances: Vec<BalanceDetail>) -> AccountSnapshot {
        let totals = PnlTotals::from_classes(classes);
        let fees = FeeCalculator::default().fees_for(&totals);
        AccountSnapshot {
            user: AccountIdentity {
                id: "acct-1".to_string(),
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                label: "main".to_string(),
            },
            summary: AccountSummary::default(),
            account_info: AccountInfo {
                total_equity: "0".to_string(),
                update_time: None,
                balances_available: true,
                positions_available: true,
            },
            balances,
            positions: vec![],
            trading: TradingActivity {
                window_start: 0,
                window_end: 0,
                instruments: vec![],
                totals,
                fees,
            },
        }
    }

    fn total(pnl: Decimal) -> ClassTotal {
        ClassTotal {
            pnl,
            ..Default::default()
        }
    }

    fn btc_balance() -> BalanceDetail {
        BalanceDetail {
            currency: "BTC".to_string(),
            equity: "1.0".to_string(),
            usd_value: "60000".to_string(),
            available: "0.5".to_string(),
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_decimal_rendering() {
        assert_eq!(format_decimal(dec!(8.25)), "8.25000000");
        assert_eq!(format_decimal(dec!(0)), "0.00000000");
        assert_eq!(format_decimal(dec!(-3)), "-3.00000000");
        assert_eq!(format_decimal(dec!(0.000000005)), "0.00000001");
        assert_eq!(format_decimal(dec!(-0.000000005)), "-0.00000001");
        assert_eq!(format_decimal(dec!(1.234567894)), "1.23456789");
        assert_eq!(format_decimal(dec!(-0.000000001)), "0.00000000");
        assert_eq!(
            format_decimal(dec!(120000000000000000000.5)),
            "120000000000000000000.50000000"
        );
    }

    #[test]
    fn test_reference_account_row() {
        let mut classes = BTreeMap::new();
        classes.insert(MarketClass::Spot, total(dec!(8.25)));
        classes.insert(MarketClass::LinearPerpetual, total(dec!(100)));
        classes.insert(MarketClass::InversePerpetual, total(dec!(0)));

        let record = format(&snapshot(classes, vec![btc_balance()]), as_of(), "Europe/Dublin").unwrap();

        assert_eq!(record.date, "15/01/2024");
        assert_eq!(record.time, "09:05");
        assert_eq!(record.name, "Alice");
        assert_eq!(record.email, "alice@example.com");
        assert_eq!(record.spot_pnl, "8.25000000");
        assert_eq!(record.perps_pnl, "100.00000000");
        assert_eq!(record.invperps_pnl, "0.00000000");
        assert_eq!(record.perps_fee, "25.00000000");
        assert_eq!(record.invperps_fee, "0.00000000");
        assert_eq!(record.btc_equity, "1.0");
        assert_eq!(record.btc_usd_value, "60000");
        assert_eq!(record.btc_available, "0.5");
    }

    #[test]
    fn test_missing_currency_renders_zeroes() {
        let record = format(&snapshot(BTreeMap::new(), vec![btc_balance()]), as_of(), "UTC").unwrap();

        assert_eq!(record.eth_equity, "0");
        assert_eq!(record.eth_usd_value, "0");
        assert_eq!(record.eth_available, "0");
        assert_eq!(record.usdt_equity, "0");
        assert_eq!(record.spot_pnl, "0.00000000");
    }

    #[test]
    fn test_incomplete_class_uses_sentinel() {
        let mut classes = BTreeMap::new();
        classes.insert(MarketClass::Spot, total(dec!(1)));
        classes.insert(
            MarketClass::InversePerpetual,
            ClassTotal {
                pnl: dec!(40),
                incomplete: true,
                failed_instruments: vec!["ETH-USD-SWAP".to_string()],
            },
        );

        let record = format(&snapshot(classes, vec![]), as_of(), "UTC").unwrap();

        assert_eq!(record.spot_pnl, "1.00000000");
        assert_eq!(record.invperps_pnl, INCOMPLETE);
        assert_eq!(record.invperps_fee, INCOMPLETE);
        assert_eq!(record.perps_fee, "0.00000000");
    }

    #[test]
    fn test_local_time_follows_daylight_saving() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 23, 30, 0).unwrap();
        let record = format(&snapshot(BTreeMap::new(), vec![]), summer, "Europe/Dublin").unwrap();

        assert_eq!(record.date, "02/07/2024");
        assert_eq!(record.time, "00:30");
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let result = format(&snapshot(BTreeMap::new(), vec![]), as_of(), "Mars/Olympus");
        assert!(matches!(result, Err(BillingError::InvalidTimezone(tz)) if tz == "Mars/Olympus"));
    }

    #[test]
    fn test_formatting_is_idempotent_with_fixed_schema() {
        let mut classes = BTreeMap::new();
        classes.insert(MarketClass::LinearPerpetual, total(dec!(-12.3456789049)));
        let snap = snapshot(classes, vec![btc_balance()]);

        let first = format(&snap, as_of(), "Europe/Dublin").unwrap();
        let second = format(&snap, as_of(), "Europe/Dublin").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.values().len(), BILLING_COLUMNS.len());
        assert_eq!(first.perps_pnl, "-12.34567890");
        assert_eq!(first.perps_fee, "0.00000000");
    }
}
