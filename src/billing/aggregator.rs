use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::error::BillingError;
use crate::models::{ClassTotal, Instrument, InstrumentPnl, LedgerEntry, MarketClass, PnlTotals};

/// Fetch outcome of one tracked instrument
pub type InstrumentBills = (Instrument, Result<Vec<LedgerEntry>, BillingError>);

/// Parse a raw PnL value; absent counts as zero, malformed as zero with a warning
pub fn parse_pnl(entry: &LedgerEntry) -> Decimal {
    let Some(raw) = entry.pnl.as_deref() else {
        return Decimal::ZERO;
    };

    Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .unwrap_or_else(|_| {
            log::warn!(
                "{}: non-numeric pnl '{}' on bill {} counted as 0",
                entry.instrument_id,
                raw,
                entry.bill_id
            );
            Decimal::ZERO
        })
}

/// Realized PnL of one instrument's entries
pub fn instrument_total(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().map(parse_pnl).sum()
}

/// Reduce per-instrument results to per-instrument rows and class totals.
///
/// Every class named by an instrument appears in the totals; a class whose
/// instrument failed keeps the sum of its successful instruments but is
/// marked incomplete with the failures listed.
pub fn aggregate(results: &[InstrumentBills]) -> (Vec<InstrumentPnl>, PnlTotals) {
    let mut rows = Vec::with_capacity(results.len());
    let mut classes: BTreeMap<MarketClass, ClassTotal> = BTreeMap::new();

    for (instrument, result) in results {
        let class_total = classes.entry(instrument.market_class).or_default();

        match result {
            Ok(entries) => {
                let pnl = instrument_total(entries);
                class_total.pnl += pnl;
                rows.push(InstrumentPnl {
                    instrument_id: instrument.id.clone(),
                    market_class: instrument.market_class,
                    entry_count: entries.len(),
                    pnl,
                    error: None,
                });
            }
            Err(e) => {
                class_total.incomplete = true;
                class_total.failed_instruments.push(instrument.id.clone());
                rows.push(InstrumentPnl {
                    instrument_id: instrument.id.clone(),
                    market_class: instrument.market_class,
                    entry_count: 0,
                    pnl: Decimal::ZERO,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    (rows, PnlTotals::from_classes(classes))
}
