use std::collections::HashSet;

use super::error::BillingError;
use crate::api::okx::account::fetch_bills_page;
use crate::api::okx::mapper::map_bill_to_entry;
use crate::api::okx::types::BillsRequest;
use crate::api::{ApiError, SignedTransport};
use crate::models::{BillingSettings, LedgerEntry};

/// Walks the bills endpoint backwards in time for one instrument.
///
/// Precondition: the exchange returns bills newest first, with `billId`
/// strictly decreasing across pages. The walk stops at the first page that
/// reaches past `window_start`, so the result is the contiguous in-window
/// prefix of the history. If the exchange ever returned an older bill ahead
/// of newer ones, the newer ones on later pages would be missed.
#[derive(Debug, Clone)]
pub struct BillFetcher {
    bills_path: String,
    page_limit: u32,
    max_pages: u32,
}

impl BillFetcher {
    pub fn new(bills_path: impl Into<String>, page_limit: u32, max_pages: u32) -> Self {
        Self {
            bills_path: bills_path.into(),
            page_limit: page_limit.clamp(1, 100),
            max_pages: max_pages.max(1),
        }
    }

    pub fn from_settings(settings: &BillingSettings) -> Self {
        Self::new(&settings.bills_path, settings.page_limit, settings.max_pages)
    }

    /// All bills of `instrument_id` with `timestamp_millis >= window_start`,
    /// in no particular order
    pub async fn fetch_bills(
        &self,
        transport: &dyn SignedTransport,
        instrument_id: &str,
        window_start: i64,
    ) -> Result<Vec<LedgerEntry>, BillingError> {
        let fetch_error = |source: ApiError| BillingError::Fetch {
            instrument: instrument_id.to_string(),
            source,
        };

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut page: u32 = 0;

        // The empty page that ends a history does not count toward `max_pages`
        loop {
            let request = BillsRequest {
                inst_id: instrument_id.to_string(),
                after: cursor.clone(),
                limit: self.page_limit,
            };

            let bills = fetch_bills_page(transport, &self.bills_path, &request)
                .await
                .map_err(fetch_error)?;

            if bills.is_empty() {
                log::debug!("{}: history exhausted after {} page(s)", instrument_id, page);
                return Ok(entries);
            }
            page += 1;

            let mut reached_window_start = false;
            let mut holds_window_entries = false;
            for bill in &bills {
                let entry = map_bill_to_entry(bill, instrument_id)
                    .map_err(|e| fetch_error(ApiError::ParseError(e)))?;

                if entry.timestamp_millis < window_start {
                    reached_window_start = true;
                    continue;
                }
                holds_window_entries = true;

                if seen.insert(entry.bill_id.clone()) {
                    entries.push(entry);
                } else {
                    log::warn!("{}: duplicate bill {} ignored", instrument_id, entry.bill_id);
                }
            }

            if page > self.max_pages && holds_window_entries {
                return Err(BillingError::Pagination {
                    instrument: instrument_id.to_string(),
                    reason: format!("more than {} pages inside the window", self.max_pages),
                });
            }

            if reached_window_start {
                log::debug!(
                    "{}: window start reached on page {} ({} bills in window)",
                    instrument_id,
                    page,
                    entries.len()
                );
                return Ok(entries);
            }

            let next_cursor = bills.last().map(|b| b.bill_id.clone());
            if next_cursor == cursor {
                return Err(BillingError::Pagination {
                    instrument: instrument_id.to_string(),
                    reason: format!("cursor {:?} did not advance", cursor),
                });
            }
            cursor = next_cursor;
        }
    }
}
