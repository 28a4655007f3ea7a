//! In-memory exchange used by the pipeline tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{ApiError, CredentialProvider, HttpMethod, SignedTransport, TransportFactory};
use crate::models::Credentials;

pub const BILLS_PATH: &str = "/api/v5/account/bills-archive";
pub const BALANCE_PATH: &str = "/api/v5/account/balance";
pub const POSITIONS_PATH: &str = "/api/v5/account/positions";

#[derive(Debug, Clone)]
struct MockBill {
    bill_id: u64,
    ts: i64,
    pnl: Option<String>,
}

/// Scripted ledger honoring `instId`, `limit` and `after`
#[derive(Default)]
pub struct MockExchange {
    ledgers: HashMap<String, Vec<MockBill>>,
    failing: HashSet<String>,
    balance: Option<Value>,
    positions: Option<Value>,
    ignore_cursor: bool,
    next_bill_id: u64,
    requests: AtomicUsize,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            next_bill_id: 1_000_000,
            ..Default::default()
        }
    }

    /// Bills must be added newest first; ids decrease as they are added
    pub fn add_bill(&mut self, inst_id: &str, ts: i64, pnl: Option<&str>) {
        self.next_bill_id -= 1;
        self.ledgers.entry(inst_id.to_string()).or_default().push(MockBill {
            bill_id: self.next_bill_id,
            ts,
            pnl: pnl.map(str::to_string),
        });
    }

    pub fn fail_instrument(&mut self, inst_id: &str) {
        self.failing.insert(inst_id.to_string());
    }

    pub fn ignore_cursor(&mut self) {
        self.ignore_cursor = true;
    }

    /// `details` rows as OKX returns them under `data[0].details`
    pub fn set_balance(&mut self, details: Value) {
        self.balance = Some(json!([{ "totalEq": "61000", "uTime": "1704067200000", "details": details }]));
    }

    pub fn set_positions(&mut self, positions: Value) {
        self.positions = Some(positions);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn bills_page(&self, params: &HashMap<String, String>) -> Value {
        let inst_id = params.get("instId").cloned().unwrap_or_default();
        if self.failing.contains(&inst_id) {
            return json!({"code": "50026", "msg": "System error, try again later", "data": []});
        }

        let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(100);
        let after: Option<u64> = if self.ignore_cursor {
            None
        } else {
            params.get("after").and_then(|a| a.parse().ok())
        };

        let data: Vec<Value> = self
            .ledgers
            .get(&inst_id)
            .map(|bills| {
                bills
                    .iter()
                    .filter(|b| after.map_or(true, |cursor| b.bill_id < cursor))
                    .take(limit)
                    .map(|b| {
                        json!({
                            "instId": inst_id,
                            "billId": b.bill_id.to_string(),
                            "ts": b.ts.to_string(),
                            "pnl": b.pnl.clone().unwrap_or_default(),
                            "ccy": "USDT",
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        json!({"code": "0", "msg": "", "data": data})
    }
}

fn split_path(path: &str) -> (&str, HashMap<String, String>) {
    let (base, query) = path.split_once('?').unwrap_or((path, ""));
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (base, params)
}

#[async_trait]
impl SignedTransport for MockExchange {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        _body: Option<&str>,
    ) -> Result<Value, ApiError> {
        assert_eq!(method, HttpMethod::Get);
        self.requests.fetch_add(1, Ordering::SeqCst);

        let (base, params) = split_path(path);
        match base {
            BILLS_PATH => Ok(self.bills_page(&params)),
            BALANCE_PATH => match &self.balance {
                Some(data) => Ok(json!({"code": "0", "msg": "", "data": data})),
                None => Err(ApiError::HttpStatus {
                    status: 503,
                    body: "balance service unavailable".to_string(),
                }),
            },
            POSITIONS_PATH => match &self.positions {
                Some(data) => Ok(json!({"code": "0", "msg": "", "data": data})),
                None => Ok(json!({"code": "51000", "msg": "Parameter error", "data": []})),
            },
            other => panic!("unexpected path {}", other),
        }
    }
}

/// Hands out a prepared `MockExchange` per API key
#[derive(Default)]
pub struct MockConnector {
    exchanges: HashMap<String, Arc<MockExchange>>,
}

impl MockConnector {
    pub fn insert(&mut self, api_key: &str, exchange: MockExchange) {
        self.exchanges.insert(api_key.to_string(), Arc::new(exchange));
    }
}

impl TransportFactory for MockConnector {
    fn exchange_name(&self) -> &str {
        "mock"
    }

    fn connect(&self, credentials: Credentials) -> Arc<dyn SignedTransport> {
        self.exchanges
            .get(&credentials.api_key)
            .cloned()
            .unwrap_or_else(|| Arc::new(MockExchange::new()))
    }
}

/// Fixed credential map; accounts not present have none
#[derive(Default)]
pub struct StaticCredentials {
    credentials: Mutex<HashMap<String, Credentials>>,
}

impl StaticCredentials {
    pub fn insert(&self, account_id: &str, api_key: &str) {
        self.credentials.lock().unwrap().insert(
            account_id.to_string(),
            Credentials {
                api_key: api_key.to_string(),
                secret_key: "secret".to_string(),
                passphrase: "passphrase".to_string(),
            },
        );
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials_for(&self, account_id: &str) -> Result<Option<Credentials>, ApiError> {
        Ok(self.credentials.lock().unwrap().get(account_id).cloned())
    }
}
