//! Shared harness for end-to-end API tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use charitrace::blockchain::{
    ChainClient, ChainDonation, ChainError, ChainReceipt, ChainResult, CharityFlow,
    OnChainDonation,
};
use charitrace::config::{CharitraceConfig, VerificationMode};
use charitrace::db::Database;
use charitrace::http::HttpServer;
use charitrace::lifecycle::startup::compose;
use charitrace::lifecycle::Shutdown;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Chain stand-in that can be switched between healthy and failing, and
/// slowed down to simulate waiting for mining.
#[derive(Default)]
pub struct ToggleChain {
    failing: AtomicBool,
    submissions: AtomicU64,
    delay_ms: AtomicU64,
}

impl ToggleChain {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ToggleChain {
    async fn record_donation(&self, _donation: &ChainDonation) -> ChainResult<ChainReceipt> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("connection refused".to_string()));
        }
        Ok(ChainReceipt {
            transaction_hash: format!("0x{:064x}", n),
            block_number: 100 + n,
            gas_used: "21000".to_string(),
            chain_donation_id: Some(n.to_string()),
        })
    }

    async fn get_donation(&self, chain_donation_id: u64) -> ChainResult<OnChainDonation> {
        if chain_donation_id == 0 || chain_donation_id > self.submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Reverted(format!("unknown donation {}", chain_donation_id)));
        }
        Ok(OnChainDonation {
            chain_donation_id: chain_donation_id.to_string(),
            transaction_id: format!("txn_{}", chain_donation_id),
            donor_id: "donor_1".to_string(),
            charity_id: "charity_1".to_string(),
            project_id: None,
            amount: "1000".to_string(),
            currency: "usd".to_string(),
            anonymous: false,
            recorded_at: 1_700_000_000,
        })
    }

    async fn get_donations_by_charity(&self, _charity_id: &str) -> ChainResult<Vec<String>> {
        Ok(vec!["1".to_string(), "2".to_string()])
    }

    async fn get_charity_flow(&self, charity_id: &str) -> ChainResult<CharityFlow> {
        Ok(CharityFlow {
            charity_id: charity_id.to_string(),
            received: "5000".to_string(),
            disbursed: "1000".to_string(),
            balance: "4000".to_string(),
        })
    }

    async fn is_healthy(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub chain: Arc<ToggleChain>,
    pub shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a payment intent and return its id.
    pub async fn create_donation(&self, amount_cents: i64) -> i64 {
        let res = self
            .client
            .post(self.url("/api/donations"))
            .json(&json!({
                "amount_cents": amount_cents,
                "currency": "usd",
                "donor_id": "donor_1",
                "charity_id": "charity_1",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn confirm(&self, id: i64) -> Value {
        let res = self
            .client
            .post(self.url(&format!("/api/donations/{}/confirm", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        res.json().await.unwrap()
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status().as_u16();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve the full router on an ephemeral port over an in-memory database.
pub async fn spawn_app(mode: VerificationMode) -> TestApp {
    spawn_app_with(|config| config.verification.mode = mode).await
}

/// Like `spawn_app`, with `configure` applied on top of the test defaults.
pub async fn spawn_app_with(configure: impl FnOnce(&mut CharitraceConfig)) -> TestApp {
    let mut config = CharitraceConfig::default();
    config.verification.max_batch_size = 5;
    config.admin.api_key = ADMIN_KEY.to_string();
    config.observability.metrics_enabled = false;
    configure(&mut config);

    let db = Database::in_memory().await.unwrap();
    let chain = Arc::new(ToggleChain::default());
    let state = compose(db, chain.clone(), config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        HttpServer::new(state).run(listener, rx).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        chain,
        shutdown,
    }
}
