//! In-memory doubles for the agent and ledger boundaries, used by the
//! integration tests under `tests/`.

use crate::{
    GRID_SQUARES,
    agent::{
        AgentEvent,
        CallRequest,
        OperationHandle,
        WalletAgent,
    },
    error::{
        Error,
        Result,
    },
    ledger::LedgerClient,
    session::{
        ConnectionStore,
        Session,
        SessionManager,
    },
    sync::StateSyncEngine,
    tx::TransactionController,
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    path::PathBuf,
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
};

pub const ALICE: &str = "0xAAAA000000000000000000000000000000001111";
pub const BOB: &str = "0xBBBB000000000000000000000000000000002222";

pub fn connected_session(address: &str, network: &str) -> Session {
    Session {
        address: Some(address.to_string()),
        network: network.to_string(),
        persisted: true,
    }
}

/// Fresh per-test data directory under the OS temp dir.
pub fn temp_data_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("buy-earth-test-{}-{label}-{n}", std::process::id()))
}

#[derive(Default)]
pub struct FakeAgent {
    pub accounts: Mutex<Vec<String>>,
    pub network: Mutex<String>,
    pub unavailable: Mutex<bool>,
    pub rejection: Mutex<Option<String>>,
    pub queued_events: Mutex<VecDeque<AgentEvent>>,
    pub account_requests: AtomicUsize,
}

impl FakeAgent {
    pub fn new(accounts: &[&str], network: &str) -> Self {
        Self {
            accounts: Mutex::new(accounts.iter().map(|a| a.to_string()).collect()),
            network: Mutex::new(network.to_string()),
            ..Self::default()
        }
    }

    pub fn push_event(&self, event: AgentEvent) {
        self.queued_events.lock().unwrap().push_back(event);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn reject_next(&self, message: &str) {
        *self.rejection.lock().unwrap() = Some(message.to_string());
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(Error::AgentUnavailable);
        }
        Ok(())
    }
}

impl WalletAgent for FakeAgent {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        self.check_reachable()?;
        self.account_requests.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = self.rejection.lock().unwrap().take() {
            return Err(Error::ConnectionRejected(message));
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn network_name(&self) -> Result<String> {
        self.check_reachable()?;
        Ok(self.network.lock().unwrap().clone())
    }

    async fn call(&self, _request: CallRequest) -> Result<serde_json::Value> {
        Err(Error::Bridge("fake agent carries no ledger".into()))
    }

    async fn submit(&self, _request: CallRequest, _value: u128) -> Result<OperationHandle> {
        Err(Error::Bridge("fake agent carries no ledger".into()))
    }

    async fn await_confirmation(&self, _handle: &OperationHandle) -> Result<()> {
        Err(Error::Bridge("fake agent carries no ledger".into()))
    }

    async fn poll_events(&self) -> Result<Vec<AgentEvent>> {
        self.check_reachable()?;
        Ok(self.queued_events.lock().unwrap().drain(..).collect())
    }
}

/// Effect a submitted transaction will have once confirmed.
#[derive(Clone, Debug)]
enum PendingEffect {
    SetSquare { index: u8, color: u32 },
    Deposit { value: u128 },
    SetOwner { to: String },
    Withdraw,
}

pub struct FakeLedger {
    pub squares: Mutex<Vec<u32>>,
    pub owner: Mutex<String>,
    pub deposits: Mutex<HashMap<String, u128>>,
    /// The account whose deposits payable calls credit.
    pub viewer: Mutex<String>,
    pub fail_grid_read: Mutex<Option<String>>,
    pub fail_owner_read: Mutex<Option<String>>,
    pub fail_deposit_read: Mutex<Option<String>>,
    pub reject_submission: Mutex<Option<String>>,
    pub fail_confirmation: Mutex<Option<String>>,
    pub read_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pending: Mutex<HashMap<String, PendingEffect>>,
    next_tx: AtomicUsize,
    pub attached_values: Mutex<Vec<u128>>,
}

impl FakeLedger {
    pub fn new(owner: &str, viewer: &str) -> Self {
        Self {
            squares: Mutex::new(vec![0; GRID_SQUARES]),
            owner: Mutex::new(owner.to_string()),
            deposits: Mutex::new(HashMap::new()),
            viewer: Mutex::new(viewer.to_string()),
            fail_grid_read: Mutex::new(None),
            fail_owner_read: Mutex::new(None),
            fail_deposit_read: Mutex::new(None),
            reject_submission: Mutex::new(None),
            fail_confirmation: Mutex::new(None),
            read_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            pending: Mutex::new(HashMap::new()),
            next_tx: AtomicUsize::new(0),
            attached_values: Mutex::new(Vec::new()),
        }
    }

    pub fn total_boundary_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed) + self.submit_calls.load(Ordering::Relaxed)
    }

    fn submit_effect(&self, effect: PendingEffect, value: u128) -> Result<OperationHandle> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);
        self.attached_values.lock().unwrap().push(value);
        if let Some(message) = self.reject_submission.lock().unwrap().take() {
            return Err(Error::SubmissionRejected(message));
        }
        let tx = format!("0xtx{:04}", self.next_tx.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().unwrap().insert(tx.clone(), effect);
        Ok(OperationHandle(tx))
    }

    fn apply(&self, effect: PendingEffect) {
        match effect {
            PendingEffect::SetSquare { index, color } => {
                self.squares.lock().unwrap()[usize::from(index)] = color;
            }
            PendingEffect::Deposit { value } => {
                let viewer = self.viewer.lock().unwrap().clone();
                *self.deposits.lock().unwrap().entry(viewer).or_insert(0) += value;
            }
            PendingEffect::SetOwner { to } => {
                *self.owner.lock().unwrap() = to;
            }
            PendingEffect::Withdraw => {
                self.deposits.lock().unwrap().clear();
            }
        }
    }
}

impl LedgerClient for FakeLedger {
    async fn read_grid(&self) -> Result<Vec<u32>> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = self.fail_grid_read.lock().unwrap().clone() {
            return Err(Error::Bridge(message));
        }
        Ok(self.squares.lock().unwrap().clone())
    }

    async fn read_owner(&self) -> Result<String> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = self.fail_owner_read.lock().unwrap().clone() {
            return Err(Error::Bridge(message));
        }
        Ok(self.owner.lock().unwrap().clone())
    }

    async fn read_deposit(&self, account: &str) -> Result<u128> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = self.fail_deposit_read.lock().unwrap().clone() {
            return Err(Error::Bridge(message));
        }
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or(0))
    }

    async fn buy_square(&self, index: u8, color: u32, value: u128) -> Result<OperationHandle> {
        self.submit_effect(PendingEffect::SetSquare { index, color }, value)
    }

    async fn deposit(&self, value: u128) -> Result<OperationHandle> {
        self.submit_effect(PendingEffect::Deposit { value }, value)
    }

    async fn set_color(&self, index: u8, color: u32) -> Result<OperationHandle> {
        self.submit_effect(PendingEffect::SetSquare { index, color }, 0)
    }

    async fn withdraw_to(&self, _account: &str) -> Result<OperationHandle> {
        self.submit_effect(PendingEffect::Withdraw, 0)
    }

    async fn set_owner(&self, account: &str) -> Result<OperationHandle> {
        self.submit_effect(
            PendingEffect::SetOwner {
                to: account.to_string(),
            },
            0,
        )
    }

    async fn await_confirmation(&self, handle: OperationHandle) -> Result<()> {
        let effect = self.pending.lock().unwrap().remove(&handle.0);
        if let Some(message) = self.fail_confirmation.lock().unwrap().take() {
            return Err(Error::ConfirmationFailed(message));
        }
        match effect {
            Some(effect) => {
                self.apply(effect);
                Ok(())
            }
            None => Err(Error::ConfirmationFailed(format!(
                "unknown transaction {}",
                handle.0
            ))),
        }
    }
}

/// Wires the fakes into the real core components against a throwaway data
/// directory.
pub struct TestContext {
    pub agent: Arc<FakeAgent>,
    pub ledger: Arc<FakeLedger>,
    pub data_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_owner(BOB)
    }

    /// `owner` is the contract owner the fake ledger reports; the fake
    /// agent always signs as [`ALICE`] on "homestead".
    pub fn with_owner(owner: &str) -> Self {
        Self {
            agent: Arc::new(FakeAgent::new(&[ALICE], "homestead")),
            ledger: Arc::new(FakeLedger::new(owner, ALICE)),
            data_dir: temp_data_dir("ctx"),
        }
    }

    pub fn session_manager(&self) -> SessionManager<FakeAgent> {
        let store = ConnectionStore::new(&self.data_dir).expect("temp dir is writable");
        SessionManager::new(self.agent.clone(), store)
    }

    pub fn sync_engine(&self) -> StateSyncEngine<FakeLedger> {
        StateSyncEngine::new(self.ledger.clone())
    }

    pub fn controller(&self) -> TransactionController<FakeLedger> {
        TransactionController::new(self.ledger.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
