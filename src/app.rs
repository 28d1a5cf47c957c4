//! Wires the core components together and drives the interactive loop.

use crate::{
    GRID_SQUARES,
    agent::{
        AgentEvent,
        HttpWalletAgent,
        WalletAgent,
    },
    audit::AuditLog,
    error::Error,
    ledger::{
        AgentLedger,
        LedgerClient,
        format_units,
    },
    session::{
        AccountChange,
        ConnectionStore,
        SessionManager,
        SessionState,
    },
    short_address,
    sync::StateSyncEngine,
    tx::{
        Operation,
        Status,
        TransactionController,
    },
    ui,
};
use color_eyre::eyre::Result;
use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::time;
use tracing::{
    info,
    warn,
};

pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8777";
const AGENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bridge_url: String,
    pub data_dir: PathBuf,
    /// Attempt a connection at startup even without the persisted flag.
    pub connect_on_start: bool,
}

/// Why the inner loop ended.
pub enum Exit {
    Quit,
    /// The agent's chain changed underneath us. Nothing read on the old
    /// chain is trustworthy, so the whole client state is rebuilt.
    Restart,
}

pub struct App<A, L> {
    pub sessions: SessionManager<A>,
    pub sync: StateSyncEngine<L>,
    pub controller: TransactionController<L>,
    pub audit: AuditLog,
    agent: Arc<A>,
    status: String,
}

impl<A, L> App<A, L> {
    pub fn new(agent: Arc<A>, ledger: Arc<L>, store: ConnectionStore) -> Self {
        Self {
            sessions: SessionManager::new(agent.clone(), store),
            sync: StateSyncEngine::new(ledger.clone()),
            controller: TransactionController::new(ledger),
            audit: AuditLog::new(),
            agent,
            status: String::from("Ready"),
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn view(&self) -> ui::AppView<'_> {
        let session = self.sessions.session();
        let snapshot = self.sync.snapshot();
        ui::AppView {
            session,
            state: self.sessions.state(),
            snapshot,
            is_owner: snapshot.map(|s| s.is_owner(session)).unwrap_or(false),
            deposit_label: snapshot
                .map(|s| format_units(s.viewer_deposit))
                .unwrap_or_else(|| "0".into()),
            audit: &self.audit,
            status: &self.status,
        }
    }
}

impl<A: WalletAgent, L: LedgerClient> App<A, L> {
    pub async fn connect(&mut self) {
        self.set_status("Connecting...");
        match self.sessions.connect().await {
            Ok(session) => {
                let who = session
                    .address
                    .as_deref()
                    .map(short_address)
                    .unwrap_or_default();
                let network = session.network.clone();
                info!(%who, %network, "wallet connected");
                self.set_status(format!("Connected to {who} on {network}"));
                self.refresh().await;
            }
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                self.set_status(err.to_string());
            }
        }
    }

    pub fn disconnect(&mut self) {
        if let Err(err) = self.sessions.disconnect() {
            warn!(error = %err, "failed to clear persisted connection flag");
        }
        // Ownership and deposit data must not outlive the session.
        self.sync.invalidate();
        self.set_status("Wallet disconnected");
    }

    pub async fn refresh(&mut self) {
        if !self.sessions.session().connected() {
            self.set_status("Connect a wallet first");
            return;
        }
        let session = self.sessions.session().clone();
        if let Err(err) = self.sync.refresh(&session).await {
            warn!(error = %err, "refresh failed");
            self.set_status(err.to_string());
        }
    }

    pub async fn submit(&mut self, op: Operation) {
        if !self.sessions.session().connected() {
            self.set_status("Connect a wallet first");
            return;
        }
        let kind = op.kind();
        self.set_status(format!("{kind}: waiting for confirmation..."));
        let session = self.sessions.session().clone();
        match self
            .controller
            .submit(op, &session, &mut self.sync, &mut self.audit)
            .await
        {
            Ok(outcome) => match outcome.status {
                Status::Confirmed => self.set_status(format!("Success! {}", outcome.message)),
                Status::Failed => self.set_status(format!("{kind} failed: {}", outcome.message)),
            },
            Err(err) => self.set_status(err.to_string()),
        }
    }

    /// Drain agent notifications. Returns `Some(Exit::Restart)` when the
    /// chain changed and the client must rebuild from scratch.
    pub async fn process_agent_events(&mut self) -> Option<Exit> {
        let events = match self.agent.poll_events().await {
            Ok(events) => events,
            Err(Error::AgentUnavailable) => return None,
            Err(err) => {
                warn!(error = %err, "agent event poll failed");
                return None;
            }
        };
        for event in events {
            match event {
                AgentEvent::ChainChanged => {
                    info!("chain changed; discarding all client state");
                    self.sessions.on_chain_changed();
                    return Some(Exit::Restart);
                }
                AgentEvent::AccountsChanged(accounts) => {
                    self.handle_accounts_changed(accounts).await;
                }
            }
        }
        None
    }

    async fn handle_accounts_changed(&mut self, accounts: Vec<String>) {
        if self.sessions.state() != SessionState::Connected {
            return;
        }
        match self.sessions.on_accounts_changed(accounts) {
            Ok(AccountChange::Disconnected) => {
                self.sync.invalidate();
                self.set_status("Wallet disconnected");
            }
            Ok(AccountChange::Switched(address)) => {
                self.set_status(format!("Switched to account {}", short_address(&address)));
                self.refresh().await;
            }
            Ok(AccountChange::Unchanged) => {}
            Err(err) => {
                warn!(error = %err, "accounts-changed handling failed");
                self.set_status(err.to_string());
            }
        }
    }

    /// Parse and run one command-line entry from the UI.
    pub async fn run_command(&mut self, input: &str, selected: usize) -> Option<Exit> {
        match parse_command(input, selected) {
            Ok(Command::Quit) => return Some(Exit::Quit),
            Ok(Command::Connect) => self.connect().await,
            Ok(Command::Disconnect) => self.disconnect(),
            Ok(Command::Refresh) => self.refresh().await,
            Ok(Command::Submit(op)) => self.submit(op).await,
            Err(message) => self.set_status(message),
        }
        None
    }
}

enum Command {
    Quit,
    Connect,
    Disconnect,
    Refresh,
    Submit(Operation),
}

fn parse_command(input: &str, selected: usize) -> Result<Command, String> {
    let mut parts = input.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();
    match (verb, rest.as_slice()) {
        ("quit" | "q", []) => Ok(Command::Quit),
        ("connect", []) => Ok(Command::Connect),
        ("disconnect", []) => Ok(Command::Disconnect),
        ("refresh", []) => Ok(Command::Refresh),
        ("buy", [color]) => Ok(Command::Submit(Operation::BuySquare {
            index: selected.min(GRID_SQUARES - 1) as u8,
            color: color.to_string(),
        })),
        ("deposit", [amount]) => Ok(Command::Submit(Operation::Deposit {
            amount: amount.to_string(),
        })),
        ("color", [index, color]) => {
            let index = index
                .parse::<u8>()
                .map_err(|_| format!("'{index}' is not a square index"))?;
            Ok(Command::Submit(Operation::SetColor {
                index,
                color: color.to_string(),
            }))
        }
        ("withdraw", [to]) => Ok(Command::Submit(Operation::Withdraw {
            to: to.to_string(),
        })),
        ("owner", [to]) => Ok(Command::Submit(Operation::TransferOwner {
            to: to.to_string(),
        })),
        ("", _) => Err(String::from("empty command")),
        _ => Err(format!(
            "unknown command '{input}'; try buy/deposit/color/withdraw/owner/refresh"
        )),
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();
    ui::terminal_enter(&mut ui_state)?;
    let result = run_generations(&config, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    result
}

/// One "generation" of client state per chain. A chain-changed signal ends
/// the generation and a fresh one is built, re-running initialization
/// (including auto-reconnect) from scratch.
async fn run_generations(
    config: &AppConfig,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let mut first_generation = true;
    loop {
        let agent = Arc::new(HttpWalletAgent::new(config.bridge_url.as_str())?);
        let ledger = Arc::new(AgentLedger::new(agent.clone()));
        let store = ConnectionStore::new(&config.data_dir)?;
        let mut app = App::new(agent, ledger, store);

        let connect_now = (first_generation && config.connect_on_start)
            || app.sessions.should_auto_connect();
        first_generation = false;

        match run_loop(&mut app, ui_state, input_events, connect_now).await? {
            Exit::Quit => return Ok(()),
            Exit::Restart => {
                ui_state.reset();
                continue;
            }
        }
    }
}

async fn run_loop<A: WalletAgent, L: LedgerClient>(
    app: &mut App<A, L>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    connect_on_start: bool,
) -> Result<Exit> {
    if connect_on_start {
        app.connect().await;
    }
    ui::draw(ui_state, &app.view())?;

    let mut agent_ticker = time::interval(AGENT_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = agent_ticker.tick() => {
                if let Some(exit) = app.process_agent_events().await {
                    return Ok(exit);
                }
                ui::draw(ui_state, &app.view())?;
            }
            raw = ui::next_raw_event(input_events) => {
                let Some(event) = ui::interpret_event(ui_state, raw?) else {
                    continue;
                };
                match event {
                    ui::UserEvent::Quit => return Ok(Exit::Quit),
                    ui::UserEvent::Connect => app.connect().await,
                    ui::UserEvent::Disconnect => app.disconnect(),
                    ui::UserEvent::Refresh => app.refresh().await,
                    ui::UserEvent::Command(text) => {
                        if let Some(exit) = app.run_command(&text, ui_state.selected()).await {
                            return Ok(exit);
                        }
                    }
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, &app.view())?;
            }
            _ = tokio::signal::ctrl_c() => return Ok(Exit::Quit),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn parse_command__buy_targets_the_selected_square() {
        let Ok(Command::Submit(Operation::BuySquare { index, color })) =
            parse_command("buy #112233", 42)
        else {
            panic!("expected a buy operation");
        };
        assert_eq!(index, 42);
        assert_eq!(color, "#112233");
    }

    #[test]
    fn parse_command__rejects_unknown_verbs() {
        assert!(parse_command("stake 5", 0).is_err());
        assert!(parse_command("", 0).is_err());
    }

    #[test]
    fn parse_command__owner_actions_carry_the_address() {
        let Ok(Command::Submit(Operation::TransferOwner { to })) =
            parse_command("owner 0xBBBB000000000000000000000000000000002222", 0)
        else {
            panic!("expected a transfer operation");
        };
        assert_eq!(to, "0xBBBB000000000000000000000000000000002222");
    }
}
