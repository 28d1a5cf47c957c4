//! Boundary to the external signing agent.
//!
//! The agent is a local wallet-bridge daemon that holds the user's key
//! material, prompts for approval, and relays both reads and signed
//! state-changing calls to the ledger. The core never sees a private key;
//! it speaks a small HTTP API and treats every response as untrusted input.

use crate::error::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use tokio::time;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Notifications the agent pushes at the client. `ChainChanged` carries no
/// payload on purpose: nothing read on the old chain survives it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    AccountsChanged(Vec<String>),
    ChainChanged,
}

/// One contract call, read-only or state-changing, as the bridge accepts it.
#[derive(Clone, Debug, Serialize)]
pub struct CallRequest {
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl CallRequest {
    pub fn new(method: &'static str, params: serde_json::Value) -> Self {
        Self { method, params }
    }
}

/// Identifier for a broadcast transaction, awaited for confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationHandle(pub String);

pub trait WalletAgent {
    /// Ask the agent for account access. The agent may prompt the user.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Name of the network the agent is currently pointed at.
    fn network_name(&self) -> impl Future<Output = Result<String>>;

    /// Read-only contract call.
    fn call(&self, request: CallRequest) -> impl Future<Output = Result<serde_json::Value>>;

    /// Sign and broadcast a state-changing call with `value` wei attached.
    /// Fails with [`Error::SubmissionRejected`] if the agent declines
    /// before broadcast.
    fn submit(
        &self,
        request: CallRequest,
        value: u128,
    ) -> impl Future<Output = Result<OperationHandle>>;

    /// Block until the transaction behind `handle` reaches a terminal
    /// state. Fails with [`Error::ConfirmationFailed`] on revert.
    fn await_confirmation(&self, handle: &OperationHandle) -> impl Future<Output = Result<()>>;

    /// Drain pending accounts-changed / chain-changed notifications.
    fn poll_events(&self) -> impl Future<Output = Result<Vec<AgentEvent>>>;
}

#[derive(Clone)]
pub struct HttpWalletAgent {
    base_url: String,
    http: reqwest::Client,
}

impl HttpWalletAgent {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().build()?;
        Ok(Self { base_url, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A bridge that cannot be reached at all means no signing agent is
    /// installed or running, which is its own user-facing condition.
    fn map_transport(err: reqwest::Error) -> Error {
        if err.is_connect() || err.is_timeout() {
            Error::AgentUnavailable
        } else {
            Error::Http(err)
        }
    }

    async fn rejection_message(res: reqwest::Response) -> String {
        let status = res.status();
        match res.json::<ErrorDto>().await {
            Ok(dto) => dto.error,
            Err(_) => format!("bridge responded with {status}"),
        }
    }
}

impl WalletAgent for HttpWalletAgent {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        let res = self
            .http
            .post(self.url("/accounts/request"))
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !res.status().is_success() {
            return Err(Error::ConnectionRejected(
                Self::rejection_message(res).await,
            ));
        }
        let dto: AccountsDto = res
            .json()
            .await
            .map_err(|e| Error::Bridge(format!("invalid accounts payload: {e}")))?;
        Ok(dto.accounts)
    }

    async fn network_name(&self) -> Result<String> {
        let res = self
            .http
            .get(self.url("/network"))
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !res.status().is_success() {
            return Err(Error::Bridge(Self::rejection_message(res).await));
        }
        let dto: NetworkDto = res
            .json()
            .await
            .map_err(|e| Error::Bridge(format!("invalid network payload: {e}")))?;
        Ok(dto.name)
    }

    async fn call(&self, request: CallRequest) -> Result<serde_json::Value> {
        let res = self
            .http
            .post(self.url("/call"))
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !res.status().is_success() {
            return Err(Error::Bridge(Self::rejection_message(res).await));
        }
        let dto: CallResultDto = res
            .json()
            .await
            .map_err(|e| Error::Bridge(format!("invalid call result payload: {e}")))?;
        Ok(dto.result)
    }

    async fn submit(&self, request: CallRequest, value: u128) -> Result<OperationHandle> {
        let body = SubmitDto {
            method: request.method,
            params: request.params,
            // wei amounts overflow JSON numbers, so they travel as strings
            value: value.to_string(),
        };
        let res = self
            .http
            .post(self.url("/submit"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !res.status().is_success() {
            return Err(Error::SubmissionRejected(
                Self::rejection_message(res).await,
            ));
        }
        let dto: SubmittedDto = res
            .json()
            .await
            .map_err(|e| Error::Bridge(format!("invalid submission payload: {e}")))?;
        Ok(OperationHandle(dto.tx))
    }

    async fn await_confirmation(&self, handle: &OperationHandle) -> Result<()> {
        loop {
            let res = self
                .http
                .get(self.url(&format!("/receipt/{}", handle.0)))
                .send()
                .await
                .map_err(Self::map_transport)?;
            if !res.status().is_success() {
                return Err(Error::Bridge(Self::rejection_message(res).await));
            }
            let dto: ReceiptDto = res
                .json()
                .await
                .map_err(|e| Error::Bridge(format!("invalid receipt payload: {e}")))?;
            match dto.status.as_str() {
                "confirmed" => return Ok(()),
                "failed" => {
                    let reason = dto.error.unwrap_or_else(|| "transaction reverted".into());
                    return Err(Error::ConfirmationFailed(reason));
                }
                _ => time::sleep(RECEIPT_POLL_INTERVAL).await,
            }
        }
    }

    async fn poll_events(&self) -> Result<Vec<AgentEvent>> {
        let res = self
            .http
            .get(self.url("/events"))
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !res.status().is_success() {
            return Err(Error::Bridge(Self::rejection_message(res).await));
        }
        let dto: EventsDto = res
            .json()
            .await
            .map_err(|e| Error::Bridge(format!("invalid events payload: {e}")))?;
        Ok(dto.events.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Deserialize)]
struct AccountsDto {
    accounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CallResultDto {
    result: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SubmitDto {
    method: &'static str,
    params: serde_json::Value,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SubmittedDto {
    tx: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptDto {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum EventDto {
    AccountsChanged { accounts: Vec<String> },
    ChainChanged,
}

#[derive(Debug, Deserialize)]
struct EventsDto {
    events: Vec<EventDto>,
}

impl From<EventDto> for AgentEvent {
    fn from(dto: EventDto) -> Self {
        match dto {
            EventDto::AccountsChanged { accounts } => AgentEvent::AccountsChanged(accounts),
            EventDto::ChainChanged => AgentEvent::ChainChanged,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn events__decode_from_the_bridge_wire_format() {
        let json = r#"{"events":[
            {"type":"accountsChanged","accounts":["0xabc"]},
            {"type":"chainChanged"}
        ]}"#;

        let dto: EventsDto = serde_json::from_str(json).unwrap();
        let events: Vec<AgentEvent> = dto.events.into_iter().map(Into::into).collect();

        assert_eq!(
            events,
            vec![
                AgentEvent::AccountsChanged(vec!["0xabc".into()]),
                AgentEvent::ChainChanged,
            ]
        );
    }

    #[test]
    fn submit_dto__carries_the_value_as_a_string() {
        let dto = SubmitDto {
            method: "buySquare",
            params: serde_json::json!([42, 0x112233]),
            value: u128::MAX.to_string(),
        };

        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["value"], "340282366920938463463374607431768211455");
    }
}
