//! Submission lifecycle for state-changing ledger operations.
//!
//! Each submission is validated locally before the signing agent is
//! touched, then runs Submitted → Confirmed | Failed exactly once. On
//! confirmation the controller appends one audit entry and re-syncs the
//! snapshot, in that order. Failure is terminal for that submission; every
//! attempt is fee-bearing, so nothing is retried automatically.

use crate::{
    GRID_SQUARES,
    SQUARE_PRICE_DISPLAY,
    SQUARE_PRICE_WEI,
    audit::AuditLog,
    color,
    error::{
        Error,
        Result,
    },
    ledger::{
        LedgerClient,
        format_units,
        parse_units,
    },
    session::Session,
    short_address,
    sync::StateSyncEngine,
};
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

/// A user action against the ledger, with the parameters as entered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    BuySquare { index: u8, color: String },
    Deposit { amount: String },
    SetColor { index: u8, color: String },
    Withdraw { to: String },
    TransferOwner { to: String },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::BuySquare { .. } => "Buy",
            Operation::Deposit { .. } => "Deposit",
            Operation::SetColor { .. } => "Set Color",
            Operation::Withdraw { .. } => "Withdraw",
            Operation::TransferOwner { .. } => "Transfer Ownership",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Confirmed,
    Failed,
}

/// Terminal report for one submission, surfaced to the UI as a transient
/// notification. Not retained as state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub kind: &'static str,
    pub status: Status,
    pub message: String,
}

/// Operation with its parameters parsed and range-checked, ready to
/// dispatch.
enum Prepared {
    BuySquare { index: u8, color: u32 },
    Deposit { wei: u128 },
    SetColor { index: u8, color: u32 },
    Withdraw { to: String },
    TransferOwner { to: String },
}

impl Prepared {
    /// Human-readable summary recorded in the audit log on confirmation.
    fn summary(&self) -> String {
        match self {
            Prepared::BuySquare { index, .. } => format!("Purchased square #{index}"),
            Prepared::Deposit { wei } => format!("Deposited {} ETH", format_units(*wei)),
            Prepared::SetColor { index, .. } => format!("Changed color of square #{index}"),
            Prepared::Withdraw { to } => format!("Funds withdrawn to {}", short_address(to)),
            Prepared::TransferOwner { to } => format!("Transferred to {}", short_address(to)),
        }
    }
}

pub struct TransactionController<L> {
    ledger: Arc<L>,
}

impl<L> TransactionController<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

impl<L: LedgerClient> TransactionController<L> {
    /// Run one submission to its terminal status.
    ///
    /// Returns `Err(Error::Validation(..))` without touching the network
    /// when the input is malformed; otherwise always returns an [`Outcome`].
    /// The confirmed path runs the serialized sequence status → audit
    /// append → snapshot refresh, so readers never observe an entry for an
    /// unconfirmed action.
    pub async fn submit(
        &self,
        op: Operation,
        session: &Session,
        sync: &mut StateSyncEngine<L>,
        audit: &mut AuditLog,
    ) -> Result<Outcome> {
        let kind = op.kind();
        let prepared = validate(&op)?;

        let handle = match self.dispatch(&prepared).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(kind, error = %err, "submission rejected before broadcast");
                return Ok(Outcome {
                    kind,
                    status: Status::Failed,
                    message: err.to_string(),
                });
            }
        };

        info!(kind, tx = %handle.0, "operation submitted; awaiting confirmation");
        match self.ledger.await_confirmation(handle).await {
            Ok(()) => {
                let details = prepared.summary();
                audit.record(kind, &details);
                if let Err(err) = sync.refresh(session).await {
                    // The action still confirmed; the next explicit refresh
                    // will catch the snapshot up.
                    warn!(kind, error = %err, "post-confirmation refresh failed");
                }
                Ok(Outcome {
                    kind,
                    status: Status::Confirmed,
                    message: details,
                })
            }
            Err(err) => {
                warn!(kind, error = %err, "confirmation failed");
                Ok(Outcome {
                    kind,
                    status: Status::Failed,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn dispatch(&self, prepared: &Prepared) -> Result<crate::agent::OperationHandle> {
        match prepared {
            Prepared::BuySquare { index, color } => {
                self.ledger
                    .buy_square(*index, *color, SQUARE_PRICE_WEI)
                    .await
            }
            Prepared::Deposit { wei } => self.ledger.deposit(*wei).await,
            Prepared::SetColor { index, color } => self.ledger.set_color(*index, *color).await,
            Prepared::Withdraw { to } => self.ledger.withdraw_to(to).await,
            Prepared::TransferOwner { to } => self.ledger.set_owner(to).await,
        }
    }
}

fn validate(op: &Operation) -> Result<Prepared> {
    match op {
        Operation::BuySquare { index, color } => Ok(Prepared::BuySquare {
            index: validate_index(*index)?,
            color: validate_color(color)?,
        }),
        Operation::Deposit { amount } => Ok(Prepared::Deposit {
            wei: parse_units(amount)?,
        }),
        Operation::SetColor { index, color } => Ok(Prepared::SetColor {
            index: validate_index(*index)?,
            color: validate_color(color)?,
        }),
        Operation::Withdraw { to } => Ok(Prepared::Withdraw {
            to: validate_address(to)?,
        }),
        Operation::TransferOwner { to } => Ok(Prepared::TransferOwner {
            to: validate_address(to)?,
        }),
    }
}

fn validate_index(index: u8) -> Result<u8> {
    if usize::from(index) >= GRID_SQUARES {
        return Err(Error::Validation(format!(
            "square index {index} is out of range (0-{})",
            GRID_SQUARES - 1
        )));
    }
    Ok(index)
}

fn validate_color(color: &str) -> Result<u32> {
    match color::to_int(color) {
        Ok(value) => Ok(value),
        Err(Error::InvalidColorFormat(s)) => Err(Error::Validation(format!(
            "'{s}' is not a #RRGGBB color"
        ))),
        Err(other) => Err(other),
    }
}

/// Addresses are `0x` followed by 20 hex-encoded bytes.
pub fn validate_address(address: &str) -> Result<String> {
    let stripped = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"));
    let valid = stripped
        .map(|digits| digits.len() == 40 && hex::decode(digits).is_ok())
        .unwrap_or(false);
    if !valid {
        return Err(Error::Validation(format!(
            "'{address}' is not a valid account address"
        )));
    }
    Ok(address.to_string())
}

/// Fixed price of one square, for display alongside buy prompts.
pub fn square_price_label() -> String {
    format!("{SQUARE_PRICE_DISPLAY} ETH")
}
