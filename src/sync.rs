//! Mirrors remote ledger state into one consistent local snapshot.
//!
//! A refresh either replaces the held [`GridSnapshot`] wholesale or leaves
//! it untouched. Partial updates are disallowed: showing a grid from one
//! read mixed with an owner from another is exactly the torn state this
//! engine exists to prevent.

use crate::{
    GRID_SQUARES,
    color,
    error::{
        Error,
        Result,
    },
    ledger::LedgerClient,
    session::Session,
};
use std::sync::Arc;

/// One fully-consistent read of ledger state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridSnapshot {
    /// Exactly [`GRID_SQUARES`] color integers; 0 means unowned.
    pub squares: Vec<u32>,
    pub owner: String,
    /// The connected account's deposit balance in wei, always re-read from
    /// the ledger, never incremented locally.
    pub viewer_deposit: u128,
}

impl GridSnapshot {
    /// Case-insensitive ownership check against the viewing session.
    pub fn is_owner(&self, session: &Session) -> bool {
        session
            .address
            .as_deref()
            .is_some_and(|addr| addr.eq_ignore_ascii_case(&self.owner))
    }
}

pub struct StateSyncEngine<L> {
    ledger: Arc<L>,
    snapshot: Option<GridSnapshot>,
}

impl<L> StateSyncEngine<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            snapshot: None,
        }
    }

    pub fn snapshot(&self) -> Option<&GridSnapshot> {
        self.snapshot.as_ref()
    }

    /// Drop the held snapshot. Called on disconnect so no stale ownership
    /// or deposit data outlives its session.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

impl<L: LedgerClient> StateSyncEngine<L> {
    /// Pull grid, owner, and viewer deposit, and replace the held snapshot
    /// only if all three reads succeed. On failure the previous snapshot
    /// stays as it was and the caller gets [`Error::SyncFailed`].
    pub async fn refresh(&mut self, session: &Session) -> Result<&GridSnapshot> {
        let address = session
            .address
            .as_deref()
            .ok_or_else(|| Error::sync(Error::Validation("no connected account".into())))?;
        let fresh = self.read_consistent(address).await.map_err(Error::sync)?;
        Ok(self.snapshot.insert(fresh))
    }

    async fn read_consistent(&self, address: &str) -> Result<GridSnapshot> {
        let squares = self.ledger.read_grid().await?;
        if squares.len() != GRID_SQUARES {
            return Err(Error::Bridge(format!(
                "grid read returned {} squares, expected {GRID_SQUARES}",
                squares.len()
            )));
        }
        if let Some(bad) = squares.iter().find(|c| **c > color::MAX_COLOR) {
            return Err(Error::Bridge(format!(
                "grid contains out-of-range color {bad:#x}"
            )));
        }
        let owner = self.ledger.read_owner().await?;
        let viewer_deposit = self.ledger.read_deposit(address).await?;
        Ok(GridSnapshot {
            squares,
            owner,
            viewer_deposit,
        })
    }
}
