//! Stable interface over the Buy Earth ledger contract.
//!
//! No retry or caching lives here: a read either succeeds or fails, and a
//! state-changing call either yields an [`OperationHandle`] or a synchronous
//! rejection. Recovery policy belongs to the sync engine and the
//! transaction controller.

use crate::{
    GRID_SQUARES,
    agent::{
        CallRequest,
        OperationHandle,
        WalletAgent,
    },
    error::{
        Error,
        Result,
    },
};
use serde_json::json;
use std::sync::Arc;

/// Decimal places of the network's native unit.
pub const NATIVE_DECIMALS: u32 = 18;

pub trait LedgerClient {
    fn read_grid(&self) -> impl Future<Output = Result<Vec<u32>>>;
    fn read_owner(&self) -> impl Future<Output = Result<String>>;
    fn read_deposit(&self, account: &str) -> impl Future<Output = Result<u128>>;

    fn buy_square(
        &self,
        index: u8,
        color: u32,
        value: u128,
    ) -> impl Future<Output = Result<OperationHandle>>;
    fn deposit(&self, value: u128) -> impl Future<Output = Result<OperationHandle>>;
    fn set_color(&self, index: u8, color: u32) -> impl Future<Output = Result<OperationHandle>>;
    fn withdraw_to(&self, account: &str) -> impl Future<Output = Result<OperationHandle>>;
    fn set_owner(&self, account: &str) -> impl Future<Output = Result<OperationHandle>>;

    fn await_confirmation(&self, handle: OperationHandle) -> impl Future<Output = Result<()>>;
}

/// Ledger access routed through the signing agent, which doubles as the
/// RPC provider exactly like a browser wallet does.
pub struct AgentLedger<A> {
    agent: Arc<A>,
}

impl<A> AgentLedger<A> {
    pub fn new(agent: Arc<A>) -> Self {
        Self { agent }
    }
}

impl<A: WalletAgent> LedgerClient for AgentLedger<A> {
    async fn read_grid(&self) -> Result<Vec<u32>> {
        let raw = self
            .agent
            .call(CallRequest::new("getSquares", json!([])))
            .await?;
        let squares: Vec<u32> = serde_json::from_value(raw)
            .map_err(|e| Error::Bridge(format!("getSquares returned a malformed grid: {e}")))?;
        if squares.len() != GRID_SQUARES {
            return Err(Error::Bridge(format!(
                "getSquares returned {} squares, expected {GRID_SQUARES}",
                squares.len()
            )));
        }
        Ok(squares)
    }

    async fn read_owner(&self) -> Result<String> {
        let raw = self
            .agent
            .call(CallRequest::new("getOwner", json!([])))
            .await?;
        serde_json::from_value(raw)
            .map_err(|e| Error::Bridge(format!("getOwner returned a malformed address: {e}")))
    }

    async fn read_deposit(&self, account: &str) -> Result<u128> {
        let raw = self
            .agent
            .call(CallRequest::new("getUserDeposits", json!([account])))
            .await?;
        let wei: String = serde_json::from_value(raw)
            .map_err(|e| Error::Bridge(format!("getUserDeposits returned a malformed amount: {e}")))?;
        wei.parse::<u128>()
            .map_err(|_| Error::Bridge(format!("getUserDeposits returned non-numeric amount '{wei}'")))
    }

    async fn buy_square(&self, index: u8, color: u32, value: u128) -> Result<OperationHandle> {
        self.agent
            .submit(CallRequest::new("buySquare", json!([index, color])), value)
            .await
    }

    async fn deposit(&self, value: u128) -> Result<OperationHandle> {
        self.agent
            .submit(CallRequest::new("deposit", json!([])), value)
            .await
    }

    async fn set_color(&self, index: u8, color: u32) -> Result<OperationHandle> {
        self.agent
            .submit(CallRequest::new("setColor", json!([index, color])), 0)
            .await
    }

    async fn withdraw_to(&self, account: &str) -> Result<OperationHandle> {
        self.agent
            .submit(CallRequest::new("withdrawTo", json!([account])), 0)
            .await
    }

    async fn set_owner(&self, account: &str) -> Result<OperationHandle> {
        self.agent
            .submit(CallRequest::new("setOwner", json!([account])), 0)
            .await
    }

    async fn await_confirmation(&self, handle: OperationHandle) -> Result<()> {
        self.agent.await_confirmation(&handle).await
    }
}

/// Parse a positive decimal amount of the native unit into wei.
pub fn parse_units(amount: &str) -> Result<u128> {
    let trimmed = amount.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    let valid = !trimmed.is_empty()
        && (!whole.is_empty() || !frac.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
        && frac.len() <= NATIVE_DECIMALS as usize;
    if !valid {
        return Err(Error::Validation(format!(
            "'{amount}' is not a positive decimal amount"
        )));
    }
    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| Error::Validation(format!("'{amount}' is too large")))?
            .checked_mul(10u128.pow(NATIVE_DECIMALS))
            .ok_or_else(|| Error::Validation(format!("'{amount}' is too large")))?
    };
    let frac_wei = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(NATIVE_DECIMALS - frac.len() as u32);
        frac.parse::<u128>().unwrap_or(0) * scale
    };
    let wei = whole_wei
        .checked_add(frac_wei)
        .ok_or_else(|| Error::Validation(format!("'{amount}' is too large")))?;
    if wei == 0 {
        return Err(Error::Validation("amount must be greater than zero".into()));
    }
    Ok(wei)
}

/// Format wei as a trimmed decimal of the native unit ("0.001", "2", "0").
pub fn format_units(wei: u128) -> String {
    let base = 10u128.pow(NATIVE_DECIMALS);
    let whole = wei / base;
    let frac = wei % base;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:018}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn parse_units__handles_whole_and_fractional_amounts() {
        assert_eq!(parse_units("1").unwrap(), 10u128.pow(18));
        assert_eq!(parse_units("0.001").unwrap(), 1_000_000_000_000_000);
        assert_eq!(parse_units(".5").unwrap(), 5 * 10u128.pow(17));
        assert_eq!(parse_units("2.25").unwrap(), 225 * 10u128.pow(16));
    }

    #[test]
    fn parse_units__rejects_zero_and_malformed_input() {
        for bad in ["", "0", "0.0", "-1", "1.2.3", "abc", "1e18", "."] {
            assert!(
                matches!(parse_units(bad), Err(Error::Validation(_))),
                "expected rejection for '{bad}'"
            );
        }
    }

    #[test]
    fn parse_units__rejects_a_whole_part_beyond_u128() {
        // one past u128::MAX must not silently collapse to the fraction
        let oversized = format!("{}6.5", u128::MAX / 10);
        for bad in [oversized.as_str(), "340282366920938463463374607431768211456"] {
            assert!(
                matches!(parse_units(bad), Err(Error::Validation(_))),
                "expected rejection for '{bad}'"
            );
        }
    }

    #[test]
    fn parse_units__rejects_more_than_native_precision() {
        let too_precise = format!("0.{}1", "0".repeat(18));
        assert!(matches!(
            parse_units(&too_precise),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn format_units__trims_trailing_zeros() {
        assert_eq!(format_units(0), "0");
        assert_eq!(format_units(10u128.pow(18)), "1");
        assert_eq!(format_units(1_000_000_000_000_000), "0.001");
        assert_eq!(format_units(1_500_000_000_000_000_000), "1.5");
    }

    #[test]
    fn format_units__round_trips_parse_units() {
        for amount in ["0.001", "1", "12.75", "0.000000000000000001"] {
            let wei = parse_units(amount).unwrap();
            assert_eq!(format_units(wei), amount);
        }
    }
}
