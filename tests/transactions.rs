#![allow(non_snake_case)]
use buy_earth::SQUARE_PRICE_WEI;
use buy_earth::audit::{AUDIT_DEPTH, AuditLog};
use buy_earth::error::Error;
use buy_earth::test_helpers::{ALICE, BOB, TestContext, connected_session};
use buy_earth::tx::{Operation, Status};

#[tokio::test]
async fn buy_square__confirms_records_and_refreshes() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    // when
    let outcome = controller
        .submit(
            Operation::BuySquare {
                index: 42,
                color: "#112233".into(),
            },
            &session,
            &mut sync,
            &mut audit,
        )
        .await
        .unwrap();

    // then the purchase confirmed with the fixed price attached
    assert_eq!(outcome.status, Status::Confirmed);
    assert_eq!(
        ctx.ledger.attached_values.lock().unwrap().as_slice(),
        &[SQUARE_PRICE_WEI]
    );
    // the audit trail leads with the purchase
    let newest = audit.newest().unwrap();
    assert_eq!(newest.kind, "Buy");
    assert_eq!(newest.details, "Purchased square #42");
    // and the refreshed snapshot shows the new color
    assert_eq!(sync.snapshot().unwrap().squares[42], 0x0011_2233);
}

#[tokio::test]
async fn submit__validation_failures_never_reach_the_ledger() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    for op in [
        Operation::BuySquare {
            index: 200,
            color: "#112233".into(),
        },
        Operation::SetColor {
            index: 3,
            color: "red".into(),
        },
        Operation::Deposit {
            amount: "0".into(),
        },
        Operation::Withdraw {
            to: "0x1234".into(),
        },
        Operation::TransferOwner {
            to: "not-an-address".into(),
        },
    ] {
        let err = controller
            .submit(op, &session, &mut sync, &mut audit)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    assert_eq!(ctx.ledger.total_boundary_calls(), 0);
    assert!(audit.is_empty());
}

#[tokio::test]
async fn submit__a_rejected_submission_fails_without_an_audit_entry() {
    let ctx = TestContext::new();
    ctx.ledger
        .reject_submission
        .lock()
        .unwrap()
        .replace("insufficient funds".into());
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    let outcome = controller
        .submit(
            Operation::Deposit {
                amount: "0.5".into(),
            },
            &session,
            &mut sync,
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Failed);
    assert!(outcome.message.contains("insufficient funds"));
    assert!(audit.is_empty());
    assert!(sync.snapshot().is_none());
}

#[tokio::test]
async fn submit__a_failed_confirmation_leaves_no_trace() {
    let ctx = TestContext::new();
    ctx.ledger
        .fail_confirmation
        .lock()
        .unwrap()
        .replace("reverted".into());
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    let outcome = controller
        .submit(
            Operation::SetColor {
                index: 5,
                color: "#ABCDEF".into(),
            },
            &session,
            &mut sync,
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Failed);
    assert!(audit.is_empty());
    assert_eq!(ctx.ledger.squares.lock().unwrap()[5], 0);
}

#[tokio::test]
async fn deposit__credits_the_viewer_and_lands_in_the_snapshot() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    let outcome = controller
        .submit(
            Operation::Deposit {
                amount: "0.5".into(),
            },
            &session,
            &mut sync,
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Confirmed);
    assert_eq!(audit.newest().unwrap().kind, "Deposit");
    assert_eq!(audit.newest().unwrap().details, "Deposited 0.5 ETH");
    assert_eq!(
        sync.snapshot().unwrap().viewer_deposit,
        500_000_000_000_000_000
    );
}

#[tokio::test]
async fn transfer_owner__confirmation_shows_up_on_the_next_snapshot() {
    let ctx = TestContext::with_owner(ALICE);
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    let outcome = controller
        .submit(
            Operation::TransferOwner { to: BOB.into() },
            &session,
            &mut sync,
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Confirmed);
    assert_eq!(audit.newest().unwrap().kind, "Transfer Ownership");
    let snapshot = sync.snapshot().unwrap();
    assert_eq!(snapshot.owner, BOB);
    assert!(!snapshot.is_owner(&session));
}

#[tokio::test]
async fn audit__history_is_newest_first_and_capped() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    let mut sync = ctx.sync_engine();
    let mut audit = AuditLog::new();
    let session = connected_session(ALICE, "homestead");

    for index in 0..(AUDIT_DEPTH as u8 + 3) {
        controller
            .submit(
                Operation::SetColor {
                    index,
                    color: "#010101".into(),
                },
                &session,
                &mut sync,
                &mut audit,
            )
            .await
            .unwrap();
    }

    assert_eq!(audit.len(), AUDIT_DEPTH);
    let details: Vec<&str> = audit.entries().map(|e| e.details.as_str()).collect();
    assert_eq!(details[0], "Changed color of square #12");
    assert_eq!(details[AUDIT_DEPTH - 1], "Changed color of square #3");
}
