#![allow(non_snake_case)]
use buy_earth::GRID_SQUARES;
use buy_earth::error::Error;
use buy_earth::test_helpers::{ALICE, BOB, TestContext, connected_session};

#[tokio::test]
async fn refresh__produces_a_full_snapshot() {
    let ctx = TestContext::new();
    ctx.ledger.squares.lock().unwrap()[7] = 0x00AB_CDEF;
    ctx.ledger
        .deposits
        .lock()
        .unwrap()
        .insert(ALICE.to_string(), 500);
    let mut sync = ctx.sync_engine();
    let session = connected_session(ALICE, "homestead");

    let snapshot = sync.refresh(&session).await.unwrap();

    assert_eq!(snapshot.squares.len(), GRID_SQUARES);
    assert_eq!(snapshot.squares[7], 0x00AB_CDEF);
    assert_eq!(snapshot.owner, BOB);
    assert_eq!(snapshot.viewer_deposit, 500);
}

#[tokio::test]
async fn refresh__requires_a_connected_session() {
    let ctx = TestContext::new();
    let mut sync = ctx.sync_engine();

    let err = sync
        .refresh(&buy_earth::session::Session::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SyncFailed(_)));
    // no ledger traffic for a session with no address
    assert_eq!(ctx.ledger.total_boundary_calls(), 0);
}

#[tokio::test]
async fn refresh__a_partial_failure_leaves_the_prior_snapshot_untouched() {
    let ctx = TestContext::new();
    let mut sync = ctx.sync_engine();
    let session = connected_session(ALICE, "homestead");

    // given a good snapshot
    sync.refresh(&session).await.unwrap();
    let before = sync.snapshot().cloned().unwrap();

    // when the owner read starts failing mid-refresh
    ctx.ledger.squares.lock().unwrap()[3] = 0x0011_2233;
    *ctx.ledger.fail_owner_read.lock().unwrap() = Some("node timed out".into());
    let err = sync.refresh(&session).await.unwrap_err();

    // then the error is reported and no half-updated state is visible
    assert!(matches!(err, Error::SyncFailed(_)));
    assert_eq!(sync.snapshot(), Some(&before));
}

#[tokio::test]
async fn refresh__rejects_a_wrong_length_grid() {
    let ctx = TestContext::new();
    ctx.ledger.squares.lock().unwrap().truncate(50);
    let mut sync = ctx.sync_engine();
    let session = connected_session(ALICE, "homestead");

    let err = sync.refresh(&session).await.unwrap_err();

    assert!(matches!(err, Error::SyncFailed(_)));
    assert!(sync.snapshot().is_none());
}

#[tokio::test]
async fn is_owner__matches_the_viewer_case_insensitively() {
    let ctx = TestContext::with_owner(&ALICE.to_uppercase());
    let mut sync = ctx.sync_engine();
    let session = connected_session(&ALICE.to_lowercase(), "homestead");

    let snapshot = sync.refresh(&session).await.unwrap();

    assert!(snapshot.is_owner(&session));
    assert!(!snapshot.is_owner(&connected_session(BOB, "homestead")));
}

#[tokio::test]
async fn invalidate__drops_the_snapshot() {
    let ctx = TestContext::new();
    let mut sync = ctx.sync_engine();
    let session = connected_session(ALICE, "homestead");
    sync.refresh(&session).await.unwrap();

    sync.invalidate();

    assert!(sync.snapshot().is_none());
}
