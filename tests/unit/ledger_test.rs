//! Tests for the account ledger service

use job_award::core::{Account, AwardError, StoreError, Tier};
use job_award::util::UserId;

use crate::common::harness;

#[tokio::test]
async fn test_open_account_retries_unavailable_store() {
    let h = harness();
    h.store.fail_next_commits([StoreError::Unavailable("blip".into())]);

    let id = UserId::new();
    h.market.ledger().open_account(Account::free(id)).await.unwrap();
    assert_eq!(h.credits_used(id).await, 0);
    assert_eq!(h.store.commit_count(), 1);
}

#[tokio::test]
async fn test_open_account_twice_is_invalid_state() {
    let h = harness();
    let id = h.free_user(1).await;

    let err = h
        .market
        .ledger()
        .open_account(Account::paid(id))
        .await
        .unwrap_err();
    assert!(matches!(err, AwardError::InvalidState(_)));
    let account = h.market.ledger().account(id).await.unwrap();
    assert_eq!(account.tier, Tier::Free);
    assert_eq!(account.credits_used, 1);
}

#[tokio::test]
async fn test_refund_below_zero_clamps() {
    let h = harness();
    let id = h.free_user(1).await;

    assert_eq!(h.market.ledger().adjust_credits(id, -5).await.unwrap(), 0);
    assert_eq!(h.credits_used(id).await, 0);
    assert_eq!(h.market.ledger().adjust_credits(id, 2).await.unwrap(), 2);
}

#[tokio::test]
async fn test_adjust_unknown_account_is_not_found() {
    let h = harness();
    let err = h
        .market
        .ledger()
        .adjust_credits(UserId::new(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AwardError::NotFound(_)));
}
