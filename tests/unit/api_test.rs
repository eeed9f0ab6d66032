//! Tests for API error mapping and handlers

use job_award::core::{AwardError, BidStatus, JobStatus};
use job_award::runtime::{
    accept_bid, health, post_job, submit_bid, withdraw_bid, AcceptBidRequest, ApiError,
    ErrorCode, PostJobRequest, SubmitBidRequest, WithdrawBidRequest,
};

use crate::common::{harness, HOUR_MS};

#[test]
fn test_capacity_error_asks_for_upgrade() {
    let err = ApiError::from(AwardError::CapacityExceeded);
    assert_eq!(err.code, ErrorCode::CapacityExceeded);
    assert!(err.message.contains("Upgrade"));
    assert!(!err.retryable);
}

#[test]
fn test_transient_error_is_generic_and_retryable() {
    let err = ApiError::from(AwardError::Transient);
    assert_eq!(err.code, ErrorCode::Unavailable);
    assert!(err.message.contains("retry later"));
    assert!(err.retryable);
}

#[test]
fn test_error_code_serializes_snake_case() {
    let err = ApiError::from(AwardError::InvalidState("job is in_progress".into()));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "invalid_state");
    assert_eq!(json["message"], "job is in_progress");
    assert_eq!(json["retryable"], false);
}

#[test]
fn test_health() {
    assert!(health().ok);
}

#[tokio::test]
async fn test_handlers_drive_the_marketplace() {
    let h = harness();
    let poster = h.paid_user().await;
    let bidder = h.free_user(0).await;

    let job = post_job(
        &h.market,
        PostJobRequest {
            poster_id: poster,
            title: "Install blinds".into(),
            description: String::new(),
            budget: Some(2_500),
            deadline_ms: h.now() + HOUR_MS,
        },
    )
    .await
    .unwrap();

    let submit = |amount| SubmitBidRequest {
        job_id: job.id,
        bidder_id: bidder,
        proposed_amount: amount,
        message: None,
    };
    let first = submit_bid(&h.market, submit(200)).await.unwrap();
    let dup = submit_bid(&h.market, submit(210)).await.unwrap_err();
    assert_eq!(dup.code, ErrorCode::DuplicateBid);

    let withdrawn = withdraw_bid(
        &h.market,
        WithdrawBidRequest {
            job_id: job.id,
            bid_id: first.id,
            bidder_id: bidder,
        },
    )
    .await
    .unwrap();
    assert_eq!(withdrawn.status, BidStatus::Withdrawn);

    let second = submit_bid(&h.market, submit(190)).await.unwrap();
    let outcome = accept_bid(
        &h.market,
        AcceptBidRequest {
            job_id: job.id,
            bid_id: second.id,
            poster_id: poster,
            response_message: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.job.status, JobStatus::InProgress);

    let again = accept_bid(
        &h.market,
        AcceptBidRequest {
            job_id: job.id,
            bid_id: second.id,
            poster_id: poster,
            response_message: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(again.code, ErrorCode::InvalidState);
}
