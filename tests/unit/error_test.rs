//! Tests for error types

use job_award::core::{AwardError, CollaboratorError, StoreError};

#[test]
fn test_award_error_display() {
    assert_eq!(
        AwardError::NotFound("job 42".into()).to_string(),
        "not found: job 42"
    );
    assert_eq!(
        AwardError::CapacityExceeded.to_string(),
        "credit capacity exceeded"
    );
    assert_eq!(
        AwardError::PostingThrottled { next_allowed_ms: 7 }.to_string(),
        "posting throttled until 7"
    );
}

#[test]
fn test_only_transient_is_retryable() {
    assert!(AwardError::Transient.is_retryable());
    for err in [
        AwardError::NotFound("x".into()),
        AwardError::Forbidden("x".into()),
        AwardError::InvalidState("x".into()),
        AwardError::DuplicateBid,
        AwardError::CapacityExceeded,
        AwardError::InvalidInput("x".into()),
    ] {
        assert!(!err.is_retryable(), "{err} must be terminal");
    }
}

#[test]
fn test_store_error_transience() {
    assert!(StoreError::Conflict.is_transient());
    assert!(StoreError::Unavailable("failover".into()).is_transient());
    assert!(!StoreError::Backend("corrupt page".into()).is_transient());
    assert_eq!(
        StoreError::Backend("corrupt page".into()).to_string(),
        "backend error: corrupt page"
    );
}

#[test]
fn test_collaborator_error_display() {
    let err = CollaboratorError::Unavailable("push gateway".into());
    assert!(err.to_string().contains("push gateway"));
}
