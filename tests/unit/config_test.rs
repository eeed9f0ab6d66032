//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use job_award::config::MarketplaceConfig;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = MarketplaceConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.ledger.free_credit_quota, 3);
    assert_eq!(cfg.throttle.free_post_cooldown_secs, 86_400);
    assert!(cfg.enforce_capacity_on_submit);
    assert_eq!(cfg.sweep_interval(), Duration::from_secs(60));
}

#[test]
fn test_invalid_values_are_rejected() {
    let mut cfg = MarketplaceConfig::default();
    cfg.assignment.max_commit_attempts = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = MarketplaceConfig::default();
    cfg.assignment.backoff_base_ms = 500;
    cfg.assignment.backoff_max_ms = 100;
    assert!(cfg.validate().is_err());

    let mut cfg = MarketplaceConfig::default();
    cfg.sweeper.batch_limit = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = MarketplaceConfig::default();
    cfg.sweeper.interval_secs = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = MarketplaceConfig::default();
    cfg.assignment.rejection_message = " ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = MarketplaceConfig::from_json_str(
        r#"{ "ledger": { "free_credit_quota": 5 }, "sweeper": { "interval_secs": 30 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.ledger.free_credit_quota, 5);
    assert_eq!(cfg.sweeper.interval_secs, 30);
    assert_eq!(cfg.sweeper.batch_limit, 500);
    assert_eq!(cfg.ledger_policy().free_credit_quota, 5);
}

#[test]
fn test_from_json_str_rejects_bad_input() {
    assert!(MarketplaceConfig::from_json_str("not json").is_err());
    assert!(MarketplaceConfig::from_json_str(r#"{ "sweeper": { "batch_limit": 0 } }"#).is_err());
}

#[test]
fn test_from_lookup_overrides() {
    let cfg = MarketplaceConfig::from_lookup(lookup(&[
        ("JOB_AWARD_FREE_CREDIT_QUOTA", "10"),
        ("JOB_AWARD_MAX_COMMIT_ATTEMPTS", " 8 "),
        ("JOB_AWARD_FREE_POST_COOLDOWN_SECS", "3600"),
        ("JOB_AWARD_ENFORCE_CAPACITY_ON_SUBMIT", "false"),
        ("JOB_AWARD_REJECTION_MESSAGE", "Position filled."),
    ]))
    .unwrap();

    assert_eq!(cfg.ledger.free_credit_quota, 10);
    assert_eq!(cfg.retry_policy().max_attempts, 8);
    assert_eq!(cfg.posting_throttle().cooldown(), Duration::from_secs(3600));
    assert!(!cfg.enforce_capacity_on_submit);
    assert_eq!(cfg.assignment.rejection_message, "Position filled.");
}

#[test]
fn test_from_lookup_reports_unparsable_value() {
    let err = MarketplaceConfig::from_lookup(lookup(&[("JOB_AWARD_SWEEP_BATCH_LIMIT", "many")]))
        .unwrap_err();
    assert!(err.contains("JOB_AWARD_SWEEP_BATCH_LIMIT"));
}
