//! Tests for builder modules

use std::sync::Arc;

use job_award::builders::{build_marketplace, MarketplaceBuilder};
use job_award::config::MarketplaceConfig;
use job_award::core::{Account, Collaborators, NewJob};
use job_award::infra::{InMemoryStore, TracingBroadcaster, TracingConversations, TracingNotifier};
use job_award::runtime::TokioSpawner;
use job_award::util::UserId;

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let mut cfg = MarketplaceConfig::default();
    cfg.assignment.max_commit_attempts = 0;
    let spawner = TokioSpawner::current().unwrap();

    let err = MarketplaceBuilder::new(cfg).build(spawner).err().unwrap();
    assert!(format!("{err:#}").contains("max_commit_attempts"));
}

#[tokio::test]
async fn test_builder_defaults_are_usable() {
    let market = MarketplaceBuilder::default()
        .build(TokioSpawner::current().unwrap())
        .unwrap();
    assert_eq!(market.config(), &MarketplaceConfig::default());
    assert_eq!(market.ledger().policy().free_credit_quota, 3);

    let poster = UserId::new();
    market.ledger().open_account(Account::free(poster)).await.unwrap();
    let job = market
        .post_job(
            poster,
            NewJob {
                title: "Smoke test".into(),
                description: String::new(),
                budget: None,
                deadline: job_award::util::now_ms() + 60_000,
            },
        )
        .await
        .unwrap();
    assert_eq!(market.board().job(job.id).await.unwrap().title, "Smoke test");
}

#[tokio::test]
async fn test_build_marketplace_shares_the_store() {
    let store = Arc::new(InMemoryStore::new());
    let collaborators = Collaborators::new(
        Arc::new(TracingNotifier),
        Arc::new(TracingBroadcaster),
        Arc::new(TracingConversations),
    );
    let market = build_marketplace(
        &MarketplaceConfig::default(),
        store.clone(),
        collaborators,
        TokioSpawner::current().unwrap(),
    )
    .unwrap();

    let id = UserId::new();
    market.ledger().open_account(Account::paid(id)).await.unwrap();
    assert_eq!(store.commit_count(), 1);
    assert!(market.ledger().open_account(Account::paid(id)).await.is_err());
}

#[tokio::test]
async fn test_built_coordinator_awards_against_the_shared_ledger() {
    let h = crate::common::harness();
    let poster = h.paid_user().await;
    let bidder = h.free_user(0).await;
    let job = h.post_job(poster, "Wired").await;
    let bid = h.market.submit_bid(job.id, bidder, 100, None).await.unwrap();

    let outcome = h
        .market
        .coordinator()
        .accept_bid(job.id, bid.id, poster, None)
        .await
        .unwrap();
    assert_eq!(outcome.bidder_id, bidder);
    assert_eq!(outcome.remaining_credits, Some(2));
    assert_eq!(h.credits_used(bidder).await, 1);
    assert_eq!(h.job(&job).await.accepted_bid_id, Some(bid.id));
}
