//! Tests for audit sink

use job_award::core::{build_audit_event, AuditSink, InMemoryAuditSink, TracingAuditSink};

use crate::common::{harness, HOUR_MS, T0};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event("evt1", "job1", "user1", "accept", Some("bid9".to_string()));

    sink.record(event);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, "evt1");
    assert_eq!(events[0].job_id, "job1");
    assert_eq!(events[0].action, "accept");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("evt1", "job1", "user1", "post", None));
    sink.record(build_audit_event("evt2", "job1", "user2", "bid", None));
    sink.record(build_audit_event("evt3", "job1", "user1", "accept", None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_id, "evt2"); // First one popped
    assert_eq!(events[1].event_id, "evt3");
}

#[test]
fn test_shared_handle_feeds_the_same_buffer() {
    let sink = InMemoryAuditSink::new(4);
    let shared = sink.shared();

    shared
        .lock()
        .record(build_audit_event("evt1", "job1", "system", "expire", None));

    assert_eq!(sink.events().len(), 1);
    assert_eq!(sink.events()[0].actor, "system");
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event("evt1", "job1", "user1", "dispute", Some("late".to_string()));

    assert_eq!(event.actor, "user1");
    assert_eq!(event.action, "dispute");
    assert_eq!(event.payload, Some("late".to_string()));
    assert!(event.created_at_ms > 0);
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event("evt1", "job1", "system", "expire", None));
}

#[tokio::test]
async fn test_marketplace_events_use_the_market_clock() {
    let h = harness();
    let poster = h.paid_user().await;
    let bidder = h.free_user(0).await;
    let job = h.post_job(poster, "Clocked").await;

    h.clock.advance_ms(HOUR_MS);
    let bid = h.market.submit_bid(job.id, bidder, 100, None).await.unwrap();
    h.clock.advance_ms(HOUR_MS);
    h.market.accept_bid(job.id, bid.id, poster, None).await.unwrap();

    let stamps: Vec<(String, u128)> = h
        .audit
        .events()
        .into_iter()
        .map(|e| (e.action, e.created_at_ms))
        .collect();
    assert_eq!(
        stamps,
        vec![
            ("post".to_string(), T0),
            ("bid".to_string(), T0 + HOUR_MS),
            ("accept".to_string(), T0 + 2 * HOUR_MS),
        ]
    );
}
