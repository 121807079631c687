//! Broker timer management and synthetic expiry pops.

mod common;

use common::local_site;
use common::BrokerCall;
use common::ChannelConsumer;
use common::AOR;
use sedge_core::now_epoch_seconds;
use sedge_core::test_support::binding_expiring;
use sedge_core::test_support::record_with_binding;
use sedge_core::test_support::subscription_expiring;
use sedge_core::AorStore;
use sedge_core::Patch;

#[tokio::test]
async fn first_write_creates_a_timer_and_persists_its_id() {
    let local = local_site(vec![]);
    let now = now_epoch_seconds();

    let mut record = record_with_binding(AOR, now + 60);
    *record.get_binding("b2") = binding_expiring("sip:alice@10.0.0.2", now + 90);
    *record.get_subscription("tag-1") = subscription_expiring("tag-1", now + 120);
    local.site.handle_put(AOR, record).await.unwrap();

    let calls = local.broker.calls();
    let BrokerCall::Create { expiry, tags, payload, .. } = &calls[0] else {
        panic!("expected a create, got {:?}", calls[0]);
    };

    // Relative to the earliest expiry; allow one second of clock skew
    // between the test and the site manager.
    assert!((59..=60).contains(expiry), "expiry was {expiry}");
    assert_eq!(tags["REG"], 1);
    assert_eq!(tags["BIND"], 2);
    assert_eq!(tags["SUB"], 1);
    assert_eq!(payload, &format!(r#"{{"aor_id":"{AOR}"}}"#));

    // The broker-assigned id made it back into the stored record.
    let stored = local.store.get_aor(AOR).await.unwrap().unwrap();
    assert_eq!(stored.timer_id, "timer-1");
}

#[tokio::test]
async fn refresh_updates_the_existing_timer() {
    let local = local_site(vec![]);
    let now = now_epoch_seconds();

    local.site.handle_put(AOR, record_with_binding(AOR, now + 60)).await.unwrap();

    let mut patch = Patch::default();
    patch
        .update_bindings
        .insert("b1".to_string(), binding_expiring("sip:alice@10.0.0.1", now + 300));
    local.site.handle_patch(AOR, patch).await.unwrap();

    let calls = local.broker.calls();
    assert!(matches!(&calls[0], BrokerCall::Create { .. }));
    assert!(
        matches!(&calls[1], BrokerCall::Update { timer_id, .. } if timer_id == "timer-1"),
        "expected an update of timer-1, got {:?}",
        calls[1]
    );
}

#[tokio::test]
async fn deleting_the_last_binding_cancels_the_timer() {
    let local = local_site(vec![]);
    let now = now_epoch_seconds();

    local.site.handle_put(AOR, record_with_binding(AOR, now + 60)).await.unwrap();
    let (_, version) = local.site.handle_get(AOR).await.unwrap();
    local.site.handle_delete(AOR, version).await.unwrap();

    let calls = local.broker.calls();
    assert!(
        matches!(calls.last().unwrap(), BrokerCall::Delete { timer_id } if timer_id == "timer-1"),
        "expected a delete of timer-1, got {:?}",
        calls.last().unwrap()
    );
}

#[tokio::test]
async fn broker_failure_does_not_fail_the_operation() {
    let local = local_site(vec![]);
    let now = now_epoch_seconds();

    local.broker.fail_all();
    local.site.handle_put(AOR, record_with_binding(AOR, now + 60)).await.unwrap();

    // No timer id was assigned, so nothing was persisted for it either.
    let stored = local.store.get_aor(AOR).await.unwrap().unwrap();
    assert!(stored.timer_id.is_empty());
}

#[tokio::test]
async fn write_leaving_elapsed_binding_raises_one_pop_off_task() {
    let local = local_site(vec![]);
    let (consumer, mut rx) = ChannelConsumer::new();
    local.site.register_timer_pop_consumer(consumer).await;
    let now = now_epoch_seconds();

    // Run the operations under the task-local marker so the consumer can
    // tell an inline delivery from a handed-off one.
    common::OPERATING_TASK
        .scope((), async {
            local.site.handle_put(AOR, record_with_binding(AOR, now + 60)).await.unwrap();

            // Refresh the binding to a time that has already passed.
            let mut patch = Patch::default();
            patch
                .update_bindings
                .insert("b1".to_string(), binding_expiring("sip:alice@10.0.0.1", now - 5));
            local.site.handle_patch(AOR, patch).await.unwrap();
        })
        .await;

    let delivery = rx.recv().await.unwrap();
    assert_eq!(delivery.aor_id, AOR);
    assert!(delivery.trail_id > 0);

    // Delivered on its own task, not inline on the patching one.
    assert!(!delivery.inline_on_operating_task);

    // Exactly one pop.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn live_records_raise_no_synthetic_pops() {
    let local = local_site(vec![]);
    let (consumer, mut rx) = ChannelConsumer::new();
    local.site.register_timer_pop_consumer(consumer).await;
    let now = now_epoch_seconds();

    local.site.handle_put(AOR, record_with_binding(AOR, now + 60)).await.unwrap();

    let mut patch = Patch::default();
    patch.increment_cseq = true;
    local.site.handle_patch(AOR, patch).await.unwrap();

    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());
}
