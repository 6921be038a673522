//! A body that cannot be written surfaces on the failing transaction's error
//! sink, never as an error from the registration that triggered delivery.

use serde_json::json;
use stubd_engine::testkit::{snapshot_for, FailingSink, RecordingSink};
use stubd_engine::{Action, Engine, Method, ResponseSpec, Transaction};

#[test]
fn write_failure_goes_to_the_error_sink() {
    let mut engine = Engine::new();

    let errors = RecordingSink::new();
    let transaction = Transaction::new(
        snapshot_for("GET", "/api/widgets"),
        Box::new(FailingSink),
        Box::new(errors.clone()),
    );
    engine.accept(transaction);

    // The registration call itself must succeed even though delivery fails.
    engine.register(
        Action::respond(ResponseSpec::new("/widgets", Method::Get).with_data(json!({"id": 1})))
            .unwrap(),
    );

    let recorded = errors.recorded();
    assert_eq!(recorded.faults.len(), 1);
    assert!(
        recorded.faults[0].to_string().contains("stub response body"),
        "fault should describe the serialization failure: {}",
        recorded.faults[0]
    );

    // Bookkeeping is unaffected by the failed write.
    assert!(engine.pending_requests().is_empty());
    assert!(engine.pending_responses().is_empty());
}

#[test]
fn unaffected_transactions_still_deliver_after_a_failure() {
    let mut engine = Engine::new();

    let errors = RecordingSink::new();
    let failing = Transaction::new(
        snapshot_for("GET", "/api/widgets"),
        Box::new(FailingSink),
        Box::new(errors.clone()),
    );
    engine.accept(failing);
    engine.register(Action::respond(ResponseSpec::new("/widgets", Method::Get)).unwrap());
    assert_eq!(errors.recorded().faults.len(), 1);

    let healthy = RecordingSink::new();
    let transaction = Transaction::new(
        snapshot_for("GET", "/api/widgets"),
        Box::new(healthy.clone()),
        Box::new(healthy.clone()),
    );
    engine.accept(transaction);
    engine.register(
        Action::respond(ResponseSpec::new("/widgets", Method::Get).with_data(json!({"ok": true})))
            .unwrap(),
    );

    assert_eq!(healthy.recorded().body, Some(json!({"ok": true})));
}
