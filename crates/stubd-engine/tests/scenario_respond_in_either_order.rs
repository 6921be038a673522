//! Registration-before-arrival and arrival-before-registration both deliver
//! synchronously inside the second call, and consumption is exactly-once.

use serde_json::json;
use stubd_engine::testkit::transaction_for;
use stubd_engine::{Action, Engine, Method, ResponseSpec};

fn widget_spec() -> ResponseSpec {
    ResponseSpec::new("/widgets", Method::Get).with_data(json!({"id": 1}))
}

#[test]
fn spec_registered_first_answers_on_arrival() {
    let mut engine = Engine::new();
    engine.register(Action::respond(widget_spec()).unwrap());

    let (transaction, sink) = transaction_for("GET", "/api/widgets?x=1");
    engine.accept(transaction);

    let recorded = sink.recorded();
    assert_eq!(recorded.status, Some(200));
    assert_eq!(recorded.body, Some(json!({"id": 1})));
    assert!(engine.pending_responses().is_empty());
    assert!(engine.pending_requests().is_empty());
}

#[test]
fn transaction_arriving_first_is_answered_on_registration() {
    let mut engine = Engine::new();

    let (transaction, sink) = transaction_for("GET", "/api/widgets");
    engine.accept(transaction);
    assert!(!sink.has_written(), "nothing to answer with yet");
    assert_eq!(engine.pending_requests().len(), 1);

    engine.register(Action::respond(widget_spec()).unwrap());

    assert_eq!(sink.recorded().body, Some(json!({"id": 1})));
    assert!(engine.pending_requests().is_empty());
}

#[test]
fn consumed_spec_never_answers_a_second_arrival() {
    let mut engine = Engine::new();
    engine.register(Action::respond(widget_spec()).unwrap());

    let (first, first_sink) = transaction_for("GET", "/api/widgets");
    engine.accept(first);
    assert_eq!(first_sink.recorded().writes, 1);

    // Same request again: the action is already consumed, so the transaction
    // stays open and unanswered.
    let (second, second_sink) = transaction_for("GET", "/api/widgets");
    engine.accept(second);
    assert!(!second_sink.has_written());
    assert_eq!(engine.pending_requests().len(), 1);
    assert_eq!(first_sink.recorded().writes, 1, "no second write may occur");
}

#[test]
fn explicit_status_and_headers_are_delivered() {
    let mut engine = Engine::new();
    let spec = ResponseSpec::new("/widgets", Method::Get)
        .with_status(401)
        .with_status_text("Unauthorized")
        .with_header("x-request-id", "abc-123")
        .with_data(json!({"denied": true}));
    engine.register(Action::respond(spec).unwrap());

    let (transaction, sink) = transaction_for("GET", "/api/widgets");
    engine.accept(transaction);

    let recorded = sink.recorded();
    assert_eq!(recorded.status, Some(401));
    assert_eq!(recorded.status_text.as_deref(), Some("Unauthorized"));
    assert_eq!(
        recorded.headers,
        vec![("x-request-id".to_string(), "abc-123".to_string())]
    );
    assert_eq!(recorded.body, Some(json!({"denied": true})));
}

#[test]
fn non_matching_spec_leaves_both_sides_pending() {
    let mut engine = Engine::new();
    engine.register(Action::respond(ResponseSpec::new("/a/different/path", Method::Get)).unwrap());

    let (transaction, sink) = transaction_for("GET", "/api/some/path?withParam=abc");
    engine.accept(transaction);

    assert!(!sink.has_written());
    assert_eq!(engine.pending_responses().len(), 1);
    assert_eq!(engine.pending_requests().len(), 1);
}

#[test]
fn pending_views_are_stable_when_nothing_is_eligible() {
    let mut engine = Engine::new();
    engine.register(Action::respond(ResponseSpec::new("/widgets", Method::Post)).unwrap());
    let (transaction, _sink) = transaction_for("GET", "/api/widgets");
    engine.accept(transaction);

    let responses_before = engine.pending_responses();
    let requests_before = engine.pending_requests();

    // Another ineligible registration triggers another pass; a pass with no
    // eligible pairs must change nothing else.
    engine.register(Action::respond(ResponseSpec::new("/gadgets", Method::Post)).unwrap());

    assert_eq!(engine.pending_requests(), requests_before);
    assert_eq!(engine.pending_responses()[..1], responses_before[..]);
}
