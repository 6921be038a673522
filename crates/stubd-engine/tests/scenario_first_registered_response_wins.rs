//! Arrival-order tie-breaking: the oldest pending action satisfying the
//! predicate wins, on both axes.

use serde_json::json;
use stubd_engine::testkit::transaction_for;
use stubd_engine::{Action, Engine, Method, ResponseSpec};

fn respond(engine: &mut Engine, spec: ResponseSpec) {
    engine.register(Action::respond(spec).expect("pattern must compile"));
}

#[test]
fn oldest_matching_spec_answers_and_newer_stays_pending() {
    let mut engine = Engine::new();

    let spec_a = ResponseSpec::new("/widgets", Method::Get).with_data(json!({"from": "A"}));
    let spec_b = ResponseSpec::new("/widgets", Method::Get).with_data(json!({"from": "B"}));
    respond(&mut engine, spec_a);
    respond(&mut engine, spec_b.clone());

    let (transaction, sink) = transaction_for("GET", "/api/widgets");
    engine.accept(transaction);

    assert_eq!(sink.recorded().body, Some(json!({"from": "A"})));
    assert_eq!(
        engine.pending_responses(),
        vec![spec_b],
        "the newer spec must remain pending"
    );
}

#[test]
fn non_matching_spec_is_skipped_in_favor_of_an_older_match() {
    let mut engine = Engine::new();

    // Oldest spec matches a different method; the next-oldest matching one
    // must fire instead, never a later duplicate.
    respond(
        &mut engine,
        ResponseSpec::new("/widgets", Method::Post).with_data(json!({"value": "1"})),
    );
    respond(
        &mut engine,
        ResponseSpec::new("/widgets", Method::Get).with_data(json!({"value": "2"})),
    );
    respond(
        &mut engine,
        ResponseSpec::new("/widgets", Method::Get).with_data(json!({"value": "3"})),
    );

    let (transaction, sink) = transaction_for("GET", "/api/widgets");
    engine.accept(transaction);

    assert_eq!(sink.recorded().body, Some(json!({"value": "2"})));
    assert_eq!(engine.pending_responses().len(), 2);
}

#[test]
fn oldest_transaction_takes_priority_for_a_late_spec() {
    let mut engine = Engine::new();

    let (first, first_sink) = transaction_for("GET", "/api/widgets?n=1");
    let (second, second_sink) = transaction_for("GET", "/api/widgets?n=2");
    engine.accept(first);
    engine.accept(second);

    respond(
        &mut engine,
        ResponseSpec::new("/widgets", Method::Get).with_data(json!({"seq": 1})),
    );

    assert_eq!(first_sink.recorded().body, Some(json!({"seq": 1})));
    assert!(
        !second_sink.has_written(),
        "the newer transaction must stay open"
    );

    respond(
        &mut engine,
        ResponseSpec::new("/widgets", Method::Get).with_data(json!({"seq": 2})),
    );
    assert_eq!(second_sink.recorded().body, Some(json!({"seq": 2})));
}
