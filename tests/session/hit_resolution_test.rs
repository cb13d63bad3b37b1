use std::sync::{mpsc, Arc};
use std::time::Duration;

use simcat::debugger::error::MSG_INVALID_BREAKPOINT;
use simcat::{
    BreakpointStore, DebugSession, DisplayPublisher, MessageSink, ResolvedRow, SessionConfig,
    SessionEvent, VariableValue,
};

use crate::support::{DebugDb, FakeSimulator};

struct Harness {
    session: DebugSession,
    events: mpsc::Receiver<SessionEvent>,
    simulator: FakeSimulator,
    _db: DebugDb,
}

fn harness(values: &[(&str, &str)]) -> Harness {
    let db = DebugDb::create(
        &[(1, "/a.py", 10), (2, "/a.py", 20)],
        &[("g1", "x", "X", 1), ("TOP.g2", "y", "Y", 1)],
    );
    let simulator = FakeSimulator::start(values);
    let store = Arc::new(BreakpointStore::open(db.path()).unwrap());

    let config = SessionConfig {
        simulator_host: "127.0.0.1".to_string(),
        simulator_port: simulator.port(),
        callback_bind: "127.0.0.1".to_string(),
        callback_port: 0,
        advertise_host: "127.0.0.1".to_string(),
        request_timeout: Duration::from_secs(2),
    };

    let (tx, rx) = mpsc::channel::<SessionEvent>();
    let publisher: Arc<dyn DisplayPublisher> = Arc::new(tx.clone());
    let sink: Arc<dyn MessageSink> = Arc::new(tx);
    let session = DebugSession::start(&config, store, publisher, sink).unwrap();

    Harness {
        session,
        events: rx,
        simulator,
        _db: db,
    }
}

fn notify(port: u16, body: &str) -> Result<String, ureq::Error> {
    ureq::post(&format!("http://127.0.0.1:{port}/status/breakpoint"))
        .timeout(Duration::from_secs(2))
        .send_string(body)
        .map(|response| response.into_string().unwrap())
}

#[test]
fn test_connect_announces_callback_address() {
    let h = harness(&[]);
    let info = h.session.info();

    assert!(info.connected);
    assert_eq!(
        h.simulator.requests(),
        vec![format!("POST /connect 127.0.0.1:{}", info.callback_port)]
    );
}

#[test]
fn test_hit_publishes_rows_with_partial_failure() {
    // TOP.g2.y is unknown to the simulator and answers 500
    let h = harness(&[("TOP.g1.x", "5")]);
    let port = h.session.info().callback_port;

    assert_eq!(notify(port, "1").unwrap(), "Okay");

    let event = h.events.recv_timeout(Duration::from_secs(2)).unwrap();
    let SessionEvent::Update(update) = event else {
        panic!("expected a display update, got {:?}", event);
    };
    assert_eq!(update.location, "a.py:10");
    assert_eq!(
        update.rows,
        vec![
            ResolvedRow::new("X", VariableValue::from("5")),
            ResolvedRow::new("Y", VariableValue::Error),
        ]
    );

    let requests = h.simulator.requests();
    assert!(requests.contains(&"GET /value/TOP.g1.x".to_string()));
    assert!(requests.contains(&"GET /value/TOP.g2.y".to_string()));
}

#[test]
fn test_hit_without_variables() {
    let h = harness(&[]);
    let port = h.session.info().callback_port;

    notify(port, "2").unwrap();

    match h.events.recv_timeout(Duration::from_secs(2)).unwrap() {
        SessionEvent::Update(update) => {
            assert!(update.rows.is_empty());
            assert_eq!(update.location, "a.py:20");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_malformed_notification_is_rejected() {
    let h = harness(&[]);
    let port = h.session.info().callback_port;

    match notify(port, "abc") {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 400),
        other => panic!("expected a 400 answer, got {:?}", other.map(|_| ())),
    }
    assert!(h.events.recv_timeout(Duration::from_millis(200)).is_err());

    // the listener keeps serving afterwards
    notify(port, "2").unwrap();
    assert!(matches!(
        h.events.recv_timeout(Duration::from_secs(2)).unwrap(),
        SessionEvent::Update(_)
    ));
}

#[test]
fn test_oversized_notification_is_rejected() {
    let h = harness(&[]);
    let port = h.session.info().callback_port;

    // parses as statement 2 but exceeds the body limit
    let body = format!("{}2", "0".repeat(200));
    assert!(notify(port, &body).is_err());
    assert!(h.events.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_set_break_point_and_continue() {
    let h = harness(&[]);

    assert_eq!(h.session.set_break_point("/a.py", 20).unwrap(), 2);
    h.session.continue_().unwrap();

    let requests = h.simulator.requests();
    assert!(requests.contains(&"POST /breakpoint/add/2".to_string()));
    assert!(requests.contains(&"POST /continue".to_string()));
}

#[test]
fn test_invalid_breakpoint_sends_nothing() {
    let h = harness(&[]);

    assert!(h.session.set_break_point("/a.py", 11).is_err());
    assert_eq!(
        h.events.recv_timeout(Duration::from_secs(1)).unwrap(),
        SessionEvent::Message(MSG_INVALID_BREAKPOINT.to_string())
    );
    assert!(!h
        .simulator
        .requests()
        .iter()
        .any(|request| request.contains("/breakpoint/add")));
}

#[test]
fn test_no_updates_after_teardown() {
    let mut h = harness(&[("TOP.g1.x", "5")]);
    let port = h.session.info().callback_port;

    h.session.stop();
    assert!(!h.session.is_active());

    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_millis(300))
        .build();
    let _ = agent
        .post(&format!("http://127.0.0.1:{port}/status/breakpoint"))
        .send_string("1");

    assert!(h.events.recv_timeout(Duration::from_millis(200)).is_err());
}
