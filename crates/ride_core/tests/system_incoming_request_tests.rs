mod support;

use std::time::Duration;

use ride_core::dispatch::{AcceptOutcome, DispatchError};
use ride_core::ecs::Notification;
use support::session::{trip_summary, TestSessionBuilder};

#[test]
fn request_expires_on_the_fifteenth_decrement() {
    let mut session = TestSessionBuilder::new().build();
    let id = session.receive_incoming_request(trip_summary()).expect("received");
    assert_eq!(id, 1);
    assert_eq!(session.incoming_request().map(|r| r.time_left), Some(15));

    session.advance_to(14_000);
    assert_eq!(session.incoming_request().map(|r| r.time_left), Some(1));
    assert!(session
        .drain_notifications()
        .iter()
        .all(|n| !matches!(n, Notification::IncomingRequestExpired { .. })));

    session.advance_to(15_000);
    assert!(session.incoming_request().is_none());
    assert!(session.timers().countdown.is_none());
    assert_eq!(
        session
            .drain_notifications()
            .into_iter()
            .filter(|n| matches!(n, Notification::IncomingRequestExpired { request_id: 1 }))
            .count(),
        1
    );
}

#[test]
fn late_accept_reports_expiry_without_error() {
    let mut session = TestSessionBuilder::new().build();
    let id = session.receive_incoming_request(trip_summary()).expect("received");
    session.advance_by(Duration::from_secs(20));

    assert_eq!(session.accept_incoming(id), Ok(AcceptOutcome::Expired));
    assert!(!session
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::IncomingRequestAccepted { .. })));
}

#[test]
fn accept_is_idempotent_and_stops_the_countdown() {
    let mut session = TestSessionBuilder::new().build();
    let id = session.receive_incoming_request(trip_summary()).expect("received");
    session.advance_by(Duration::from_secs(5));

    assert_eq!(session.accept_incoming(id), Ok(AcceptOutcome::Accepted));
    assert_eq!(session.accept_incoming(id), Ok(AcceptOutcome::AlreadyResolved));
    assert_eq!(session.reject_incoming(id), Ok(false));
    assert!(session.incoming_request().is_none());
    assert!(session.timers().countdown.is_none());

    session.advance_by(Duration::from_secs(30));
    let notifications = session.drain_notifications();
    let accepted = notifications
        .iter()
        .filter(|n| matches!(n, Notification::IncomingRequestAccepted { .. }))
        .count();
    assert_eq!(accepted, 1);
    assert!(!notifications
        .iter()
        .any(|n| matches!(n, Notification::IncomingRequestExpired { .. })));
}

#[test]
fn reject_resolves_the_request() {
    let mut session = TestSessionBuilder::new().build();
    let id = session.receive_incoming_request(trip_summary()).expect("received");

    assert_eq!(session.reject_incoming(id), Ok(true));
    assert_eq!(session.accept_incoming(id), Ok(AcceptOutcome::AlreadyResolved));
    assert!(session
        .drain_notifications()
        .contains(&Notification::IncomingRequestRejected { request_id: id }));
}

#[test]
fn unknown_request_ids_are_errors() {
    let mut session = TestSessionBuilder::new().build();
    assert_eq!(
        session.accept_incoming(99),
        Err(DispatchError::UnknownIncomingRequest(99))
    );
    assert_eq!(
        session.reject_incoming(99),
        Err(DispatchError::UnknownIncomingRequest(99))
    );
}

#[test]
fn only_one_request_may_be_pending() {
    let mut session = TestSessionBuilder::new().build();
    let first = session.receive_incoming_request(trip_summary()).expect("first");
    assert_eq!(
        session.receive_incoming_request(trip_summary()),
        Err(DispatchError::IncomingRequestPending)
    );

    session.accept_incoming(first).expect("accepted");
    let second = session.receive_incoming_request(trip_summary()).expect("second");
    assert_eq!(second, first + 1);
    assert_eq!(session.incoming_request().map(|r| r.time_left), Some(15));
}

#[test]
fn shutdown_drops_the_pending_request() {
    let mut session = TestSessionBuilder::new().build();
    session.receive_incoming_request(trip_summary()).expect("received");
    session.shutdown();

    assert!(session.incoming_request().is_none());
    assert_eq!(session.pending_events(), 0);
    assert_eq!(
        session.receive_incoming_request(trip_summary()),
        Err(DispatchError::SessionClosed)
    );
}
