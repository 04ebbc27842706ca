mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ride_core::dispatch::DispatchError;
use ride_core::ecs::{CancelReason, Notification, TripOutcome, TripStatus};
use ride_core::geo::{planar_distance, Place};
use ride_core::pricing::ServiceType;
use ride_core::test_helpers::{
    destination_place, SlowFareEstimator, StaticFareEstimator, DESTINATION, PICKUP,
};
use support::session::{drive_to_assigned, drive_to_choosing, statuses, TestSessionBuilder};

#[tokio::test]
async fn happy_path_runs_through_every_state() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_choosing(&mut session).await;
    session.request_ride().expect("requested");
    assert_eq!(session.status(), TripStatus::Searching);

    session.advance_by(Duration::from_millis(2_999));
    assert_eq!(session.status(), TripStatus::Searching);
    session.advance_by(Duration::from_millis(1));
    assert_eq!(session.status(), TripStatus::DriverAssigned);

    session.start_trip().expect("started");
    session.finish_trip().expect("finished");
    assert_eq!(session.status(), TripStatus::Completed);

    let notifications = session.drain_notifications();
    assert_eq!(
        statuses(&notifications),
        vec![
            TripStatus::Estimating,
            TripStatus::Choosing,
            TripStatus::Searching,
            TripStatus::DriverAssigned,
            TripStatus::InProgress,
            TripStatus::Completed,
        ]
    );
    assert!(notifications
        .iter()
        .any(|n| matches!(n, Notification::DriverAssigned { .. })));
    assert!(notifications.iter().any(|n| matches!(
        n,
        Notification::TripClosed {
            outcome: TripOutcome::Completed,
            ..
        }
    )));
    assert_eq!(session.pending_events(), 0, "no timer outlives the trip");
}

#[tokio::test]
async fn assignment_picks_the_nearest_visible_candidate() {
    let mut session = TestSessionBuilder::new().with_seed(11).build();
    let candidates = session.candidates();
    let mut expected = &candidates[0];
    for candidate in &candidates {
        if planar_distance(candidate.1, PICKUP) < planar_distance(expected.1, PICKUP) {
            expected = candidate;
        }
    }
    let expected_id = expected.0.id.clone();

    drive_to_assigned(&mut session).await;
    let (driver, _) = session.assigned_driver().expect("assigned");
    assert_eq!(driver.id, expected_id);
    assert_eq!(session.trip().driver.as_ref().map(|d| d.id.clone()), Some(expected_id));
    assert!(session.candidates().is_empty(), "other candidates are dropped");
    assert!(session.timers().refresh.is_none());
}

#[tokio::test]
async fn driver_moves_to_pickup_then_destination_without_auto_transitions() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_assigned(&mut session).await;
    let (_, start) = session.assigned_driver().expect("assigned");

    session.advance_by(Duration::from_secs(1));
    let (_, after_one_tick) = session.assigned_driver().expect("assigned");
    let step = session.config().movement_step_deg;
    let moved = planar_distance(start, PICKUP) - planar_distance(after_one_tick, PICKUP);
    assert!((moved - step).abs() < 1e-9 || after_one_tick == PICKUP);

    session.advance_by(Duration::from_secs(600));
    assert_eq!(session.assigned_driver().map(|(_, c)| c), Some(PICKUP));
    assert_eq!(session.status(), TripStatus::DriverAssigned, "arrival is not a transition");

    session.start_trip().expect("started");
    session.advance_by(Duration::from_secs(600));
    assert_eq!(session.assigned_driver().map(|(_, c)| c), Some(DESTINATION));
    assert_eq!(session.status(), TripStatus::InProgress);
}

#[tokio::test]
async fn request_without_selection_changes_nothing() {
    let mut session = TestSessionBuilder::new().build();
    session.set_destination(destination_place()).expect("destination");
    session.estimate().await.expect("estimate");
    let pending = session.pending_events();

    assert_eq!(session.request_ride(), Err(DispatchError::NoOptionSelected));
    assert_eq!(session.status(), TripStatus::Choosing);
    assert_eq!(session.pending_events(), pending);
    assert!(session.timers().assignment.is_none());
}

#[tokio::test]
async fn estimation_failure_yields_zero_options() {
    let mut session = TestSessionBuilder::new()
        .with_fares(Arc::new(StaticFareEstimator::default()))
        .build();
    session.set_destination(destination_place()).expect("destination");
    let options = session.estimate().await.expect("estimate never fails on provider error");
    assert!(options.is_empty());
    assert_eq!(session.status(), TripStatus::Choosing);
    assert_eq!(
        session.select_option("standard_ride-car"),
        Err(DispatchError::UnknownOption("standard_ride-car".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_estimate_returns_trip_to_planning() {
    let mut session = TestSessionBuilder::new()
        .with_fares(Arc::new(SlowFareEstimator {
            delay: Duration::from_secs(60),
        }))
        .build();
    session.set_destination(destination_place()).expect("destination");

    let abandoned = tokio::time::timeout(Duration::from_secs(1), session.estimate()).await;
    assert!(abandoned.is_err());
    assert_eq!(session.status(), TripStatus::Idle);
    assert_eq!(
        statuses(&session.drain_notifications()),
        vec![TripStatus::Estimating, TripStatus::Idle]
    );

    session.set_destination(destination_place()).expect("plan editable again");
    let options = session.estimate().await.expect("estimate again");
    assert!(options.is_empty(), "slow estimator hits the estimate timeout");
    assert_eq!(session.status(), TripStatus::Choosing);
    session.reset().expect("reset from choosing");
}

#[tokio::test]
async fn every_listed_cancel_reason_is_accepted_after_assignment() {
    let labels: HashSet<&str> = CancelReason::ALL.iter().map(|r| r.label()).collect();
    assert_eq!(labels.len(), CancelReason::ALL.len());

    for reason in CancelReason::ALL {
        let mut session = TestSessionBuilder::new().build();
        drive_to_assigned(&mut session).await;
        session.cancel(Some(reason)).expect("cancel with a listed reason");
        assert_eq!(session.trip().cancel_reason, Some(reason));
    }
}

#[tokio::test]
async fn cancel_preempts_pending_assignment() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_choosing(&mut session).await;
    session.request_ride().expect("requested");
    session.advance_by(Duration::from_secs(1));

    session.cancel(None).expect("cancel while searching");
    session.advance_by(Duration::from_secs(30));

    assert_eq!(session.status(), TripStatus::Cancelled);
    assert!(session.assigned_driver().is_none());
    assert_eq!(session.pending_events(), 0);
    assert!(!session
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::DriverAssigned { .. })));
}

#[tokio::test]
async fn cancel_after_assignment_requires_a_reason() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_assigned(&mut session).await;

    assert_eq!(session.cancel(None), Err(DispatchError::ReasonRequired));
    assert_eq!(session.status(), TripStatus::DriverAssigned);

    session
        .cancel(Some(CancelReason::WaitTooLong))
        .expect("cancel with reason");
    assert_eq!(session.status(), TripStatus::Cancelled);
    assert_eq!(session.trip().cancel_reason, Some(CancelReason::WaitTooLong));
    assert_eq!(session.pending_events(), 0);
    assert!(session.drain_notifications().iter().any(|n| matches!(
        n,
        Notification::TripClosed {
            outcome: TripOutcome::Cancelled {
                reason: Some(CancelReason::WaitTooLong)
            },
            ..
        }
    )));
}

#[tokio::test]
async fn terminal_states_only_leave_through_reset() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_assigned(&mut session).await;
    session.cancel(Some(CancelReason::ChangedPlans)).expect("cancelled");

    assert!(session.request_ride().is_err());
    assert!(session.start_trip().is_err());
    assert!(session.cancel(Some(CancelReason::Other)).is_err());
    assert!(session.estimate().await.is_err());
    assert!(session.set_destination(destination_place()).is_err());
    assert_eq!(session.status(), TripStatus::Cancelled);

    let previous_id = session.trip().id;
    session.reset().expect("reset");
    assert_eq!(session.status(), TripStatus::Idle);
    assert_eq!(session.trip().id, previous_id + 1);
    assert!(session.trip().destination.is_none());
    assert_eq!(session.candidates().len(), 5);
    assert!(session.timers().refresh.is_some());
}

#[tokio::test]
async fn reset_is_refused_mid_trip() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_assigned(&mut session).await;
    assert!(matches!(
        session.reset(),
        Err(DispatchError::InvalidTransition {
            action: "reset",
            status: TripStatus::DriverAssigned
        })
    ));
}

#[tokio::test]
async fn no_candidates_reports_and_retries_until_cancelled() {
    let mut session = TestSessionBuilder::new().with_candidate_count(0).build();
    drive_to_choosing(&mut session).await;
    session.request_ride().expect("requested");
    session.drain_notifications();

    session.advance_by(Duration::from_secs(3));
    assert_eq!(session.status(), TripStatus::Searching);
    assert_eq!(
        session.drain_notifications(),
        vec![Notification::NoDriversAvailable]
    );
    assert!(session.timers().assignment.is_some());

    session.advance_by(Duration::from_secs(3));
    assert_eq!(session.drain_notifications(), vec![Notification::NoDriversAvailable]);

    session.cancel(None).expect("cancel");
    assert_eq!(session.pending_events(), 0);
}

#[tokio::test]
async fn candidates_refresh_while_idle() {
    let mut session = TestSessionBuilder::new().build();
    let before: Vec<String> = session.candidates().into_iter().map(|(p, _)| p.id).collect();
    session.advance_by(Duration::from_secs(10));
    let after: Vec<String> = session.candidates().into_iter().map(|(p, _)| p.id).collect();
    assert_eq!(after.len(), 5);
    assert_ne!(before, after);
}

#[tokio::test]
async fn editing_the_plan_while_choosing_drops_stale_options() {
    let mut session = TestSessionBuilder::new().build();
    drive_to_choosing(&mut session).await;
    session
        .set_service_type(ServiceType::Intercity)
        .expect("service type");
    assert_eq!(session.status(), TripStatus::Idle);
    assert!(session.trip().options.is_empty());
    assert!(session.trip().selected_option.is_none());

    session
        .set_pickup(Place::new("Terminal Terrestre", PICKUP.offset(0.03, 0.0)))
        .expect("pickup");
    let options = session.estimate().await.expect("estimate");
    assert!(options.iter().all(|o| o.id.starts_with("intercity-")));
}

#[tokio::test]
async fn same_seed_gives_same_assignment() {
    let mut a = TestSessionBuilder::new().with_seed(3).build();
    let mut b = TestSessionBuilder::new().with_seed(3).build();
    drive_to_assigned(&mut a).await;
    drive_to_assigned(&mut b).await;
    assert_eq!(a.assigned_driver(), b.assigned_driver());
}
