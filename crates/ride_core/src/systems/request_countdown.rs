//! Incoming-request countdown: one decrement per second, expiry at zero.
//!
//! Expiry is a defined outcome, not an error: the request is removed and an
//! `IncomingRequestExpired` notification is emitted on the decrement that
//! reaches zero.

use bevy_ecs::prelude::{Commands, Res, ResMut};
use tracing::info;

use crate::clock::{CurrentEvent, DispatchClock, EventKind, ONE_SEC_MS};
use crate::ecs::{
    DispatchNotifications, DispatchTimers, IncomingRequest, IncomingRequestLog, Notification,
    RequestResolution,
};

pub fn request_countdown_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<DispatchClock>,
    mut timers: ResMut<DispatchTimers>,
    mut log: ResMut<IncomingRequestLog>,
    mut notifications: ResMut<DispatchNotifications>,
    request: Option<ResMut<IncomingRequest>>,
) {
    if event.0.kind != EventKind::RequestCountdownTick {
        return;
    }
    if timers.countdown == Some(event.0.id) {
        timers.countdown = None;
    }
    let Some(mut request) = request else {
        return;
    };

    request.time_left = request.time_left.saturating_sub(1);
    if request.time_left > 0 {
        timers.countdown = Some(clock.schedule_in(ONE_SEC_MS, EventKind::RequestCountdownTick));
        return;
    }

    info!(request = request.id, "incoming request expired without acceptance");
    log.resolved.insert(request.id, RequestResolution::Expired);
    notifications.push(Notification::IncomingRequestExpired {
        request_id: request.id,
    });
    commands.remove_resource::<IncomingRequest>();
}
