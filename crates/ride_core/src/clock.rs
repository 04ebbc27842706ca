//! Discrete-event clock for the dispatch timers.
//!
//! Time is in milliseconds since the session started. Every scheduled event
//! gets a [`TimerId`] so it can be cancelled individually; events at the same
//! timestamp pop in scheduling order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::Resource;

pub const ONE_SEC_MS: u64 = 1000;

/// Handle to one scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Simulated assignment delay elapsed; run nearest-driver assignment.
    AssignDriver,
    /// 1 Hz step of the assigned driver toward its target.
    MovementTick,
    /// Regenerate the nearby candidate drivers.
    CandidateRefresh,
    /// 1 Hz decrement of the incoming request countdown.
    RequestCountdownTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub id: TimerId,
    pub kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp, then id.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default, Resource)]
pub struct DispatchClock {
    now: u64,
    next_id: u64,
    events: BinaryHeap<Event>,
}

impl DispatchClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Schedule `kind` at an absolute timestamp. Past timestamps fire at `now`.
    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.events.push(Event {
            timestamp: timestamp.max(self.now),
            id,
            kind,
        });
        id
    }

    pub fn schedule_in(&mut self, delay_ms: u64, kind: EventKind) -> TimerId {
        self.schedule_at(self.now.saturating_add(delay_ms), kind)
    }

    /// Drop a pending event. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.events.len();
        self.events.retain(|event| event.id != id);
        self.events.len() != before
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    /// Pop the next event if it is due at or before `until`, moving `now` to it.
    pub fn pop_due(&mut self, until: u64) -> Option<Event> {
        if self.next_event_time()? > until {
            return None;
        }
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    /// Move `now` forward without firing anything. Never moves backward.
    pub fn advance_to(&mut self, timestamp: u64) {
        self.now = self.now.max(timestamp);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The event currently being processed by the schedule.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);
