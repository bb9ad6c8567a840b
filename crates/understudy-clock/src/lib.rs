// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Controllable time for tests.
//!
//! Code under test reads time through [`now`] (or a [`TimeSource`]) and
//! schedules work through [`set_timeout`]; tests install the process-wide
//! [`VirtualClock`] and advance it with `tick`.
#![forbid(unsafe_code)]

pub mod clock;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use clock::{TimerId, VirtualClock, RUN_ALL_LIMIT};

/// Source of the current time.
pub trait TimeSource: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Always reads the operating system clock, ignoring any virtual clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        VirtualClock::now(self)
    }
}

/// Current time as seen through the process-wide clock.
pub fn now() -> DateTime<Utc> {
    VirtualClock::global().now()
}

/// Schedule `callback` on the process-wide clock.
pub fn set_timeout<F>(delay: Duration, callback: F) -> TimerId
where
    F: FnMut() + Send + 'static,
{
    VirtualClock::global().set_timeout(delay, callback)
}

/// Schedule a repeating `callback` on the process-wide clock.
pub fn set_interval<F>(period: Duration, callback: F) -> TimerId
where
    F: FnMut() + Send + 'static,
{
    VirtualClock::global().set_interval(period, callback)
}

/// Cancel a timer on the process-wide clock.
pub fn clear_timer(id: TimerId) -> bool {
    VirtualClock::global().clear_timer(id)
}
