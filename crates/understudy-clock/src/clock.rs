// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Virtual clock and timer queue.
//!
//! While installed, [`VirtualClock::now`] returns logical time and timers only
//! fire from [`VirtualClock::tick`] / [`VirtualClock::run_all`]. When nothing
//! is installed, `now` reads the system clock and timers run on real threads.
//!
//! Ordering: due timers fire by ascending fire time, ties by registration
//! order. A tick's upper bound is inclusive. Logical time equals the timer's
//! fire time while its callback runs, and callbacks may schedule or clear
//! timers (including themselves).
//!
//! Logical time saturates at [`DateTime::<Utc>::MAX_UTC`]; an interval that
//! cannot advance past it is dropped. Installing a clock cancels every timer
//! still waiting on a real thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace, warn};
use understudy_core::{Error, Result};

/// Upper bound on timers fired by one [`VirtualClock::run_all`].
pub const RUN_ALL_LIMIT: usize = 1000;

/// Handle returned by the scheduling functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

type Callback = Arc<Mutex<Box<dyn FnMut() + Send>>>;
type RealTimers = Arc<Mutex<HashMap<TimerId, Arc<AtomicBool>>>>;

struct Timer {
    id: TimerId,
    interval: Option<TimeDelta>,
    callback: Callback,
}

struct ClockState {
    now: DateTime<Utc>,
    // keyed by (fire time, registration sequence)
    timers: BTreeMap<(DateTime<Utc>, u64), Timer>,
    next_seq: u64,
}

impl ClockState {
    fn schedule(&mut self, at: DateTime<Utc>, timer: Timer) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert((at, seq), timer);
    }
}

/// A clock that can be swapped for a logical one.
#[derive(Default)]
pub struct VirtualClock {
    state: Mutex<Option<ClockState>>,
    real_timers: RealTimers,
    next_id: AtomicU64,
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("installed", &self.is_installed())
            .field("pending", &self.pending_timers())
            .field("real_timers", &self.real_timer_count())
            .finish()
    }
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

fn later(at: DateTime<Utc>, by: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl VirtualClock {
    /// Create an uninstalled clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide clock read by [`crate::now`].
    pub fn global() -> &'static VirtualClock {
        static GLOBAL: OnceLock<VirtualClock> = OnceLock::new();
        GLOBAL.get_or_init(VirtualClock::new)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ClockState>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn real_timers(&self) -> std::sync::MutexGuard<'_, HashMap<TimerId, Arc<AtomicBool>>> {
        self.real_timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn real_timer_count(&self) -> usize {
        self.real_timers().len()
    }

    fn next_id(&self) -> TimerId {
        TimerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Replace the time source with a logical clock fixed at `start`.
    ///
    /// Outstanding real-thread timers are cancelled.
    pub fn install(&self, start: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        if state.is_some() {
            return Err(Error::ClockAlreadyInstalled);
        }
        *state = Some(ClockState {
            now: start,
            timers: BTreeMap::new(),
            next_seq: 0,
        });
        drop(state);
        let cancelled: Vec<_> = self.real_timers().drain().collect();
        for (_, flag) in &cancelled {
            flag.store(true, Ordering::SeqCst);
        }
        debug!(%start, cancelled = cancelled.len(), "virtual clock installed");
        Ok(())
    }

    /// True while a logical clock is installed.
    pub fn is_installed(&self) -> bool {
        self.lock().is_some()
    }

    /// Go back to the system clock, discarding pending timers.
    /// Returns `false` if nothing was installed.
    pub fn restore(&self) -> bool {
        let previous = self.lock().take();
        if let Some(state) = &previous {
            debug!(
                now = %state.now,
                discarded = state.timers.len(),
                "virtual clock restored"
            );
        }
        previous.is_some()
    }

    /// Current time: logical while installed, real otherwise.
    pub fn now(&self) -> DateTime<Utc> {
        self.lock().as_ref().map_or_else(Utc::now, |s| s.now)
    }

    /// Timers waiting on the logical clock.
    pub fn pending_timers(&self) -> usize {
        self.lock().as_ref().map_or(0, |s| s.timers.len())
    }

    /// Run `callback` once after `delay`.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(delay, None, Box::new(callback))
    }

    /// Run `callback` every `period` (at least one millisecond).
    pub fn set_interval<F>(&self, period: Duration, callback: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        self.schedule(period, Some(period), Box::new(callback))
    }

    fn schedule(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        callback: Box<dyn FnMut() + Send>,
    ) -> TimerId {
        let id = self.next_id();
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            let at = later(state.now, delta(delay));
            state.schedule(
                at,
                Timer {
                    id,
                    interval: interval.map(delta),
                    callback: Arc::new(Mutex::new(callback)),
                },
            );
            trace!(timer = id.0, %at, "timer scheduled on virtual clock");
            return id;
        }
        drop(guard);
        self.spawn_real(id, delay, interval, callback);
        id
    }

    fn spawn_real(
        &self,
        id: TimerId,
        delay: Duration,
        interval: Option<Duration>,
        mut callback: Box<dyn FnMut() + Send>,
    ) {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.real_timers().insert(id, Arc::clone(&cancelled));
        let registry = Arc::clone(&self.real_timers);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            while !cancelled.load(Ordering::SeqCst) {
                callback();
                match interval {
                    Some(period) => std::thread::sleep(period),
                    None => break,
                }
            }
            if interval.is_none() {
                registry
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
            }
        });
    }

    /// Cancel a timer. Returns `false` if it already fired or never existed.
    pub fn clear_timer(&self, id: TimerId) -> bool {
        if let Some(state) = self.lock().as_mut() {
            if let Some(key) = state
                .timers
                .iter()
                .find(|(_, t)| t.id == id)
                .map(|(k, _)| *k)
            {
                state.timers.remove(&key);
                return true;
            }
        }
        self.real_timers()
            .remove(&id)
            .is_some_and(|flag| !flag.swap(true, Ordering::SeqCst))
    }

    /// Pop the earliest timer due at or before `limit`, moving logical time to
    /// its fire time. Interval timers are rescheduled before they run.
    fn pop_due(&self, limit: DateTime<Utc>) -> Option<Callback> {
        let mut guard = self.lock();
        let state = guard.as_mut()?;
        let key = *state.timers.keys().next()?;
        if key.0 > limit {
            return None;
        }
        let timer = state.timers.remove(&key)?;
        state.now = key.0;
        let callback = Arc::clone(&timer.callback);
        if let Some(period) = timer.interval {
            match key.0.checked_add_signed(period) {
                Some(next) => state.schedule(next, timer),
                None => warn!(timer = timer.id.0, "interval ran past the end of time; dropped"),
            }
        }
        Some(callback)
    }

    /// Pop the earliest one-shot timer, moving logical time to its fire time.
    fn pop_next_timeout(&self) -> Option<Callback> {
        let mut guard = self.lock();
        let state = guard.as_mut()?;
        let key = state
            .timers
            .iter()
            .find(|(_, t)| t.interval.is_none())
            .map(|(k, _)| *k)?;
        let timer = state.timers.remove(&key)?;
        state.now = key.0;
        Some(timer.callback)
    }

    /// Move intervals left behind by a time jump to one period after `now`.
    fn realign_intervals(&self) {
        let mut guard = self.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        let now = state.now;
        let overdue: Vec<_> = state
            .timers
            .range(..(now, 0))
            .map(|(k, _)| *k)
            .collect();
        for key in overdue {
            if let Some(timer) = state.timers.remove(&key) {
                if let Some(period) = timer.interval {
                    state.timers.insert((later(now, period), key.1), timer);
                }
            }
        }
    }

    fn fire(callback: &Callback) {
        let mut f = callback.lock().unwrap_or_else(|e| e.into_inner());
        f();
    }

    /// Advance logical time by `duration`, firing every timer that falls due
    /// within `[now, now + duration]`. Returns how many fired.
    pub fn tick(&self, duration: Duration) -> usize {
        let Some(target) = self.lock().as_ref().map(|s| later(s.now, delta(duration))) else {
            warn!("tick called without an installed virtual clock");
            return 0;
        };
        let mut fired = 0;
        while let Some(callback) = self.pop_due(target) {
            Self::fire(&callback);
            fired += 1;
        }
        if let Some(state) = self.lock().as_mut() {
            state.now = target;
        }
        trace!(%target, fired, "virtual clock ticked");
        fired
    }

    /// Fire one-shot timers in order, jumping time forward, until none are
    /// left or [`RUN_ALL_LIMIT`] have fired. Returns how many fired.
    ///
    /// Interval timers do not fire here; afterwards they resume one period
    /// after the new logical time.
    pub fn run_all(&self) -> usize {
        let mut fired = 0;
        while fired < RUN_ALL_LIMIT {
            let Some(callback) = self.pop_next_timeout() else {
                break;
            };
            Self::fire(&callback);
            fired += 1;
        }
        self.realign_intervals();
        if fired == RUN_ALL_LIMIT {
            warn!(limit = RUN_ALL_LIMIT, "run_all stopped at its limit");
        }
        fired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 22, 17, 0, 0).unwrap()
    }

    fn log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl FnMut() + Send {
        let log = Arc::clone(log);
        move || log.lock().unwrap().push(tag)
    }

    #[test]
    fn install_fixes_time_and_second_install_fails() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        assert_eq!(clock.now(), start());
        let err = clock.install(start()).unwrap_err();
        assert_eq!(err.name(), "clock-already-installed");
        assert!(clock.restore());
        assert!(!clock.restore());
        clock.install(start()).unwrap();
    }

    #[test]
    fn tick_fires_in_time_order_with_ties_by_registration() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let seen = log();
        clock.set_timeout(Duration::from_secs(5), push(&seen, "c"));
        clock.set_timeout(Duration::from_secs(1), push(&seen, "a"));
        clock.set_timeout(Duration::from_secs(5), push(&seen, "d"));
        clock.set_timeout(Duration::from_secs(2), push(&seen, "b"));
        clock.set_timeout(Duration::from_secs(6), push(&seen, "late"));

        assert_eq!(clock.tick(Duration::from_secs(5)), 4);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(clock.now(), start() + TimeDelta::seconds(5));
        assert_eq!(clock.pending_timers(), 1);
    }

    #[test]
    fn now_inside_callback_is_fire_time() {
        let clock = Arc::new(VirtualClock::new());
        clock.install(start()).unwrap();
        let observed = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&clock);
        let slot = Arc::clone(&observed);
        clock.set_timeout(Duration::from_millis(1500), move || {
            *slot.lock().unwrap() = Some(inner.now());
        });
        clock.tick(Duration::from_secs(10));
        assert_eq!(
            *observed.lock().unwrap(),
            Some(start() + TimeDelta::milliseconds(1500))
        );
    }

    #[test]
    fn intervals_repeat_and_can_be_cleared() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let id = clock.set_interval(Duration::from_secs(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(clock.tick(Duration::from_millis(3500)), 3);
        assert!(clock.clear_timer(id));
        assert_eq!(clock.tick(Duration::from_secs(10)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!clock.clear_timer(id));
    }

    #[test]
    fn restore_discards_pending_timers() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let seen = log();
        clock.set_timeout(Duration::from_secs(1), push(&seen, "never"));
        clock.restore();
        clock.install(start()).unwrap();
        clock.tick(Duration::from_secs(2));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn run_all_drains_timeouts() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let seen = log();
        clock.set_timeout(Duration::from_secs(60), push(&seen, "b"));
        clock.set_timeout(Duration::from_secs(1), push(&seen, "a"));
        assert_eq!(clock.run_all(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(clock.now(), start() + TimeDelta::seconds(60));
    }

    #[test]
    fn run_all_does_not_fire_intervals() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let seen = log();
        clock.set_interval(Duration::from_millis(1), push(&seen, "tick"));
        clock.set_timeout(Duration::from_secs(10), push(&seen, "timeout"));

        assert_eq!(clock.run_all(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["timeout"]);
        assert_eq!(clock.now(), start() + TimeDelta::seconds(10));
        assert_eq!(clock.pending_timers(), 1);

        assert_eq!(clock.tick(Duration::from_millis(1)), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["timeout", "tick"]);
    }

    #[test]
    fn huge_durations_saturate_instead_of_overflowing() {
        let clock = VirtualClock::new();
        clock.install(start()).unwrap();
        let seen = log();
        clock.set_timeout(Duration::MAX, push(&seen, "end"));
        clock.set_interval(Duration::from_secs(u64::MAX), push(&seen, "once"));

        assert_eq!(clock.tick(Duration::from_secs(u64::MAX)), 2);
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(*seen.lock().unwrap(), vec!["end", "once"]);
        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(clock.tick(Duration::MAX), 0);
    }

    #[test]
    fn fired_real_timeout_is_forgotten() {
        let clock = VirtualClock::new();
        let seen = log();
        let id = clock.set_timeout(Duration::from_millis(5), push(&seen, "real"));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while clock.real_timer_count() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(clock.real_timer_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["real"]);
        assert!(!clock.clear_timer(id));
    }

    #[test]
    fn install_cancels_real_timers() {
        let clock = VirtualClock::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let id = clock.set_interval(Duration::from_millis(2), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        clock.install(start()).unwrap();
        assert_eq!(clock.real_timer_count(), 0);
        assert!(!clock.clear_timer(id));

        std::thread::sleep(Duration::from_millis(30));
        let settled = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn tick_without_install_is_a_noop() {
        let clock = VirtualClock::new();
        assert_eq!(clock.tick(Duration::from_secs(1)), 0);
        assert!(!clock.is_installed());
    }
}
