// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests for `tick` boundaries and firing order.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use understudy_clock::VirtualClock;

proptest! {
    #[test]
    fn tick_fires_exactly_the_due_window_in_order(
        delays in prop::collection::vec(0u64..10_000, 0..32),
        window in 0u64..10_000,
    ) {
        let clock = VirtualClock::new();
        let start = Utc.with_ymd_and_hms(2023, 12, 22, 17, 0, 0).unwrap();
        clock.install(start).unwrap();

        let fired: Arc<Mutex<Vec<(u64, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        for (idx, delay) in delays.iter().copied().enumerate() {
            let fired = Arc::clone(&fired);
            clock.set_timeout(Duration::from_millis(delay), move || {
                fired.lock().unwrap().push((delay, idx));
            });
        }

        let count = clock.tick(Duration::from_millis(window));

        let mut expected: Vec<(u64, usize)> = delays
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, d)| *d <= window)
            .map(|(i, d)| (d, i))
            .collect();
        expected.sort_unstable();

        let fired = fired.lock().unwrap().clone();
        prop_assert_eq!(count, expected.len());
        prop_assert_eq!(fired, expected);
        prop_assert_eq!(clock.pending_timers(), delays.len() - count);
    }
}

#[test]
fn timer_on_the_exact_boundary_fires() {
    let clock = VirtualClock::new();
    clock
        .install(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap();
    let hit = Arc::new(Mutex::new(false));
    let h = Arc::clone(&hit);
    clock.set_timeout(Duration::from_secs(3), move || *h.lock().unwrap() = true);
    assert_eq!(clock.tick(Duration::from_millis(2999)), 0);
    assert_eq!(clock.tick(Duration::from_millis(1)), 1);
    assert!(*hit.lock().unwrap());
}
