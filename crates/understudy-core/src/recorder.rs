// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Invocation history for a single double.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::matcher::{args_match, Matcher};
use crate::value::{Invocation, Outcome};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

/// Append-only call log.
///
/// Every recorded call is stamped with a process-wide sequence number, so the
/// relative order of calls on different doubles can be compared.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<Invocation>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call and return the stored invocation.
    pub fn record(&self, args: &[Value], outcome: Outcome) -> Invocation {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let invocation = Invocation {
            args: args.to_vec(),
            sequence: next_sequence(),
            outcome,
        };
        calls.push(invocation.clone());
        invocation
    }

    /// Snapshot of all calls in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of recorded calls, including those that failed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True after at least one call.
    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    /// The `n`th call (0-based).
    pub fn call(&self, n: usize) -> Option<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(n)
            .cloned()
    }

    /// The first call.
    pub fn first_call(&self) -> Option<Invocation> {
        self.call(0)
    }

    /// The most recent call.
    pub fn last_call(&self) -> Option<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// True if any call's leading arguments satisfy `matchers`.
    pub fn called_with(&self, matchers: &[Matcher]) -> bool {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|c| args_match(matchers, &c.args, false))
    }

    /// True if there was at least one call and every call satisfies `matchers`.
    pub fn always_called_with(&self, matchers: &[Matcher]) -> bool {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        !calls.is_empty() && calls.iter().all(|c| args_match(matchers, &c.args, false))
    }

    /// True if any call failed.
    pub fn threw(&self) -> bool {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|c| c.outcome.is_threw())
    }

    /// Sequence number of the first call, if any.
    pub fn first_sequence(&self) -> Option<u64> {
        self.first_call().map(|c| c.sequence)
    }

    /// Drop all recorded calls.
    pub fn reset(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
