// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-place, reversible substitution of surface members.
//!
//! Invariants:
//! - at most one active patch per (surface, member); a member that already
//!   carries a double cannot be patched again, whichever manager installed it;
//! - [`PatchManager::restore_all`] reverts in LIFO order and puts back the exact
//!   original `Callable`;
//! - restoring something that is not patched is not an error;
//! - a double installed on several members stays live until its last patch
//!   is restored.

use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, warn};

use crate::double::{Double, DoubleKind, Identity};
use crate::error::{Error, Result};
use crate::surface::{Binding, Surface, SurfaceId};
use crate::value::Callable;

struct PatchRecord {
    surface: Arc<Surface>,
    member: String,
    original: Callable,
    double: Double,
}

impl PatchRecord {
    fn is_for(&self, surface: SurfaceId, member: &str) -> bool {
        self.surface.id() == surface && self.member == member
    }

    /// Put the original back. The double is retired unless `shared`.
    fn revert(self, shared: bool) {
        if self
            .surface
            .swap(&self.member, Binding::Real(self.original))
            .is_none()
        {
            warn!(
                surface = self.surface.name(),
                member = %self.member,
                "patched member vanished before restore"
            );
        }
        if !shared {
            self.double.retire();
        }
        debug!(surface = self.surface.name(), member = %self.member, shared, "patch restored");
    }
}

/// Tracks active patches so they can be reverted individually or all at once.
#[derive(Default)]
pub struct PatchManager {
    records: Mutex<Vec<PatchRecord>>,
}

impl std::fmt::Debug for PatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchManager")
            .field("active", &self.active_count())
            .finish()
    }
}

impl PatchManager {
    /// Create an empty, independent manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide manager used by [`Mock::new`](crate::Mock::new) and the sandbox.
    pub fn global() -> &'static PatchManager {
        static GLOBAL: OnceLock<PatchManager> = OnceLock::new();
        GLOBAL.get_or_init(PatchManager::new)
    }

    /// Install `double` in place of `surface.member`.
    pub fn patch(&self, surface: &Arc<Surface>, member: &str, double: &Double) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let original = match surface.binding(member) {
            None => {
                return Err(Error::DoubleTarget {
                    surface: surface.name().to_string(),
                    member: member.to_string(),
                })
            }
            Some(Binding::Double(_)) => {
                return Err(Error::AlreadyPatched {
                    surface: surface.name().to_string(),
                    member: member.to_string(),
                })
            }
            Some(Binding::Real(f)) => f,
        };
        surface.swap(member, Binding::Double(double.clone()));
        records.push(PatchRecord {
            surface: Arc::clone(surface),
            member: member.to_string(),
            original,
            double: double.clone(),
        });
        debug!(
            surface = surface.name(),
            member,
            kind = ?double.kind(),
            "member patched"
        );
        Ok(())
    }

    fn bound_double(
        &self,
        surface: &Arc<Surface>,
        member: &str,
        kind: DoubleKind,
        forward: bool,
    ) -> Result<Double> {
        let original = match surface.binding(member) {
            Some(Binding::Real(f)) => f,
            Some(Binding::Double(_)) => {
                return Err(Error::AlreadyPatched {
                    surface: surface.name().to_string(),
                    member: member.to_string(),
                })
            }
            None => {
                return Err(Error::DoubleTarget {
                    surface: surface.name().to_string(),
                    member: member.to_string(),
                })
            }
        };
        let identity = Identity::Member {
            surface: surface.name().to_string(),
            member: member.to_string(),
        };
        let double = Double::bound(kind, identity, forward.then_some(original));
        self.patch(surface, member, &double)?;
        Ok(double)
    }

    /// Patch `surface.member` with a spy that forwards to the real member.
    pub fn spy_member(&self, surface: &Arc<Surface>, member: &str) -> Result<Double> {
        self.bound_double(surface, member, DoubleKind::Spy, true)
    }

    /// Patch `surface.member` with a stub; the real member is never called.
    pub fn stub_member(&self, surface: &Arc<Surface>, member: &str) -> Result<Double> {
        self.bound_double(surface, member, DoubleKind::Stub, false)
    }

    pub(crate) fn mock_member(&self, surface: &Arc<Surface>, member: &str) -> Result<Double> {
        self.bound_double(surface, member, DoubleKind::Mock, false)
    }

    /// Revert one patch. Returns `false` if it was not patched by this manager.
    pub fn restore(&self, surface: &Surface, member: &str) -> bool {
        let (record, shared) = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            let Some(pos) = records.iter().position(|r| r.is_for(surface.id(), member)) else {
                return false;
            };
            let record = records.remove(pos);
            let shared = records.iter().any(|r| r.double.same_as(&record.double));
            (record, shared)
        };
        record.revert(shared);
        true
    }

    /// Revert every active patch, most recent first. Returns how many were reverted.
    pub fn restore_all(&self) -> usize {
        let drained: Vec<PatchRecord> = {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.drain(..).collect()
        };
        let n = drained.len();
        for record in drained.into_iter().rev() {
            record.revert(false);
        }
        if n > 0 {
            debug!(count = n, "restored all patches");
        }
        n
    }

    /// Number of active patches.
    pub fn active_count(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if this manager holds a patch for `surface.member`.
    pub fn is_patched(&self, surface: &Surface, member: &str) -> bool {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|r| r.is_for(surface.id(), member))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::Fault;
    use serde_json::json;

    fn mailer() -> Arc<Surface> {
        Surface::builder("mail-sender")
            .member("send", |_| Ok(json!("real-send")))
            .member("ping", |_| Ok(json!("pong")))
            .build()
    }

    #[test]
    fn stub_member_replaces_and_restore_reverts() {
        let pm = PatchManager::new();
        let s = mailer();
        let original = s.current("send").unwrap();

        let stub = pm.stub_member(&s, "send").unwrap();
        stub.returns(true).unwrap();
        assert_eq!(s.call("send", &[]), Ok(json!(true)));
        assert!(pm.is_patched(&s, "send"));

        assert!(pm.restore(&s, "send"));
        assert!(Arc::ptr_eq(&original, &s.current("send").unwrap()));
        assert_eq!(s.call("send", &[]), Ok(json!("real-send")));
        assert!(!stub.is_live());
        assert_eq!(stub.call_count(), 1);
    }

    #[test]
    fn spy_member_forwards_to_original() {
        let pm = PatchManager::new();
        let s = mailer();
        let spy = pm.spy_member(&s, "send").unwrap();
        assert_eq!(s.call("send", &[json!("a@b.c")]), Ok(json!("real-send")));
        assert_eq!(spy.call_count(), 1);
        assert_eq!(
            spy.identity(),
            &Identity::Member {
                surface: "mail-sender".into(),
                member: "send".into()
            }
        );
        pm.restore_all();
    }

    #[test]
    fn double_patch_is_rejected() {
        let pm = PatchManager::new();
        let other = PatchManager::new();
        let s = mailer();
        pm.stub_member(&s, "send").unwrap();
        let err = pm.patch(&s, "send", &Double::spy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyPatched);
        // a second manager sees the same redirection table
        let err = other.stub_member(&s, "send").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyPatched);
        pm.restore_all();
    }

    #[test]
    fn missing_member_is_a_target_error() {
        let pm = PatchManager::new();
        let err = pm.stub_member(&mailer(), "sendd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DoubleTarget);
        assert_eq!(pm.active_count(), 0);
    }

    #[test]
    fn restore_all_is_lifo_and_tolerant() {
        let pm = PatchManager::new();
        assert_eq!(pm.restore_all(), 0);
        assert!(!pm.restore(&mailer(), "send"));

        let s = mailer();
        let send = pm.stub_member(&s, "send").unwrap();
        let ping = pm.stub_member(&s, "ping").unwrap();
        ping.throws(Fault::named("down")).unwrap();
        assert_eq!(pm.restore_all(), 2);
        assert_eq!(pm.active_count(), 0);
        assert!(!send.is_live() && !ping.is_live());
        assert_eq!(s.call("ping", &[]), Ok(json!("pong")));
        assert!(s.double("ping").is_none());
        assert_eq!(send.invoke(&[]).unwrap_err().name(), "inert-double");
    }

    #[test]
    fn shared_double_survives_partial_restore() {
        let pm = PatchManager::new();
        let s = mailer();
        let stub = Double::stub();
        stub.returns("canned").unwrap();
        pm.patch(&s, "send", &stub).unwrap();
        pm.patch(&s, "ping", &stub).unwrap();

        assert!(pm.restore(&s, "send"));
        assert!(stub.is_live());
        assert_eq!(s.call("send", &[]), Ok(json!("real-send")));
        assert_eq!(s.call("ping", &[]), Ok(json!("canned")));

        assert!(pm.restore(&s, "ping"));
        assert!(!stub.is_live());
        assert_eq!(s.call("ping", &[]), Ok(json!("pong")));
    }
}
