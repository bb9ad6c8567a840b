// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Redirection table for collaborator members.
//!
//! A [`Surface`] stands for an object or module: a named set of members, each a
//! mutable binding that is either the real implementation or a [`Double`].
//! Collaborators dispatch through [`Surface::call`], so the patch manager can
//! swap bindings without touching calling code.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::double::Double;
use crate::value::{callable, Callable, Fault};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique surface identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Clone)]
pub(crate) enum Binding {
    Real(Callable),
    Double(Double),
}

/// A named set of swappable members.
pub struct Surface {
    id: SurfaceId,
    name: String,
    members: RwLock<BTreeMap<String, Binding>>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("members", &self.member_names())
            .finish()
    }
}

impl Surface {
    /// Create an empty surface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            members: RwLock::new(BTreeMap::new()),
        }
    }

    /// Start a builder.
    pub fn builder(name: impl Into<String>) -> SurfaceBuilder {
        SurfaceBuilder {
            surface: Self::new(name),
        }
    }

    /// Identity used by the patch table.
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace a real member.
    pub fn define<F>(&self, member: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.define_callable(member, callable(f));
    }

    /// Add or replace a real member from an existing [`Callable`].
    pub fn define_callable(&self, member: impl Into<String>, f: Callable) {
        self.members
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(member.into(), Binding::Real(f));
    }

    /// True if `member` exists.
    pub fn has_member(&self, member: &str) -> bool {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(member)
    }

    /// Sorted member names.
    pub fn member_names(&self) -> Vec<String> {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Current implementation of `member`.
    ///
    /// For a real binding this is the very `Arc` that was defined, so
    /// `Arc::ptr_eq` can prove a restore put the original back.
    pub fn current(&self, member: &str) -> Option<Callable> {
        self.binding(member).map(|b| match b {
            Binding::Real(f) => f,
            Binding::Double(d) => d.as_callable(),
        })
    }

    /// The double currently installed on `member`, if any.
    pub fn double(&self, member: &str) -> Option<Double> {
        match self.binding(member)? {
            Binding::Double(d) => Some(d),
            Binding::Real(_) => None,
        }
    }

    /// Invoke `member` with `args`.
    pub fn call(&self, member: &str, args: &[Value]) -> Result<Value, Fault> {
        match self.binding(member) {
            Some(Binding::Real(f)) => f(args),
            Some(Binding::Double(d)) => d.invoke(args),
            None => Err(self.unknown(member)),
        }
    }

    /// Invoke `member` from async code; doubles get to suspend.
    pub async fn call_async(&self, member: &str, args: Vec<Value>) -> Result<Value, Fault> {
        match self.binding(member) {
            Some(Binding::Real(f)) => f(&args),
            Some(Binding::Double(d)) => d.invoke_async(args).await,
            None => Err(self.unknown(member)),
        }
    }

    fn unknown(&self, member: &str) -> Fault {
        Fault::new(
            "unknown-member",
            format!("`{}` has no member `{member}`", self.name),
        )
    }

    pub(crate) fn binding(&self, member: &str) -> Option<Binding> {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(member)
            .cloned()
    }

    /// Replace a binding, returning the previous one. No-op for unknown members.
    pub(crate) fn swap(&self, member: &str, binding: Binding) -> Option<Binding> {
        let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
        let slot = members.get_mut(member)?;
        Some(std::mem::replace(slot, binding))
    }
}

/// Fluent surface construction.
pub struct SurfaceBuilder {
    surface: Surface,
}

impl SurfaceBuilder {
    /// Add a real member.
    pub fn member<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.surface.define(name, f);
        self
    }

    /// Finish, shared so it can be patched and called from many places.
    pub fn build(self) -> Arc<Surface> {
        Arc::new(self.surface)
    }
}
