//! Server-side object registry.
//!
//! Objects handed to the client are kept alive here under a synthetic
//! [`ObjectReference`]. Handles come from a monotonically increasing counter,
//! never from memory addresses, so a reference is never reused.
//!
//! Entries are only ever removed by [`ObjectRegistry::reconcile`]: there is no
//! reference counting and no time-based eviction. A client that never
//! reconciles keeps every object alive for the lifetime of the server.
//!
//! # Thread Safety
//!
//! All operations take `&self` and synchronize internally, so the registry can
//! be shared between workers behind an `Arc`.

use crate::catalog::HostObject;
use crate::codec::ObjectReference;
use crate::{GatewayError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Default)]
struct RegistryInner {
    objects: HashMap<ObjectReference, HostObject>,
    /// Identity of each registered object, for idempotent registration.
    by_identity: HashMap<usize, ObjectReference>,
}

/// Concurrent map from reference to live object.
pub struct ObjectRegistry {
    inner: RwLock<RegistryInner>,
    next_handle: AtomicU64,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register an object and return its reference.
    ///
    /// Registering the same identity again returns the existing reference.
    pub fn put(&self, obj: &HostObject) -> ObjectReference {
        let identity = obj.identity();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = inner.by_identity.get(&identity) {
            return *existing;
        }

        let reference = ObjectReference::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        inner.objects.insert(reference, obj.clone());
        inner.by_identity.insert(identity, reference);
        debug!("Registered {} as {}", obj.type_name(), reference);
        reference
    }

    pub fn get(&self, reference: ObjectReference) -> Result<HostObject> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .get(&reference)
            .cloned()
            .ok_or(GatewayError::UnknownReference(reference))
    }

    pub fn contains(&self, reference: ObjectReference) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .contains_key(&reference)
    }

    /// Remove every registered reference not listed in `live`.
    ///
    /// References in `live` that were never registered are ignored. Returns
    /// the number of entries removed.
    pub fn reconcile(&self, live: &[ObjectReference]) -> usize {
        let keep: HashSet<ObjectReference> = live.iter().copied().collect();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let stale: Vec<ObjectReference> = inner
            .objects
            .keys()
            .filter(|reference| !keep.contains(reference))
            .copied()
            .collect();
        for reference in &stale {
            if let Some(obj) = inner.objects.remove(reference) {
                inner.by_identity.remove(&obj.identity());
            }
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
