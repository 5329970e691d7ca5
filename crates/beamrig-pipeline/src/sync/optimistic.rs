//! Two-phase optimistic mutations.
//!
//! Confirmed values live in an authoritative map. A tentative value is kept
//! in a separate overlay until the server answers: `confirm` promotes the
//! server's copy, `rollback` drops the tentative one. Readers see the overlay
//! first through [`OptimisticStore::view`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use beamrig_core::{RigError, RigResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Handle of one tentative mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingId(pub u64);

#[derive(Debug, Clone, PartialEq)]
struct Pending<K, V> {
    key: K,
    value: V,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticStore<K, V> {
    confirmed: BTreeMap<K, V>,
    pending: BTreeMap<PendingId, Pending<K, V>>,
    next_id: u64,
}

impl<K, V> Default for OptimisticStore<K, V> {
    fn default() -> Self {
        Self {
            confirmed: BTreeMap::new(),
            pending: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<K: Ord + Clone + std::fmt::Debug, V> OptimisticStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with values already known to the server.
    pub fn from_confirmed(confirmed: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            confirmed: confirmed.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record a tentative value for `key`.
    pub fn apply(&mut self, key: K, tentative: V) -> PendingId {
        let id = PendingId(self.next_id);
        self.next_id += 1;
        debug!("optimistic apply {:?} for {:?}", id, key);
        self.pending.insert(
            id,
            Pending {
                key,
                value: tentative,
            },
        );
        id
    }

    /// Replace the tentative value with the server's and make it authoritative.
    pub fn confirm(&mut self, id: PendingId, server_value: V) -> RigResult<&V> {
        let pending = self.take(id)?;
        debug!("optimistic confirm {:?} for {:?}", id, pending.key);
        match self.confirmed.entry(pending.key) {
            Entry::Occupied(mut slot) => {
                slot.insert(server_value);
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => Ok(slot.insert(server_value)),
        }
    }

    /// Drop the tentative value; the confirmed one becomes visible again.
    pub fn rollback(&mut self, id: PendingId) -> RigResult<()> {
        let pending = self.take(id)?;
        warn!("optimistic rollback {:?} for {:?}", id, pending.key);
        Ok(())
    }

    /// Newest tentative value for `key`, else the confirmed one.
    pub fn view(&self, key: &K) -> Option<&V> {
        self.pending
            .values()
            .rev()
            .find(|p| &p.key == key)
            .map(|p| &p.value)
            .or_else(|| self.confirmed.get(key))
    }

    pub fn confirmed(&self, key: &K) -> Option<&V> {
        self.confirmed.get(key)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.values().any(|p| &p.key == key)
    }

    /// Key a pending mutation was applied to.
    pub fn pending_key(&self, id: PendingId) -> Option<&K> {
        self.pending.get(&id).map(|p| &p.key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply `tentative`, run `commit` and settle on its result.
    ///
    /// The overlay holds the tentative value only while `commit` runs; on
    /// error it is rolled back and the error returned.
    pub fn commit_with<F>(&mut self, key: K, tentative: V, commit: F) -> RigResult<&V>
    where
        F: FnOnce(&V) -> RigResult<V>,
    {
        let id = self.apply(key, tentative);
        let outcome = match self.pending.get(&id) {
            Some(pending) => commit(&pending.value),
            None => Err(RigError::precondition(format!("pending {id:?} vanished"))),
        };
        match outcome {
            Ok(server_value) => self.confirm(id, server_value),
            Err(err) => {
                self.rollback(id)?;
                Err(err)
            }
        }
    }

    fn take(&mut self, id: PendingId) -> RigResult<Pending<K, V>> {
        self.pending
            .remove(&id)
            .ok_or_else(|| RigError::precondition(format!("unknown pending mutation {id:?}")))
    }
}
