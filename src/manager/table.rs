//! Session table
//!
//! Maps external ids to managed sessions. After a rekey the old id stays
//! resolvable through an alias, so callers holding it still reach the
//! session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::session::ProcessSession;
use crate::types::identifiers::SessionId;

/// A Process Session plus the id it is currently known under
pub(super) struct ManagedSession {
    /// Rewritten in place on rekey; read by the event sink at emit time
    pub id_cell: Arc<RwLock<SessionId>>,
    pub session: ProcessSession,
}

impl ManagedSession {
    pub fn current_id(&self) -> SessionId {
        self.id_cell.read().clone()
    }
}

pub(super) enum Rekey {
    /// Entry moved from `previous`; `displaced` held the new key before
    Moved {
        previous: SessionId,
        displaced: Option<Arc<ManagedSession>>,
    },
    /// Entry is already known as the new id
    Unchanged,
    /// Entry is no longer registered; nothing changed
    Stale,
}

#[derive(Default)]
pub(super) struct SessionTable {
    entries: HashMap<SessionId, Arc<ManagedSession>>,
    /// Former id → current key
    aliases: HashMap<SessionId, SessionId>,
}

impl SessionTable {
    fn key_for<'a>(&'a self, id: &'a SessionId) -> Option<&'a SessionId> {
        if self.entries.contains_key(id) {
            Some(id)
        } else {
            self.aliases.get(id)
        }
    }

    pub fn resolve(&self, id: &SessionId) -> Option<Arc<ManagedSession>> {
        self.key_for(id)
            .and_then(|key| self.entries.get(key))
            .cloned()
    }

    pub fn insert(&mut self, id: SessionId, entry: Arc<ManagedSession>) {
        self.aliases.remove(&id);
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Arc<ManagedSession>> {
        let key = self.key_for(id)?.clone();
        let entry = self.entries.remove(&key)?;
        self.aliases.retain(|_, target| *target != key);
        Some(entry)
    }

    /// Move `entry` to `canonical`, keeping its old id as an alias
    pub fn rekey(&mut self, entry: &Arc<ManagedSession>, canonical: &SessionId) -> Rekey {
        let previous = entry.current_id();
        match self.entries.get(&previous) {
            Some(registered) if Arc::ptr_eq(registered, entry) => {}
            _ => return Rekey::Stale,
        }
        if previous == *canonical {
            return Rekey::Unchanged;
        }

        self.entries.remove(&previous);
        let displaced = self.entries.insert(canonical.clone(), Arc::clone(entry));

        // Aliases of a displaced session must not start reaching this one.
        if displaced.is_some() {
            self.aliases.retain(|_, target| *target != *canonical);
        }
        for target in self.aliases.values_mut() {
            if *target == previous {
                *target = canonical.clone();
            }
        }
        self.aliases.remove(canonical);
        self.aliases.insert(previous.clone(), canonical.clone());
        *entry.id_cell.write() = canonical.clone();

        Rekey::Moved {
            previous,
            displaced,
        }
    }

    pub fn drain(&mut self) -> Vec<Arc<ManagedSession>> {
        self.aliases.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.entries.keys().cloned().collect()
    }

    pub fn canonical_id(&self, id: &SessionId) -> Option<SessionId> {
        self.key_for(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
