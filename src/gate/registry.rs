//! Concurrent session lookup by remote address and bound role.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use super::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    by_addr: DashMap<SocketAddr, Arc<Session>>,
    by_role: DashMap<u64, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns `false` without inserting when the
    /// address is already registered, which means a stale entry has not
    /// finished tearing down yet.
    pub fn insert(&self, session: Arc<Session>) -> bool {
        match self.by_addr.entry(session.remote_addr()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<Session>> {
        self.by_addr.get(addr).map(|s| s.clone())
    }

    /// Index a session by role id after login. A relogin from a new
    /// connection displaces the old mapping.
    pub fn bind_role(&self, role_id: u64, session: Arc<Session>) {
        self.by_role.insert(role_id, session);
    }

    pub fn find_role(&self, role_id: u64) -> Option<Arc<Session>> {
        self.by_role.get(&role_id).map(|s| s.clone())
    }

    /// Drop both indexes for a session. The role entry is removed only if
    /// it still points at this session, so a relogin is not clobbered.
    pub fn remove(&self, session: &Arc<Session>) {
        self.by_addr.remove(&session.remote_addr());
        if let Some(role_id) = session.role_id() {
            self.by_role
                .remove_if(&role_id, |_, bound| Arc::ptr_eq(bound, session));
        }
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}
