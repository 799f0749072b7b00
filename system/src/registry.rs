use crate::error::RegistryError;
use crate::session::Session;
use crate::session_id::SessionIdGenerator;
use crate::transport::Deliver;
use crate::types::{ConnectionId, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Result of taking a connection out of its session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Departure {
    pub session_id: SessionId,
    /// The session became empty and was removed.
    pub purged: bool,
}

/// Single authority over session ids and membership.
///
/// Every operation runs under one lock, so id allocation, joins and purges
/// never interleave. `connection_locations` mirrors session membership and is
/// what keeps a connection in at most one session.
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

struct RegistryState {
    sessions: HashMap<SessionId, Session>,
    connection_locations: HashMap<ConnectionId, SessionId>,
    id_generator: SessionIdGenerator,
}

impl RegistryState {
    fn check_handle(&self, connection_id: &ConnectionId) -> Result<(), RegistryError> {
        if connection_id.is_null() {
            return Err(RegistryError::InvalidHandle);
        }
        Ok(())
    }

    /// Drops `connection_id` from `session_id`, purging the session if that
    /// left it empty.
    fn detach(&mut self, connection_id: &ConnectionId, session_id: SessionId) -> Departure {
        self.connection_locations.remove(connection_id);
        let purged = self
            .sessions
            .get_mut(&session_id)
            .map(|session| {
                let removed = session.remove_user(connection_id);
                debug_assert!(
                    removed.is_ok(),
                    "index placed {} in {} but it is not a member",
                    connection_id,
                    session_id
                );
                session.is_empty()
            })
            .unwrap_or(false);
        if purged {
            self.sessions.remove(&session_id);
        }
        Departure { session_id, purged }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_generator(SessionIdGenerator::new())
    }

    pub fn with_generator(id_generator: SessionIdGenerator) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                sessions: HashMap::new(),
                connection_locations: HashMap::new(),
                id_generator,
            }),
        }
    }

    /// Allocates a fresh id and registers a session whose first member is
    /// `creator`. Both happen under the same lock, so no one can observe the
    /// session empty.
    pub fn create_session(&self, creator: ConnectionId) -> Result<SessionId, RegistryError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.check_handle(&creator)?;
        if let Some(current) = state.connection_locations.get(&creator) {
            return Err(RegistryError::InAnotherSession(current.clone()));
        }

        let sessions = &state.sessions;
        let session_id = state
            .id_generator
            .allocate(|candidate| sessions.contains_key(candidate))?;

        let mut session = Session::new(session_id.clone());
        session.add_user(creator);
        state.sessions.insert(session_id.clone(), session);
        state
            .connection_locations
            .insert(creator, session_id.clone());
        Ok(session_id)
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.state.lock().sessions.contains_key(session_id)
    }

    /// Runs `f` against the live session while the registry lock is held.
    /// The borrow cannot outlive the call, so a concurrent purge can never
    /// leave the caller holding a dead session.
    pub fn with_session<R, F>(&self, session_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        self.state.lock().sessions.get(session_id).map(f)
    }

    /// Owned copy of a session as it is right now.
    pub fn session_snapshot(&self, session_id: &str) -> Option<Session> {
        self.with_session(session_id, Session::clone)
    }

    /// Admits `connection_id` to `session_id`. A connection already in some
    /// other session is refused rather than moved.
    pub fn add_user_to_session(
        &self,
        connection_id: ConnectionId,
        session_id: &str,
    ) -> Result<SessionId, RegistryError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.check_handle(&connection_id)?;

        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or(RegistryError::SessionNotFound)?;
        if session.contains_user(&connection_id) {
            return Err(RegistryError::UserExists);
        }
        if let Some(current) = state.connection_locations.get(&connection_id) {
            return Err(RegistryError::InAnotherSession(current.clone()));
        }

        session.add_user(connection_id);
        let session_id = session.id().clone();
        state
            .connection_locations
            .insert(connection_id, session_id.clone());
        Ok(session_id)
    }

    /// Relays `payload` from `sender` to the other members of `session_id`.
    ///
    /// Membership is checked and copied under the lock; delivery happens after
    /// it is released, so a slow peer cannot stall other registry calls.
    /// Returns how many peers accepted the payload.
    pub fn send_message<D: Deliver>(
        &self,
        sender: ConnectionId,
        session_id: &str,
        payload: &str,
        transport: &D,
    ) -> Result<usize, RegistryError> {
        if sender.is_null() {
            return Err(RegistryError::InvalidHandle);
        }
        let snapshot = {
            let state = self.state.lock();
            let session = state
                .sessions
                .get(session_id)
                .ok_or(RegistryError::SessionNotFound)?;
            if !session.contains_user(&sender) {
                return Err(RegistryError::NotAMember(session.id().clone()));
            }
            session.clone()
        };
        Ok(snapshot.send_to_peers(&sender, payload, transport))
    }

    /// Removes `connection_id` from the named session without disconnecting
    /// it. The session is purged if it becomes empty.
    pub fn leave_session(
        &self,
        connection_id: ConnectionId,
        session_id: &str,
    ) -> Result<Departure, RegistryError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.check_handle(&connection_id)?;

        let session = state
            .sessions
            .get(session_id)
            .ok_or(RegistryError::SessionNotFound)?;
        if !session.contains_user(&connection_id) {
            return Err(RegistryError::NotAMember(session.id().clone()));
        }
        let session_id = session.id().clone();
        Ok(state.detach(&connection_id, session_id))
    }

    /// Removes `connection_id` from whichever session holds it, purging that
    /// session if it becomes empty. Called once per terminated connection.
    pub fn remove_user_from_any(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Departure, RegistryError> {
        let mut state = self.state.lock();
        state.check_handle(&connection_id)?;

        let session_id = state
            .connection_locations
            .get(&connection_id)
            .cloned()
            .ok_or(RegistryError::UserNotFound)?;
        Ok(state.detach(&connection_id, session_id))
    }

    /// The session `connection_id` currently belongs to, if any.
    pub fn member_session(&self, connection_id: &ConnectionId) -> Option<SessionId> {
        self.state
            .lock()
            .connection_locations
            .get(connection_id)
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
