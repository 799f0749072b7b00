use crate::error::RegistryError;
use crate::transport::Deliver;
use crate::types::{ConnectionId, SessionId};

/// A group of connections relaying payloads to each other.
///
/// No locking here: sessions are only reachable through `SessionRegistry`,
/// which serializes every access.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    members: Vec<ConnectionId>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    /// Returns false if `connection_id` is already a member.
    pub(crate) fn add_user(&mut self, connection_id: ConnectionId) -> bool {
        if self.contains_user(&connection_id) {
            return false;
        }
        self.members.push(connection_id);
        true
    }

    pub(crate) fn remove_user(&mut self, connection_id: &ConnectionId) -> Result<(), RegistryError> {
        self.members
            .iter()
            .position(|member| member == connection_id)
            .map(|pos| {
                self.members.remove(pos);
            })
            .ok_or(RegistryError::UserNotFound)
    }

    pub fn contains_user(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    /// Hands `payload` to every member except `sender`. A failed delivery
    /// does not stop the rest. Returns how many peers accepted it.
    pub fn send_to_peers<D: Deliver>(
        &self,
        sender: &ConnectionId,
        payload: &str,
        transport: &D,
    ) -> usize {
        self.members
            .iter()
            .filter(|member| *member != sender)
            .filter(|member| transport.deliver(**member, payload).is_ok())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
