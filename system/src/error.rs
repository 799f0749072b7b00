use crate::types::{ConnectionId, SessionId};
use thiserror::Error;

/// Outcome of a rejected registry operation. None of these are fatal; the
/// dispatcher decides how to surface them. Display text doubles as the
/// human-readable reason sent back to clients.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum RegistryError {
    #[error("session not found")]
    SessionNotFound,

    #[error("user already in session")]
    UserExists,

    /// Membership is exclusive across the registry.
    #[error("user already in another session {0}")]
    InAnotherSession(SessionId),

    #[error("user not in session {0}")]
    NotAMember(SessionId),

    #[error("user not found in any session")]
    UserNotFound,

    #[error("invalid connection handle")]
    InvalidHandle,

    #[error("could not allocate a session id")]
    IdSpaceExhausted,
}

/// A single failed delivery. Only ever seen by the delivery capability and
/// the session fan-out, which swallows it.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum DeliveryError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}
