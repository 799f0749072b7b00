use crate::error::DeliveryError;
use crate::types::ConnectionId;

/// Best-effort delivery of one payload to one connection. Implemented by the
/// transport layer; must not block on a slow peer.
pub trait Deliver {
    fn deliver(&self, to: ConnectionId, payload: &str) -> Result<(), DeliveryError>;
}

impl<D: Deliver + ?Sized> Deliver for &D {
    fn deliver(&self, to: ConnectionId, payload: &str) -> Result<(), DeliveryError> {
        (**self).deliver(to, payload)
    }
}
