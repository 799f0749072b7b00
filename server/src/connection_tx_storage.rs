use crate::connection::ConnectionEvent;
use parking_lot::Mutex;
use relay_system::{ConnectionId, Deliver, DeliveryError};
use std::collections::HashMap;

pub type ConnectionTx = tokio::sync::mpsc::UnboundedSender<ConnectionEvent>;

/// Outbound channel of every open connection, keyed by id.
pub struct ConnectionTxStorage {
    connection_txs: Mutex<HashMap<ConnectionId, ConnectionTx>>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.lock().insert(connection_id, tx);
    }

    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.lock().remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.lock().len()
    }
}

impl Default for ConnectionTxStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Deliver for ConnectionTxStorage {
    /// Never waits: the channel is unbounded and the actor drains it.
    fn deliver(&self, to: ConnectionId, payload: &str) -> Result<(), DeliveryError> {
        let tx = self
            .connection_txs
            .lock()
            .get(&to)
            .cloned()
            .ok_or(DeliveryError::UnknownConnection(to))?;
        tx.send(ConnectionEvent::Relayed(payload.to_owned()))
            .map_err(|_| DeliveryError::Closed(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn it_delivers_to_registered_connection() {
        let storage = ConnectionTxStorage::new();
        let (tx, mut rx) = unbounded_channel();
        storage.insert(ConnectionId(1), tx);

        storage.deliver(ConnectionId(1), "hello").expect("");

        match rx.try_recv() {
            Ok(ConnectionEvent::Relayed(payload)) => assert_eq!(payload, "hello"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn it_fails_for_unknown_or_closed_connection() {
        let storage = ConnectionTxStorage::new();
        assert_eq!(
            storage.deliver(ConnectionId(7), "x"),
            Err(DeliveryError::UnknownConnection(ConnectionId(7)))
        );

        let (tx, rx) = unbounded_channel();
        storage.insert(ConnectionId(8), tx);
        drop(rx);
        assert_eq!(
            storage.deliver(ConnectionId(8), "x"),
            Err(DeliveryError::Closed(ConnectionId(8)))
        );
    }
}
