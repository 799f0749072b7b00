use std::sync::atomic::{AtomicU64, Ordering};

use relay_system::{
    parse_request, ClientRequest, ConnectionId, RegistryError, ServerResponse, SessionRegistry,
};

use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};

/// Connection-event dispatcher shared by every websocket actor.
///
/// Holds no lock of its own: the registry serializes session state and the
/// channel table guards itself, so actors on different workers call in
/// concurrently.
pub struct Server {
    registry: SessionRegistry,
    connections: ConnectionTxStorage,
    connection_id_source: AtomicU64,
}

impl Server {
    pub fn new() -> Self {
        Self::with_registry(SessionRegistry::new())
    }

    pub fn with_registry(registry: SessionRegistry) -> Self {
        Self {
            registry,
            connections: ConnectionTxStorage::new(),
            connection_id_source: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Issues an id for a new connection and registers its outbound channel.
    pub fn connect(&self, tx: ConnectionTx) -> ConnectionId {
        let connection_id =
            ConnectionId(self.connection_id_source.fetch_add(1, Ordering::SeqCst) + 1);
        self.connections.insert(connection_id, tx);
        log::debug!("Connection {} opened", connection_id);
        connection_id
    }

    /// Must run exactly once per connection, however it ended.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        match self.registry.remove_user_from_any(connection_id) {
            Ok(departure) => {
                log::info!(
                    "Connection {} left session {}",
                    connection_id,
                    departure.session_id
                );
                if departure.purged {
                    log::info!("Session {} purged", departure.session_id);
                }
            }
            Err(RegistryError::UserNotFound) => {
                log::debug!("Connection {} closed outside any session", connection_id)
            }
            Err(e) => log::warn!("Disconnect of {} failed: {}", connection_id, e),
        }
    }

    /// Handles one inbound text frame and returns the reply for the sender.
    pub fn handle_text(&self, from: ConnectionId, text: &str) -> ServerResponse {
        match parse_request(text) {
            Ok(request) => self.handle_request(from, request),
            Err(response) => {
                log::info!("Received bad request from {}: {}", from, text);
                response
            }
        }
    }

    pub fn handle_request(&self, from: ConnectionId, request: ClientRequest) -> ServerResponse {
        let result = match request {
            ClientRequest::Create => self.registry.create_session(from).map(|session_id| {
                log::info!("Created session: {}", session_id);
                ServerResponse::with_id(session_id)
            }),
            ClientRequest::Join { id } => {
                self.registry
                    .add_user_to_session(from, &id)
                    .map(|session_id| {
                        log::info!("Connection {} joined session {}", from, session_id);
                        ServerResponse::with_id(session_id)
                    })
            }
            ClientRequest::Leave { id } => {
                self.registry.leave_session(from, &id).map(|departure| {
                    log::info!("Connection {} left session {}", from, departure.session_id);
                    if departure.purged {
                        log::info!("Session {} purged", departure.session_id);
                    }
                    ServerResponse::with_id(departure.session_id)
                })
            }
            ClientRequest::Message { id, payload } => self
                .registry
                .send_message(from, &id, &payload, &self.connections)
                .map(|delivered| {
                    log::debug!(
                        "Relayed {} bytes from {} in {} to {} peers",
                        payload.len(),
                        from,
                        id,
                        delivered
                    );
                    ServerResponse::sent()
                }),
        };
        result.unwrap_or_else(|e| {
            log::debug!("Rejected request from {}: {}", from, e);
            ServerResponse::from(e)
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionEvent;
    use relay_system::serde_json::{self, json, Value};
    use relay_system::SessionId;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn connect(server: &Server) -> (ConnectionId, UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = unbounded_channel();
        (server.connect(tx), rx)
    }

    fn send(server: &Server, from: ConnectionId, request: Value) -> Value {
        let response = server.handle_text(from, &request.to_string());
        serde_json::from_str(&response.to_json()).expect("")
    }

    fn create(server: &Server, from: ConnectionId) -> SessionId {
        server
            .handle_request(from, ClientRequest::Create)
            .id
            .expect("create must return an id")
    }

    fn relayed(rx: &mut UnboundedReceiver<ConnectionEvent>) -> Vec<String> {
        let mut result = Vec::new();
        while let Ok(ConnectionEvent::Relayed(payload)) = rx.try_recv() {
            result.push(payload);
        }
        result
    }

    #[test]
    fn it_issues_distinct_connection_ids() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let (b, _rx_b) = connect(&server);
        assert_ne!(a, b);
        assert!(!a.is_null() && !b.is_null());
        assert_eq!(server.connection_count(), 2);
    }

    #[test]
    fn it_relays_message_to_peers_only() {
        let server = Server::new();
        let (a, mut rx_a) = connect(&server);
        let (b, mut rx_b) = connect(&server);
        let id = create(&server, a);

        assert_eq!(
            send(&server, b, json!({"type": "join", "id": id})),
            json!({"response": "success", "id": id})
        );
        assert_eq!(
            send(&server, b, json!({"type": "join", "id": id})),
            json!({"response": "error", "reason": "user already in session"})
        );
        assert_eq!(
            send(&server, b, json!({"type": "message", "id": id, "payload": "hi"})),
            json!({"response": "success", "status": "sent"})
        );

        assert_eq!(relayed(&mut rx_a), vec!["hi"]);
        assert!(relayed(&mut rx_b).is_empty());
    }

    #[test]
    fn it_rejects_message_from_non_member() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let (c, _rx_c) = connect(&server);
        let id = create(&server, a);

        assert_eq!(
            send(&server, c, json!({"type": "message", "id": id, "payload": "test"})),
            json!({"response": "bad_request", "reason": format!("user not in session {}", id)})
        );
        assert_eq!(
            send(&server, c, json!({"type": "message", "id": "zzzzzz", "payload": "test"})),
            json!({"response": "bad_request", "reason": "session not found"})
        );
    }

    #[test]
    fn it_purges_session_after_last_disconnect() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let (b, _rx_b) = connect(&server);
        let id = create(&server, a);
        send(&server, b, json!({"type": "join", "id": id}));

        server.disconnect(a);
        assert!(server.registry().has_session(id.as_str()));
        server.disconnect(b);
        assert!(!server.registry().has_session(id.as_str()));
        assert_eq!(server.connection_count(), 0);

        let (c, _rx_c) = connect(&server);
        assert_eq!(
            send(&server, c, json!({"type": "join", "id": id})),
            json!({"response": "bad_request", "reason": "session not found"})
        );
    }

    #[test]
    fn it_leaves_without_disconnecting() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let (b, mut rx_b) = connect(&server);
        let id = create(&server, a);
        send(&server, b, json!({"type": "join", "id": id}));

        assert_eq!(
            send(&server, a, json!({"type": "leave", "id": id})),
            json!({"response": "success", "id": id})
        );
        send(&server, a, json!({"type": "message", "id": id, "payload": "late"}));
        assert!(relayed(&mut rx_b).is_empty());

        let other = create(&server, a);
        assert_ne!(other, id);
    }

    #[test]
    fn it_skips_closed_peer_and_still_acknowledges() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let (b, rx_b) = connect(&server);
        let (c, mut rx_c) = connect(&server);
        let id = create(&server, a);
        send(&server, b, json!({"type": "join", "id": id}));
        send(&server, c, json!({"type": "join", "id": id}));
        drop(rx_b);

        assert_eq!(
            send(&server, a, json!({"type": "message", "id": id, "payload": "still here"})),
            json!({"response": "success", "status": "sent"})
        );
        assert_eq!(relayed(&mut rx_c), vec!["still here"]);
    }

    #[test]
    fn it_replies_bad_message_for_garbage() {
        let server = Server::new();
        let (a, _rx_a) = connect(&server);
        let response = server.handle_text(a, "not json");
        assert_eq!(response.response, relay_system::ResponseKind::BadMessage);
        assert_eq!(server.registry().session_count(), 0);
    }
}
