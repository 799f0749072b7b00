use std::sync::Arc;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use relay_system::{ConnectionId, Payload, ServerResponse};

use crate::server::Server;

/// Pushed to a connection from outside its own request flow.
#[derive(Debug)]
pub enum ConnectionEvent {
    Relayed(Payload),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    server: Arc<Server>,
}

impl ConnectionActor {
    fn dispatch(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        if let ConnectionState::Connected(from) = self.state {
            log::debug!("Ingress from {}: {}", from, text);
            let response = self.server.handle_text(from, text);
            ctx.text(response.to_json());
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ConnectionEvent>();
        self.state = ConnectionState::Connected(self.server.connect(tx));

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            // do_send ignores mailbox capacity; it only fails once the actor
            // is gone.
            while let Some(msg) = rx.recv().await {
                if addr.do_send(ConnectionActorMessage(msg)).is_err() {
                    break;
                }
            }
            log::debug!("connection green thread - terminated");
        });
    }

    /// The only place a disconnect is dispatched, so it happens once whether
    /// the client closed cleanly or the socket just died.
    fn stopped(&mut self, _: &mut Self::Context) {
        if let ConnectionState::Connected(id) = self.state {
            self.state = ConnectionState::Idle;
            self.server.disconnect(id);
        }
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => self.dispatch(&text, ctx),
            Ok(ws::Message::Binary(bin)) => match std::str::from_utf8(&bin) {
                Ok(text) => self.dispatch(text, ctx),
                Err(_) => {
                    ctx.text(ServerResponse::bad_message("payload is not utf-8").to_json());
                }
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                log::warn!("Closing connection on protocol error: {}", e);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Protocol,
                    description: None,
                }));
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Relayed(payload) => {
                log::debug!("Egress {} bytes", payload.len());
                ctx.text(payload);
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Arc<Server>>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            server: server.get_ref().clone(),
            state: ConnectionState::Idle,
        },
        &req,
        stream,
    )
}
