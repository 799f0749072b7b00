pub extern crate actix_web;

pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod server;

use actix_web::web;

use crate::connection::ws_index;

pub const WS_ENDPOINT: &str = "/ws";

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(WS_ENDPOINT).route(web::get().to(ws_index)));
}
