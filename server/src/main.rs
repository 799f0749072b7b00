use std::sync::Arc;

use actix_web::{App, HttpServer};
use clap::Parser;

use relay_server::config::ServerConfig;
use relay_server::server::Server;
use relay_server::{root, WS_ENDPOINT};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let server = Arc::new(Server::new());

    let mut http_server = HttpServer::new(move || App::new().data(server.clone()).configure(root));
    if config.workers > 0 {
        http_server = http_server.workers(config.workers);
    }

    let (host, port) = config.bind_address();
    log::info!("Relay listening on ws://{}:{}{}", host, port, WS_ENDPOINT);
    http_server.bind((host.as_str(), port))?.run().await
}
