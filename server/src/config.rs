use clap::Parser;

/// Websocket session relay.
#[derive(Debug, Clone, Parser)]
#[command(name = "relay", version)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, env = "RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Worker threads. 0 means one per CPU.
    #[arg(short, long, env = "RELAY_WORKERS", default_value_t = 0)]
    pub workers: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_uses_defaults_without_arguments() {
        let config = ServerConfig::try_parse_from(["relay"]).expect("");
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, 0);
        assert_eq!(config.bind_address(), ("127.0.0.1".to_string(), 8080));
    }

    #[test]
    fn it_reads_flags() {
        let config =
            ServerConfig::try_parse_from(["relay", "--port", "9000", "--workers", "4"]).expect("");
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn it_rejects_bad_port() {
        assert!(ServerConfig::try_parse_from(["relay", "--port", "http"]).is_err());
    }
}
