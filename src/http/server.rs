//! HTTP server startup logic.

use std::net::SocketAddr;

use axum::Router;
use axum_server::Handle;

use crate::config::AppConfig;

use super::shutdown;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address {addr:?}: {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Resolve the listen address from the app block.
///
/// `localhost` is mapped to the loopback address since `SocketAddr` does not
/// resolve names.
pub fn listen_addr(config: &AppConfig) -> Result<SocketAddr, ServerError> {
    let host = match config.app.host.as_str() {
        "localhost" => "127.0.0.1",
        host => host,
    };
    let addr = format!("{}:{}", host, config.app.port);
    addr.parse()
        .map_err(|source| ServerError::Address { addr, source })
}

/// Start the HTTP server.
///
/// This function blocks until the server shuts down.
pub async fn start_server(app: Router, config: &AppConfig) -> Result<(), ServerError> {
    let addr = listen_addr(config)?;
    let handle = Handle::new();

    tracing::info!(%addr, "Starting HTTP server");

    shutdown::setup_shutdown_handler(handle.clone());

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_maps_to_loopback() {
        let config = AppConfig::default();
        assert_eq!(listen_addr(&config).unwrap(), "127.0.0.1:3000".parse().unwrap());
    }

    #[test]
    fn test_explicit_address() {
        let mut config = AppConfig::default();
        config.app.host = "0.0.0.0".to_string();
        config.app.port = 8080;
        assert_eq!(listen_addr(&config).unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_unresolvable_host_is_error() {
        let mut config = AppConfig::default();
        config.app.host = "api.internal".to_string();
        assert!(matches!(
            listen_addr(&config),
            Err(ServerError::Address { .. })
        ));
    }
}
