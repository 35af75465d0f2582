//! HTTP exposition endpoint.
//!
//! Serves the current snapshot verbatim on `GET /metrics`. The handler
//! takes the store's atomic read path only; it never touches disk or the
//! sampling loop. Shutdown is graceful: the listener stops accepting on
//! cancellation and in-flight requests get to finish, with the supervisor
//! bounding the wait.

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::{header, HeaderName},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::snapshot::MetricsStore;

/// Errors from the exposition server. A bind failure is fatal for startup;
/// serve failures surface to the supervisor which escalates to shutdown.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind metrics listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// The metrics exposition server.
pub struct ExportServer {
    addr: SocketAddr,
    store: MetricsStore,
    cancel: CancellationToken,
}

impl ExportServer {
    pub fn new(addr: SocketAddr, store: MetricsStore, cancel: CancellationToken) -> Self {
        ExportServer {
            addr,
            store,
            cancel,
        }
    }

    /// Binds the configured address and serves until cancellation.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` when the address cannot be bound and
    /// `ServerError::Serve` for accept-loop failures.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_on(listener).await
    }

    /// Serves on an already-bound listener. Split out so tests can bind an
    /// ephemeral port first.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "metrics endpoint listening");
        }

        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self.store)
            .layer(TraceLayer::new_for_http());

        let cancel = self.cancel;
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("metrics endpoint shutting down");
            })
            .await
            .map_err(ServerError::Serve)?;

        Ok(())
    }
}

/// Returns the current snapshot verbatim as plain text.
async fn metrics_handler(
    State(store): State<MetricsStore>,
) -> ([(HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        store.read().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    };

    use super::*;
    use crate::{config::site::SiteConfig, core::snapshot::render};

    fn lab_site() -> SiteConfig {
        SiteConfig {
            point: "lab".to_string(),
            system0: "solar".to_string(),
            system1: "grid".to_string(),
        }
    }

    async fn spawn_server(
        store: MetricsStore,
        cancel: CancellationToken,
    ) -> (SocketAddr, tokio::task::JoinHandle<Result<(), ServerError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = ExportServer::new(addr, store, cancel);
        let handle = tokio::spawn(server.serve_on(listener));
        (addr, handle)
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_the_current_snapshot_verbatim() {
        let site = lab_site();
        let store = MetricsStore::zeroed(&site);
        store.replace(render(&site, 1.23, 4.56));
        let cancel = CancellationToken::new();
        let (addr, handle) = spawn_server(store, cancel.clone()).await;

        let response = http_get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("content-type: text/plain; charset=utf-8"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(body, render(&lab_site(), 1.23, 4.56));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn initial_zero_snapshot_is_served_before_any_cycle() {
        let store = MetricsStore::zeroed(&lab_site());
        let cancel = CancellationToken::new();
        let (addr, handle) = spawn_server(store, cancel.clone()).await;

        let response = http_get(addr, "/metrics").await;
        assert!(response.contains("ampere_value{system=\"solar\", point=\"lab\"} 0.00"));
        assert!(response.contains("ampere_value{system=\"grid\", point=\"lab\"} 0.00"));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let store = MetricsStore::zeroed(&lab_site());
        let cancel = CancellationToken::new();
        let (addr, handle) = spawn_server(store, cancel.clone()).await;

        let response = http_get(addr, "/other").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_accepting_new_connections() {
        let store = MetricsStore::zeroed(&lab_site());
        let cancel = CancellationToken::new();
        let (addr, handle) = spawn_server(store, cancel.clone()).await;

        cancel.cancel();
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop within the deadline")
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn bind_failure_is_reported_with_the_address() {
        let store = MetricsStore::zeroed(&lab_site());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = ExportServer::new(addr, store, CancellationToken::new());
        let err = server.serve().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&addr.to_string()));
        drop(listener);
    }
}
