// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP(S) server: routes by request path to a registered handler.
//!
//! Built on `axum`, with routes and handlers kept in separate concerns —
//! except here the set of paths is not fixed at compile time: each SDC
//! service (GetService, SetService, SubscriptionManager, ...) registers
//! its own path at construction via [`ServiceRegistry::register`].

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Body in, body out — both already SOAP-envelope XML. Handlers never see
/// transport-level concerns (TLS, chunking); those stop at this boundary.
pub type SoapHandlerFuture = Pin<Box<dyn Future<Output = String> + Send>>;
pub type SoapHandlerFn = Arc<dyn Fn(String) -> SoapHandlerFuture + Send + Sync>;

/// Maps request paths to the SOAP handler registered for that service.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: Arc<DashMap<String, SoapHandlerFn>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` to answer requests POSTed to `path` (e.g.
    /// `/StateEventService`). Re-registering the same path replaces the
    /// handler — callers own their own path uniqueness.
    pub fn register(
        &self,
        path: impl Into<String>,
        handler: impl Fn(String) -> SoapHandlerFuture + Send + Sync + 'static,
    ) {
        self.handlers.insert(path.into(), Arc::new(handler));
    }
}

async fn dispatch(
    State(registry): State<ServiceRegistry>,
    Path(service): Path<String>,
    body: Bytes,
) -> Response {
    let Some(handler) = registry.handlers.get(&service).map(|h| h.clone()) else {
        return (StatusCode::NOT_FOUND, "unknown service path").into_response();
    };
    let body_xml = String::from_utf8_lossy(&body).into_owned();
    let response_xml = handler(body_xml).await;
    (
        StatusCode::OK,
        [("Content-Type", "application/soap+xml; charset=utf-8")],
        response_xml,
    )
        .into_response()
}

/// The SOAP-over-HTTP server. Supports chunked request/response bodies
/// transparently (axum/hyper handle this below this layer); TLS is layered
/// on by the caller via the `tls` feature's `tokio-rustls` acceptor.
pub struct HttpServer {
    registry: ServiceRegistry,
}

impl HttpServer {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/:service", post(dispatch))
            .with_state(self.registry.clone())
    }

    /// Binds and serves forever (until the process is killed or the
    /// listener errors). Plain HTTP; see [`Self::serve_tls`] for the
    /// TLS-wrapped variant.
    pub async fn serve(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("sdc-transport: SOAP server listening on {addr}");
        axum::serve(listener, self.router()).await
    }

    /// Binds and serves forever behind a TLS handshake on every accepted
    /// connection. `tls_config` is built by [`crate::tls::TlsContext`];
    /// a connection whose handshake fails (including trust-predicate
    /// rejection) is logged and dropped without taking down the listener.
    #[cfg(feature = "tls")]
    pub async fn serve_tls(&self, addr: SocketAddr, tls_config: Arc<rustls::ServerConfig>) -> std::io::Result<()> {
        let tcp = tokio::net::TcpListener::bind(addr).await?;
        log::info!("sdc-transport: SOAP server listening on {addr} (TLS)");
        let listener = TlsListener {
            tcp,
            acceptor: tokio_rustls::TlsAcceptor::from(tls_config),
        };
        axum::serve(listener, self.router()).await
    }
}

/// An [`axum::serve::Listener`] that terminates TLS on every accepted
/// connection before handing the decrypted stream to axum. A failed
/// handshake (bad cert, trust-predicate rejection, client hung up mid
/// negotiation) is logged and the listener keeps accepting.
#[cfg(feature = "tls")]
struct TlsListener {
    tcp: tokio::net::TcpListener,
    acceptor: tokio_rustls::TlsAcceptor,
}

#[cfg(feature = "tls")]
impl axum::serve::Listener for TlsListener {
    type Io = tokio_rustls::server::TlsStream<tokio::net::TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (stream, addr) = match self.tcp.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("sdc-transport: TCP accept failed: {e}");
                    continue;
                }
            };
            match self.acceptor.accept(stream).await {
                Ok(tls_stream) => return (tls_stream, addr),
                Err(e) => log::warn!("sdc-transport: TLS handshake with {addr} failed: {e}"),
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_dispatches_by_path() {
        let registry = ServiceRegistry::new();
        registry.register("GetService", |body| {
            Box::pin(async move { format!("echo:{body}") })
        });
        let handler = registry.handlers.get("GetService").unwrap().clone();
        let out = handler("<msg:GetMdib/>".to_string()).await;
        assert_eq!(out, "echo:<msg:GetMdib/>");
    }

    #[tokio::test]
    async fn unregistered_path_has_no_handler() {
        let registry = ServiceRegistry::new();
        assert!(registry.handlers.get("Nope").is_none());
    }
}
