// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sdc-transport — HTTP(S) client pool and dispatch server
//!
//! Client: a per-host connection pool with bounded concurrency; every call
//! takes a [`deadline::Deadline`]. Server: routes by request path to a
//! registered handler, with optional TLS (mutual auth supported) behind the
//! `tls` feature. This layer never retries a SOAP-level operation — see
//! the HTTP transport.

pub mod client;
pub mod deadline;
pub mod error;
pub mod server;
pub mod tls;

pub use client::{HttpClientPool, SoapRequest, SoapResponse};
pub use deadline::{CancellationToken, Deadline};
pub use error::{TransportError, TransportErrorKind, TransportResult};
pub use server::{HttpServer, ServiceRegistry};
pub use tls::TlsMode;
