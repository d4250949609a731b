// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLS configuration for the SOAP transport.
//!
//! Certificate validation is delegated to the platform trust store via
//! `rustls` + `webpki-roots`; an additional pluggable predicate runs over
//! the peer's subject/SAN for SDC-specific trust-list checks, layered on
//! top of that platform validation rather than replacing it.

/// How this endpoint uses TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Off,
    Server,
    Mutual,
}

#[cfg(feature = "tls")]
pub use imp::*;

#[cfg(feature = "tls")]
mod imp {
    use super::TlsMode;
    use rustls::client::danger::{HandshakeSignatureValid as ClientSigValid, ServerCertVerified, ServerCertVerifier};
    use rustls::client::WebPkiServerVerifier;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
    use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
    use rustls::server::WebPkiClientVerifier;
    use rustls::{ClientConfig, DigitallySignedStruct, DistinguishedName, RootCertStore, ServerConfig, SignatureScheme};
    use std::fmt;
    use std::io;
    use std::path::Path;
    use std::sync::Arc;

    /// Additional SDC-specific trust check run over the peer certificate
    /// after platform trust-store validation succeeds. Returning `false`
    /// terminates the handshake even though the certificate chain itself
    /// validated.
    pub type TrustPredicate = Arc<dyn Fn(&CertificateDer<'_>) -> bool + Send + Sync>;

    /// Bundles the TLS mode with the SDC trust predicate; builds the
    /// `rustls` configs that `sdc-transport`'s server and client wire up.
    pub struct TlsContext {
        pub mode: TlsMode,
        pub trust_predicate: Option<TrustPredicate>,
    }

    impl TlsContext {
        pub fn off() -> Self {
            Self {
                mode: TlsMode::Off,
                trust_predicate: None,
            }
        }

        pub fn server(trust_predicate: Option<TrustPredicate>) -> Self {
            Self {
                mode: TlsMode::Server,
                trust_predicate,
            }
        }

        pub fn mutual(trust_predicate: TrustPredicate) -> Self {
            Self {
                mode: TlsMode::Mutual,
                trust_predicate: Some(trust_predicate),
            }
        }

        /// Evaluates the pluggable trust predicate, if any. Exposed mainly
        /// for tests; the live handshake path runs the same predicate from
        /// inside [`PredicateServerCertVerifier`]/[`PredicateClientCertVerifier`].
        pub fn is_peer_trusted(&self, peer_cert: &CertificateDer<'_>) -> bool {
            match &self.trust_predicate {
                Some(pred) => pred(peer_cert),
                None => true,
            }
        }

        /// Builds the server-side config for accepting connections: loads
        /// `cert_path`/`key_path` as the server's own identity, and in
        /// [`TlsMode::Mutual`] additionally requires and verifies a client
        /// certificate against `client_ca_path`.
        pub fn build_server_config(
            &self,
            cert_path: &Path,
            key_path: &Path,
            client_ca_path: Option<&Path>,
        ) -> io::Result<ServerConfig> {
            let certs = load_certs(cert_path)?;
            let key = load_private_key(key_path)?;

            let builder = ServerConfig::builder();
            let builder = match self.mode {
                TlsMode::Mutual => {
                    let ca_path = client_ca_path.ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "mutual TLS requires a client CA bundle")
                    })?;
                    let mut roots = RootCertStore::empty();
                    for cert in load_certs(ca_path)? {
                        roots
                            .add(cert)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    }
                    let inner = WebPkiClientVerifier::builder(Arc::new(roots))
                        .build()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    let verifier: Arc<dyn ClientCertVerifier> = match &self.trust_predicate {
                        Some(predicate) => Arc::new(PredicateClientCertVerifier {
                            inner,
                            predicate: predicate.clone(),
                        }),
                        None => inner,
                    };
                    builder.with_client_cert_verifier(verifier)
                }
                TlsMode::Server | TlsMode::Off => builder.with_no_client_auth(),
            };

            builder
                .with_single_cert(certs, key)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        }

        /// Builds the client-side config for initiating connections. Trust
        /// anchors are the platform's own root store (`webpki-roots`), not a
        /// caller-supplied CA file — per-peer narrowing happens through the
        /// trust predicate, not through a smaller root set. In
        /// [`TlsMode::Mutual`], `client_identity` supplies this side's own
        /// certificate and key for the server to verify.
        pub fn build_client_config(&self, client_identity: Option<(&Path, &Path)>) -> io::Result<ClientConfig> {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let inner = WebPkiServerVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            let verifier: Arc<dyn ServerCertVerifier> = match &self.trust_predicate {
                Some(predicate) => Arc::new(PredicateServerCertVerifier {
                    inner,
                    predicate: predicate.clone(),
                }),
                None => inner,
            };

            let builder = ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(verifier);

            let config = if self.mode == TlsMode::Mutual {
                let (cert_path, key_path) = client_identity.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "mutual TLS requires a client certificate and key")
                })?;
                let certs = load_certs(cert_path)?;
                let key = load_private_key(key_path)?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
            } else {
                builder.with_no_client_auth()
            };
            Ok(config)
        }
    }

    fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
        let mut reader = io::BufReader::new(std::fs::File::open(path)?);
        let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("no certificates found in {}", path.display())));
        }
        Ok(certs)
    }

    fn load_private_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
        let mut reader = io::BufReader::new(std::fs::File::open(path)?);
        rustls_pemfile::private_key(&mut reader)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("no private key found in {}", path.display())))
    }

    /// Wraps the platform's default server-certificate verifier and runs the
    /// SDC trust predicate over the end-entity certificate once the default
    /// verifier has already accepted the chain.
    struct PredicateServerCertVerifier {
        inner: Arc<dyn ServerCertVerifier>,
        predicate: TrustPredicate,
    }

    impl fmt::Debug for PredicateServerCertVerifier {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PredicateServerCertVerifier").finish_non_exhaustive()
        }
    }

    impl ServerCertVerifier for PredicateServerCertVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            server_name: &rustls::pki_types::ServerName<'_>,
            ocsp_response: &[u8],
            now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;
            if (self.predicate)(end_entity) {
                Ok(ServerCertVerified::assertion())
            } else {
                Err(rustls::Error::General("server certificate rejected by trust predicate".into()))
            }
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<ClientSigValid, rustls::Error> {
            self.inner.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<ClientSigValid, rustls::Error> {
            self.inner.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.inner.supported_verify_schemes()
        }
    }

    /// Wraps the platform's default client-certificate verifier (mutual TLS,
    /// server side) and runs the SDC trust predicate once the default
    /// verifier has already accepted the chain against the client CA roots.
    struct PredicateClientCertVerifier {
        inner: Arc<dyn ClientCertVerifier>,
        predicate: TrustPredicate,
    }

    impl fmt::Debug for PredicateClientCertVerifier {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PredicateClientCertVerifier").finish_non_exhaustive()
        }
    }

    impl ClientCertVerifier for PredicateClientCertVerifier {
        fn offer_client_auth(&self) -> bool {
            true
        }

        fn client_auth_mandatory(&self) -> bool {
            self.inner.client_auth_mandatory()
        }

        fn root_hint_subjects(&self) -> &[DistinguishedName] {
            self.inner.root_hint_subjects()
        }

        fn verify_client_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            now: UnixTime,
        ) -> Result<ClientCertVerified, rustls::Error> {
            self.inner.verify_client_cert(end_entity, intermediates, now)?;
            if (self.predicate)(end_entity) {
                Ok(ClientCertVerified::assertion())
            } else {
                Err(rustls::Error::General("client certificate rejected by trust predicate".into()))
            }
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<ClientSigValid, rustls::Error> {
            self.inner.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<ClientSigValid, rustls::Error> {
            self.inner.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.inner.supported_verify_schemes()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn predicate_default_accepts_when_absent() {
            let ctx = TlsContext::server(None);
            let cert = CertificateDer::from(vec![0u8; 4]);
            assert!(ctx.is_peer_trusted(&cert));
        }

        #[test]
        fn predicate_can_reject() {
            let ctx = TlsContext::mutual(Arc::new(|_c: &CertificateDer<'_>| false));
            let cert = CertificateDer::from(vec![1, 2, 3]);
            assert!(!ctx.is_peer_trusted(&cert));
        }

        #[test]
        fn client_config_rejects_mutual_mode_without_identity() {
            let ctx = TlsContext::mutual(Arc::new(|_| true));
            let err = ctx.build_client_config(None).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }

        #[test]
        fn server_config_rejects_mutual_mode_without_client_ca() {
            let dir = std::env::temp_dir();
            let ctx = TlsContext::mutual(Arc::new(|_| true));
            let err = ctx.build_server_config(&dir.join("nonexistent.crt"), &dir.join("nonexistent.key"), None);
            assert!(err.is_err());
        }
    }
}
