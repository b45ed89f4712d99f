//! TLS identity comparison
//!
//! Agents talk to servers with self-signed certificates, so PKI validation
//! is switched off at the transport and the presented leaf certificate is
//! compared with a locally stored copy instead. Thumbprint and public key
//! decide the match; the subject is only logged.

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

use super::{CertificateVerifier, Endpoint, PeerCertificateSource};
use crate::constants::DEFAULT_NETWORK_TIMEOUT;

/// The local certificate cannot be used
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("Failed to read certificate file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificate found in {0}")]
    Empty(PathBuf),

    #[error("Invalid certificate in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// What identifies a certificate for matching purposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    /// Uppercase hex SHA-256 of the DER encoding
    pub thumbprint: String,
    /// Raw SubjectPublicKeyInfo bytes
    pub public_key: Vec<u8>,
    pub subject: String,
}

impl CertificateIdentity {
    pub fn from_der(der: &[u8]) -> std::result::Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|err| err.to_string())?;
        Ok(Self {
            thumbprint: hex::encode_upper(Sha256::digest(der)),
            public_key: cert.public_key().raw.to_vec(),
            subject: cert.subject().to_string(),
        })
    }

    /// Thumbprint (case-insensitive) and public key must both agree
    pub fn matches(&self, other: &CertificateIdentity) -> bool {
        self.thumbprint.eq_ignore_ascii_case(&other.thumbprint) && self.public_key == other.public_key
    }
}

/// Read the first certificate of a PEM file, or a whole file as DER
pub fn load_local_certificate(path: &Path) -> std::result::Result<Vec<u8>, CertificateError> {
    let bytes = fs::read(path).map_err(|source| CertificateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(CertificateError::Empty(path.to_path_buf()));
    }

    let is_pem = bytes.windows(11).any(|window| window == b"-----BEGIN ");
    if !is_pem {
        return Ok(bytes);
    }

    let mut reader = bytes.as_slice();
    let first = rustls_pemfile::certs(&mut reader).next();
    match first {
        Some(Ok(der)) => Ok(der.to_vec()),
        Some(Err(err)) => Err(CertificateError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
        None => Err(CertificateError::Empty(path.to_path_buf())),
    }
}

/// Compares one local certificate with whatever remote servers present
pub struct CertificateMatcher {
    local: CertificateIdentity,
    source: Arc<dyn PeerCertificateSource>,
}

impl CertificateMatcher {
    /// Load the local certificate; failing here is fatal for the caller
    pub fn new(
        local_cert: &Path,
        source: Arc<dyn PeerCertificateSource>,
    ) -> std::result::Result<Self, CertificateError> {
        let der = load_local_certificate(local_cert)?;
        let local = CertificateIdentity::from_der(&der).map_err(|reason| CertificateError::Parse {
            path: local_cert.to_path_buf(),
            reason,
        })?;
        Ok(Self { local, source })
    }

    pub fn local_identity(&self) -> &CertificateIdentity {
        &self.local
    }

    /// Transport problems count as a mismatch
    pub fn matches(&self, remote_url: &str) -> bool {
        let endpoint = match Endpoint::parse(remote_url, true) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!("Certificate check skipped, '{}' {}", remote_url, err);
                return false;
            }
        };

        let der = match self.source.peer_certificate(&endpoint.host, endpoint.port) {
            Ok(der) => der,
            Err(err) => {
                warn!("Could not retrieve certificate from {}: {:#}", endpoint.tls_url(), err);
                return false;
            }
        };

        let remote = match CertificateIdentity::from_der(&der) {
            Ok(remote) => remote,
            Err(reason) => {
                warn!("Server {} presented an unreadable certificate: {}", endpoint.tls_url(), reason);
                return false;
            }
        };

        if remote.subject != self.local.subject {
            info!(
                "Certificate subject differs (local '{}', remote '{}')",
                self.local.subject, remote.subject
            );
        }

        let matched = self.local.matches(&remote);
        info!(
            "Certificate from {} {} local thumbprint {}",
            endpoint.tls_url(),
            if matched { "matches" } else { "does not match" },
            self.local.thumbprint
        );
        matched
    }
}

/// `CertificateVerifier` that builds a fresh matcher per check
pub struct MatcherVerifier {
    source: Arc<dyn PeerCertificateSource>,
}

impl MatcherVerifier {
    pub fn new(source: Arc<dyn PeerCertificateSource>) -> Self {
        Self { source }
    }
}

impl Default for MatcherVerifier {
    fn default() -> Self {
        Self::new(Arc::new(RustlsPeerFetcher::default()))
    }
}

impl CertificateVerifier for MatcherVerifier {
    fn verify(&self, local_cert: &Path, remote_url: &str) -> Result<bool> {
        let matcher = CertificateMatcher::new(local_cert, Arc::clone(&self.source))?;
        Ok(matcher.matches(remote_url))
    }
}

/// Accepts any chain; handshake signatures are still checked
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Performs a TLS handshake and keeps the server's leaf certificate
pub struct RustlsPeerFetcher {
    timeout: Duration,
    provider: Arc<CryptoProvider>,
}

impl Default for RustlsPeerFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_TIMEOUT)
    }
}

impl RustlsPeerFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            provider: Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        }
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let verifier = Arc::new(AcceptAnyServerCert {
            algorithms: self.provider.signature_verification_algorithms,
        });
        Ok(ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth())
    }
}

impl PeerCertificateSource for RustlsPeerFetcher {
    fn peer_certificate(&self, host: &str, port: u16) -> Result<Vec<u8>> {
        let server_name = ServerName::try_from(host.to_string())
            .with_context(|| format!("Invalid TLS server name '{}'", host))?;
        let mut conn = ClientConnection::new(Arc::new(self.client_config()?), server_name)?;

        let addr = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", host))?
            .next()
            .ok_or_else(|| anyhow!("No addresses found for {}", host))?;
        let mut sock = TcpStream::connect_timeout(&addr, self.timeout)
            .with_context(|| format!("Failed to connect to {}", addr))?;
        sock.set_read_timeout(Some(self.timeout))?;
        sock.set_write_timeout(Some(self.timeout))?;

        while conn.is_handshaking() {
            conn.complete_io(&mut sock).context("TLS handshake failed")?;
        }

        let leaf = conn
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| cert.to_vec())
            .ok_or_else(|| anyhow!("Server {}:{} presented no certificate", host, port))?;

        conn.send_close_notify();
        let _ = conn.complete_io(&mut sock);
        Ok(leaf)
    }
}
