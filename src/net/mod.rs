//! Network collaborators used by the live validation steps
//!
//! Each concern sits behind a small trait so the standard pipeline can be
//! exercised without a network:
//! - `HostProbe`: TCP reachability with a human-readable reason
//! - `CertificateVerifier`: local certificate vs. the one a server presents
//! - `KeyAuthenticator`: API key accepted by the remote endpoint
//! - `PeerCertificateSource`: raw leaf certificate of a TLS session

pub mod api_key;
pub mod certificate;
pub mod endpoint;
pub mod probe;

use std::path::Path;

use anyhow::Result;

pub use api_key::{ApiKeyError, HttpKeyAuthenticator};
pub use certificate::{
    CertificateError, CertificateIdentity, CertificateMatcher, MatcherVerifier, RustlsPeerFetcher,
};
pub use endpoint::{Endpoint, EndpointError, Scheme};
pub use probe::TcpHostProbe;

/// Reachability check that explains failures
pub trait HostProbe: Send + Sync {
    /// `None` when a connection could be made, otherwise the reason
    fn probe(&self, host: &str, port: u32) -> Option<String>;
}

/// Decides whether a server terminates TLS with a locally held identity
pub trait CertificateVerifier: Send + Sync {
    /// `Err` only when the local certificate cannot be used at all
    fn verify(&self, local_cert: &Path, remote_url: &str) -> Result<bool>;
}

/// Checks an API key against a server's API root
pub trait KeyAuthenticator: Send + Sync {
    fn authenticate(&self, base_url: &str, key: &str) -> std::result::Result<(), ApiKeyError>;
}

/// Supplies the DER leaf certificate a server presents
pub trait PeerCertificateSource: Send + Sync {
    fn peer_certificate(&self, host: &str, port: u16) -> Result<Vec<u8>>;
}
