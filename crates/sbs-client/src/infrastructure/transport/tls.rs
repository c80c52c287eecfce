//! TLS settings for encrypted device services.
//!
//! Devices present a self-signed certificate that was exchanged during
//! pairing, so the usual web PKI checks do not apply: the client accepts the
//! server certificate as long as the handshake signatures verify, and may
//! present the host's pairing identity as a client certificate.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;

/// Errors building a TLS configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM data in {origin}: {reason}")]
    Pem { origin: String, reason: String },

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("TLS configuration rejected: {0}")]
    Config(#[from] rustls::Error),
}

/// Client certificate chain and private key presented to the device.
pub struct TlsIdentity {
    certificates: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("TlsIdentity")
            .field("certificates", &self.certificates.len())
            .finish_non_exhaustive()
    }
}

impl TlsIdentity {
    /// Parses a PEM certificate chain and a PEM private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        Self::parse(cert_pem, "certificate", key_pem, "private key")
    }

    /// Loads the identity from two PEM files.
    pub fn from_pem_files(certificate: &Path, private_key: &Path) -> Result<Self, TlsError> {
        let cert_pem = read(certificate)?;
        let key_pem = read(private_key)?;
        Self::parse(
            &cert_pem,
            &certificate.display().to_string(),
            &key_pem,
            &private_key.display().to_string(),
        )
    }

    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    fn parse(cert_pem: &[u8], cert_origin: &str, key_pem: &[u8], key_origin: &str) -> Result<Self, TlsError> {
        let certificates = CertificateDer::pem_slice_iter(cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TlsError::Pem {
                origin: cert_origin.to_string(),
                reason: format!("{e:?}"),
            })?;
        if certificates.is_empty() {
            return Err(TlsError::NoCertificate(cert_origin.to_string()));
        }
        let private_key = PrivateKeyDer::from_pem_slice(key_pem).map_err(|e| TlsError::Pem {
            origin: key_origin.to_string(),
            reason: format!("{e:?}"),
        })?;
        Ok(Self {
            certificates,
            private_key,
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the client configuration used for encrypted services.
///
/// The device certificate is accepted without chain validation; handshake
/// signatures are still checked with the ring provider.
pub fn device_tls_config(identity: Option<&TlsIdentity>) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptDeviceCertificate { provider }));

    let config = match identity {
        Some(identity) => {
            builder.with_client_auth_cert(identity.certificates.clone(), identity.private_key.clone_key())?
        }
        None => builder.with_no_client_auth(),
    };
    Ok(config)
}

/// Server name sent in the handshake for `host`.
///
/// Hosts that are neither a DNS name nor an IP address (some discovery
/// layers hand out link-local names with scope suffixes) fall back to the
/// loopback address; the verifier ignores the name anyway.
pub fn server_name_for(host: &str) -> ServerName<'static> {
    ServerName::try_from(host.to_owned())
        .unwrap_or_else(|_| ServerName::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST).into()))
}

// ── Verifier ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct AcceptDeviceCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptDeviceCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
