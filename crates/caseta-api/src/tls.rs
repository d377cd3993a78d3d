// TLS configuration for the two bridge channels
//
// The authenticated channel (8081) trusts only the bridge CA handed out at
// pairing time and presents the signed client identity. Bridges are reached
// by IP and their certificates carry no matching SAN, so name mismatches are
// accepted once the chain itself verifies. The pairing channel (8083) has
// no trust anchor yet and accepts any bridge certificate.

use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};

use crate::error::Error;

/// Authenticated LEAP port.
pub const LEAP_PORT: u16 = 8081;

/// Pairing (certificate signing) port.
pub const PAIRING_PORT: u16 = 8083;

/// A client certificate chain and its private key.
#[derive(Debug)]
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, Error> {
        let chain = parse_certificates(cert_pem)?;
        let key = PrivateKeyDer::from_pem_slice(key_pem)
            .map_err(|e| Error::Certificate(format!("private key: {e:?}")))?;
        Ok(Self { chain, key })
    }
}

/// Parse every certificate in a PEM blob. An empty result is an error.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, Error> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Certificate(format!("certificate: {e:?}")))?;
    if certs.is_empty() {
        return Err(Error::Certificate("no certificate found in PEM data".into()));
    }
    Ok(certs)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Client config for the mutual-TLS LEAP channel.
pub fn authenticated_config(
    ca_pem: &[u8],
    identity: ClientIdentity,
) -> Result<Arc<ClientConfig>, Error> {
    let provider = provider();

    let mut roots = RootCertStore::empty();
    for cert in parse_certificates(ca_pem)? {
        roots
            .add(cert)
            .map_err(|e| Error::Certificate(format!("bridge CA: {e}")))?;
    }
    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(|e| Error::Tls(e.to_string()))?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(BridgeCaVerifier { inner }))
        .with_client_auth_cert(identity.chain, identity.key)
        .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(Arc::new(config))
}

/// Client config for the pairing channel.
///
/// Some bridge firmware insists on a client certificate even here; pass one
/// through `identity` when that is the case.
pub fn pairing_config(identity: Option<ClientIdentity>) -> Result<Arc<ClientConfig>, Error> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(UnverifiedBridge { provider }));

    let config = match identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.chain, identity.key)
            .map_err(|e| Error::Tls(e.to_string()))?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

// ── Verifiers ───────────────────────────────────────────────────────

/// Chain validation against the bridge CA, ignoring the server name.
#[derive(Debug)]
struct BridgeCaVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for BridgeCaVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Accepts any bridge certificate; handshake signatures are still checked.
#[derive(Debug)]
struct UnverifiedBridge {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for UnverifiedBridge {
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
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn self_signed() -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["smartbridge".to_owned()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        (cert.pem(), key.serialize_pem())
    }

    #[test]
    fn authenticated_config_accepts_bridge_material() {
        let (ca_pem, _) = self_signed();
        let (cert_pem, key_pem) = self_signed();
        let identity = ClientIdentity::from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap();
        let config = authenticated_config(ca_pem.as_bytes(), identity).unwrap();
        assert!(config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn pairing_config_works_without_identity() {
        let config = pairing_config(None).unwrap();
        assert!(!config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let err = parse_certificates(b"not a certificate").unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));

        let (cert_pem, _) = self_signed();
        let err = ClientIdentity::from_pem(cert_pem.as_bytes(), b"nope").unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }
}
