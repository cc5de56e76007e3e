use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{self, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use crate::error::{self, Error};

/// Parameters to use for secure clients
#[derive(Clone)]
pub struct TlsParameters {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    domain: Box<str>,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl TlsParameters {
    /// Creates parameters that verify the certificate chain and the host name
    pub fn new(domain: String) -> Result<Self, Error> {
        Self::build(domain, false)
    }

    /// Creates parameters accepting any certificate presented for any name
    ///
    /// Signatures made during the handshake are still checked. Only meant for
    /// diagnosing a relay, never for sending real mail.
    pub fn new_dangerous_no_verify(domain: String) -> Result<Self, Error> {
        Self::build(domain, true)
    }

    fn build(domain: String, skip_verification: bool) -> Result<Self, Error> {
        let crypto_provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&crypto_provider))
            .with_protocol_versions(rustls::ALL_VERSIONS)
            .map_err(error::tls)?;

        let config = if skip_verification {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification {
                    crypto_provider,
                }))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(root_cert_store())
                .with_no_client_auth()
        };

        let server_name = ServerName::try_from(domain.as_str())
            .map_err(error::tls)?
            .to_owned();

        Ok(Self {
            config: Arc::new(config),
            server_name,
            domain: domain.into_boxed_str(),
        })
    }

    /// The name presented to the server and checked against its certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(super) fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    pub(super) fn server_name(&self) -> ServerName<'static> {
        self.server_name.clone()
    }
}

fn root_cert_store() -> RootCertStore {
    let mut root_cert_store = RootCertStore::empty();
    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    #[cfg(feature = "native-certs")]
    {
        let rustls_native_certs::CertificateResult { certs, errors, .. } =
            rustls_native_certs::load_native_certs();
        let errors_len = errors.len();

        let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "loaded platform certs with {errors_len} failing to load, {added} valid and {ignored} ignored (invalid) certs"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (errors_len, added, ignored);
    }

    root_cert_store
}

#[derive(Debug)]
struct NoCertificateVerification {
    crypto_provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &pki_types::CertificateDer<'_>,
        _intermediates: &[pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.crypto_provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parameters_for_domain() {
        let parameters = TlsParameters::new("smtp.example.com".to_owned()).unwrap();
        assert_eq!(parameters.domain(), "smtp.example.com");
        assert!(format!("{parameters:?}").contains("smtp.example.com"));

        let insecure = TlsParameters::new_dangerous_no_verify("127.0.0.1".to_owned()).unwrap();
        assert_eq!(insecure.domain(), "127.0.0.1");
    }

    #[test]
    fn test_invalid_server_name() {
        let err = TlsParameters::new("not a host name".to_owned()).unwrap_err();
        assert!(err.is_tls());
    }
}
