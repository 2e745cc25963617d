//! Mutual TLS for the plugin listener.
//!
//! Terraform hands the plugin its own client certificate through
//! `PLUGIN_CLIENT_CERT` and expects the plugin to answer with a fresh
//! self-signed server certificate in the handshake line. Only the exact
//! client certificate Terraform sent is accepted.

use std::sync::Arc;

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, Error, ServerConfig,
    SignatureScheme,
};

use super::ServerError;

/// Server certificate and key generated for one plugin run.
pub(crate) struct PluginIdentity {
    pub(crate) certificate: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
}

/// Generates the self-signed certificate announced in the handshake.
pub(crate) fn generate_identity() -> Result<PluginIdentity, ServerError> {
    let key_pair = KeyPair::generate()
        .map_err(|err| ServerError::Tls(format!("failed to generate key: {err}")))?;

    let mut params = CertificateParams::new(vec![String::from("localhost")])
        .map_err(|err| ServerError::Tls(format!("invalid certificate name: {err}")))?;
    params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|err| ServerError::Tls(format!("failed to sign certificate: {err}")))?;

    Ok(PluginIdentity {
        certificate: cert.der().clone(),
        key: PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
    })
}

/// Accepts only the certificates Terraform pinned through the environment.
#[derive(Debug)]
struct PinnedClientCert {
    expected: Vec<CertificateDer<'static>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ClientCertVerifier for PinnedClientCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, Error> {
        if self
            .expected
            .iter()
            .any(|cert| cert.as_ref() == end_entity.as_ref())
        {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

fn pinned_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ServerError::Tls(format!("invalid PLUGIN_CLIENT_CERT: {err}")))?;
    if certs.is_empty() {
        return Err(ServerError::Tls(String::from(
            "PLUGIN_CLIENT_CERT contains no certificate",
        )));
    }
    Ok(certs)
}

/// Builds the rustls server configuration for the plugin listener.
///
/// The aws-lc-rs provider is used because Terraform signs with ECDSA P-521.
pub(crate) fn server_config(
    identity: &PluginIdentity,
    client_cert_pem: &str,
) -> Result<ServerConfig, ServerError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let verifier = PinnedClientCert {
        expected: pinned_certificates(client_cert_pem)?,
        algorithms: provider.signature_verification_algorithms,
    };

    let mut config = ServerConfig::builder_with_provider(Arc::<CryptoProvider>::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|err| ServerError::Tls(err.to_string()))?
        .with_client_cert_verifier(Arc::new(verifier))
        .with_single_cert(
            vec![identity.certificate.clone()],
            PrivateKeyDer::from(identity.key.clone_key()),
        )
        .map_err(|err| ServerError::Tls(err.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}
