//! Scoped transport provisioning for portal exchanges
//!
//! The portal is not a service you stay connected to. Every operation
//! provisions a [`ScopedClient`], performs its exchange and drops the
//! client, releasing the underlying resources. Credentials ride on every
//! request explicitly; proxies and other ambient machine state are never
//! consulted.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, Response, Url};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct};
use tracing::{debug, warn};

use crate::PortalError;
use crate::connection::{DeviceConnection, TrustPolicy};
use crate::token::TokenProvider;

/// Wall-clock budget for one request/response cycle
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A request-capable client scoped to one portal exchange
///
/// Dropping the value releases the connection; nothing is pooled or
/// reused across calls.
#[derive(Debug)]
pub struct ScopedClient {
    client: reqwest::Client,
}

impl ScopedClient {
    /// Provisions a client for a single authenticated exchange
    ///
    /// The connection's credentials are stamped as a default header so
    /// every request carries them. For https addresses the connection
    /// must already hold a [`TrustPolicy`].
    ///
    /// # Errors
    /// [`PortalError::MissingTrustPolicy`] when the address is https and
    /// no policy was supplied. No request is attempted in that case.
    pub fn acquire(conn: &DeviceConnection) -> Result<Self, PortalError> {
        let mut auth = HeaderValue::try_from(conn.credentials().basic_header())
            .map_err(|_| PortalError::MissingCredentials)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .no_proxy();

        let builder = if conn.is_tls() {
            let trust = conn.trust().ok_or(PortalError::MissingTrustPolicy)?;
            debug!("provisioning https client with trust policy {trust:?}");
            builder.use_preconfigured_tls(tls_config(trust.clone())?)
        } else {
            debug!("provisioning plain http client");
            builder
        };

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Sends one GET to `url`, stamping anti-forgery material on the way
    /// out and absorbing rotated material from the response
    pub async fn get(
        &self,
        url: Url,
        tokens: &dyn TokenProvider,
    ) -> Result<Response, PortalError> {
        let mut headers = HeaderMap::new();
        tokens.apply(&Method::GET, &mut headers);
        debug!("GET {url}");
        let response = self.client.get(url).headers(headers).send().await?;
        tokens.absorb(response.headers());
        Ok(response)
    }
}

/// Builds a rustls config whose certificate decision is the trust policy
fn tls_config(trust: TrustPolicy) -> Result<ClientConfig, PortalError> {
    let provider = crypto_provider();
    let mut config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PolicyVerifier { trust, provider }))
        .with_no_client_auth();
    // no session reuse; a scoped client carries no state into the next one
    config.resumption = rustls::client::Resumption::disabled();
    Ok(config)
}

fn crypto_provider() -> Arc<CryptoProvider> {
    match CryptoProvider::get_default() {
        Some(provider) => provider.clone(),
        None => {
            #[cfg(feature = "aws-lc")]
            let provider = rustls::crypto::aws_lc_rs::default_provider();
            #[cfg(all(feature = "ring", not(feature = "aws-lc")))]
            let provider = rustls::crypto::ring::default_provider();
            Arc::new(provider)
        }
    }
}

/// Delegates the server certificate decision to the connection's policy
///
/// Portals serve self-signed certificates, so the usual root-store check
/// is replaced wholesale. Handshake signatures are still verified; only
/// the question of who signed the certificate is handed to the policy.
#[derive(Debug)]
struct PolicyVerifier {
    trust: TrustPolicy,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PolicyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.trust.decide(end_entity, intermediates) {
            Ok(ServerCertVerified::assertion())
        } else {
            warn!("trust policy rejected the certificate presented by the device");
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
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
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Credentials;

    fn verify(policy: TrustPolicy, cert: &CertificateDer<'_>) -> Result<(), rustls::Error> {
        let verifier = PolicyVerifier {
            trust: policy,
            provider: crypto_provider(),
        };
        verifier
            .verify_server_cert(
                cert,
                &[],
                &ServerName::try_from("device.local").unwrap(),
                &[],
                UnixTime::now(),
            )
            .map(|_| ())
    }

    #[test]
    fn https_without_policy_is_refused_before_any_request() {
        let conn = DeviceConnection::new(
            "https://192.168.1.42",
            Credentials::new("admin", "hunter2"),
        )
        .unwrap();
        assert!(matches!(
            ScopedClient::acquire(&conn),
            Err(PortalError::MissingTrustPolicy)
        ));
    }

    #[test]
    fn http_provisions_without_a_policy() {
        let conn = DeviceConnection::new(
            "http://192.168.1.42",
            Credentials::new("admin", "hunter2"),
        )
        .unwrap();
        assert!(ScopedClient::acquire(&conn).is_ok());
    }

    #[test]
    fn https_provisions_once_a_policy_is_set() {
        let conn = DeviceConnection::new(
            "https://192.168.1.42",
            Credentials::new("admin", "hunter2"),
        )
        .unwrap()
        .with_trust(TrustPolicy::AcceptAny);
        assert!(ScopedClient::acquire(&conn).is_ok());
    }

    #[test]
    fn verifier_follows_the_policy() {
        let cert = CertificateDer::from(vec![1, 2, 3]);
        let other = CertificateDer::from(vec![4, 5, 6]);

        assert!(verify(TrustPolicy::AcceptAny, &cert).is_ok());
        assert!(verify(TrustPolicy::pin_certificate(&cert), &cert).is_ok());

        let rejected = verify(TrustPolicy::pin_certificate(&other), &cert);
        assert!(matches!(
            rejected,
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure
            ))
        ));
    }
}
