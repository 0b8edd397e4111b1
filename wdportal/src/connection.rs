//! Connection context for a Windows Device Portal
//!
//! A [`DeviceConnection`] carries everything needed to reach one portal:
//! the base address, the credential set, and the certificate trust policy
//! for https. Service clients borrow it read-only; nothing here owns a
//! socket or a client, transports are provisioned per call.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};

use crate::PortalError;

/// Caller-supplied predicate over the certificate chain presented by the
/// device. Receives the end-entity certificate and the rest of the chain
/// in DER form, returns whether the presented identity is acceptable.
pub type CertPredicate =
    dyn Fn(&CertificateDer<'_>, &[CertificateDer<'_>]) -> bool + Send + Sync;

/// How to decide whether the certificate a device presents is trusted
///
/// Portals ship with self-signed certificates, so the usual root-store
/// verification is useless here. The policy replaces it entirely and an
/// https connection refuses to provision without one.
#[derive(Clone)]
pub enum TrustPolicy {
    /// Accept whatever certificate the device presents
    AcceptAny,
    /// Accept only a certificate whose DER SHA-256 digest matches
    PinnedSha256([u8; 32]),
    /// Delegate the decision to a caller-supplied predicate
    Custom(Arc<CertPredicate>),
}

impl TrustPolicy {
    /// Builds a pinned policy from the certificate itself
    pub fn pin_certificate(cert: &CertificateDer<'_>) -> Self {
        Self::PinnedSha256(Sha256::digest(cert.as_ref()).into())
    }

    pub(crate) fn decide(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> bool {
        match self {
            TrustPolicy::AcceptAny => true,
            TrustPolicy::PinnedSha256(pin) => {
                let digest: [u8; 32] = Sha256::digest(end_entity.as_ref()).into();
                &digest == pin
            }
            TrustPolicy::Custom(predicate) => predicate(end_entity, intermediates),
        }
    }
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::AcceptAny => write!(f, "AcceptAny"),
            TrustPolicy::PinnedSha256(pin) => {
                write!(f, "PinnedSha256({})", STANDARD.encode(pin))
            }
            TrustPolicy::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Explicit credential set for the portal's Basic authentication scheme
///
/// The portal never sees ambient machine credentials; whatever is placed
/// here is the whole identity a request carries.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Precomputed value for the `Authorization` header
    pub(crate) fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.username.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// Caller-owned description of one portal connection
#[derive(Debug, Clone)]
pub struct DeviceConnection {
    base: Url,
    credentials: Credentials,
    trust: Option<TrustPolicy>,
}

impl DeviceConnection {
    /// Parses the portal's base address and binds the credential set to it
    ///
    /// # Errors
    /// [`PortalError::InvalidAddress`] when the address does not parse or
    /// uses a scheme other than `http`/`https`,
    /// [`PortalError::MissingCredentials`] when the username is empty.
    pub fn new(
        address: impl AsRef<str>,
        credentials: Credentials,
    ) -> Result<Self, PortalError> {
        let address = address.as_ref();
        let base = Url::parse(address)
            .map_err(|_| PortalError::InvalidAddress(address.to_string()))?;
        match base.scheme() {
            "http" | "https" => {}
            _ => return Err(PortalError::InvalidAddress(address.to_string())),
        }
        if credentials.is_empty() {
            return Err(PortalError::MissingCredentials);
        }
        Ok(Self {
            base,
            credentials,
            trust: None,
        })
    }

    /// Sets the certificate trust policy used when the address is https
    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = Some(trust);
        self
    }

    pub fn address(&self) -> &Url {
        &self.base
    }

    /// Resolves a fixed endpoint path against the base address
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, PortalError> {
        self.base
            .join(path)
            .map_err(|_| PortalError::InvalidEndpoint(path.to_string()))
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn trust(&self) -> Option<&TrustPolicy> {
        self.trust.as_ref()
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.base.scheme() == "https"
    }
}
