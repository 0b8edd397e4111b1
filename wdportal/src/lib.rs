#![doc = include_str!("../README.md")]

pub mod connection;
pub mod token;
pub mod transport;

pub mod services;
pub use services::*;

use thiserror::Error;

/// Comprehensive error type for all portal communication failures
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PortalError {
    #[error("invalid portal address `{0}`")]
    InvalidAddress(String),
    #[error("endpoint `{0}` does not resolve against the portal address")]
    InvalidEndpoint(String),
    #[error("connection has no credentials")]
    MissingCredentials,
    #[error("https connection has no certificate trust policy")]
    MissingTrustPolicy,
    #[error("TLS configuration failed")]
    Tls(#[from] rustls::Error),
    #[error("transport failed")]
    Transport(#[from] reqwest::Error),
    #[error("portal returned HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("unexpected response from portal")]
    UnexpectedResponse,
}
