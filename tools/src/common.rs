// Shared connection handling between tools

use wdportal::connection::{Credentials, DeviceConnection, TrustPolicy};

pub fn get_connection(
    address: Option<&String>,
    username: Option<&String>,
    password: Option<&String>,
    accept_any_cert: bool,
    cert_sha256: Option<&String>,
) -> Result<DeviceConnection, String> {
    let Some(address) = address else {
        return Err("No address passed, pass -h for help".to_string());
    };
    let username = username.cloned().unwrap_or_default();
    let password = password.cloned().unwrap_or_default();

    let connection = match DeviceConnection::new(address, Credentials::new(username, password)) {
        Ok(c) => c,
        Err(e) => {
            return Err(format!("Invalid connection settings: {e}"));
        }
    };

    let connection = if let Some(fingerprint) = cert_sha256 {
        let digest = match parse_fingerprint(fingerprint) {
            Some(d) => d,
            None => {
                return Err("Invalid certificate fingerprint, expected 32 hex bytes".to_string());
            }
        };
        connection.with_trust(TrustPolicy::PinnedSha256(digest))
    } else if accept_any_cert {
        connection.with_trust(TrustPolicy::AcceptAny)
    } else {
        connection
    };

    Ok(connection)
}

fn parse_fingerprint(fingerprint: &str) -> Option<[u8; 32]> {
    let cleaned = fingerprint.replace(':', "");
    let bytes = hex::decode(cleaned).ok()?;
    bytes.try_into().ok()
}
