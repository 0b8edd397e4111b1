//! Device portal OS information client.
//! Handy for checking which device you are actually talking to before
//! deploying anything to it.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::PortalError;
use crate::connection::DeviceConnection;
use crate::token::TokenProvider;
use crate::transport::ScopedClient;

/// Endpoint reporting the device's computer name
pub const MACHINE_NAME_ENDPOINT: &str = "api/os/machinename";
/// Endpoint reporting operating system information
pub const OS_INFO_ENDPOINT: &str = "api/os/info";

/// Operating system information reported by the portal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OperatingSystemInfo {
    pub computer_name: String,
    #[serde(default)]
    pub language: Option<String>,
    pub os_edition: String,
    pub os_edition_id: u32,
    pub os_version: String,
    pub platform: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MachineName {
    computer_name: String,
}

pub struct DeviceInfoClient<'a> {
    conn: &'a DeviceConnection,
    tokens: &'a dyn TokenProvider,
}

impl<'a> DeviceInfoClient<'a> {
    pub fn new(conn: &'a DeviceConnection, tokens: &'a dyn TokenProvider) -> Self {
        Self { conn, tokens }
    }

    /// Queries the device's computer name
    pub async fn machine_name(&self) -> Result<String, PortalError> {
        let body: MachineName = self.fetch_json(MACHINE_NAME_ENDPOINT).await?;
        Ok(body.computer_name)
    }

    /// Queries operating system information
    pub async fn os_info(&self) -> Result<OperatingSystemInfo, PortalError> {
        self.fetch_json(OS_INFO_ENDPOINT).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, PortalError> {
        let url = self.conn.endpoint(endpoint)?;
        let client = ScopedClient::acquire(self.conn)?;
        let response = client.get(url, self.tokens).await?;

        if !response.status().is_success() {
            return Err(PortalError::HttpStatus(response.status()));
        }
        match response.json().await {
            Ok(body) => Ok(body),
            Err(e) => {
                warn!("portal body did not decode: {e:?}");
                Err(PortalError::UnexpectedResponse)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::connection::Credentials;
    use crate::token::NoTokens;

    fn connection(server: &MockServer) -> DeviceConnection {
        DeviceConnection::new(server.uri(), Credentials::new("admin", "hunter2")).unwrap()
    }

    #[tokio::test]
    async fn decodes_the_machine_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/os/machinename"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ComputerName": "HOLOLENS-42"})),
            )
            .mount(&server)
            .await;

        let conn = connection(&server);
        let client = DeviceInfoClient::new(&conn, &NoTokens);
        assert_eq!(client.machine_name().await.unwrap(), "HOLOLENS-42");
    }

    #[tokio::test]
    async fn decodes_os_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/os/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ComputerName": "DESKTOP-ABC",
                "Language": "en-us",
                "OsEdition": "Professional",
                "OsEditionId": 48,
                "OsVersion": "10.0.19041.1",
                "Platform": "Windows Desktop"
            })))
            .mount(&server)
            .await;

        let conn = connection(&server);
        let client = DeviceInfoClient::new(&conn, &NoTokens);
        let info = client.os_info().await.unwrap();
        assert_eq!(info.computer_name, "DESKTOP-ABC");
        assert_eq!(info.language.as_deref(), Some("en-us"));
        assert_eq!(info.os_edition, "Professional");
        assert_eq!(info.os_edition_id, 48);
        assert_eq!(info.platform, "Windows Desktop");
    }

    #[tokio::test]
    async fn failure_status_is_not_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/os/info"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let conn = connection(&server);
        let client = DeviceInfoClient::new(&conn, &NoTokens);
        assert!(matches!(
            client.os_info().await,
            Err(PortalError::HttpStatus(_))
        ));
    }
}
