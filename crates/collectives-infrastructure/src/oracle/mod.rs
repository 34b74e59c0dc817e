//! HTTP client of the federation membership registry

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use collectives_core::error::DomainError;
use collectives_core::oracle::{LicenseValidity, MembershipOracle};

/// Asks the registry at `GET {base_url}/licenses/{license}` for the validity
/// period of a license. The response body is a [`LicenseValidity`] as JSON.
#[derive(Clone, Debug)]
pub struct HttpMembershipOracle {
    base_url: String,
    api_key: Option<String>,
    http_client: Client,
}

impl HttpMembershipOracle {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http_client: Client::new(),
        }
    }

    fn license_url(&self, license: &str) -> String {
        format!("{}/licenses/{}", self.base_url, license)
    }
}

fn unavailable(reason: impl std::fmt::Display) -> DomainError {
    DomainError::ServiceUnavailable(format!("membership registry: {}", reason))
}

#[async_trait]
impl MembershipOracle for HttpMembershipOracle {
    async fn check_license(&self, license: &str) -> Result<LicenseValidity, DomainError> {
        if license.is_empty() || !license.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::LicenseInvalid);
        }

        let mut request = self.http_client.get(self.license_url(license));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "membership registry request failed");
            unavailable(e)
        })?;

        match response.status() {
            status if status.is_success() => {
                let validity: LicenseValidity = response.json().await.map_err(|e| {
                    warn!(error = %e, "membership registry sent an unreadable body");
                    unavailable(e)
                })?;
                debug!(license = %license, valid_until = %validity.valid_until, "license checked");
                Ok(validity)
            }
            StatusCode::NOT_FOUND => Err(DomainError::LicenseInvalid),
            status => Err(unavailable(format!("unexpected status {}", status))),
        }
    }
}
