//! Membership oracle port
//!
//! The federation registry is slow and sometimes down. Every call goes through
//! [`check_with_deadline`]; any failure is reported as `ServiceUnavailable` so
//! the command can be retried later.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DomainError;

/// Validity period of a license as known to the federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseValidity {
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn check_license(&self, license: &str) -> Result<LicenseValidity, DomainError>;
}

/// Oracle used when no registry is configured; every lookup is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOracle;

#[async_trait]
impl MembershipOracle for DisabledOracle {
    async fn check_license(&self, _license: &str) -> Result<LicenseValidity, DomainError> {
        Err(DomainError::ServiceUnavailable("membership oracle is not configured".into()))
    }
}

/// Queries `oracle` under `deadline`.
pub async fn check_with_deadline<O: MembershipOracle + ?Sized>(
    oracle: &O,
    license: &str,
    deadline: Duration,
) -> Result<LicenseValidity, DomainError> {
    match tokio::time::timeout(deadline, oracle.check_license(license)).await {
        Ok(Ok(validity)) => Ok(validity),
        Ok(Err(e)) => {
            warn!(license = %license, error = %e, "membership oracle lookup failed");
            Err(match e {
                DomainError::ServiceUnavailable(_) => e,
                other => DomainError::ServiceUnavailable(other.to_string()),
            })
        }
        Err(_) => {
            warn!(license = %license, timeout_ms = deadline.as_millis() as u64, "membership oracle timed out");
            Err(DomainError::ServiceUnavailable("membership oracle timed out".into()))
        }
    }
}
