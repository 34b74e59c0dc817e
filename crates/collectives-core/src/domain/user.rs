// ============================================================================
// Collectives Core - User Entity
// File: crates/collectives-core/src/domain/user.rs
// Description: Club member account and license validity
// ============================================================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Origin of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Fixture account, license never expires
    Test,
    /// Synchronized with the federation membership registry
    Extranet,
    /// Created locally by an administrator, license never expires
    Local,
    /// Self-created account pending verification
    UnverifiedLocal,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Test => "test",
            UserType::Extranet => "extranet",
            UserType::Local => "local",
            UserType::UnverifiedLocal => "unverified_local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "test" => Some(UserType::Test),
            "extranet" => Some(UserType::Extranet),
            "local" => Some(UserType::Local),
            "unverified_local" => Some(UserType::UnverifiedLocal),
            _ => None,
        }
    }
}

impl Default for UserType {
    fn default() -> Self {
        UserType::Extranet
    }
}

/// Club member
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: Uuid,

    #[validate(email(message = "Invalid mail address"))]
    pub mail: String,

    #[validate(length(min = 1, max = 100, message = "License number must be between 1 and 100 characters"))]
    pub license: String,

    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,

    pub enabled: bool,
    pub license_expiry_date: Option<NaiveDate>,
    pub user_type: UserType,
    pub auth0_id: Option<String>,
}

impl User {
    pub fn new(
        mail: String,
        license: String,
        first_name: String,
        last_name: String,
        user_type: UserType,
        license_expiry_date: Option<NaiveDate>,
    ) -> Result<Self, validator::ValidationErrors> {
        let user = Self {
            id: collectives_shared::new_id(),
            mail: mail.trim().to_lowercase(),
            license: license.trim().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            date_of_birth: None,
            phone: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            enabled: true,
            license_expiry_date,
            user_type,
            auth0_id: None,
        };

        user.validate()?;
        Ok(user)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Federation-backed licenses are 12 digits.
    pub fn has_federation_license_format(&self) -> bool {
        self.license.len() == 12 && self.license.chars().all(|c| c.is_ascii_digit())
    }

    /// License validity at `time`. Test and Local accounts never expire; the
    /// expiry date itself is no longer covered.
    pub fn license_valid_at(&self, time: NaiveDateTime) -> bool {
        if matches!(self.user_type, UserType::Local | UserType::Test) {
            return true;
        }
        match self.license_expiry_date {
            Some(expiry) => expiry > time.date(),
            None => false,
        }
    }

    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.enabled && self.license_valid_at(now)
    }

    /// Whether the membership oracle can be asked to refresh this license.
    pub fn is_oracle_backed(&self) -> bool {
        self.user_type == UserType::Extranet
    }
}
