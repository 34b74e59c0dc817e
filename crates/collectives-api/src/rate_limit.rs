//! Per-member throttle of registration commands

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub struct RegistrationLimiter {
    inner: DefaultKeyedRateLimiter<Uuid>,
}

impl RegistrationLimiter {
    /// `per_minute` of zero is treated as one.
    pub fn per_minute(per_minute: u32) -> Self {
        let burst = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: RateLimiter::keyed(Quota::per_minute(burst)),
        }
    }

    /// Forgets members whose quota has fully replenished and returns how
    /// many are still tracked. Called periodically, the key map would grow
    /// with every member ever seen otherwise.
    pub fn retain_recent(&self) -> usize {
        self.inner.retain_recent();
        self.inner.shrink_to_fit();
        self.inner.len()
    }

    pub fn check(&self, user_id: &Uuid) -> Result<(), ApiError> {
        self.inner.check_key(user_id).map_err(|_| {
            warn!(user_id = %user_id, "registration rate limit exceeded");
            ApiError::RateLimited
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_per_member() {
        let limiter = RegistrationLimiter::per_minute(2);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(limiter.check(&a).is_ok());
        assert!(limiter.check(&a).is_ok());
        assert!(matches!(limiter.check(&a), Err(ApiError::RateLimited)));
        assert!(limiter.check(&b).is_ok());
    }

    #[test]
    fn test_idle_members_are_forgotten() {
        // One cell every 60ms
        let limiter = RegistrationLimiter::per_minute(1000);
        let (idle, busy) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(limiter.check(&idle).is_ok());
        std::thread::sleep(std::time::Duration::from_millis(150));
        assert!(limiter.check(&busy).is_ok());

        assert_eq!(limiter.retain_recent(), 1);
        assert!(limiter.check(&idle).is_ok());
    }
}
