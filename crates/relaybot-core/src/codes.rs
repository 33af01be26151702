//! Redeem-code and premium-ledger records.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::domain::UserId;

pub const CODE_LENGTH: usize = 8;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How long a freshly generated code stays redeemable, independent of the
/// premium duration it grants.
pub fn redemption_window() -> Duration {
    Duration::hours(2)
}

/// A single-use token granting premium access.
#[derive(Clone, Debug, PartialEq)]
pub struct RedeemCode {
    pub code: String,
    pub premium_duration_days: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_by: Option<UserId>,
    pub used_at: Option<DateTime<Utc>>,
}

impl RedeemCode {
    pub fn new(code: String, premium_duration_days: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            code,
            premium_duration_days,
            created_at,
            expires_at: created_at + redemption_window(),
            is_used: false,
            used_by: None,
            used_at: None,
        }
    }

    /// Past the redemption window. At exactly `expires_at` a code is still redeemable.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Counted as active by the statistics: unused and strictly before `expires_at`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }

    /// Counted as expired by the statistics and eligible for purging (when unused).
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether an atomic claim at `now` may flip this record to used.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at >= now
    }
}

/// Per-user premium state, keyed by `user_id`.
#[derive(Clone, Debug, PartialEq)]
pub struct UserPremiumRecord {
    pub user_id: UserId,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
}

impl UserPremiumRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.premium_until {
            Some(until) => self.is_premium && now < until,
            None => false,
        }
    }
}

/// Code counts. `used` and `expired` overlap: a used code past its window
/// counts in both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeStats {
    pub active: u64,
    pub used: u64,
    pub expired: u64,
}

impl CodeStats {
    /// Sum of the three buckets, double-counting the overlap.
    pub fn total(&self) -> u64 {
        self.active + self.used + self.expired
    }
}

/// Draw an 8-character code uniformly from `A-Z0-9`. Collisions are not checked.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}
