use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    codes::{CodeStats, RedeemCode, UserPremiumRecord},
    domain::UserId,
    Result,
};

/// Hexagonal port for code and premium persistence.
///
/// Every method is a single round-trip to the store. Implementations map
/// driver failures to [`crate::Error::StoreUnavailable`].
#[async_trait]
pub trait CodeRepository: Send + Sync {
    async fn insert_codes(&self, codes: Vec<RedeemCode>) -> Result<()>;

    /// First record stored under `code`, used or not.
    async fn find_code(&self, code: &str) -> Result<Option<RedeemCode>>;

    /// Atomically mark a record used, matching `code`, `is_used = false` and
    /// `expires_at >= now` in one conditional write.
    ///
    /// Returns the updated record, or `None` when nothing matched (unknown,
    /// already used, expired, or lost a race).
    async fn claim_code(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RedeemCode>>;

    /// Undo a claim made by `user_id`. Used when the follow-up premium write fails.
    async fn release_code(&self, code: &str, user_id: UserId) -> Result<()>;

    async fn code_stats(&self, now: DateTime<Utc>) -> Result<CodeStats>;

    /// Delete unused codes with `expires_at <= now`; returns the number deleted.
    async fn delete_expired_unused(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn find_premium(&self, user_id: UserId) -> Result<Option<UserPremiumRecord>>;

    /// Insert or overwrite the user's premium record.
    async fn upsert_premium(&self, record: UserPremiumRecord) -> Result<()>;
}
