//! Code store: generation, redemption, statistics, purging and the premium ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tracing::{error, info};

use crate::{
    codes::{generate_code, redemption_window, CodeStats, RedeemCode, UserPremiumRecord},
    domain::UserId,
    duration::format_duration_days,
    formatting::format_timestamp,
    ports::CodeRepository,
    Error, Result,
};

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// A freshly generated batch of codes.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeBatch {
    pub codes: Vec<String>,
    pub premium_duration_days: f64,
    pub expires_at: DateTime<Utc>,
}

/// Result of a redemption attempt. Rejections are expected outcomes, not errors.
#[derive(Clone, Debug, PartialEq)]
pub enum RedeemOutcome {
    Redeemed {
        premium_duration_days: f64,
        premium_until: DateTime<Utc>,
    },
    AlreadyPremium,
    InvalidCode,
    AlreadyRedeemed,
    CodeExpired,
}

impl RedeemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RedeemOutcome::Redeemed { .. })
    }

    /// User-facing reply text (Telegram HTML).
    pub fn message(&self) -> String {
        match self {
            RedeemOutcome::Redeemed {
                premium_duration_days,
                premium_until,
            } => format!(
                "✅ Code successfully redeemed!\n\
⏱️ <b>Premium Duration:</b> {}\n\
📅 <b>Expires On:</b> {}\n\n\
Enjoy your premium access! Use /checkmypremium to check your subscription details.",
                format_duration_days(*premium_duration_days),
                format_timestamp(&premium_until.with_timezone(&Local)),
            ),
            RedeemOutcome::AlreadyPremium => {
                "❌ You already have premium. You can't redeem another code while premium is active."
                    .to_string()
            }
            RedeemOutcome::InvalidCode => "❌ Invalid redemption code!".to_string(),
            RedeemOutcome::AlreadyRedeemed => "❌ This code has already been redeemed!".to_string(),
            RedeemOutcome::CodeExpired => "❌ This redemption code has expired!".to_string(),
        }
    }

    /// The `(success, message)` pair callers reply with.
    pub fn into_reply(self) -> (bool, String) {
        (self.is_success(), self.message())
    }
}

/// Redeem-code store over an injected repository.
///
/// Performs no authorization and no bound checks on batch size; callers gate both.
#[derive(Clone)]
pub struct CodeStore {
    repo: Arc<dyn CodeRepository>,
}

impl CodeStore {
    pub fn new(repo: Arc<dyn CodeRepository>) -> Self {
        Self { repo }
    }

    pub async fn generate_codes(&self, count: u32, duration_days: f64) -> Result<CodeBatch> {
        self.generate_codes_at(count, duration_days, Utc::now()).await
    }

    pub async fn generate_codes_at(
        &self,
        count: u32,
        duration_days: f64,
        now: DateTime<Utc>,
    ) -> Result<CodeBatch> {
        // A grant that cannot be applied now would make every code unredeemable.
        premium_until_from(now, duration_days)?;

        // ThreadRng is !Send, so draw every code before the first await.
        let records: Vec<RedeemCode> = {
            let mut rng = rand::rng();
            (0..count)
                .map(|_| RedeemCode::new(generate_code(&mut rng), duration_days, now))
                .collect()
        };
        let codes = records.iter().map(|r| r.code.clone()).collect::<Vec<_>>();

        self.repo.insert_codes(records).await?;
        info!(count, duration_days, "generated redeem codes");

        Ok(CodeBatch {
            codes,
            premium_duration_days: duration_days,
            expires_at: now + redemption_window(),
        })
    }

    pub async fn redeem_code(&self, code: &str, user_id: UserId) -> Result<RedeemOutcome> {
        self.redeem_code_at(code, user_id, Utc::now()).await
    }

    pub async fn redeem_code_at(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome> {
        if let Some(rec) = self.repo.find_premium(user_id).await? {
            if rec.is_active_at(now) {
                return Ok(RedeemOutcome::AlreadyPremium);
            }
        }

        let Some(existing) = self.repo.find_code(code).await? else {
            return Ok(RedeemOutcome::InvalidCode);
        };
        if existing.is_used {
            return Ok(RedeemOutcome::AlreadyRedeemed);
        }
        if existing.is_expired_at(now) {
            return Ok(RedeemOutcome::CodeExpired);
        }

        let premium_until = premium_until_from(now, existing.premium_duration_days)?;

        let Some(claimed) = self.repo.claim_code(code, user_id, now).await? else {
            // Lost a race or the record changed between the read and the claim.
            return self.classify_unclaimable(code, now).await;
        };

        let record = UserPremiumRecord {
            user_id,
            is_premium: true,
            premium_until: Some(premium_until),
        };
        if let Err(e) = self.repo.upsert_premium(record).await {
            error!(user_id = user_id.0, error = %e, "premium upsert failed; releasing code");
            self.release_claim(code, user_id).await;
            return Err(e);
        }

        info!(user_id = user_id.0, code, "code redeemed");
        Ok(RedeemOutcome::Redeemed {
            premium_duration_days: claimed.premium_duration_days,
            premium_until,
        })
    }

    async fn classify_unclaimable(&self, code: &str, now: DateTime<Utc>) -> Result<RedeemOutcome> {
        Ok(match self.repo.find_code(code).await? {
            None => RedeemOutcome::InvalidCode,
            Some(rec) if rec.is_used => RedeemOutcome::AlreadyRedeemed,
            Some(rec) if rec.is_expired_at(now) => RedeemOutcome::CodeExpired,
            Some(_) => RedeemOutcome::AlreadyRedeemed,
        })
    }

    async fn release_claim(&self, code: &str, user_id: UserId) {
        if let Err(e) = self.repo.release_code(code, user_id).await {
            error!(user_id = user_id.0, code, error = %e, "failed to release claimed code");
        }
    }

    pub async fn get_codes_stats(&self) -> Result<CodeStats> {
        self.repo.code_stats(Utc::now()).await
    }

    pub async fn get_codes_stats_at(&self, now: DateTime<Utc>) -> Result<CodeStats> {
        self.repo.code_stats(now).await
    }

    pub async fn clean_expired_codes(&self) -> Result<u64> {
        self.clean_expired_codes_at(Utc::now()).await
    }

    pub async fn clean_expired_codes_at(&self, now: DateTime<Utc>) -> Result<u64> {
        self.repo.delete_expired_unused(now).await
    }

    pub async fn is_user_premium(&self, user_id: UserId) -> Result<bool> {
        self.is_user_premium_at(user_id, Utc::now()).await
    }

    pub async fn is_user_premium_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.premium_until_at(user_id, now).await?.is_some())
    }

    /// End of the user's premium window, if it is still running at `now`.
    pub async fn premium_until_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .repo
            .find_premium(user_id)
            .await?
            .filter(|rec| rec.is_active_at(now))
            .and_then(|rec| rec.premium_until))
    }
}

/// Redemption time plus the granted duration. Never stacks on an earlier window.
fn premium_until_from(now: DateTime<Utc>, duration_days: f64) -> Result<DateTime<Utc>> {
    let grant = Duration::microseconds((duration_days * MICROS_PER_DAY) as i64);
    now.checked_add_signed(grant).ok_or_else(|| {
        Error::InvalidInput(format!("premium duration of {duration_days} days is out of range"))
    })
}
