//! In-process [`CodeRepository`], for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    codes::{CodeStats, RedeemCode, UserPremiumRecord},
    domain::UserId,
    ports::CodeRepository,
    Result,
};

/// Codes are kept in insertion order; duplicates are allowed and the first
/// match wins, as with a document store's natural order.
#[derive(Default)]
pub struct InMemoryCodeRepository {
    codes: Mutex<Vec<RedeemCode>>,
    users: Mutex<HashMap<UserId, UserPremiumRecord>>,
}

impl InMemoryCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all_codes(&self) -> Vec<RedeemCode> {
        self.codes.lock().await.clone()
    }
}

#[async_trait]
impl CodeRepository for InMemoryCodeRepository {
    async fn insert_codes(&self, codes: Vec<RedeemCode>) -> Result<()> {
        self.codes.lock().await.extend(codes);
        Ok(())
    }

    async fn find_code(&self, code: &str) -> Result<Option<RedeemCode>> {
        let codes = self.codes.lock().await;
        Ok(codes.iter().find(|c| c.code == code).cloned())
    }

    async fn claim_code(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RedeemCode>> {
        let mut codes = self.codes.lock().await;
        let Some(rec) = codes
            .iter_mut()
            .find(|c| c.code == code && c.is_claimable_at(now))
        else {
            return Ok(None);
        };
        rec.is_used = true;
        rec.used_by = Some(user_id);
        rec.used_at = Some(now);
        Ok(Some(rec.clone()))
    }

    async fn release_code(&self, code: &str, user_id: UserId) -> Result<()> {
        let mut codes = self.codes.lock().await;
        if let Some(rec) = codes
            .iter_mut()
            .find(|c| c.code == code && c.is_used && c.used_by == Some(user_id))
        {
            rec.is_used = false;
            rec.used_by = None;
            rec.used_at = None;
        }
        Ok(())
    }

    async fn code_stats(&self, now: DateTime<Utc>) -> Result<CodeStats> {
        let codes = self.codes.lock().await;
        let mut stats = CodeStats::default();
        for c in codes.iter() {
            if c.is_active_at(now) {
                stats.active += 1;
            }
            if c.is_used {
                stats.used += 1;
            }
            if c.is_stale_at(now) {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    async fn delete_expired_unused(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|c| c.is_used || !c.is_stale_at(now));
        Ok((before - codes.len()) as u64)
    }

    async fn find_premium(&self, user_id: UserId) -> Result<Option<UserPremiumRecord>> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn upsert_premium(&self, record: UserPremiumRecord) -> Result<()> {
        self.users.lock().await.insert(record.user_id, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn claim_is_single_shot() {
        let repo = InMemoryCodeRepository::new();
        repo.insert_codes(vec![RedeemCode::new("AAAA1111".into(), 7.0, t0())])
            .await
            .unwrap();

        let first = repo.claim_code("AAAA1111", UserId(1), t0()).await.unwrap();
        let second = repo.claim_code("AAAA1111", UserId(2), t0()).await.unwrap();

        let first = first.unwrap();
        assert!(first.is_used);
        assert_eq!(first.used_by, Some(UserId(1)));
        assert_eq!(first.used_at, Some(t0()));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn release_only_undoes_own_claim() {
        let repo = InMemoryCodeRepository::new();
        repo.insert_codes(vec![RedeemCode::new("AAAA1111".into(), 7.0, t0())])
            .await
            .unwrap();
        repo.claim_code("AAAA1111", UserId(1), t0()).await.unwrap();

        repo.release_code("AAAA1111", UserId(2)).await.unwrap();
        assert!(repo.find_code("AAAA1111").await.unwrap().unwrap().is_used);

        repo.release_code("AAAA1111", UserId(1)).await.unwrap();
        let rec = repo.find_code("AAAA1111").await.unwrap().unwrap();
        assert!(!rec.is_used);
        assert_eq!(rec.used_by, None);
    }

    #[tokio::test]
    async fn delete_keeps_used_and_live_codes() {
        let repo = InMemoryCodeRepository::new();
        let old = t0() - Duration::hours(3);
        repo.insert_codes(vec![
            RedeemCode::new("STALE001".into(), 1.0, old),
            RedeemCode::new("STALE002".into(), 1.0, old),
            RedeemCode::new("LIVE0001".into(), 1.0, t0()),
        ])
        .await
        .unwrap();
        repo.claim_code("STALE002", UserId(5), old).await.unwrap();

        let deleted = repo.delete_expired_unused(t0()).await.unwrap();
        assert_eq!(deleted, 1);

        let left: Vec<String> = repo.all_codes().await.into_iter().map(|c| c.code).collect();
        assert_eq!(left, vec!["STALE002".to_string(), "LIVE0001".to_string()]);
    }
}
