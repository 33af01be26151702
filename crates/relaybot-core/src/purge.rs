//! Periodic removal of expired, unused redeem codes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::redeem::CodeStore;

/// Background purge loop with an explicit start/stop lifecycle.
///
/// The first purge runs one full period after `start`. Failures are logged and
/// the loop keeps going.
pub struct PurgeTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PurgeTask {
    pub fn start(store: CodeStore, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let tok = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + every, every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = tok.cancelled() => break,
                  _ = tick.tick() => {
                    match store.clean_expired_codes().await {
                      Ok(0) => debug!("no expired codes to purge"),
                      Ok(n) => info!(deleted = n, "purged expired redeem codes"),
                      Err(e) => warn!(error = %e, "auto cleanup of expired codes failed"),
                    }
                  }
                }
            }
        });

        info!(interval_secs = every.as_secs(), "code purge task started");
        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "code purge task ended abnormally");
        }
        info!("code purge task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};

    use crate::{
        codes::{CodeStats, RedeemCode, UserPremiumRecord},
        domain::UserId,
        memory::InMemoryCodeRepository,
        ports::CodeRepository,
        Error, Result,
    };

    #[tokio::test]
    async fn purges_on_each_period_and_stops() {
        let repo = Arc::new(InMemoryCodeRepository::new());
        let old = Utc::now() - ChronoDuration::hours(3);
        repo.insert_codes(vec![
            RedeemCode::new("STALE001".into(), 1.0, old),
            RedeemCode::new("LIVE0001".into(), 1.0, Utc::now()),
        ])
        .await
        .unwrap();

        let task = PurgeTask::start(CodeStore::new(repo.clone()), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(task.is_running());
        task.stop().await;

        let left: Vec<String> = repo.all_codes().await.into_iter().map(|c| c.code).collect();
        assert_eq!(left, vec!["LIVE0001".to_string()]);
    }

    /// Repository whose purge always fails, counting attempts.
    #[derive(Default)]
    struct FailingPurge {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl CodeRepository for FailingPurge {
        async fn insert_codes(&self, _codes: Vec<RedeemCode>) -> Result<()> {
            Ok(())
        }
        async fn find_code(&self, _code: &str) -> Result<Option<RedeemCode>> {
            Ok(None)
        }
        async fn claim_code(
            &self,
            _code: &str,
            _user_id: UserId,
            _now: DateTime<Utc>,
        ) -> Result<Option<RedeemCode>> {
            Ok(None)
        }
        async fn release_code(&self, _code: &str, _user_id: UserId) -> Result<()> {
            Ok(())
        }
        async fn code_stats(&self, _now: DateTime<Utc>) -> Result<CodeStats> {
            Ok(CodeStats::default())
        }
        async fn delete_expired_unused(&self, _now: DateTime<Utc>) -> Result<u64> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::StoreUnavailable("server selection timeout".to_string()))
        }
        async fn find_premium(&self, _user_id: UserId) -> Result<Option<UserPremiumRecord>> {
            Ok(None)
        }
        async fn upsert_premium(&self, _record: UserPremiumRecord) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_do_not_end_the_loop() {
        let repo = Arc::new(FailingPurge::default());
        let task = PurgeTask::start(CodeStore::new(repo.clone()), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(task.is_running());
        assert!(repo.attempts.load(Ordering::SeqCst) >= 2);
        task.stop().await;
    }

    #[tokio::test]
    async fn stop_before_first_period_runs_nothing() {
        let repo = Arc::new(FailingPurge::default());
        let task = PurgeTask::start(CodeStore::new(repo.clone()), Duration::from_secs(3600));
        task.stop().await;
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 0);
    }
}
