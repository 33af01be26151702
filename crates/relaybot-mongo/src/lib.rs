//! MongoDB adapter.
//!
//! Implements the `relaybot-core` [`CodeRepository`] over two collections,
//! `redeem_codes` and `users`, keeping the field names existing deployments use.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Duration, Utc};
use mongodb::{
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use relaybot_core::{
    codes::{CodeStats, RedeemCode, UserPremiumRecord},
    domain::UserId,
    ports::CodeRepository,
    Error, Result,
};

pub const CODES_COLLECTION: &str = "redeem_codes";
pub const USERS_COLLECTION: &str = "users";

/// Maps instants to the BSON dates kept in the collections.
///
/// BSON dates carry no zone. A deployment that wrote naive local wall-clock
/// times has them stored as if they were UTC, so its records read back shifted
/// by that server's offset. Such a database is opened with the offset it was
/// written at; reads subtract it and writes add it, so both kinds of writer
/// agree on every timestamp. The default offset of zero stores true UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredClock {
    offset: Duration,
}

impl Default for StoredClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl StoredClock {
    pub fn utc() -> Self {
        Self {
            offset: Duration::zero(),
        }
    }

    pub fn with_offset_minutes(minutes: i32) -> Self {
        Self {
            offset: Duration::minutes(i64::from(minutes)),
        }
    }

    pub fn to_bson(self, t: DateTime<Utc>) -> bson::DateTime {
        bson::DateTime::from_chrono(t.checked_add_signed(self.offset).unwrap_or(t))
    }

    pub fn from_bson(self, d: bson::DateTime) -> DateTime<Utc> {
        let t = d.to_chrono();
        t.checked_sub_signed(self.offset).unwrap_or(t)
    }
}

/// Stored shape of a redeem code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeDocument {
    pub code: String,
    pub premium_duration_days: f64,
    pub created_at: bson::DateTime,
    pub expires_at: bson::DateTime,
    pub is_used: bool,
    pub used_by: Option<i64>,
    pub used_at: Option<bson::DateTime>,
}

impl CodeDocument {
    pub fn from_record(c: &RedeemCode, clock: StoredClock) -> Self {
        Self {
            code: c.code.clone(),
            premium_duration_days: c.premium_duration_days,
            created_at: clock.to_bson(c.created_at),
            expires_at: clock.to_bson(c.expires_at),
            is_used: c.is_used,
            used_by: c.used_by.map(|u| u.0),
            used_at: c.used_at.map(|t| clock.to_bson(t)),
        }
    }

    pub fn into_record(self, clock: StoredClock) -> RedeemCode {
        RedeemCode {
            code: self.code,
            premium_duration_days: self.premium_duration_days,
            created_at: clock.from_bson(self.created_at),
            expires_at: clock.from_bson(self.expires_at),
            is_used: self.is_used,
            used_by: self.used_by.map(UserId),
            used_at: self.used_at.map(|t| clock.from_bson(t)),
        }
    }
}

/// Stored shape of a premium record. The `users` collection may be shared with
/// other bot modules, so the premium fields are optional on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub user_id: i64,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub premium_until: Option<bson::DateTime>,
}

impl UserDocument {
    pub fn into_record(self, clock: StoredClock) -> UserPremiumRecord {
        UserPremiumRecord {
            user_id: UserId(self.user_id),
            is_premium: self.is_premium,
            premium_until: self.premium_until.map(|t| clock.from_bson(t)),
        }
    }
}

fn store_err(op: &str, e: mongodb::error::Error) -> Error {
    Error::StoreUnavailable(format!("{op}: {e}"))
}

/// Matches a code that can still be redeemed at `now`.
pub fn claim_filter(code: &str, now: bson::DateTime) -> Document {
    doc! {
        "code": code,
        "is_used": false,
        "expires_at": { "$gte": now },
    }
}

pub fn claim_update(user_id: UserId, now: bson::DateTime) -> Document {
    doc! {
        "$set": {
            "is_used": true,
            "used_by": user_id.0,
            "used_at": now,
        }
    }
}

pub fn active_filter(now: bson::DateTime) -> Document {
    doc! { "is_used": false, "expires_at": { "$gt": now } }
}

pub fn expired_filter(now: bson::DateTime) -> Document {
    doc! { "expires_at": { "$lte": now } }
}

/// Unused codes past their window; used codes are never purged.
pub fn purge_filter(now: bson::DateTime) -> Document {
    doc! { "expires_at": { "$lte": now }, "is_used": false }
}

pub fn premium_update(record: &UserPremiumRecord, clock: StoredClock) -> Document {
    let until = record
        .premium_until
        .map(|t| Bson::DateTime(clock.to_bson(t)))
        .unwrap_or(Bson::Null);
    doc! { "$set": { "premium_until": until, "is_premium": record.is_premium } }
}

pub struct MongoCodeRepository {
    codes: Collection<CodeDocument>,
    users: Collection<UserDocument>,
    clock: StoredClock,
}

impl MongoCodeRepository {
    pub async fn connect(uri: &str, database: &str, clock: StoredClock) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| store_err("connect", e))?;
        info!(database, stored_offset = ?clock.offset, "connected to MongoDB");
        Ok(Self::from_database(&client.database(database), clock))
    }

    pub fn from_database(db: &Database, clock: StoredClock) -> Self {
        Self {
            codes: db.collection(CODES_COLLECTION),
            users: db.collection(USERS_COLLECTION),
            clock,
        }
    }

    /// Lookup indexes. `code` stays non-unique: generation does not dedupe.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let code_idx = IndexModel::builder()
            .keys(doc! { "code": 1 })
            .options(IndexOptions::builder().unique(false).build())
            .build();
        self.codes
            .create_index(code_idx, None)
            .await
            .map_err(|e| store_err("create code index", e))?;

        let user_idx = IndexModel::builder().keys(doc! { "user_id": 1 }).build();
        self.users
            .create_index(user_idx, None)
            .await
            .map_err(|e| store_err("create user index", e))?;
        Ok(())
    }
}

#[async_trait]
impl CodeRepository for MongoCodeRepository {
    async fn insert_codes(&self, codes: Vec<RedeemCode>) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }
        let docs: Vec<CodeDocument> = codes
            .iter()
            .map(|c| CodeDocument::from_record(c, self.clock))
            .collect();
        self.codes
            .insert_many(docs, None)
            .await
            .map_err(|e| store_err("insert codes", e))?;
        Ok(())
    }

    async fn find_code(&self, code: &str) -> Result<Option<RedeemCode>> {
        let found = self
            .codes
            .find_one(doc! { "code": code }, None)
            .await
            .map_err(|e| store_err("find code", e))?;
        Ok(found.map(|d| d.into_record(self.clock)))
    }

    async fn claim_code(
        &self,
        code: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RedeemCode>> {
        let now = self.clock.to_bson(now);
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .codes
            .find_one_and_update(claim_filter(code, now), claim_update(user_id, now), opts)
            .await
            .map_err(|e| store_err("claim code", e))?;
        Ok(updated.map(|d| d.into_record(self.clock)))
    }

    async fn release_code(&self, code: &str, user_id: UserId) -> Result<()> {
        self.codes
            .update_one(
                doc! { "code": code, "is_used": true, "used_by": user_id.0 },
                doc! { "$set": { "is_used": false, "used_by": Bson::Null, "used_at": Bson::Null } },
                None,
            )
            .await
            .map_err(|e| store_err("release code", e))?;
        Ok(())
    }

    async fn code_stats(&self, now: DateTime<Utc>) -> Result<CodeStats> {
        let now = self.clock.to_bson(now);
        let active = self
            .codes
            .count_documents(active_filter(now), None)
            .await
            .map_err(|e| store_err("count active codes", e))?;
        let used = self
            .codes
            .count_documents(doc! { "is_used": true }, None)
            .await
            .map_err(|e| store_err("count used codes", e))?;
        let expired = self
            .codes
            .count_documents(expired_filter(now), None)
            .await
            .map_err(|e| store_err("count expired codes", e))?;

        Ok(CodeStats {
            active,
            used,
            expired,
        })
    }

    async fn delete_expired_unused(&self, now: DateTime<Utc>) -> Result<u64> {
        let res = self
            .codes
            .delete_many(purge_filter(self.clock.to_bson(now)), None)
            .await
            .map_err(|e| store_err("delete expired codes", e))?;
        Ok(res.deleted_count)
    }

    async fn find_premium(&self, user_id: UserId) -> Result<Option<UserPremiumRecord>> {
        let found = self
            .users
            .find_one(doc! { "user_id": user_id.0 }, None)
            .await
            .map_err(|e| store_err("find user", e))?;
        Ok(found.map(|d| d.into_record(self.clock)))
    }

    async fn upsert_premium(&self, record: UserPremiumRecord) -> Result<()> {
        let opts = UpdateOptions::builder().upsert(true).build();
        self.users
            .update_one(
                doc! { "user_id": record.user_id.0 },
                premium_update(&record, self.clock),
                opts,
            )
            .await
            .map_err(|e| store_err("upsert premium", e))?;
        Ok(())
    }
}
