use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::auth::{User, UserRole};

use crate::error::GamificationResult;
use crate::models::{
    BadgeRecord, BadgeType, CounterDelta, DerivedAverages, DocumentRecord, RatingRecord,
    TurnWindowCounts, UserStatistics, WeeklySchedule, WindowedValues,
};

/// Durable per-user counters.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Existing row, or a freshly persisted zero-valued one.
    async fn get_or_create(&self, user_id: Uuid, role: UserRole) -> GamificationResult<UserStatistics>;

    /// Atomically add the deltas in one storage operation and return the updated
    /// row. Creates the row when it does not exist yet.
    async fn apply_delta(
        &self,
        user_id: Uuid,
        role: UserRole,
        deltas: &[CounterDelta],
    ) -> GamificationResult<UserStatistics>;

    async fn read(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Option<UserStatistics>>;

    /// Overwrite (never add to) the windowed groups present in `values`.
    async fn replace_windowed(
        &self,
        user_id: Uuid,
        role: UserRole,
        values: &WindowedValues,
    ) -> GamificationResult<()>;

    async fn write_derived(&self, user_id: Uuid, derived: &DerivedAverages) -> GamificationResult<()>;

    async fn write_progress(
        &self,
        user_id: Uuid,
        role: UserRole,
        progress: &BTreeMap<BadgeType, f64>,
        evaluated_at: DateTime<Utc>,
    ) -> GamificationResult<()>;
}

/// Badge records keyed by (user_id, badge_type).
#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn list_for_user(&self, user_id: Uuid) -> GamificationResult<Vec<BadgeRecord>>;

    /// Insert or replace the record for (user_id, badge_type).
    async fn upsert(&self, record: &BadgeRecord) -> GamificationResult<BadgeRecord>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> GamificationResult<Option<User>>;
}

#[async_trait]
pub trait TurnLedger: Send + Sync {
    /// Completed turns between the user and one counterparty, including the one
    /// that triggered the current event.
    async fn completed_turns_between(
        &self,
        user_id: Uuid,
        role: UserRole,
        counterparty_id: Uuid,
    ) -> GamificationResult<u64>;

    async fn distinct_counterparts(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Vec<Uuid>>;

    async fn turns_since(
        &self,
        user_id: Uuid,
        role: UserRole,
        since: DateTime<Utc>,
    ) -> GamificationResult<TurnWindowCounts>;
}

#[async_trait]
pub trait RatingLedger: Send + Sync {
    /// Newest first.
    async fn recent_ratings(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<RatingRecord>>;
}

#[async_trait]
pub trait DocumentLedger: Send + Sync {
    /// Newest first.
    async fn recent_documents(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<DocumentRecord>>;
}

#[async_trait]
pub trait DoctorProfileSource: Send + Sync {
    async fn weekly_schedule(&self, doctor_id: Uuid) -> GamificationResult<Option<WeeklySchedule>>;
}

#[async_trait]
pub trait PeerRanking: Send + Sync {
    /// Percentile (0-100) of the doctor's average rating among peers.
    async fn rating_percentile(&self, doctor_id: Uuid) -> GamificationResult<Option<f64>>;
}
