// libs/gamification-cell/src/services/memory.rs
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{User, UserRole};

use crate::error::{GamificationError, GamificationResult};
use crate::models::{
    BadgeRecord, BadgeType, CounterDelta, DerivedAverages, DocumentRecord, RatingRecord,
    TurnWindowCounts, UserStatistics, WeeklySchedule, WindowedValues,
};
use crate::services::store::{
    BadgeStore, DocumentLedger, DoctorProfileSource, PeerRanking, RatingLedger, StatisticsStore,
    TurnLedger, UserDirectory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
struct TurnEntry {
    doctor_id: Uuid,
    patient_id: Uuid,
    status: TurnStatus,
    at: DateTime<Utc>,
}

impl TurnEntry {
    /// (own side, other side) for the given role.
    fn sides(&self, role: UserRole) -> (Uuid, Uuid) {
        match role {
            UserRole::Doctor => (self.doctor_id, self.patient_id),
            _ => (self.patient_id, self.doctor_id),
        }
    }
}

#[derive(Default)]
struct PlatformState {
    users: HashMap<Uuid, User>,
    statistics: HashMap<Uuid, UserStatistics>,
    badges: BTreeMap<(Uuid, BadgeType), BadgeRecord>,
    turns: Vec<TurnEntry>,
    ratings: HashMap<Uuid, Vec<RatingRecord>>,
    documents: HashMap<Uuid, Vec<DocumentRecord>>,
    schedules: HashMap<Uuid, WeeklySchedule>,
    percentiles: HashMap<Uuid, f64>,
    badge_writes: usize,
}

impl PlatformState {
    fn row_mut(&mut self, user_id: Uuid, role: UserRole) -> GamificationResult<&mut UserStatistics> {
        if !self.statistics.contains_key(&user_id) {
            let empty = UserStatistics::empty(user_id, role).ok_or_else(|| GamificationError::RoleMismatch {
                user_id,
                role: role.to_string(),
            })?;
            self.statistics.insert(user_id, empty);
        }
        let row = self
            .statistics
            .get_mut(&user_id)
            .ok_or(GamificationError::UserNotFound(user_id))?;
        if row.role() != role {
            return Err(GamificationError::RoleMismatch {
                user_id,
                role: role.to_string(),
            });
        }
        Ok(row)
    }
}

/// Every store and collaborator behind one lock. Used for local runs and tests.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: RwLock<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn record_turn(&self, doctor_id: Uuid, patient_id: Uuid, status: TurnStatus, at: DateTime<Utc>) {
        self.state.write().await.turns.push(TurnEntry {
            doctor_id,
            patient_id,
            status,
            at,
        });
    }

    pub async fn record_rating(&self, doctor_id: Uuid, rating: RatingRecord) {
        self.state.write().await.ratings.entry(doctor_id).or_default().push(rating);
    }

    pub async fn record_document(&self, doctor_id: Uuid, document: DocumentRecord) {
        self.state.write().await.documents.entry(doctor_id).or_default().push(document);
    }

    pub async fn set_schedule(&self, doctor_id: Uuid, schedule: WeeklySchedule) {
        self.state.write().await.schedules.insert(doctor_id, schedule);
    }

    pub async fn set_percentile(&self, doctor_id: Uuid, percentile: f64) {
        self.state.write().await.percentiles.insert(doctor_id, percentile);
    }

    pub async fn seed_statistics(&self, stats: UserStatistics) {
        self.state.write().await.statistics.insert(stats.user_id(), stats);
    }

    pub async fn badge(&self, user_id: Uuid, badge_type: BadgeType) -> Option<BadgeRecord> {
        self.state.read().await.badges.get(&(user_id, badge_type)).cloned()
    }

    pub async fn statistics(&self, user_id: Uuid) -> Option<UserStatistics> {
        self.state.read().await.statistics.get(&user_id).cloned()
    }

    /// Number of badge upserts performed since creation.
    pub async fn badge_write_count(&self) -> usize {
        self.state.read().await.badge_writes
    }
}

#[async_trait]
impl StatisticsStore for InMemoryPlatform {
    async fn get_or_create(&self, user_id: Uuid, role: UserRole) -> GamificationResult<UserStatistics> {
        let mut state = self.state.write().await;
        let row = state.row_mut(user_id, role)?;
        row.touch(Utc::now());
        Ok(row.clone())
    }

    async fn apply_delta(
        &self,
        user_id: Uuid,
        role: UserRole,
        deltas: &[CounterDelta],
    ) -> GamificationResult<UserStatistics> {
        if let Some(foreign) = deltas.iter().find(|d| !d.counter.applies_to(role)) {
            return Err(GamificationError::InvalidData {
                counter: foreign.counter.column().to_string(),
                role: role.to_string(),
            });
        }

        // The write guard spans the whole delta, which makes it atomic.
        let mut state = self.state.write().await;
        let row = state.row_mut(user_id, role)?;
        for delta in deltas {
            row.increment(delta.counter, delta.amount);
        }
        row.touch(Utc::now());
        debug!("Applied {} deltas to {} {}", deltas.len(), role, user_id);
        Ok(row.clone())
    }

    async fn read(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Option<UserStatistics>> {
        let state = self.state.read().await;
        Ok(state
            .statistics
            .get(&user_id)
            .filter(|row| row.role() == role)
            .cloned())
    }

    async fn replace_windowed(
        &self,
        user_id: Uuid,
        role: UserRole,
        values: &WindowedValues,
    ) -> GamificationResult<()> {
        let mut state = self.state.write().await;
        let row = state.row_mut(user_id, role)?;
        row.apply_windowed(values);
        row.touch(Utc::now());
        Ok(())
    }

    async fn write_derived(&self, user_id: Uuid, derived: &DerivedAverages) -> GamificationResult<()> {
        let mut state = self.state.write().await;
        let row = state.row_mut(user_id, UserRole::Doctor)?;
        row.apply_derived(derived);
        Ok(())
    }

    async fn write_progress(
        &self,
        user_id: Uuid,
        role: UserRole,
        progress: &BTreeMap<BadgeType, f64>,
        evaluated_at: DateTime<Utc>,
    ) -> GamificationResult<()> {
        let mut state = self.state.write().await;
        let row = state.row_mut(user_id, role)?;
        row.set_progress(progress.clone(), evaluated_at);
        Ok(())
    }
}

#[async_trait]
impl BadgeStore for InMemoryPlatform {
    async fn list_for_user(&self, user_id: Uuid) -> GamificationResult<Vec<BadgeRecord>> {
        let state = self.state.read().await;
        Ok(state
            .badges
            .range((user_id, BadgeType::ClearCommunicator)..=(user_id, BadgeType::HelpfulReviewer))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn upsert(&self, record: &BadgeRecord) -> GamificationResult<BadgeRecord> {
        let mut state = self.state.write().await;
        state.badges.insert((record.user_id, record.badge_type), record.clone());
        state.badge_writes += 1;
        Ok(record.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryPlatform {
    async fn find_user(&self, user_id: Uuid) -> GamificationResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl TurnLedger for InMemoryPlatform {
    async fn completed_turns_between(
        &self,
        user_id: Uuid,
        role: UserRole,
        counterparty_id: Uuid,
    ) -> GamificationResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .turns
            .iter()
            .filter(|t| t.status == TurnStatus::Completed && t.sides(role) == (user_id, counterparty_id))
            .count() as u64)
    }

    async fn distinct_counterparts(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut counterparts = Vec::new();
        for turn in state.turns.iter().filter(|t| t.status == TurnStatus::Completed) {
            let (own, other) = turn.sides(role);
            if own == user_id && seen.insert(other) {
                counterparts.push(other);
            }
        }
        Ok(counterparts)
    }

    async fn turns_since(
        &self,
        user_id: Uuid,
        role: UserRole,
        since: DateTime<Utc>,
    ) -> GamificationResult<TurnWindowCounts> {
        let state = self.state.read().await;
        let mut counts = TurnWindowCounts::default();
        for turn in state.turns.iter().filter(|t| t.sides(role).0 == user_id && t.at >= since) {
            match turn.status {
                TurnStatus::Completed => counts.completed += 1,
                TurnStatus::Cancelled => counts.cancelled += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RatingLedger for InMemoryPlatform {
    async fn recent_ratings(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<RatingRecord>> {
        let state = self.state.read().await;
        let ratings = state.ratings.get(&doctor_id).map(Vec::as_slice).unwrap_or_default();
        Ok(ratings.iter().rev().take(limit as usize).cloned().collect())
    }
}

#[async_trait]
impl DocumentLedger for InMemoryPlatform {
    async fn recent_documents(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<DocumentRecord>> {
        let state = self.state.read().await;
        let documents = state.documents.get(&doctor_id).map(Vec::as_slice).unwrap_or_default();
        Ok(documents.iter().rev().take(limit as usize).cloned().collect())
    }
}

#[async_trait]
impl DoctorProfileSource for InMemoryPlatform {
    async fn weekly_schedule(&self, doctor_id: Uuid) -> GamificationResult<Option<WeeklySchedule>> {
        Ok(self.state.read().await.schedules.get(&doctor_id).cloned())
    }
}

#[async_trait]
impl PeerRanking for InMemoryPlatform {
    async fn rating_percentile(&self, doctor_id: Uuid) -> GamificationResult<Option<f64>> {
        Ok(self.state.read().await.percentiles.get(&doctor_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatCounter;
    use chrono::Duration;

    #[test]
    fn test_apply_delta_creates_row_lazily() {
        let platform = InMemoryPlatform::new();
        let user_id = Uuid::new_v4();

        let stats = tokio_test::block_on(platform.apply_delta(
            user_id,
            UserRole::Patient,
            &[CounterDelta::one(StatCounter::TotalFilesUploaded)],
        ))
        .unwrap();

        match stats {
            UserStatistics::Patient(s) => assert_eq!(s.total_files_uploaded, 1),
            other => panic!("unexpected row: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_delta_rejects_foreign_counter() {
        let platform = InMemoryPlatform::new();
        let result = platform
            .apply_delta(Uuid::new_v4(), UserRole::Patient, &[CounterDelta::one(StatCounter::RatedCount)])
            .await;

        assert!(matches!(result, Err(GamificationError::InvalidData { .. })));
    }

    #[tokio::test]
    async fn test_admin_rows_are_never_created() {
        let platform = InMemoryPlatform::new();
        let result = platform.get_or_create(Uuid::new_v4(), UserRole::Admin).await;
        assert!(matches!(result, Err(GamificationError::RoleMismatch { .. })));
    }

    #[tokio::test]
    async fn test_turn_ledger_is_side_aware() {
        let platform = InMemoryPlatform::new();
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();
        let now = Utc::now();

        platform.record_turn(doctor, patient, TurnStatus::Completed, now).await;
        platform.record_turn(doctor, patient, TurnStatus::Completed, now - Duration::days(200)).await;
        platform.record_turn(doctor, Uuid::new_v4(), TurnStatus::Cancelled, now).await;

        assert_eq!(platform.completed_turns_between(doctor, UserRole::Doctor, patient).await.unwrap(), 2);
        assert_eq!(platform.completed_turns_between(patient, UserRole::Patient, doctor).await.unwrap(), 2);
        assert_eq!(platform.distinct_counterparts(doctor, UserRole::Doctor).await.unwrap(), vec![patient]);

        let window = platform
            .turns_since(doctor, UserRole::Doctor, now - Duration::days(90))
            .await
            .unwrap();
        assert_eq!(window, TurnWindowCounts { completed: 1, cancelled: 1 });
    }

    #[tokio::test]
    async fn test_recent_ratings_newest_first() {
        let platform = InMemoryPlatform::new();
        let doctor = Uuid::new_v4();
        for score in 1..=5u8 {
            platform
                .record_rating(doctor, RatingRecord { score, subcategory: None, created_at: None })
                .await;
        }

        let recent = platform.recent_ratings(doctor, 2).await.unwrap();
        let scores: Vec<u8> = recent.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![5, 4]);
    }
}
