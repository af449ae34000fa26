#![allow(dead_code)]

use std::sync::Arc;

use gamification_cell::models::{DoctorStatistics, PatientStatistics, UserStatistics};
use gamification_cell::services::{BadgeEngine, EngineCollaborators, InMemoryPlatform, RecalculationPolicy};
use shared_utils::test_utils::TestUser;

pub struct TestHarness {
    pub platform: Arc<InMemoryPlatform>,
    pub engine: BadgeEngine,
}

impl TestHarness {
    pub fn new() -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let engine = BadgeEngine::new(
            EngineCollaborators::in_memory(Arc::clone(&platform)),
            RecalculationPolicy::default(),
        );
        Self { platform, engine }
    }

    pub async fn register(&self, user: &TestUser) {
        self.platform.add_user(user.to_user()).await;
    }

    pub async fn seed_doctor(&self, stats: DoctorStatistics) {
        self.platform.seed_statistics(UserStatistics::Doctor(stats)).await;
    }

    pub async fn seed_patient(&self, stats: PatientStatistics) {
        self.platform.seed_statistics(UserStatistics::Patient(stats)).await;
    }

    pub async fn doctor_stats(&self, user: &TestUser) -> DoctorStatistics {
        match self.platform.statistics(user.id).await {
            Some(UserStatistics::Doctor(stats)) => stats,
            other => panic!("expected doctor statistics, got {:?}", other),
        }
    }

    pub async fn patient_stats(&self, user: &TestUser) -> PatientStatistics {
        match self.platform.statistics(user.id).await {
            Some(UserStatistics::Patient(stats)) => stats,
            other => panic!("expected patient statistics, got {:?}", other),
        }
    }
}

/// Doctor whose rating profile clears every sustained excellence threshold
/// except, possibly, the low rating ratio.
pub fn excellent_doctor(user: &TestUser, low_rating_count: u64) -> DoctorStatistics {
    DoctorStatistics {
        total_ratings_received: 120,
        rated_count: 120,
        rating_score_sum: 540,
        communication_mentions: 30,
        empathy_mentions: 25,
        punctuality_mentions: 20,
        avg_rating: 4.5,
        low_rating_count,
        ..DoctorStatistics::new(user.id)
    }
}
