mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use uuid::Uuid;

use gamification_cell::error::{GamificationError, GamificationResult};
use gamification_cell::models::{
    BadgeCategory, BadgeRecord, BadgeType, CounterDelta, DerivedAverages, DoctorStatistics,
    PatientStatistics, RatingScores, SkipReason, TriggerOutcome, UserStatistics, WindowedValues,
};
use gamification_cell::services::memory::TurnStatus;
use gamification_cell::services::store::{BadgeStore, StatisticsStore};
use gamification_cell::services::{BadgeEngine, EngineCollaborators, InMemoryPlatform, RecalculationPolicy};
use shared_models::auth::UserRole;
use shared_utils::test_utils::TestUser;

use common::{excellent_doctor, TestHarness};

mock! {
    pub Statistics {}

    #[async_trait]
    impl StatisticsStore for Statistics {
        async fn get_or_create(&self, user_id: Uuid, role: UserRole) -> GamificationResult<UserStatistics>;
        async fn apply_delta(
            &self,
            user_id: Uuid,
            role: UserRole,
            deltas: &[CounterDelta],
        ) -> GamificationResult<UserStatistics>;
        async fn read(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Option<UserStatistics>>;
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
}

fn outage() -> GamificationError {
    GamificationError::Storage("connection reset by peer".to_string())
}

// ==============================================================================
// SCENARIOS
// ==============================================================================

#[tokio::test]
async fn test_first_turn_earns_welcome_badge() {
    let harness = TestHarness::new();
    let patient = TestUser::patient("ana@example.com");
    harness.register(&patient).await;
    harness
        .seed_patient(PatientStatistics {
            total_turns_completed: 1,
            ..PatientStatistics::new(patient.id)
        })
        .await;

    let summary = harness.engine.evaluate_all(patient.id).await.unwrap();

    assert_eq!(summary.activated, vec![BadgeType::FirstVisit]);
    assert_eq!(harness.platform.badge_write_count().await, 1);

    let badge = harness.platform.badge(patient.id, BadgeType::FirstVisit).await.unwrap();
    assert!(badge.is_active);
    assert!(badge.earned_at <= Utc::now());

    let badges = harness.engine.get_badges(patient.id).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[&BadgeCategory::Relationship][0].name, "Welcome Aboard");
}

#[tokio::test]
async fn test_sustained_excellence_depends_on_low_ratings() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("house@example.com");
    harness.register(&doctor).await;
    harness.seed_doctor(excellent_doctor(&doctor, 5)).await;

    let summary = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert!(summary.activated.contains(&BadgeType::SustainedExcellence));

    let other = TestUser::doctor("wilson@example.com");
    harness.register(&other).await;
    harness.seed_doctor(excellent_doctor(&other, 20)).await;

    let summary = harness.engine.evaluate_all(other.id).await.unwrap();
    assert!(!summary.activated.contains(&BadgeType::SustainedExcellence));

    let progress = harness.engine.get_progress(other.id).await.unwrap();
    let excellence = progress
        .iter()
        .find(|p| p.badge_type == BadgeType::SustainedExcellence)
        .unwrap();
    assert_eq!(excellence.percentage, 50.0);
    assert!(!excellence.earned);
    assert_eq!(excellence.status_message, "halfway");
}

#[tokio::test]
async fn test_rating_without_component_scores() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("grey@example.com");
    harness.register(&doctor).await;

    let outcome = harness
        .engine
        .apply_rating_added(doctor.id, RatingScores::default())
        .await;

    assert_matches!(outcome, TriggerOutcome::Processed { checkpoint_recalculated: false, .. });
    let stats = harness.doctor_stats(&doctor).await;
    assert_eq!(stats.total_ratings_received, 1);
    assert_eq!(stats.communication_mentions, 0);
    assert_eq!(stats.empathy_mentions, 0);
    assert_eq!(stats.punctuality_mentions, 0);
}

#[tokio::test]
async fn test_repeat_turns_count_unique_then_returning() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("quinn@example.com");
    let patient = TestUser::patient("sully@example.com");
    harness.register(&doctor).await;
    harness.register(&patient).await;

    harness
        .platform
        .record_turn(doctor.id, patient.id, TurnStatus::Completed, Utc::now() - Duration::days(7))
        .await;
    harness.engine.apply_turn_completed(doctor.id, patient.id).await;
    harness.engine.apply_turn_completed(patient.id, doctor.id).await;

    let stats = harness.doctor_stats(&doctor).await;
    assert_eq!((stats.unique_patients, stats.returning_patients), (1, 0));

    harness
        .platform
        .record_turn(doctor.id, patient.id, TurnStatus::Completed, Utc::now())
        .await;
    harness.engine.apply_turn_completed(doctor.id, patient.id).await;
    harness.engine.apply_turn_completed(patient.id, doctor.id).await;

    let stats = harness.doctor_stats(&doctor).await;
    assert_eq!(stats.total_turns_completed, 2);
    assert_eq!((stats.unique_patients, stats.returning_patients), (1, 1));

    let stats = harness.patient_stats(&patient).await;
    assert_eq!((stats.unique_doctors, stats.returning_doctors), (1, 1));
    assert!(harness.platform.badge(patient.id, BadgeType::FirstVisit).await.unwrap().is_active);
}

// ==============================================================================
// GATING
// ==============================================================================

#[tokio::test]
async fn test_events_for_the_wrong_role_are_ignored() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("cuddy@example.com");
    harness.register(&doctor).await;

    let outcome = harness.engine.apply_file_uploaded(doctor.id).await;

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::RoleMismatch));
    assert!(harness.platform.statistics(doctor.id).await.is_none());
}

#[tokio::test]
async fn test_unknown_and_inactive_users_are_skipped() {
    let harness = TestHarness::new();
    let inactive = TestUser::patient("gone@example.com").inactive();
    harness.register(&inactive).await;

    assert_eq!(
        harness.engine.apply_rating_given(Uuid::new_v4()).await,
        TriggerOutcome::Skipped(SkipReason::UserNotFound)
    );
    assert_eq!(
        harness.engine.apply_rating_given(inactive.id).await,
        TriggerOutcome::Skipped(SkipReason::InactiveUser)
    );

    let summary = harness.engine.evaluate_all(inactive.id).await.unwrap();
    assert_eq!(summary.evaluated, 0);
    assert_eq!(harness.platform.badge_write_count().await, 0);
}

#[tokio::test]
async fn test_admin_sweep_writes_nothing() {
    let harness = TestHarness::new();
    let admin = TestUser::admin("root@example.com");
    harness.register(&admin).await;

    let summary = harness.engine.evaluate_all(admin.id).await.unwrap();

    assert_eq!(summary.role, Some(UserRole::Admin));
    assert!(summary.activated.is_empty());
    assert_eq!(harness.platform.badge_write_count().await, 0);
    assert!(harness.engine.get_progress(admin.id).await.unwrap().is_empty());
    assert_eq!(
        harness.engine.apply_turn_cancelled(admin.id).await,
        TriggerOutcome::Skipped(SkipReason::RoleMismatch)
    );
}

#[tokio::test]
async fn test_patient_sweep_never_touches_doctor_catalog() {
    let harness = TestHarness::new();
    let patient = TestUser::patient("house-fan@example.com");
    harness.register(&patient).await;
    harness
        .seed_patient(PatientStatistics {
            total_turns_completed: 12,
            total_ratings_given: 10,
            ..PatientStatistics::new(patient.id)
        })
        .await;

    harness.engine.evaluate_all(patient.id).await.unwrap();

    let records = harness.platform.list_for_user(patient.id).await.unwrap();
    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| gamification_cell::catalog::definition(r.badge_type).unwrap().role() == UserRole::Patient));
}

// ==============================================================================
// STATE MACHINE
// ==============================================================================

#[tokio::test]
async fn test_badges_do_not_stick_once_predicate_fails() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("chase@example.com");
    harness.register(&doctor).await;
    harness
        .seed_doctor(DoctorStatistics {
            total_ratings_received: 40,
            communication_mentions: 30,
            ..DoctorStatistics::new(doctor.id)
        })
        .await;

    let first = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert!(first.activated.contains(&BadgeType::ClearCommunicator));
    let earned_at = harness
        .platform
        .badge(doctor.id, BadgeType::ClearCommunicator)
        .await
        .unwrap()
        .earned_at;

    harness
        .seed_doctor(DoctorStatistics {
            total_ratings_received: 40,
            communication_mentions: 12,
            ..DoctorStatistics::new(doctor.id)
        })
        .await;

    let second = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert_eq!(second.deactivated, vec![BadgeType::ClearCommunicator]);

    let record = harness.platform.badge(doctor.id, BadgeType::ClearCommunicator).await.unwrap();
    assert!(!record.is_active);
    assert_eq!(record.earned_at, earned_at);
    assert!(harness.engine.get_badges(doctor.id).await.unwrap().is_empty());

    harness
        .seed_doctor(DoctorStatistics {
            total_ratings_received: 60,
            communication_mentions: 31,
            ..DoctorStatistics::new(doctor.id)
        })
        .await;
    let third = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert_eq!(third.activated, vec![BadgeType::ClearCommunicator]);

    let record = harness.platform.badge(doctor.id, BadgeType::ClearCommunicator).await.unwrap();
    assert!(record.is_active);
    assert_eq!(record.earned_at, earned_at);
}

#[tokio::test]
async fn test_repeated_sweeps_keep_records_stable() {
    let harness = TestHarness::new();
    let patient = TestUser::patient("steady@example.com");
    harness.register(&patient).await;
    harness
        .seed_patient(PatientStatistics {
            total_turns_completed: 10,
            ..PatientStatistics::new(patient.id)
        })
        .await;

    harness.engine.evaluate_all(patient.id).await.unwrap();
    let before = harness.platform.list_for_user(patient.id).await.unwrap();

    let again = harness.engine.evaluate_all(patient.id).await.unwrap();
    let after = harness.platform.list_for_user(patient.id).await.unwrap();

    assert!(again.activated.is_empty());
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.badge_type, a.badge_type);
        assert_eq!(b.earned_at, a.earned_at);
    }
}

#[tokio::test]
async fn test_badges_needing_unavailable_inputs_are_left_alone() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("foreman@example.com");
    harness.register(&doctor).await;
    harness
        .seed_doctor(DoctorStatistics {
            total_ratings_received: 30,
            avg_rating: 4.8,
            ..DoctorStatistics::new(doctor.id)
        })
        .await;
    harness
        .platform
        .upsert(&BadgeRecord {
            user_id: doctor.id,
            badge_type: BadgeType::TopRated,
            is_active: true,
            earned_at: Utc::now() - Duration::days(10),
            last_evaluated_at: Utc::now() - Duration::days(10),
        })
        .await
        .unwrap();

    // no percentile has been published for this doctor
    let summary = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert!(!summary.deactivated.contains(&BadgeType::TopRated));
    assert!(harness.platform.badge(doctor.id, BadgeType::TopRated).await.unwrap().is_active);

    harness.platform.set_percentile(doctor.id, 50.0).await;
    let summary = harness.engine.evaluate_all(doctor.id).await.unwrap();
    assert!(summary.deactivated.contains(&BadgeType::TopRated));
}

// ==============================================================================
// READ PATHS
// ==============================================================================

#[tokio::test]
async fn test_progress_is_complete_only_for_active_badges() {
    let harness = TestHarness::new();
    let patient = TestUser::patient("progress@example.com");
    harness.register(&patient).await;
    harness
        .seed_patient(PatientStatistics {
            total_turns_completed: 8,
            total_files_uploaded: 2,
            ..PatientStatistics::new(patient.id)
        })
        .await;
    harness.engine.evaluate_all(patient.id).await.unwrap();

    let progress = harness.engine.get_progress(patient.id).await.unwrap();
    assert_eq!(progress.len(), 8);
    for row in &progress {
        assert!((0.0..=100.0).contains(&row.percentage));
        assert_eq!(row.percentage == 100.0, row.earned, "{:?}", row);
    }

    let regular = progress.iter().find(|p| p.badge_type == BadgeType::RegularPatient).unwrap();
    assert_eq!(regular.status_message, "almost there");
    let organized = progress.iter().find(|p| p.badge_type == BadgeType::OrganizedRecords).unwrap();
    assert_eq!(organized.status_message, "good progress");
}

#[tokio::test]
async fn test_progress_for_user_without_statistics() {
    let harness = TestHarness::new();
    let doctor = TestUser::doctor("new@example.com");
    harness.register(&doctor).await;

    let progress = harness.engine.get_progress(doctor.id).await.unwrap();

    assert_eq!(progress.len(), 13);
    assert!(progress.iter().all(|p| p.percentage == 0.0 && p.status_message == "just starting"));
    assert!(harness.platform.statistics(doctor.id).await.is_none());
}

#[tokio::test]
async fn test_read_paths_report_missing_users() {
    let harness = TestHarness::new();
    let missing = Uuid::new_v4();

    assert_matches!(
        harness.engine.get_progress(missing).await,
        Err(GamificationError::UserNotFound(id)) if id == missing
    );
    assert_matches!(harness.engine.get_badges(missing).await, Err(GamificationError::UserNotFound(_)));
    assert_matches!(harness.engine.evaluate_all(missing).await, Err(GamificationError::UserNotFound(_)));
}

// ==============================================================================
// FAILURE HANDLING
// ==============================================================================

fn engine_with_statistics(platform: &Arc<InMemoryPlatform>, statistics: MockStatistics) -> BadgeEngine {
    let collaborators = EngineCollaborators {
        statistics: Arc::new(statistics),
        ..EngineCollaborators::in_memory(Arc::clone(platform))
    };
    BadgeEngine::new(collaborators, RecalculationPolicy::default())
}

#[tokio::test]
async fn test_storage_outage_does_not_escape_triggers() {
    let platform = Arc::new(InMemoryPlatform::new());
    let patient = TestUser::patient("outage@example.com");
    platform.add_user(patient.to_user()).await;

    let mut statistics = MockStatistics::new();
    statistics
        .expect_apply_delta()
        .times(1)
        .returning(|_, _, _| Err(outage()));
    statistics.expect_read().times(1).returning(|_, _| Err(outage()));

    let engine = engine_with_statistics(&platform, statistics);
    let outcome = engine.apply_file_uploaded(patient.id).await;

    assert_matches!(outcome, TriggerOutcome::Processed { evaluated_slices, .. } if evaluated_slices.is_empty());
    assert_eq!(platform.badge_write_count().await, 0);
}

#[tokio::test]
async fn test_progress_cache_failure_still_evaluates() {
    let platform = Arc::new(InMemoryPlatform::new());
    let patient = TestUser::patient("cache@example.com");
    platform.add_user(patient.to_user()).await;
    let patient_id = patient.id;

    let mut statistics = MockStatistics::new();
    statistics.expect_apply_delta().times(1).returning(move |_, _, _| {
        Ok(UserStatistics::Patient(PatientStatistics {
            total_turns_completed: 1,
            ..PatientStatistics::new(patient_id)
        }))
    });
    statistics.expect_write_progress().returning(|_, _, _, _| Err(outage()));

    let engine = engine_with_statistics(&platform, statistics);
    let outcome = engine.apply_turn_completed(patient.id, Uuid::new_v4()).await;

    assert_matches!(outcome, TriggerOutcome::Processed { .. });
    assert!(platform.badge(patient.id, BadgeType::FirstVisit).await.unwrap().is_active);
}

#[tokio::test]
async fn test_sweep_propagates_storage_failures() {
    let platform = Arc::new(InMemoryPlatform::new());
    let doctor = TestUser::doctor("sweep@example.com");
    platform.add_user(doctor.to_user()).await;

    let mut statistics = MockStatistics::new();
    statistics
        .expect_get_or_create()
        .times(1)
        .returning(|_, _| Err(outage()));

    let engine = engine_with_statistics(&platform, statistics);

    assert_matches!(engine.evaluate_all(doctor.id).await, Err(GamificationError::Storage(_)));
}

// ==============================================================================
// CONCURRENCY
// ==============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_never_lose_counter_updates() {
    const EVENTS: u64 = 200;

    let platform = Arc::new(InMemoryPlatform::new());
    let engine = Arc::new(BadgeEngine::new(
        EngineCollaborators::in_memory(Arc::clone(&platform)),
        RecalculationPolicy::default(),
    ));
    let doctor = TestUser::doctor("busy@example.com");
    let patient = TestUser::patient("uploader@example.com");
    platform.add_user(doctor.to_user()).await;
    platform.add_user(patient.to_user()).await;

    let mut handles = Vec::new();
    for i in 0..EVENTS {
        let engine = Arc::clone(&engine);
        let (doctor_id, patient_id) = (doctor.id, patient.id);
        handles.push(tokio::spawn(async move {
            let rating = engine
                .apply_rating_added(
                    doctor_id,
                    RatingScores {
                        overall: Some(4 + (i % 2) as u8),
                        ..RatingScores::default()
                    },
                )
                .await;
            let upload = engine.apply_file_uploaded(patient_id).await;
            (rating, upload)
        }));
    }

    for handle in handles {
        let (rating, upload) = handle.await.unwrap();
        assert_matches!(rating, TriggerOutcome::Processed { .. });
        assert_matches!(upload, TriggerOutcome::Processed { .. });
    }

    let doctor_stats = match platform.statistics(doctor.id).await {
        Some(UserStatistics::Doctor(stats)) => stats,
        other => panic!("expected doctor statistics, got {:?}", other),
    };
    assert_eq!(doctor_stats.total_ratings_received, EVENTS);
    assert_eq!(doctor_stats.rated_count, EVENTS);
    assert_eq!(doctor_stats.rating_score_sum, EVENTS / 2 * 4 + EVENTS / 2 * 5);

    let patient_stats = match platform.statistics(patient.id).await {
        Some(UserStatistics::Patient(stats)) => stats,
        other => panic!("expected patient statistics, got {:?}", other),
    };
    assert_eq!(patient_stats.total_files_uploaded, EVENTS);
}
