// libs/gamification-cell/src/services/engine.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{User, UserRole};

use crate::catalog::definition;
use crate::error::{GamificationError, GamificationResult};
use crate::models::{
    BadgeCategory, BadgeProgress, DomainEvent, EarnedBadge, EvaluationSummary, RatingScores,
    SkipReason, TriggerOutcome, UserStatistics, WindowedValues,
};
use crate::services::evaluator::{active_badge_types, BadgeEvaluator};
use crate::services::ingestor::EventIngestor;
use crate::services::memory::InMemoryPlatform;
use crate::services::platform::SupabaseCollaborators;
use crate::services::progress::{calculate_progress, progress_report};
use crate::services::recalculator::{RecalculationPolicy, Recalculator};
use crate::services::store::{
    BadgeStore, DocumentLedger, DoctorProfileSource, PeerRanking, RatingLedger, StatisticsStore,
    TurnLedger, UserDirectory,
};
use crate::services::supabase_store::SupabaseGamificationStore;

/// Everything the engine reads from or writes to.
#[derive(Clone)]
pub struct EngineCollaborators {
    pub statistics: Arc<dyn StatisticsStore>,
    pub badges: Arc<dyn BadgeStore>,
    pub users: Arc<dyn UserDirectory>,
    pub turns: Arc<dyn TurnLedger>,
    pub ratings: Arc<dyn RatingLedger>,
    pub documents: Arc<dyn DocumentLedger>,
    pub profiles: Arc<dyn DoctorProfileSource>,
    pub peers: Arc<dyn PeerRanking>,
}

impl EngineCollaborators {
    pub fn supabase(config: &AppConfig) -> Self {
        let client = Arc::new(SupabaseClient::new(config));
        let store = Arc::new(SupabaseGamificationStore::new(Arc::clone(&client)));
        let platform = Arc::new(SupabaseCollaborators::new(client));

        Self {
            statistics: store.clone(),
            badges: store,
            users: platform.clone(),
            turns: platform.clone(),
            ratings: platform.clone(),
            documents: platform.clone(),
            profiles: platform.clone(),
            peers: platform,
        }
    }

    pub fn in_memory(platform: Arc<InMemoryPlatform>) -> Self {
        Self {
            statistics: platform.clone(),
            badges: platform.clone(),
            users: platform.clone(),
            turns: platform.clone(),
            ratings: platform.clone(),
            documents: platform.clone(),
            profiles: platform.clone(),
            peers: platform,
        }
    }
}

/// Entry point for the rest of the platform: one trigger per domain event plus
/// the read paths and the operator sweep.
pub struct BadgeEngine {
    users: Arc<dyn UserDirectory>,
    statistics: Arc<dyn StatisticsStore>,
    badges: Arc<dyn BadgeStore>,
    ingestor: EventIngestor,
    recalculator: Recalculator,
    evaluator: BadgeEvaluator,
}

impl BadgeEngine {
    pub fn new(collaborators: EngineCollaborators, policy: RecalculationPolicy) -> Self {
        let EngineCollaborators {
            statistics,
            badges,
            users,
            turns,
            ratings,
            documents,
            profiles,
            peers,
        } = collaborators;

        Self {
            ingestor: EventIngestor::new(statistics.clone(), turns.clone(), policy),
            recalculator: Recalculator::new(
                statistics.clone(),
                ratings,
                documents,
                turns,
                profiles.clone(),
                policy,
            ),
            evaluator: BadgeEvaluator::new(badges.clone(), profiles, peers),
            users,
            statistics,
            badges,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(EngineCollaborators::supabase(config), RecalculationPolicy::from_config(config))
    }

    // ==============================================================================
    // TRIGGERS
    // ==============================================================================

    pub async fn apply_rating_added(&self, doctor_id: Uuid, scores: RatingScores) -> TriggerOutcome {
        self.apply(doctor_id, DomainEvent::RatingAdded(scores)).await
    }

    pub async fn apply_turn_completed(&self, user_id: Uuid, counterparty_id: Uuid) -> TriggerOutcome {
        self.apply(user_id, DomainEvent::TurnCompleted { counterparty_id }).await
    }

    pub async fn apply_turn_cancelled(&self, user_id: Uuid) -> TriggerOutcome {
        self.apply(user_id, DomainEvent::TurnCancelled).await
    }

    pub async fn apply_turn_no_show(&self, patient_id: Uuid) -> TriggerOutcome {
        self.apply(patient_id, DomainEvent::TurnNoShow).await
    }

    pub async fn apply_document_added(&self, doctor_id: Uuid, text: Option<&str>) -> TriggerOutcome {
        self.apply(doctor_id, DomainEvent::DocumentAdded { text: text.map(str::to_string) })
            .await
    }

    pub async fn apply_modify_request_handled(&self, doctor_id: Uuid, response_minutes: Option<u32>) -> TriggerOutcome {
        self.apply(doctor_id, DomainEvent::ModifyRequestHandled { response_minutes })
            .await
    }

    pub async fn apply_file_uploaded(&self, patient_id: Uuid) -> TriggerOutcome {
        self.apply(patient_id, DomainEvent::FileUploaded).await
    }

    pub async fn apply_advance_booking(&self, patient_id: Uuid) -> TriggerOutcome {
        self.apply(patient_id, DomainEvent::AdvanceBookingMade).await
    }

    pub async fn apply_rating_given(&self, patient_id: Uuid) -> TriggerOutcome {
        self.apply(patient_id, DomainEvent::RatingGiven).await
    }

    /// Run one event through ingestion, checkpoint recalculation, the progress
    /// cache and the affected evaluation slices. Never fails: every stage logs
    /// its own errors and later stages run on the best snapshot available.
    pub async fn apply(&self, user_id: Uuid, event: DomainEvent) -> TriggerOutcome {
        let role = match self.resolve_for_event(user_id, &event).await {
            Ok(role) => role,
            Err(reason) => {
                debug!("Skipping {} for {}: {:?}", event.kind(), user_id, reason);
                return TriggerOutcome::Skipped(reason);
            }
        };

        let (mut stats, checkpoint) = match self.ingestor.handle(user_id, role, &event).await {
            Some(outcome) => (outcome.statistics, outcome.rating_checkpoint_crossed),
            None => match self.statistics.read(user_id, role).await {
                Ok(Some(stats)) => (stats, false),
                Ok(None) => {
                    return TriggerOutcome::Processed {
                        checkpoint_recalculated: false,
                        evaluated_slices: Vec::new(),
                    }
                }
                Err(e) => {
                    error!("Statistics unavailable for {}: {}", user_id, e);
                    return TriggerOutcome::Processed {
                        checkpoint_recalculated: false,
                        evaluated_slices: Vec::new(),
                    };
                }
            },
        };

        let mut checkpoint_recalculated = false;
        if checkpoint {
            match self
                .recalculator
                .recalculate_rating_window(user_id, stats.total_ratings_received())
                .await
            {
                Ok(window) => {
                    stats.apply_windowed(&WindowedValues {
                        ratings: Some(window),
                        ..WindowedValues::default()
                    });
                    checkpoint_recalculated = true;
                }
                Err(e) => error!("Rating recalculation failed for {}: {}", user_id, e),
            }
        }
        let stats = stats.normalized();

        self.refresh_progress_cache(&stats).await;

        let slices = event.slices();
        let now = Utc::now();
        match self.evaluator.evaluate_slices(&stats, slices, now).await {
            Ok(evaluation) => {
                if !evaluation.activated.is_empty() || !evaluation.deactivated.is_empty() {
                    let progress = calculate_progress(&stats, &evaluation.active);
                    if let Err(e) = self.statistics.write_progress(user_id, role, &progress, now).await {
                        warn!("Failed to refresh progress cache for {}: {}", user_id, e);
                    }
                }
            }
            Err(e) => error!("Badge evaluation failed for {} after {}: {}", user_id, event.kind(), e),
        }

        TriggerOutcome::Processed {
            checkpoint_recalculated,
            evaluated_slices: slices.to_vec(),
        }
    }

    async fn resolve_for_event(&self, user_id: Uuid, event: &DomainEvent) -> Result<UserRole, SkipReason> {
        let user = match self.users.find_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(SkipReason::UserNotFound),
            Err(e) => {
                warn!("User directory unavailable for {}: {}", user_id, e);
                return Err(SkipReason::DirectoryUnavailable);
            }
        };

        if !user.is_active {
            return Err(SkipReason::InactiveUser);
        }

        match user.user_role() {
            Some(role) if event.expected_roles().contains(&role) => Ok(role),
            _ => Err(SkipReason::RoleMismatch),
        }
    }

    async fn refresh_progress_cache(&self, stats: &UserStatistics) {
        let user_id = stats.user_id();
        let records = match self.badges.list_for_user(user_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Badge records unavailable for {}; progress cache not refreshed: {}", user_id, e);
                return;
            }
        };

        let progress = calculate_progress(stats, &active_badge_types(&records));
        if let Err(e) = self
            .statistics
            .write_progress(user_id, stats.role(), &progress, Utc::now())
            .await
        {
            warn!("Failed to write progress cache for {}: {}", user_id, e);
        }
    }

    // ==============================================================================
    // SWEEP AND READ PATHS
    // ==============================================================================

    /// Full re-evaluation for one user. Errors propagate.
    pub async fn evaluate_all(&self, user_id: Uuid) -> GamificationResult<EvaluationSummary> {
        let user = self.require_user(user_id).await?;
        let role = Self::require_role(&user)?;

        if !user.is_active || role == UserRole::Admin {
            info!("Nothing to evaluate for {} user {}", role, user_id);
            return Ok(EvaluationSummary::empty(user_id, Some(role)));
        }

        let now = Utc::now();
        let mut stats = self.statistics.get_or_create(user_id, role).await?;
        let windowed = self.recalculator.recalculate_for_sweep(&stats, now).await?;
        stats.apply_windowed(&windowed);
        let stats = stats.normalized();

        let evaluation = self.evaluator.evaluate_all(&stats, now).await?;
        let progress = calculate_progress(&stats, &evaluation.active);
        self.statistics.write_progress(user_id, role, &progress, now).await?;

        info!(
            "Evaluated {} badges for {} {}: {} activated, {} deactivated",
            evaluation.evaluated,
            role,
            user_id,
            evaluation.activated.len(),
            evaluation.deactivated.len()
        );

        Ok(EvaluationSummary {
            user_id,
            role: Some(role),
            evaluated: evaluation.evaluated,
            activated: evaluation.activated,
            deactivated: evaluation.deactivated,
        })
    }

    /// Live progress for every badge in the user's catalog.
    pub async fn get_progress(&self, user_id: Uuid) -> GamificationResult<Vec<BadgeProgress>> {
        let user = self.require_user(user_id).await?;
        let role = Self::require_role(&user)?;
        if role == UserRole::Admin {
            return Ok(Vec::new());
        }

        let stats = match self.statistics.read(user_id, role).await? {
            Some(stats) => stats,
            None => match UserStatistics::empty(user_id, role) {
                Some(empty) => empty,
                None => return Ok(Vec::new()),
            },
        };

        let records = self.badges.list_for_user(user_id).await?;
        Ok(progress_report(&stats, &active_badge_types(&records)))
    }

    /// Active badges grouped by category.
    pub async fn get_badges(&self, user_id: Uuid) -> GamificationResult<BTreeMap<BadgeCategory, Vec<EarnedBadge>>> {
        let user = self.require_user(user_id).await?;
        let role = Self::require_role(&user)?;

        let mut grouped: BTreeMap<BadgeCategory, Vec<EarnedBadge>> = BTreeMap::new();
        for record in self.badges.list_for_user(user_id).await? {
            if !record.is_active {
                continue;
            }
            let Some(def) = definition(record.badge_type).filter(|def| def.role() == role) else {
                continue;
            };
            grouped.entry(def.category).or_default().push(EarnedBadge {
                badge_type: def.badge_type,
                name: def.name.to_string(),
                description: def.description.to_string(),
                icon: def.icon.to_string(),
                earned_at: record.earned_at,
            });
        }

        for badges in grouped.values_mut() {
            badges.sort_by_key(|b| b.earned_at);
        }
        Ok(grouped)
    }

    async fn require_user(&self, user_id: Uuid) -> GamificationResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(GamificationError::UserNotFound(user_id))
    }

    fn require_role(user: &User) -> GamificationResult<UserRole> {
        user.user_role().ok_or_else(|| GamificationError::RoleMismatch {
            user_id: user.id,
            role: user.role.clone().unwrap_or_default(),
        })
    }
}
