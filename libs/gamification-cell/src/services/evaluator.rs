// libs/gamification-cell/src/services/evaluator.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::OptionFuture;
use tracing::{debug, info, warn};

use crate::catalog::{catalog_for, BadgeDefinition, EvaluationContext, ExternalInput};
use crate::error::GamificationResult;
use crate::models::{BadgeCategory, BadgeRecord, BadgeType, UserStatistics};
use crate::services::store::{BadgeStore, DoctorProfileSource, PeerRanking};

/// What one evaluation does to a (user, badge) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTransition {
    /// Never earned before; insert an active record stamped now.
    Create,
    /// Inactive record becomes active again. `earned_at` is kept.
    Reactivate,
    Deactivate,
    /// Still active; only `last_evaluated_at` moves.
    Refresh,
    /// Nothing to write.
    Unchanged,
}

pub fn plan_transition(existing: Option<&BadgeRecord>, satisfied: bool) -> BadgeTransition {
    match (existing, satisfied) {
        (None, true) => BadgeTransition::Create,
        (None, false) => BadgeTransition::Unchanged,
        (Some(record), true) if record.is_active => BadgeTransition::Refresh,
        (Some(_), true) => BadgeTransition::Reactivate,
        (Some(record), false) if record.is_active => BadgeTransition::Deactivate,
        (Some(_), false) => BadgeTransition::Unchanged,
    }
}

/// Record to persist for a transition, if any.
pub fn next_record(
    definition: &BadgeDefinition,
    user_stats: &UserStatistics,
    existing: Option<&BadgeRecord>,
    transition: BadgeTransition,
    now: DateTime<Utc>,
) -> Option<BadgeRecord> {
    match (transition, existing) {
        (BadgeTransition::Create, _) => Some(BadgeRecord {
            user_id: user_stats.user_id(),
            badge_type: definition.badge_type,
            is_active: true,
            earned_at: now,
            last_evaluated_at: now,
        }),
        (BadgeTransition::Reactivate, Some(record)) | (BadgeTransition::Refresh, Some(record)) => {
            Some(BadgeRecord {
                is_active: true,
                last_evaluated_at: now,
                ..record.clone()
            })
        }
        (BadgeTransition::Deactivate, Some(record)) => Some(BadgeRecord {
            is_active: false,
            last_evaluated_at: now,
            ..record.clone()
        }),
        _ => None,
    }
}

pub fn active_badge_types(records: &[BadgeRecord]) -> BTreeSet<BadgeType> {
    records
        .iter()
        .filter(|r| r.is_active)
        .map(|r| r.badge_type)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceEvaluation {
    pub evaluated: usize,
    pub activated: Vec<BadgeType>,
    pub deactivated: Vec<BadgeType>,
    /// Badges left untouched because an external input was unavailable.
    pub skipped: Vec<BadgeType>,
    /// Active set after this pass.
    pub active: BTreeSet<BadgeType>,
}

pub struct BadgeEvaluator {
    badges: Arc<dyn BadgeStore>,
    profiles: Arc<dyn DoctorProfileSource>,
    peers: Arc<dyn PeerRanking>,
}

impl BadgeEvaluator {
    pub fn new(
        badges: Arc<dyn BadgeStore>,
        profiles: Arc<dyn DoctorProfileSource>,
        peers: Arc<dyn PeerRanking>,
    ) -> Self {
        Self { badges, profiles, peers }
    }

    pub async fn evaluate_all(&self, stats: &UserStatistics, now: DateTime<Utc>) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &BadgeCategory::ALL, now).await
    }

    pub async fn evaluate_rating(&self, stats: &UserStatistics, now: DateTime<Utc>) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &[BadgeCategory::Rating], now).await
    }

    pub async fn evaluate_documentation(
        &self,
        stats: &UserStatistics,
        now: DateTime<Utc>,
    ) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &[BadgeCategory::Documentation], now).await
    }

    pub async fn evaluate_consistency(
        &self,
        stats: &UserStatistics,
        now: DateTime<Utc>,
    ) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &[BadgeCategory::Consistency], now).await
    }

    pub async fn evaluate_relationship(
        &self,
        stats: &UserStatistics,
        now: DateTime<Utc>,
    ) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &[BadgeCategory::Relationship], now).await
    }

    pub async fn evaluate_response_time(
        &self,
        stats: &UserStatistics,
        now: DateTime<Utc>,
    ) -> GamificationResult<SliceEvaluation> {
        self.evaluate_slices(stats, &[BadgeCategory::ResponseTime], now).await
    }

    /// Evaluate every catalog badge of the user's role whose category is in
    /// `slices` and persist the resulting transitions.
    pub async fn evaluate_slices(
        &self,
        stats: &UserStatistics,
        slices: &[BadgeCategory],
        now: DateTime<Utc>,
    ) -> GamificationResult<SliceEvaluation> {
        let user_id = stats.user_id();
        let definitions: Vec<&BadgeDefinition> = catalog_for(stats.role())
            .iter()
            .filter(|def| slices.contains(&def.category))
            .collect();

        let existing = self.badges.list_for_user(user_id).await?;
        let mut active = active_badge_types(&existing);
        let mut result = SliceEvaluation::default();

        if definitions.is_empty() {
            result.active = active;
            return Ok(result);
        }

        let by_type: BTreeMap<BadgeType, &BadgeRecord> = existing.iter().map(|r| (r.badge_type, r)).collect();
        let ctx = self.context_for(stats, &definitions, now).await;

        for def in definitions {
            if let Some(input) = def.requires {
                if !ctx.provides(input) {
                    debug!("Skipping {} for {}: {:?} unavailable", def.badge_type, user_id, input);
                    result.skipped.push(def.badge_type);
                    continue;
                }
            }

            let Some(satisfied) = def.is_satisfied(stats, &ctx) else {
                continue;
            };
            result.evaluated += 1;

            let current = by_type.get(&def.badge_type).copied();
            let transition = plan_transition(current, satisfied);
            let Some(record) = next_record(def, stats, current, transition, now) else {
                continue;
            };

            self.badges.upsert(&record).await?;

            match transition {
                BadgeTransition::Create | BadgeTransition::Reactivate => {
                    info!("Badge {} activated for user {}", def.badge_type, user_id);
                    active.insert(def.badge_type);
                    result.activated.push(def.badge_type);
                }
                BadgeTransition::Deactivate => {
                    info!("Badge {} deactivated for user {}", def.badge_type, user_id);
                    active.remove(&def.badge_type);
                    result.deactivated.push(def.badge_type);
                }
                BadgeTransition::Refresh | BadgeTransition::Unchanged => {}
            }
        }

        result.active = active;
        Ok(result)
    }

    /// Fetch only the external inputs the selected definitions need. A failed
    /// fetch leaves the input empty so those badges are skipped.
    async fn context_for(
        &self,
        stats: &UserStatistics,
        definitions: &[&BadgeDefinition],
        now: DateTime<Utc>,
    ) -> EvaluationContext {
        let user_id = stats.user_id();
        let needs = |input: ExternalInput| definitions.iter().any(|def| def.requires == Some(input));

        let schedule: OptionFuture<_> = needs(ExternalInput::Availability)
            .then(|| self.profiles.weekly_schedule(user_id))
            .into();
        let percentile: OptionFuture<_> = needs(ExternalInput::PeerPercentile)
            .then(|| self.peers.rating_percentile(user_id))
            .into();

        let (schedule, percentile) = futures::join!(schedule, percentile);

        let mut ctx = EvaluationContext::new(now);
        match schedule {
            Some(Ok(schedule)) => ctx.availability = Some(schedule.unwrap_or_default()),
            Some(Err(e)) => warn!("Availability schedule unavailable for {}: {}", user_id, e),
            None => {}
        }
        match percentile {
            Some(Ok(percentile)) => ctx.peer_percentile = percentile,
            Some(Err(e)) => warn!("Peer ranking unavailable for {}: {}", user_id, e),
            None => {}
        }
        ctx
    }
}
