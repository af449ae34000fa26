// =====================================================================================
// BADGE CATALOG - STATIC DEFINITIONS PER ROLE
// =====================================================================================

mod doctor;
mod patient;

use chrono::{DateTime, Utc};

use shared_models::auth::UserRole;

use crate::models::{
    BadgeCategory, BadgeType, DoctorStatistics, PatientStatistics, UserStatistics, WeeklySchedule,
};

pub use doctor::DOCTOR_BADGES;
pub use patient::PATIENT_BADGES;

/// Inputs a predicate needs beyond the statistics row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalInput {
    Availability,
    PeerPercentile,
}

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    pub availability: Option<WeeklySchedule>,
    pub peer_percentile: Option<f64>,
}

impl EvaluationContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            availability: None,
            peer_percentile: None,
        }
    }

    pub fn provides(&self, input: ExternalInput) -> bool {
        match input {
            ExternalInput::Availability => self.availability.is_some(),
            ExternalInput::PeerPercentile => self.peer_percentile.is_some(),
        }
    }
}

pub type DoctorPredicate = fn(&DoctorStatistics, &EvaluationContext) -> bool;
pub type DoctorProgress = fn(&DoctorStatistics) -> f64;
pub type PatientPredicate = fn(&PatientStatistics, &EvaluationContext) -> bool;
pub type PatientProgress = fn(&PatientStatistics) -> f64;

#[derive(Clone, Copy)]
pub enum BadgeRule {
    Doctor { predicate: DoctorPredicate, progress: DoctorProgress },
    Patient { predicate: PatientPredicate, progress: PatientProgress },
}

#[derive(Clone, Copy)]
pub struct BadgeDefinition {
    pub badge_type: BadgeType,
    pub category: BadgeCategory,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub requires: Option<ExternalInput>,
    pub rule: BadgeRule,
}

impl std::fmt::Debug for BadgeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BadgeDefinition")
            .field("badge_type", &self.badge_type)
            .field("category", &self.category)
            .field("role", &self.role())
            .finish()
    }
}

impl BadgeDefinition {
    pub fn role(&self) -> UserRole {
        match self.rule {
            BadgeRule::Doctor { .. } => UserRole::Doctor,
            BadgeRule::Patient { .. } => UserRole::Patient,
        }
    }

    /// Activation predicate; `None` when the statistics row belongs to another role.
    pub fn is_satisfied(&self, stats: &UserStatistics, ctx: &EvaluationContext) -> Option<bool> {
        match (&self.rule, stats) {
            (BadgeRule::Doctor { predicate, .. }, UserStatistics::Doctor(s)) => Some(predicate(s, ctx)),
            (BadgeRule::Patient { predicate, .. }, UserStatistics::Patient(s)) => Some(predicate(s, ctx)),
            _ => None,
        }
    }

    /// Formula progress in [0, 100], before the earned/unearned adjustment.
    pub fn formula_progress(&self, stats: &UserStatistics) -> Option<f64> {
        let raw = match (&self.rule, stats) {
            (BadgeRule::Doctor { progress, .. }, UserStatistics::Doctor(s)) => progress(s),
            (BadgeRule::Patient { progress, .. }, UserStatistics::Patient(s)) => progress(s),
            _ => return None,
        };
        Some(if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 })
    }
}

pub fn catalog_for(role: UserRole) -> &'static [BadgeDefinition] {
    match role {
        UserRole::Doctor => DOCTOR_BADGES,
        UserRole::Patient => PATIENT_BADGES,
        UserRole::Admin => &[],
    }
}

pub fn definition(badge_type: BadgeType) -> Option<&'static BadgeDefinition> {
    DOCTOR_BADGES
        .iter()
        .chain(PATIENT_BADGES.iter())
        .find(|def| def.badge_type == badge_type)
}

// ==============================================================================
// FORMULA HELPERS
// ==============================================================================

/// `min(value / requirement, 1.0)`, never negative.
pub(crate) fn ratio(value: f64, requirement: f64) -> f64 {
    if requirement <= 0.0 {
        return 1.0;
    }
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    (value / requirement).min(1.0)
}

pub(crate) fn count_ratio(value: u64, requirement: u64) -> f64 {
    ratio(value as f64, requirement as f64)
}

/// Weighted average of sub-scores in [0, 1], expressed as a percentage.
pub(crate) fn weighted(parts: &[(u32, f64)]) -> f64 {
    let total: u32 = parts.iter().map(|(weight, _)| weight).sum();
    if total == 0 {
        return 0.0;
    }
    let score: f64 = parts.iter().map(|(weight, value)| f64::from(*weight) * value).sum();
    score / f64::from(total) * 100.0
}

pub(crate) fn percent(fraction: f64) -> f64 {
    fraction * 100.0
}
