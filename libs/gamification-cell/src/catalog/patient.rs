use crate::models::{BadgeCategory, BadgeType, PatientStatistics};

use super::{count_ratio, percent, BadgeDefinition, BadgeRule, EvaluationContext};

pub(crate) const FIRST_VISIT_TURNS: u64 = 1;
pub(crate) const REGULAR_MIN_TURNS: u64 = 10;
pub(crate) const TRUSTED_BOND_MIN_RETURNING: u64 = 3;

pub(crate) const PUNCTUAL_MIN_COMPLETED: u64 = 5;
pub(crate) const PUNCTUAL_MAX_NO_SHOW_RATE: f64 = 0.05;
pub(crate) const PUNCTUAL_DISQUALIFYING_NO_SHOW_RATE: f64 = 0.20;

pub(crate) const PLANS_AHEAD_MIN_BOOKINGS: u64 = 5;

pub(crate) const COMMITTED_MIN_TURNS_90D: u64 = 3;
pub(crate) const COMMITTED_MAX_CANCEL_RATE: f64 = 0.10;
pub(crate) const COMMITTED_CAPPED_PROGRESS: f64 = 50.0;

pub(crate) const ORGANIZED_MIN_FILES: u64 = 5;
pub(crate) const REVIEWER_MIN_RATINGS: u64 = 10;

pub static PATIENT_BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        badge_type: BadgeType::FirstVisit,
        category: BadgeCategory::Relationship,
        name: "Welcome Aboard",
        description: "Completed your first consultation",
        icon: "sparkles",
        requires: None,
        rule: BadgeRule::Patient { predicate: first_visit_met, progress: first_visit_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::RegularPatient,
        category: BadgeCategory::Relationship,
        name: "Regular Patient",
        description: "Ten consultations and counting",
        icon: "repeat",
        requires: None,
        rule: BadgeRule::Patient { predicate: regular_patient_met, progress: regular_patient_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::TrustedBond,
        category: BadgeCategory::Relationship,
        name: "Trusted Bond",
        description: "You keep returning to doctors you trust",
        icon: "handshake",
        requires: None,
        rule: BadgeRule::Patient { predicate: trusted_bond_met, progress: trusted_bond_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::PunctualPatient,
        category: BadgeCategory::Consistency,
        name: "Punctual Patient",
        description: "You show up to the appointments you book",
        icon: "check-circle",
        requires: None,
        rule: BadgeRule::Patient { predicate: punctual_patient_met, progress: punctual_patient_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::PlansAhead,
        category: BadgeCategory::Consistency,
        name: "Plans Ahead",
        description: "You book your consultations well in advance",
        icon: "calendar-plus",
        requires: None,
        rule: BadgeRule::Patient { predicate: plans_ahead_met, progress: plans_ahead_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::CommittedPatient,
        category: BadgeCategory::Consistency,
        name: "Committed Patient",
        description: "Recent consultations kept with barely any cancellations",
        icon: "shield-check",
        requires: None,
        rule: BadgeRule::Patient { predicate: committed_patient_met, progress: committed_patient_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::OrganizedRecords,
        category: BadgeCategory::Documentation,
        name: "Organized Records",
        description: "Your medical files are uploaded and ready for your doctors",
        icon: "folder",
        requires: None,
        rule: BadgeRule::Patient { predicate: organized_records_met, progress: organized_records_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::HelpfulReviewer,
        category: BadgeCategory::Rating,
        name: "Helpful Reviewer",
        description: "Your ratings help other patients choose",
        icon: "thumbs-up",
        requires: None,
        rule: BadgeRule::Patient { predicate: helpful_reviewer_met, progress: helpful_reviewer_progress },
    },
];

pub(crate) fn first_visit_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_turns_completed >= FIRST_VISIT_TURNS
}

pub(crate) fn first_visit_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.total_turns_completed, FIRST_VISIT_TURNS))
}

pub(crate) fn regular_patient_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_turns_completed >= REGULAR_MIN_TURNS
}

pub(crate) fn regular_patient_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.total_turns_completed, REGULAR_MIN_TURNS))
}

pub(crate) fn trusted_bond_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.returning_doctors >= TRUSTED_BOND_MIN_RETURNING
}

pub(crate) fn trusted_bond_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.returning_doctors, TRUSTED_BOND_MIN_RETURNING))
}

pub(crate) fn punctual_patient_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_turns_completed >= PUNCTUAL_MIN_COMPLETED
        && stats.no_show_rate() <= PUNCTUAL_MAX_NO_SHOW_RATE
}

/// A no-show rate above the disqualifying ceiling zeroes progress.
pub(crate) fn punctual_patient_progress(stats: &PatientStatistics) -> f64 {
    if stats.no_show_rate() > PUNCTUAL_DISQUALIFYING_NO_SHOW_RATE {
        return 0.0;
    }
    percent(count_ratio(stats.total_turns_completed, PUNCTUAL_MIN_COMPLETED))
}

pub(crate) fn plans_ahead_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_advance_bookings >= PLANS_AHEAD_MIN_BOOKINGS
}

pub(crate) fn plans_ahead_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.total_advance_bookings, PLANS_AHEAD_MIN_BOOKINGS))
}

pub(crate) fn committed_patient_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.turns_last_90_days >= COMMITTED_MIN_TURNS_90D
        && stats.cancellation_rate_90d() <= COMMITTED_MAX_CANCEL_RATE
}

pub(crate) fn committed_patient_progress(stats: &PatientStatistics) -> f64 {
    let score = percent(count_ratio(stats.turns_last_90_days, COMMITTED_MIN_TURNS_90D));
    if stats.cancellation_rate_90d() > COMMITTED_MAX_CANCEL_RATE {
        score.min(COMMITTED_CAPPED_PROGRESS)
    } else {
        score
    }
}

pub(crate) fn organized_records_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_files_uploaded >= ORGANIZED_MIN_FILES
}

pub(crate) fn organized_records_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.total_files_uploaded, ORGANIZED_MIN_FILES))
}

pub(crate) fn helpful_reviewer_met(stats: &PatientStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_ratings_given >= REVIEWER_MIN_RATINGS
}

pub(crate) fn helpful_reviewer_progress(stats: &PatientStatistics) -> f64 {
    percent(count_ratio(stats.total_ratings_given, REVIEWER_MIN_RATINGS))
}
