use crate::models::{BadgeCategory, BadgeType, DoctorStatistics};

use super::{count_ratio, percent, ratio, weighted, BadgeDefinition, BadgeRule, EvaluationContext, ExternalInput};

pub(crate) const MENTION_REQUIREMENT: u64 = 30;

pub(crate) const EXCELLENCE_MIN_RATINGS: u64 = 100;
pub(crate) const EXCELLENCE_MIN_AVG: f64 = 4.3;
pub(crate) const EXCELLENCE_MIN_MENTIONS: u64 = 15;
pub(crate) const EXCELLENCE_MAX_LOW_RATIO: f64 = 0.10;
pub(crate) const EXCELLENCE_CAPPED_PROGRESS: f64 = 50.0;

pub(crate) const TOP_RATED_MIN_RATINGS: u64 = 20;
pub(crate) const TOP_RATED_MIN_AVG: f64 = 4.5;
pub(crate) const TOP_RATED_MIN_PERCENTILE: f64 = 90.0;

pub(crate) const DETAILED_NOTES_MIN_ENTRIES: u64 = 20;
pub(crate) const DETAILED_NOTES_MIN_WORDS: f64 = 100.0;
pub(crate) const DILIGENT_MIN_DOCUMENTS: u64 = 50;

pub(crate) const RELIABLE_MIN_TURNS_90D: u64 = 30;
pub(crate) const RELIABLE_MAX_CANCEL_RATE: f64 = 0.05;
pub(crate) const RELIABLE_CAPPED_PROGRESS: f64 = 50.0;

pub(crate) const AVAILABILITY_MIN_DAYS: u64 = 5;
pub(crate) const AVAILABILITY_MIN_MINUTES: u64 = 30 * 60;

pub(crate) const LOYAL_MIN_RETURNING: u64 = 20;
pub(crate) const BROAD_REACH_MIN_UNIQUE: u64 = 100;
pub(crate) const SEASONED_MIN_TURNS: u64 = 250;

pub(crate) const SWIFT_MIN_HANDLED: u64 = 10;
pub(crate) const SWIFT_MAX_AVG_MINUTES: f64 = 240.0;
pub(crate) const SWIFT_SLOW_AVG_MINUTES: f64 = 24.0 * 60.0;
pub(crate) const SWIFT_CAPPED_PROGRESS: f64 = 50.0;

pub static DOCTOR_BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        badge_type: BadgeType::ClearCommunicator,
        category: BadgeCategory::Rating,
        name: "Clear Communicator",
        description: "Patients keep praising how clearly you explain things",
        icon: "message-circle",
        requires: None,
        rule: BadgeRule::Doctor { predicate: clear_communicator_met, progress: clear_communicator_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::EmpatheticCare,
        category: BadgeCategory::Rating,
        name: "Empathetic Care",
        description: "Patients highlight your kindness and understanding",
        icon: "heart",
        requires: None,
        rule: BadgeRule::Doctor { predicate: empathetic_care_met, progress: empathetic_care_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::AlwaysOnTime,
        category: BadgeCategory::Rating,
        name: "Always On Time",
        description: "Patients recognise that your consultations start on time",
        icon: "clock",
        requires: None,
        rule: BadgeRule::Doctor { predicate: always_on_time_met, progress: always_on_time_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::SustainedExcellence,
        category: BadgeCategory::Rating,
        name: "Sustained Excellence",
        description: "Consistently outstanding ratings across every dimension",
        icon: "award",
        requires: None,
        rule: BadgeRule::Doctor { predicate: sustained_excellence_met, progress: sustained_excellence_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::TopRated,
        category: BadgeCategory::Rating,
        name: "Top Rated",
        description: "Among the highest rated doctors on the platform",
        icon: "star",
        requires: Some(ExternalInput::PeerPercentile),
        rule: BadgeRule::Doctor { predicate: top_rated_met, progress: top_rated_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::DetailedNotes,
        category: BadgeCategory::Documentation,
        name: "Detailed Notes",
        description: "Your recent clinical notes are thorough and complete",
        icon: "file-text",
        requires: None,
        rule: BadgeRule::Doctor { predicate: detailed_notes_met, progress: detailed_notes_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::DiligentDocumenter,
        category: BadgeCategory::Documentation,
        name: "Diligent Documenter",
        description: "A long track record of documented consultations",
        icon: "book-open",
        requires: None,
        rule: BadgeRule::Doctor { predicate: diligent_documenter_met, progress: diligent_documenter_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::ReliableSchedule,
        category: BadgeCategory::Consistency,
        name: "Reliable Schedule",
        description: "Steady activity with almost no cancellations",
        icon: "calendar-check",
        requires: None,
        rule: BadgeRule::Doctor { predicate: reliable_schedule_met, progress: reliable_schedule_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::WideAvailability,
        category: BadgeCategory::Consistency,
        name: "Wide Availability",
        description: "Open for consultations most days of the week",
        icon: "calendar",
        requires: Some(ExternalInput::Availability),
        rule: BadgeRule::Doctor { predicate: wide_availability_met, progress: wide_availability_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::LoyalFollowing,
        category: BadgeCategory::Relationship,
        name: "Loyal Following",
        description: "Patients keep coming back to you",
        icon: "users",
        requires: None,
        rule: BadgeRule::Doctor { predicate: loyal_following_met, progress: loyal_following_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::BroadReach,
        category: BadgeCategory::Relationship,
        name: "Broad Reach",
        description: "You have cared for a large number of different patients",
        icon: "globe",
        requires: None,
        rule: BadgeRule::Doctor { predicate: broad_reach_met, progress: broad_reach_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::SeasonedPractitioner,
        category: BadgeCategory::Relationship,
        name: "Seasoned Practitioner",
        description: "Hundreds of completed consultations",
        icon: "briefcase",
        requires: None,
        rule: BadgeRule::Doctor { predicate: seasoned_practitioner_met, progress: seasoned_practitioner_progress },
    },
    BadgeDefinition {
        badge_type: BadgeType::SwiftResponder,
        category: BadgeCategory::ResponseTime,
        name: "Swift Responder",
        description: "Appointment change requests are handled quickly",
        icon: "zap",
        requires: None,
        rule: BadgeRule::Doctor { predicate: swift_responder_met, progress: swift_responder_progress },
    },
];

// ==============================================================================
// RATING
// ==============================================================================

pub(crate) fn clear_communicator_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.communication_mentions >= MENTION_REQUIREMENT
}

pub(crate) fn clear_communicator_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.communication_mentions, MENTION_REQUIREMENT))
}

pub(crate) fn empathetic_care_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.empathy_mentions >= MENTION_REQUIREMENT
}

pub(crate) fn empathetic_care_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.empathy_mentions, MENTION_REQUIREMENT))
}

pub(crate) fn always_on_time_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.punctuality_mentions >= MENTION_REQUIREMENT
}

pub(crate) fn always_on_time_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.punctuality_mentions, MENTION_REQUIREMENT))
}

pub(crate) fn sustained_excellence_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_ratings_received >= EXCELLENCE_MIN_RATINGS
        && stats.avg_rating >= EXCELLENCE_MIN_AVG
        && stats.communication_mentions >= EXCELLENCE_MIN_MENTIONS
        && stats.empathy_mentions >= EXCELLENCE_MIN_MENTIONS
        && stats.punctuality_mentions >= EXCELLENCE_MIN_MENTIONS
        && stats.low_rating_ratio() <= EXCELLENCE_MAX_LOW_RATIO
}

/// Volume, average and category mentions weighted 4/3/3. Too many low ratings
/// cap the result no matter how good the rest looks.
pub(crate) fn sustained_excellence_progress(stats: &DoctorStatistics) -> f64 {
    let volume = count_ratio(stats.total_ratings_received, EXCELLENCE_MIN_RATINGS);
    let quality = ratio(stats.avg_rating, EXCELLENCE_MIN_AVG);
    let mentions = (count_ratio(stats.communication_mentions, EXCELLENCE_MIN_MENTIONS)
        + count_ratio(stats.empathy_mentions, EXCELLENCE_MIN_MENTIONS)
        + count_ratio(stats.punctuality_mentions, EXCELLENCE_MIN_MENTIONS))
        / 3.0;

    let score = weighted(&[(4, volume), (3, quality), (3, mentions)]);
    if stats.low_rating_ratio() > EXCELLENCE_MAX_LOW_RATIO {
        score.min(EXCELLENCE_CAPPED_PROGRESS)
    } else {
        score
    }
}

pub(crate) fn top_rated_met(stats: &DoctorStatistics, ctx: &EvaluationContext) -> bool {
    let percentile = ctx.peer_percentile.unwrap_or(0.0);
    stats.total_ratings_received >= TOP_RATED_MIN_RATINGS
        && stats.avg_rating >= TOP_RATED_MIN_AVG
        && percentile >= TOP_RATED_MIN_PERCENTILE
}

pub(crate) fn top_rated_progress(stats: &DoctorStatistics) -> f64 {
    weighted(&[
        (1, count_ratio(stats.total_ratings_received, TOP_RATED_MIN_RATINGS)),
        (1, ratio(stats.avg_rating, TOP_RATED_MIN_AVG)),
    ])
}

// ==============================================================================
// DOCUMENTATION
// ==============================================================================

pub(crate) fn detailed_notes_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.documented_entries_window >= DETAILED_NOTES_MIN_ENTRIES
        && stats.avg_words_per_document >= DETAILED_NOTES_MIN_WORDS
}

pub(crate) fn detailed_notes_progress(stats: &DoctorStatistics) -> f64 {
    weighted(&[
        (1, count_ratio(stats.documented_entries_window, DETAILED_NOTES_MIN_ENTRIES)),
        (1, ratio(stats.avg_words_per_document, DETAILED_NOTES_MIN_WORDS)),
    ])
}

pub(crate) fn diligent_documenter_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_documents_written >= DILIGENT_MIN_DOCUMENTS
}

pub(crate) fn diligent_documenter_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.total_documents_written, DILIGENT_MIN_DOCUMENTS))
}

// ==============================================================================
// CONSISTENCY / AVAILABILITY
// ==============================================================================

pub(crate) fn reliable_schedule_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.turns_last_90_days >= RELIABLE_MIN_TURNS_90D
        && stats.cancellation_rate_90d() <= RELIABLE_MAX_CANCEL_RATE
}

pub(crate) fn reliable_schedule_progress(stats: &DoctorStatistics) -> f64 {
    let score = percent(count_ratio(stats.turns_last_90_days, RELIABLE_MIN_TURNS_90D));
    if stats.cancellation_rate_90d() > RELIABLE_MAX_CANCEL_RATE {
        score.min(RELIABLE_CAPPED_PROGRESS)
    } else {
        score
    }
}

pub(crate) fn wide_availability_met(_stats: &DoctorStatistics, ctx: &EvaluationContext) -> bool {
    ctx.availability.as_ref().is_some_and(|schedule| {
        schedule.enabled_days() >= AVAILABILITY_MIN_DAYS
            && schedule.weekly_minutes() >= AVAILABILITY_MIN_MINUTES
    })
}

/// Uses the schedule snapshot stored with the statistics row.
pub(crate) fn wide_availability_progress(stats: &DoctorStatistics) -> f64 {
    weighted(&[
        (1, count_ratio(stats.available_days_per_week, AVAILABILITY_MIN_DAYS)),
        (1, count_ratio(stats.weekly_available_minutes, AVAILABILITY_MIN_MINUTES)),
    ])
}

// ==============================================================================
// RELATIONSHIP / TURN COMPLETION
// ==============================================================================

pub(crate) fn loyal_following_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.returning_patients >= LOYAL_MIN_RETURNING
}

pub(crate) fn loyal_following_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.returning_patients, LOYAL_MIN_RETURNING))
}

pub(crate) fn broad_reach_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.unique_patients >= BROAD_REACH_MIN_UNIQUE
}

pub(crate) fn broad_reach_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.unique_patients, BROAD_REACH_MIN_UNIQUE))
}

pub(crate) fn seasoned_practitioner_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_turns_completed >= SEASONED_MIN_TURNS
}

pub(crate) fn seasoned_practitioner_progress(stats: &DoctorStatistics) -> f64 {
    percent(count_ratio(stats.total_turns_completed, SEASONED_MIN_TURNS))
}

// ==============================================================================
// RESPONSE TIME
// ==============================================================================

pub(crate) fn swift_responder_met(stats: &DoctorStatistics, _ctx: &EvaluationContext) -> bool {
    stats.total_modify_requests_handled >= SWIFT_MIN_HANDLED
        && stats.timed_responses > 0
        && stats.avg_response_minutes <= SWIFT_MAX_AVG_MINUTES
}

pub(crate) fn swift_responder_progress(stats: &DoctorStatistics) -> f64 {
    let score = percent(count_ratio(stats.total_modify_requests_handled, SWIFT_MIN_HANDLED));
    if stats.timed_responses > 0 && stats.avg_response_minutes > SWIFT_SLOW_AVG_MINUTES {
        score.min(SWIFT_CAPPED_PROGRESS)
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaySchedule, TimeRange, WeeklySchedule};
    use chrono::{NaiveTime, Utc};
    use uuid::Uuid;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(Utc::now())
    }

    fn approx(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    fn excellent_doctor(low_rating_count: u64) -> DoctorStatistics {
        DoctorStatistics {
            total_ratings_received: 120,
            communication_mentions: 30,
            empathy_mentions: 25,
            punctuality_mentions: 20,
            avg_rating: 4.5,
            low_rating_count,
            ..DoctorStatistics::new(Uuid::new_v4())
        }
    }

    #[test]
    fn test_sustained_excellence_activates_with_few_low_ratings() {
        let stats = excellent_doctor(5);
        assert!(sustained_excellence_met(&stats, &ctx()));
        assert_eq!(sustained_excellence_progress(&stats), 100.0);
    }

    #[test]
    fn test_sustained_excellence_capped_by_low_ratings() {
        let stats = excellent_doctor(20);
        assert!(!sustained_excellence_met(&stats, &ctx()));
        assert_eq!(sustained_excellence_progress(&stats), 50.0);
    }

    #[test]
    fn test_sustained_excellence_partial_progress() {
        let stats = DoctorStatistics {
            total_ratings_received: 50,
            avg_rating: 4.3,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        // volume 0.5 * 4 + quality 1.0 * 3 + mentions 0 * 3 = 5 / 10
        approx(sustained_excellence_progress(&stats), 50.0);
        assert!(!sustained_excellence_met(&stats, &ctx()));
    }

    #[test]
    fn test_mention_badges_threshold() {
        let mut stats = DoctorStatistics::new(Uuid::new_v4());
        stats.total_ratings_received = 50;
        stats.communication_mentions = 29;
        assert!(!clear_communicator_met(&stats, &ctx()));
        approx(clear_communicator_progress(&stats), 100.0 * 29.0 / 30.0);

        stats.communication_mentions = 30;
        assert!(clear_communicator_met(&stats, &ctx()));
        assert_eq!(clear_communicator_progress(&stats), 100.0);
        assert_eq!(empathetic_care_progress(&stats), 0.0);
        assert!(!always_on_time_met(&stats, &ctx()));
    }

    #[test]
    fn test_top_rated_needs_percentile() {
        let stats = DoctorStatistics {
            total_ratings_received: 40,
            avg_rating: 4.8,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        let mut context = ctx();
        assert!(!top_rated_met(&stats, &context));

        context.peer_percentile = Some(85.0);
        assert!(!top_rated_met(&stats, &context));

        context.peer_percentile = Some(93.0);
        assert!(top_rated_met(&stats, &context));
        assert_eq!(top_rated_progress(&stats), 100.0);
    }

    #[test]
    fn test_reliable_schedule_cancellation_ceiling() {
        let mut stats = DoctorStatistics {
            total_turns_completed: 40,
            total_turns_cancelled: 10,
            turns_last_90_days: 40,
            cancellations_last_90_days: 1,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        assert!(reliable_schedule_met(&stats, &ctx()));
        assert_eq!(reliable_schedule_progress(&stats), 100.0);

        stats.cancellations_last_90_days = 10;
        assert!(!reliable_schedule_met(&stats, &ctx()));
        assert_eq!(reliable_schedule_progress(&stats), 50.0);
    }

    #[test]
    fn test_wide_availability_uses_schedule() {
        let morning = TimeRange {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        };
        let schedule = WeeklySchedule {
            days: (1..=5)
                .map(|day| DaySchedule { day_of_week: day, is_available: true, ranges: vec![morning] })
                .collect(),
        };
        let stats = DoctorStatistics::new(Uuid::new_v4());

        let mut context = ctx();
        assert!(!wide_availability_met(&stats, &context));

        context.availability = Some(schedule);
        assert!(wide_availability_met(&stats, &context));

        let snapshot = DoctorStatistics {
            available_days_per_week: 5,
            weekly_available_minutes: 900,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        assert_eq!(wide_availability_progress(&snapshot), 75.0);
    }

    #[test]
    fn test_detailed_notes_requires_both_count_and_length() {
        let mut stats = DoctorStatistics {
            total_documents_written: 40,
            documented_entries_window: 25,
            avg_words_per_document: 60.0,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        assert!(!detailed_notes_met(&stats, &ctx()));
        approx(detailed_notes_progress(&stats), 80.0);

        stats.avg_words_per_document = 120.0;
        assert!(detailed_notes_met(&stats, &ctx()));
        assert!(!diligent_documenter_met(&stats, &ctx()));
        approx(diligent_documenter_progress(&stats), 80.0);
    }

    #[test]
    fn test_swift_responder_slow_average_caps_progress() {
        let mut stats = DoctorStatistics {
            total_modify_requests_handled: 12,
            timed_responses: 12,
            avg_response_minutes: 90.0,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        assert!(swift_responder_met(&stats, &ctx()));

        stats.avg_response_minutes = 2000.0;
        assert!(!swift_responder_met(&stats, &ctx()));
        assert_eq!(swift_responder_progress(&stats), 50.0);

        stats.timed_responses = 0;
        assert!(!swift_responder_met(&stats, &ctx()));
        assert_eq!(swift_responder_progress(&stats), 100.0);
    }

    #[test]
    fn test_relationship_badges() {
        let stats = DoctorStatistics {
            total_turns_completed: 125,
            unique_patients: 100,
            returning_patients: 5,
            ..DoctorStatistics::new(Uuid::new_v4())
        };
        assert!(broad_reach_met(&stats, &ctx()));
        assert!(!loyal_following_met(&stats, &ctx()));
        assert_eq!(loyal_following_progress(&stats), 25.0);
        assert_eq!(seasoned_practitioner_progress(&stats), 50.0);
    }
}
