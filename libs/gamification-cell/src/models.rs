// libs/gamification-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::UserRole;

// ==============================================================================
// BADGE IDENTITY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    // Doctor
    ClearCommunicator,
    EmpatheticCare,
    AlwaysOnTime,
    SustainedExcellence,
    TopRated,
    DetailedNotes,
    DiligentDocumenter,
    ReliableSchedule,
    WideAvailability,
    LoyalFollowing,
    BroadReach,
    SeasonedPractitioner,
    SwiftResponder,
    // Patient
    FirstVisit,
    RegularPatient,
    TrustedBond,
    PunctualPatient,
    PlansAhead,
    CommittedPatient,
    OrganizedRecords,
    HelpfulReviewer,
}

impl BadgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::ClearCommunicator => "clear_communicator",
            BadgeType::EmpatheticCare => "empathetic_care",
            BadgeType::AlwaysOnTime => "always_on_time",
            BadgeType::SustainedExcellence => "sustained_excellence",
            BadgeType::TopRated => "top_rated",
            BadgeType::DetailedNotes => "detailed_notes",
            BadgeType::DiligentDocumenter => "diligent_documenter",
            BadgeType::ReliableSchedule => "reliable_schedule",
            BadgeType::WideAvailability => "wide_availability",
            BadgeType::LoyalFollowing => "loyal_following",
            BadgeType::BroadReach => "broad_reach",
            BadgeType::SeasonedPractitioner => "seasoned_practitioner",
            BadgeType::SwiftResponder => "swift_responder",
            BadgeType::FirstVisit => "first_visit",
            BadgeType::RegularPatient => "regular_patient",
            BadgeType::TrustedBond => "trusted_bond",
            BadgeType::PunctualPatient => "punctual_patient",
            BadgeType::PlansAhead => "plans_ahead",
            BadgeType::CommittedPatient => "committed_patient",
            BadgeType::OrganizedRecords => "organized_records",
            BadgeType::HelpfulReviewer => "helpful_reviewer",
        }
    }
}

impl std::fmt::Display for BadgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge category, which is also the evaluation slice a badge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Rating,
    Documentation,
    Consistency,
    Relationship,
    ResponseTime,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 5] = [
        BadgeCategory::Rating,
        BadgeCategory::Documentation,
        BadgeCategory::Consistency,
        BadgeCategory::Relationship,
        BadgeCategory::ResponseTime,
    ];
}

/// Persisted per (user_id, badge_type); toggled, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeRecord {
    pub user_id: Uuid,
    pub badge_type: BadgeType,
    pub is_active: bool,
    pub earned_at: DateTime<Utc>,
    pub last_evaluated_at: DateTime<Utc>,
}

// ==============================================================================
// STATISTICS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorStatistics {
    pub user_id: Uuid,

    pub total_turns_completed: u64,
    pub total_turns_cancelled: u64,
    pub total_ratings_received: u64,
    pub rated_count: u64,
    pub rating_score_sum: u64,
    pub low_rating_count: u64,
    pub unique_patients: u64,
    pub returning_patients: u64,
    pub total_documents_written: u64,
    pub total_modify_requests_handled: u64,
    pub total_response_minutes: u64,
    pub timed_responses: u64,

    // last-50 ratings
    pub communication_mentions: u64,
    pub empathy_mentions: u64,
    pub punctuality_mentions: u64,
    // last-30 documents
    pub documented_entries_window: u64,
    pub documented_words_window: u64,
    // last-90 days
    pub turns_last_90_days: u64,
    pub cancellations_last_90_days: u64,
    // schedule snapshot
    pub available_days_per_week: u64,
    pub weekly_available_minutes: u64,

    pub avg_rating: f64,
    pub avg_words_per_document: f64,
    pub avg_response_minutes: f64,

    pub badge_progress: BTreeMap<BadgeType, f64>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DoctorStatistics {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn low_rating_ratio(&self) -> f64 {
        ratio_of(self.low_rating_count, self.total_ratings_received)
    }

    pub fn cancellation_rate_90d(&self) -> f64 {
        ratio_of(
            self.cancellations_last_90_days,
            self.turns_last_90_days + self.cancellations_last_90_days,
        )
    }

    fn counter_mut(&mut self, counter: StatCounter) -> Option<&mut u64> {
        let field = match counter {
            StatCounter::TotalTurnsCompleted => &mut self.total_turns_completed,
            StatCounter::TotalTurnsCancelled => &mut self.total_turns_cancelled,
            StatCounter::TurnsLast90Days => &mut self.turns_last_90_days,
            StatCounter::CancellationsLast90Days => &mut self.cancellations_last_90_days,
            StatCounter::TotalRatingsReceived => &mut self.total_ratings_received,
            StatCounter::RatedCount => &mut self.rated_count,
            StatCounter::RatingScoreSum => &mut self.rating_score_sum,
            StatCounter::LowRatingCount => &mut self.low_rating_count,
            StatCounter::UniquePatients => &mut self.unique_patients,
            StatCounter::ReturningPatients => &mut self.returning_patients,
            StatCounter::TotalDocumentsWritten => &mut self.total_documents_written,
            StatCounter::DocumentedWordsWindow => &mut self.documented_words_window,
            StatCounter::TotalModifyRequestsHandled => &mut self.total_modify_requests_handled,
            StatCounter::TotalResponseMinutes => &mut self.total_response_minutes,
            StatCounter::TimedResponses => &mut self.timed_responses,
            StatCounter::CommunicationMentions => &mut self.communication_mentions,
            StatCounter::EmpathyMentions => &mut self.empathy_mentions,
            StatCounter::PunctualityMentions => &mut self.punctuality_mentions,
            _ => return None,
        };
        Some(field)
    }

    fn normalize(&mut self) {
        self.communication_mentions = self.communication_mentions.min(self.total_ratings_received);
        self.empathy_mentions = self.empathy_mentions.min(self.total_ratings_received);
        self.punctuality_mentions = self.punctuality_mentions.min(self.total_ratings_received);
        self.low_rating_count = self.low_rating_count.min(self.total_ratings_received);
        self.rated_count = self.rated_count.min(self.total_ratings_received);
        self.documented_entries_window = self.documented_entries_window.min(self.total_documents_written);
        self.turns_last_90_days = self.turns_last_90_days.min(self.total_turns_completed);
        self.cancellations_last_90_days = self.cancellations_last_90_days.min(self.total_turns_cancelled);
        self.timed_responses = self.timed_responses.min(self.total_modify_requests_handled);
        self.available_days_per_week = self.available_days_per_week.min(7);
        self.weekly_available_minutes = self.weekly_available_minutes.min(7 * 24 * 60);

        self.avg_rating = clamp_average(self.avg_rating).min(5.0);
        self.avg_words_per_document = clamp_average(self.avg_words_per_document);
        self.avg_response_minutes = clamp_average(self.avg_response_minutes);
        clamp_progress(&mut self.badge_progress);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientStatistics {
    pub user_id: Uuid,

    pub total_turns_completed: u64,
    pub total_turns_cancelled: u64,
    pub total_turns_no_show: u64,
    pub total_ratings_given: u64,
    pub unique_doctors: u64,
    pub returning_doctors: u64,
    pub total_files_uploaded: u64,
    pub total_advance_bookings: u64,

    pub turns_last_90_days: u64,
    pub cancellations_last_90_days: u64,

    pub badge_progress: BTreeMap<BadgeType, f64>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PatientStatistics {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn no_show_rate(&self) -> f64 {
        ratio_of(
            self.total_turns_no_show,
            self.total_turns_completed + self.total_turns_no_show,
        )
    }

    pub fn cancellation_rate_90d(&self) -> f64 {
        ratio_of(
            self.cancellations_last_90_days,
            self.turns_last_90_days + self.cancellations_last_90_days,
        )
    }

    fn counter_mut(&mut self, counter: StatCounter) -> Option<&mut u64> {
        let field = match counter {
            StatCounter::TotalTurnsCompleted => &mut self.total_turns_completed,
            StatCounter::TotalTurnsCancelled => &mut self.total_turns_cancelled,
            StatCounter::TurnsLast90Days => &mut self.turns_last_90_days,
            StatCounter::CancellationsLast90Days => &mut self.cancellations_last_90_days,
            StatCounter::TotalTurnsNoShow => &mut self.total_turns_no_show,
            StatCounter::TotalRatingsGiven => &mut self.total_ratings_given,
            StatCounter::UniqueDoctors => &mut self.unique_doctors,
            StatCounter::ReturningDoctors => &mut self.returning_doctors,
            StatCounter::TotalFilesUploaded => &mut self.total_files_uploaded,
            StatCounter::TotalAdvanceBookings => &mut self.total_advance_bookings,
            _ => return None,
        };
        Some(field)
    }

    fn normalize(&mut self) {
        self.turns_last_90_days = self.turns_last_90_days.min(self.total_turns_completed);
        self.cancellations_last_90_days = self.cancellations_last_90_days.min(self.total_turns_cancelled);
        clamp_progress(&mut self.badge_progress);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum UserStatistics {
    Doctor(DoctorStatistics),
    Patient(PatientStatistics),
}

impl UserStatistics {
    /// Zero-valued row for a role that carries statistics.
    pub fn empty(user_id: Uuid, role: UserRole) -> Option<Self> {
        match role {
            UserRole::Doctor => Some(UserStatistics::Doctor(DoctorStatistics::new(user_id))),
            UserRole::Patient => Some(UserStatistics::Patient(PatientStatistics::new(user_id))),
            UserRole::Admin => None,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            UserStatistics::Doctor(s) => s.user_id,
            UserStatistics::Patient(s) => s.user_id,
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            UserStatistics::Doctor(_) => UserRole::Doctor,
            UserStatistics::Patient(_) => UserRole::Patient,
        }
    }

    pub fn total_turns_completed(&self) -> u64 {
        match self {
            UserStatistics::Doctor(s) => s.total_turns_completed,
            UserStatistics::Patient(s) => s.total_turns_completed,
        }
    }

    pub fn total_ratings_received(&self) -> u64 {
        match self {
            UserStatistics::Doctor(s) => s.total_ratings_received,
            UserStatistics::Patient(_) => 0,
        }
    }

    pub fn badge_progress(&self) -> &BTreeMap<BadgeType, f64> {
        match self {
            UserStatistics::Doctor(s) => &s.badge_progress,
            UserStatistics::Patient(s) => &s.badge_progress,
        }
    }

    pub fn last_evaluated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            UserStatistics::Doctor(s) => s.last_evaluated_at,
            UserStatistics::Patient(s) => s.last_evaluated_at,
        }
    }

    /// Add `amount` to a counter; `false` when the counter is not part of this row.
    pub fn increment(&mut self, counter: StatCounter, amount: u64) -> bool {
        let field = match self {
            UserStatistics::Doctor(s) => s.counter_mut(counter),
            UserStatistics::Patient(s) => s.counter_mut(counter),
        };
        match field {
            Some(value) => {
                *value = value.saturating_add(amount);
                true
            }
            None => false,
        }
    }

    /// Overwrite the windowed groups present in `values`. Doctor-only groups are
    /// ignored for patients.
    pub fn apply_windowed(&mut self, values: &WindowedValues) {
        match self {
            UserStatistics::Doctor(s) => {
                if let Some(ratings) = &values.ratings {
                    s.communication_mentions = ratings.communication;
                    s.empathy_mentions = ratings.empathy;
                    s.punctuality_mentions = ratings.punctuality;
                }
                if let Some(docs) = &values.documentation {
                    s.documented_entries_window = docs.entries;
                    s.documented_words_window = docs.words;
                    s.avg_words_per_document = docs.avg_words;
                }
                if let Some(turns) = &values.turns {
                    s.turns_last_90_days = turns.completed;
                    s.cancellations_last_90_days = turns.cancelled;
                }
                if let Some(availability) = &values.availability {
                    s.available_days_per_week = availability.enabled_days;
                    s.weekly_available_minutes = availability.weekly_minutes;
                }
                if let Some(unique) = values.unique_counterparts {
                    s.unique_patients = unique;
                }
            }
            UserStatistics::Patient(s) => {
                if let Some(turns) = &values.turns {
                    s.turns_last_90_days = turns.completed;
                    s.cancellations_last_90_days = turns.cancelled;
                }
                if let Some(unique) = values.unique_counterparts {
                    s.unique_doctors = unique;
                }
            }
        }
    }

    pub fn apply_derived(&mut self, derived: &DerivedAverages) {
        if let UserStatistics::Doctor(s) = self {
            if let Some(avg) = derived.avg_rating {
                s.avg_rating = avg;
            }
            if let Some(avg) = derived.avg_words_per_document {
                s.avg_words_per_document = avg;
            }
            if let Some(avg) = derived.avg_response_minutes {
                s.avg_response_minutes = avg;
            }
        }
    }

    pub fn set_progress(&mut self, progress: BTreeMap<BadgeType, f64>, evaluated_at: DateTime<Utc>) {
        match self {
            UserStatistics::Doctor(s) => {
                s.badge_progress = progress;
                s.last_evaluated_at = Some(evaluated_at);
            }
            UserStatistics::Patient(s) => {
                s.badge_progress = progress;
                s.last_evaluated_at = Some(evaluated_at);
            }
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        match self {
            UserStatistics::Doctor(s) => {
                s.created_at.get_or_insert(now);
                s.updated_at = Some(now);
            }
            UserStatistics::Patient(s) => {
                s.created_at.get_or_insert(now);
                s.updated_at = Some(now);
            }
        }
    }

    /// Clamp every field back into its valid range.
    pub fn normalized(mut self) -> Self {
        match &mut self {
            UserStatistics::Doctor(s) => s.normalize(),
            UserStatistics::Patient(s) => s.normalize(),
        }
        self
    }
}

/// Incrementable columns. Each belongs to one or both statistics variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatCounter {
    TotalTurnsCompleted,
    TotalTurnsCancelled,
    TurnsLast90Days,
    CancellationsLast90Days,
    // doctor
    TotalRatingsReceived,
    RatedCount,
    RatingScoreSum,
    LowRatingCount,
    UniquePatients,
    ReturningPatients,
    TotalDocumentsWritten,
    DocumentedWordsWindow,
    TotalModifyRequestsHandled,
    TotalResponseMinutes,
    TimedResponses,
    CommunicationMentions,
    EmpathyMentions,
    PunctualityMentions,
    // patient
    TotalTurnsNoShow,
    TotalRatingsGiven,
    UniqueDoctors,
    ReturningDoctors,
    TotalFilesUploaded,
    TotalAdvanceBookings,
}

impl StatCounter {
    pub fn column(&self) -> &'static str {
        match self {
            StatCounter::TotalTurnsCompleted => "total_turns_completed",
            StatCounter::TotalTurnsCancelled => "total_turns_cancelled",
            StatCounter::TurnsLast90Days => "turns_last_90_days",
            StatCounter::CancellationsLast90Days => "cancellations_last_90_days",
            StatCounter::TotalRatingsReceived => "total_ratings_received",
            StatCounter::RatedCount => "rated_count",
            StatCounter::RatingScoreSum => "rating_score_sum",
            StatCounter::LowRatingCount => "low_rating_count",
            StatCounter::UniquePatients => "unique_patients",
            StatCounter::ReturningPatients => "returning_patients",
            StatCounter::TotalDocumentsWritten => "total_documents_written",
            StatCounter::DocumentedWordsWindow => "documented_words_window",
            StatCounter::TotalModifyRequestsHandled => "total_modify_requests_handled",
            StatCounter::TotalResponseMinutes => "total_response_minutes",
            StatCounter::TimedResponses => "timed_responses",
            StatCounter::CommunicationMentions => "communication_mentions",
            StatCounter::EmpathyMentions => "empathy_mentions",
            StatCounter::PunctualityMentions => "punctuality_mentions",
            StatCounter::TotalTurnsNoShow => "total_turns_no_show",
            StatCounter::TotalRatingsGiven => "total_ratings_given",
            StatCounter::UniqueDoctors => "unique_doctors",
            StatCounter::ReturningDoctors => "returning_doctors",
            StatCounter::TotalFilesUploaded => "total_files_uploaded",
            StatCounter::TotalAdvanceBookings => "total_advance_bookings",
        }
    }

    pub fn applies_to(&self, role: UserRole) -> bool {
        match self {
            StatCounter::TotalTurnsCompleted
            | StatCounter::TotalTurnsCancelled
            | StatCounter::TurnsLast90Days
            | StatCounter::CancellationsLast90Days => matches!(role, UserRole::Doctor | UserRole::Patient),
            StatCounter::TotalTurnsNoShow
            | StatCounter::TotalRatingsGiven
            | StatCounter::UniqueDoctors
            | StatCounter::ReturningDoctors
            | StatCounter::TotalFilesUploaded
            | StatCounter::TotalAdvanceBookings => role == UserRole::Patient,
            _ => role == UserRole::Doctor,
        }
    }

    pub fn unique_counterparts(role: UserRole) -> Self {
        match role {
            UserRole::Doctor => StatCounter::UniquePatients,
            _ => StatCounter::UniqueDoctors,
        }
    }

    pub fn returning_counterparts(role: UserRole) -> Self {
        match role {
            UserRole::Doctor => StatCounter::ReturningPatients,
            _ => StatCounter::ReturningDoctors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub counter: StatCounter,
    pub amount: u64,
}

impl CounterDelta {
    pub fn one(counter: StatCounter) -> Self {
        Self { counter, amount: 1 }
    }

    pub fn by(counter: StatCounter, amount: u64) -> Self {
        Self { counter, amount }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingWindow {
    pub communication: u64,
    pub empathy: u64,
    pub punctuality: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationWindow {
    pub entries: u64,
    pub words: u64,
    pub avg_words: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnWindow {
    pub completed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub enabled_days: u64,
    pub weekly_minutes: u64,
}

/// Exact windowed values; only the groups that are `Some` are overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedValues {
    pub ratings: Option<RatingWindow>,
    pub documentation: Option<DocumentationWindow>,
    pub turns: Option<TurnWindow>,
    pub availability: Option<AvailabilitySnapshot>,
    /// Distinct counterparts with at least one completed turn.
    pub unique_counterparts: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedAverages {
    pub avg_rating: Option<f64>,
    pub avg_words_per_document: Option<f64>,
    pub avg_response_minutes: Option<f64>,
}

impl DerivedAverages {
    pub fn is_empty(&self) -> bool {
        self.avg_rating.is_none()
            && self.avg_words_per_document.is_none()
            && self.avg_response_minutes.is_none()
    }
}

// ==============================================================================
// DOMAIN EVENTS
// ==============================================================================

/// Component scores of one rating, each on a 1-5 scale when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScores {
    pub overall: Option<u8>,
    pub communication: Option<u8>,
    pub empathy: Option<u8>,
    pub punctuality: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    RatingAdded(RatingScores),
    TurnCompleted { counterparty_id: Uuid },
    TurnCancelled,
    TurnNoShow,
    DocumentAdded { text: Option<String> },
    ModifyRequestHandled { response_minutes: Option<u32> },
    FileUploaded,
    AdvanceBookingMade,
    RatingGiven,
}

const DOCTOR_ONLY: &[UserRole] = &[UserRole::Doctor];
const PATIENT_ONLY: &[UserRole] = &[UserRole::Patient];
const BOTH_PARTIES: &[UserRole] = &[UserRole::Doctor, UserRole::Patient];

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::RatingAdded(_) => "rating_added",
            DomainEvent::TurnCompleted { .. } => "turn_completed",
            DomainEvent::TurnCancelled => "turn_cancelled",
            DomainEvent::TurnNoShow => "turn_no_show",
            DomainEvent::DocumentAdded { .. } => "document_added",
            DomainEvent::ModifyRequestHandled { .. } => "modify_request_handled",
            DomainEvent::FileUploaded => "file_uploaded",
            DomainEvent::AdvanceBookingMade => "advance_booking_made",
            DomainEvent::RatingGiven => "rating_given",
        }
    }

    pub fn expected_roles(&self) -> &'static [UserRole] {
        match self {
            DomainEvent::RatingAdded(_)
            | DomainEvent::DocumentAdded { .. }
            | DomainEvent::ModifyRequestHandled { .. } => DOCTOR_ONLY,
            DomainEvent::TurnCompleted { .. } | DomainEvent::TurnCancelled => BOTH_PARTIES,
            DomainEvent::TurnNoShow
            | DomainEvent::FileUploaded
            | DomainEvent::AdvanceBookingMade
            | DomainEvent::RatingGiven => PATIENT_ONLY,
        }
    }

    /// Evaluation slices whose badges this event's inputs can affect.
    pub fn slices(&self) -> &'static [BadgeCategory] {
        match self {
            DomainEvent::RatingAdded(_) | DomainEvent::RatingGiven => &[BadgeCategory::Rating],
            DomainEvent::TurnCompleted { .. } => &[BadgeCategory::Relationship, BadgeCategory::Consistency],
            DomainEvent::TurnCancelled
            | DomainEvent::TurnNoShow
            | DomainEvent::AdvanceBookingMade => &[BadgeCategory::Consistency],
            DomainEvent::DocumentAdded { .. } | DomainEvent::FileUploaded => &[BadgeCategory::Documentation],
            DomainEvent::ModifyRequestHandled { .. } => &[BadgeCategory::ResponseTime],
        }
    }
}

// ==============================================================================
// COLLABORATOR RECORDS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub score: u8,
    pub subcategory: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnWindowCounts {
    pub completed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn minutes(&self) -> u64 {
        let minutes = (self.end - self.start).num_minutes();
        u64::try_from(minutes).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: u8, // 0 = Sunday
    pub is_available: bool,
    pub ranges: Vec<TimeRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: Vec<DaySchedule>,
}

impl WeeklySchedule {
    /// Distinct weekdays that are enabled and have at least one non-empty range.
    pub fn enabled_days(&self) -> u64 {
        let mut seen = [false; 7];
        for day in &self.days {
            if day.is_available && day.day_of_week < 7 && day.ranges.iter().any(|r| r.minutes() > 0) {
                seen[usize::from(day.day_of_week)] = true;
            }
        }
        seen.iter().filter(|enabled| **enabled).count() as u64
    }

    pub fn weekly_minutes(&self) -> u64 {
        self.days
            .iter()
            .filter(|day| day.is_available && day.day_of_week < 7)
            .flat_map(|day| day.ranges.iter())
            .map(TimeRange::minutes)
            .sum::<u64>()
            .min(7 * 24 * 60)
    }

    pub fn snapshot(&self) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            enabled_days: self.enabled_days(),
            weekly_minutes: self.weekly_minutes(),
        }
    }
}

// ==============================================================================
// ENGINE OUTPUTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeProgress {
    pub badge_type: BadgeType,
    pub name: String,
    pub category: BadgeCategory,
    pub percentage: f64,
    pub earned: bool,
    pub status_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub badge_type: BadgeType,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub user_id: Uuid,
    pub role: Option<UserRole>,
    pub evaluated: usize,
    pub activated: Vec<BadgeType>,
    pub deactivated: Vec<BadgeType>,
}

impl EvaluationSummary {
    pub fn empty(user_id: Uuid, role: Option<UserRole>) -> Self {
        Self {
            user_id,
            role,
            evaluated: 0,
            activated: Vec::new(),
            deactivated: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UserNotFound,
    InactiveUser,
    RoleMismatch,
    DirectoryUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Skipped(SkipReason),
    Processed {
        checkpoint_recalculated: bool,
        evaluated_slices: Vec<BadgeCategory>,
    },
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn ratio_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn clamp_average(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn clamp_progress(progress: &mut BTreeMap<BadgeType, f64>) {
    for value in progress.values_mut() {
        *value = if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 };
    }
}
