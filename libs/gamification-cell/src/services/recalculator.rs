// libs/gamification-cell/src/services/recalculator.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::UserRole;

use crate::error::GamificationResult;
use crate::models::{
    AvailabilitySnapshot, DocumentRecord, DocumentationWindow, RatingRecord, RatingWindow,
    TurnWindow, UserStatistics, WindowedValues,
};
use crate::services::store::{DocumentLedger, DoctorProfileSource, RatingLedger, StatisticsStore, TurnLedger};

/// Only ratings at or above this score count as a category mention.
pub const MENTION_MIN_SCORE: u8 = 4;

pub const COMMUNICATION_PHRASES: &[&str] = &[
    "communicat",
    "explain",
    "clear",
    "listen",
    "answered",
    "informative",
];

pub const EMPATHY_PHRASES: &[&str] = &[
    "empath",
    "kind",
    "caring",
    "compassion",
    "understanding",
    "warm",
    "attentive",
];

pub const PUNCTUALITY_PHRASES: &[&str] = &[
    "punctual",
    "on time",
    "on-time",
    "timely",
    "no wait",
    "short wait",
    "prompt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalculationPolicy {
    pub rating_window_size: u64,
    pub rating_checkpoint_interval: u64,
    pub documentation_window_size: u64,
    pub turn_window_days: i64,
}

impl Default for RecalculationPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RecalculationPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rating_window_size: config.rating_window_size.max(1),
            rating_checkpoint_interval: config.rating_checkpoint_interval.max(1),
            documentation_window_size: config.documentation_window_size.max(1),
            turn_window_days: config.turn_window_days.max(1),
        }
    }

    /// The first checkpoint sits at the window size, then one every interval.
    pub fn is_checkpoint(&self, total: u64) -> bool {
        total >= self.rating_window_size
            && (total - self.rating_window_size) % self.rating_checkpoint_interval == 0
    }

    /// Whether any checkpoint lies in `(before, after]`.
    pub fn checkpoint_crossed(&self, before: u64, after: u64) -> bool {
        if after <= before || after < self.rating_window_size {
            return false;
        }
        let next = if before < self.rating_window_size {
            self.rating_window_size
        } else {
            let passed = (before - self.rating_window_size) / self.rating_checkpoint_interval + 1;
            self.rating_window_size + passed * self.rating_checkpoint_interval
        };
        next <= after
    }

    pub fn turn_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.turn_window_days)
    }
}

// ==============================================================================
// PURE PASSES
// ==============================================================================

/// `text` is lowercased by the caller; phrase tables must be lowercase too.
fn mentions_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| {
        debug_assert_eq!(*phrase, phrase.to_lowercase(), "phrase tables must be lowercase");
        text.contains(phrase)
    })
}

/// Count category mentions over rating records. A record can count toward
/// several categories.
pub fn classify_ratings(records: &[RatingRecord]) -> RatingWindow {
    let mut window = RatingWindow::default();

    for record in records.iter().filter(|r| r.score >= MENTION_MIN_SCORE) {
        let Some(subcategory) = record.subcategory.as_deref() else {
            continue;
        };
        let text = subcategory.to_lowercase();

        if mentions_any(&text, COMMUNICATION_PHRASES) {
            window.communication += 1;
        }
        if mentions_any(&text, EMPATHY_PHRASES) {
            window.empathy += 1;
        }
        if mentions_any(&text, PUNCTUALITY_PHRASES) {
            window.punctuality += 1;
        }
    }

    window
}

pub fn count_words(text: Option<&str>) -> u64 {
    text.map(|t| t.split_whitespace().count() as u64).unwrap_or(0)
}

pub fn summarize_documents(records: &[DocumentRecord]) -> DocumentationWindow {
    let entries = records.len() as u64;
    let words: u64 = records.iter().map(|r| count_words(r.text.as_deref())).sum();
    let avg_words = if entries == 0 { 0.0 } else { words as f64 / entries as f64 };

    DocumentationWindow { entries, words, avg_words }
}

// ==============================================================================
// RECALCULATOR
// ==============================================================================

pub struct Recalculator {
    statistics: Arc<dyn StatisticsStore>,
    ratings: Arc<dyn RatingLedger>,
    documents: Arc<dyn DocumentLedger>,
    turns: Arc<dyn TurnLedger>,
    profiles: Arc<dyn DoctorProfileSource>,
    policy: RecalculationPolicy,
}

impl Recalculator {
    pub fn new(
        statistics: Arc<dyn StatisticsStore>,
        ratings: Arc<dyn RatingLedger>,
        documents: Arc<dyn DocumentLedger>,
        turns: Arc<dyn TurnLedger>,
        profiles: Arc<dyn DoctorProfileSource>,
        policy: RecalculationPolicy,
    ) -> Self {
        Self {
            statistics,
            ratings,
            documents,
            turns,
            profiles,
            policy,
        }
    }

    pub fn policy(&self) -> &RecalculationPolicy {
        &self.policy
    }

    /// Replace the rating-mention counters with an exact count over the most
    /// recent ratings. `lifetime_total` bounds the result.
    pub async fn recalculate_rating_window(
        &self,
        doctor_id: Uuid,
        lifetime_total: u64,
    ) -> GamificationResult<RatingWindow> {
        debug!("Recalculating rating window for doctor: {}", doctor_id);

        let records = self.ratings.recent_ratings(doctor_id, self.policy.rating_window_size).await?;
        let mut window = classify_ratings(&records);
        window.communication = window.communication.min(lifetime_total);
        window.empathy = window.empathy.min(lifetime_total);
        window.punctuality = window.punctuality.min(lifetime_total);

        let values = WindowedValues {
            ratings: Some(window),
            ..WindowedValues::default()
        };
        self.statistics.replace_windowed(doctor_id, UserRole::Doctor, &values).await?;

        info!(
            "Rating window for doctor {} recalculated from {} records: {:?}",
            doctor_id,
            records.len(),
            window
        );
        Ok(window)
    }

    pub async fn documentation_window(
        &self,
        doctor_id: Uuid,
        lifetime_documents: u64,
    ) -> GamificationResult<DocumentationWindow> {
        let records = self
            .documents
            .recent_documents(doctor_id, self.policy.documentation_window_size)
            .await?;
        let mut window = summarize_documents(&records);
        window.entries = window.entries.min(lifetime_documents);
        Ok(window)
    }

    pub async fn turn_window(
        &self,
        user_id: Uuid,
        role: UserRole,
        now: DateTime<Utc>,
        lifetime_completed: u64,
        lifetime_cancelled: u64,
    ) -> GamificationResult<TurnWindow> {
        let counts = self
            .turns
            .turns_since(user_id, role, self.policy.turn_window_start(now))
            .await?;
        Ok(TurnWindow {
            completed: counts.completed.min(lifetime_completed),
            cancelled: counts.cancelled.min(lifetime_cancelled),
        })
    }

    pub async fn availability_snapshot(&self, doctor_id: Uuid) -> GamificationResult<AvailabilitySnapshot> {
        let schedule = self.profiles.weekly_schedule(doctor_id).await?;
        Ok(schedule.map(|s| s.snapshot()).unwrap_or_default())
    }

    /// Exact passes run by the full-catalog sweep: documentation, turn window,
    /// distinct counterparts and (for doctors) the availability snapshot. The
    /// rating pass is left to the checkpoints.
    pub async fn recalculate_for_sweep(
        &self,
        stats: &UserStatistics,
        now: DateTime<Utc>,
    ) -> GamificationResult<WindowedValues> {
        let user_id = stats.user_id();
        let role = stats.role();
        debug!("Running sweep recalculation for {} {}", role, user_id);

        let mut values = WindowedValues::default();

        let counterparts = self.turns.distinct_counterparts(user_id, role).await?;
        values.unique_counterparts = Some(counterparts.len() as u64);

        match stats {
            UserStatistics::Doctor(doctor) => {
                values.documentation = Some(
                    self.documentation_window(user_id, doctor.total_documents_written).await?,
                );
                values.turns = Some(
                    self.turn_window(
                        user_id,
                        role,
                        now,
                        doctor.total_turns_completed,
                        doctor.total_turns_cancelled,
                    )
                    .await?,
                );
                values.availability = Some(self.availability_snapshot(user_id).await?);
            }
            UserStatistics::Patient(patient) => {
                values.turns = Some(
                    self.turn_window(
                        user_id,
                        role,
                        now,
                        patient.total_turns_completed,
                        patient.total_turns_cancelled,
                    )
                    .await?,
                );
            }
        }

        self.statistics.replace_windowed(user_id, role, &values).await?;
        info!("Sweep recalculation stored for {} {}", role, user_id);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_tables_are_lowercase() {
        for phrase in COMMUNICATION_PHRASES.iter().chain(EMPATHY_PHRASES).chain(PUNCTUALITY_PHRASES) {
            assert_eq!(*phrase, phrase.to_lowercase(), "{phrase:?} would never match");
        }
    }

    fn rating(score: u8, subcategory: Option<&str>) -> RatingRecord {
        RatingRecord {
            score,
            subcategory: subcategory.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn test_checkpoints() {
        let policy = RecalculationPolicy::default();
        assert!(!policy.is_checkpoint(49));
        assert!(policy.is_checkpoint(50));
        assert!(!policy.is_checkpoint(55));
        assert!(policy.is_checkpoint(60));
        assert!(policy.is_checkpoint(120));
    }

    #[test]
    fn test_checkpoint_crossing() {
        let policy = RecalculationPolicy::default();
        assert!(!policy.checkpoint_crossed(48, 49));
        assert!(policy.checkpoint_crossed(49, 50));
        assert!(!policy.checkpoint_crossed(50, 51));
        assert!(!policy.checkpoint_crossed(58, 59));
        assert!(policy.checkpoint_crossed(59, 60));
        // a concurrent increment skipped 70 in the returned snapshot
        assert!(policy.checkpoint_crossed(69, 71));
        assert!(!policy.checkpoint_crossed(60, 60));
    }

    #[test]
    fn test_policy_from_config_guards_zero() {
        let config = AppConfig {
            rating_checkpoint_interval: 0,
            ..AppConfig::default()
        };
        let policy = RecalculationPolicy::from_config(&config);
        assert_eq!(policy.rating_checkpoint_interval, 1);
        assert_eq!(policy.rating_window_size, 50);
    }

    #[test]
    fn test_classify_ratings_counts_only_high_scores() {
        let records = vec![
            rating(5, Some("Explained the diagnosis very clearly")),
            rating(4, Some("Very KIND and caring")),
            rating(4, Some("Punctual, no wait at all")),
            rating(3, Some("Clear explanation")),
            rating(5, None),
            rating(5, Some("Listened and was understanding")),
        ];

        let window = classify_ratings(&records);
        assert_eq!(window, RatingWindow { communication: 2, empathy: 2, punctuality: 1 });
    }

    #[test]
    fn test_classify_ratings_is_idempotent() {
        let records = vec![rating(5, Some("on time")), rating(4, Some("warm"))];
        assert_eq!(classify_ratings(&records), classify_ratings(&records));
    }

    #[test]
    fn test_word_counting() {
        assert_eq!(count_words(None), 0);
        assert_eq!(count_words(Some("")), 0);
        assert_eq!(count_words(Some("   \n\t ")), 0);
        assert_eq!(count_words(Some("Patient reports\tmild  headache\nfor two days")), 7);
    }

    #[test]
    fn test_summarize_documents() {
        let records = vec![
            DocumentRecord { text: Some("one two three".to_string()), created_at: None },
            DocumentRecord { text: None, created_at: None },
            DocumentRecord { text: Some("four five".to_string()), created_at: None },
        ];
        let window = summarize_documents(&records);
        assert_eq!(window.entries, 3);
        assert_eq!(window.words, 5);
        assert!((window.avg_words - 5.0 / 3.0).abs() < 1e-9);

        assert_eq!(summarize_documents(&[]).avg_words, 0.0);
    }
}
