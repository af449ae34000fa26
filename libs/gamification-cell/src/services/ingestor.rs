// libs/gamification-cell/src/services/ingestor.rs
use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_models::auth::UserRole;

use crate::error::GamificationResult;
use crate::models::{
    CounterDelta, DerivedAverages, DomainEvent, RatingScores, StatCounter, UserStatistics,
};
use crate::services::recalculator::{count_words, RecalculationPolicy, MENTION_MIN_SCORE};
use crate::services::store::{StatisticsStore, TurnLedger};

/// Overall scores at or below this count as low ratings.
pub const LOW_RATING_MAX_SCORE: u8 = 2;

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Row as returned by the atomic increment.
    pub statistics: UserStatistics,
    pub rating_checkpoint_crossed: bool,
}

fn clamp_score(score: Option<u8>) -> Option<u8> {
    score.map(|s| s.clamp(1, 5))
}

/// Deltas for one rating. Missing component scores add nothing.
pub fn rating_deltas(scores: &RatingScores) -> Vec<CounterDelta> {
    let mut deltas = vec![CounterDelta::one(StatCounter::TotalRatingsReceived)];

    let components = [
        (scores.communication, StatCounter::CommunicationMentions),
        (scores.empathy, StatCounter::EmpathyMentions),
        (scores.punctuality, StatCounter::PunctualityMentions),
    ];
    for (score, counter) in components {
        if clamp_score(score).is_some_and(|s| s >= MENTION_MIN_SCORE) {
            deltas.push(CounterDelta::one(counter));
        }
    }

    if let Some(overall) = clamp_score(scores.overall) {
        deltas.push(CounterDelta::one(StatCounter::RatedCount));
        deltas.push(CounterDelta::by(StatCounter::RatingScoreSum, u64::from(overall)));
        if overall <= LOW_RATING_MAX_SCORE {
            deltas.push(CounterDelta::one(StatCounter::LowRatingCount));
        }
    }

    deltas
}

pub struct EventIngestor {
    statistics: Arc<dyn StatisticsStore>,
    turns: Arc<dyn TurnLedger>,
    policy: RecalculationPolicy,
}

impl EventIngestor {
    pub fn new(
        statistics: Arc<dyn StatisticsStore>,
        turns: Arc<dyn TurnLedger>,
        policy: RecalculationPolicy,
    ) -> Self {
        Self {
            statistics,
            turns,
            policy,
        }
    }

    /// Apply one event to the user's counters. Failures are logged and
    /// swallowed; `None` means nothing was recorded.
    pub async fn handle(&self, user_id: Uuid, role: UserRole, event: &DomainEvent) -> Option<IngestOutcome> {
        match self.try_handle(user_id, role, event).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Failed to ingest {} for {} {}: {}", event.kind(), role, user_id, e);
                None
            }
        }
    }

    async fn try_handle(
        &self,
        user_id: Uuid,
        role: UserRole,
        event: &DomainEvent,
    ) -> GamificationResult<IngestOutcome> {
        debug!("Ingesting {} for {} {}", event.kind(), role, user_id);

        let deltas = match event {
            DomainEvent::RatingAdded(scores) => rating_deltas(scores),
            DomainEvent::TurnCompleted { counterparty_id } => {
                self.turn_completed_deltas(user_id, role, *counterparty_id).await
            }
            DomainEvent::TurnCancelled => vec![
                CounterDelta::one(StatCounter::TotalTurnsCancelled),
                CounterDelta::one(StatCounter::CancellationsLast90Days),
            ],
            DomainEvent::TurnNoShow => vec![CounterDelta::one(StatCounter::TotalTurnsNoShow)],
            DomainEvent::DocumentAdded { text } => vec![
                CounterDelta::one(StatCounter::TotalDocumentsWritten),
                CounterDelta::by(StatCounter::DocumentedWordsWindow, count_words(text.as_deref())),
            ],
            DomainEvent::ModifyRequestHandled { response_minutes } => {
                let mut deltas = vec![CounterDelta::one(StatCounter::TotalModifyRequestsHandled)];
                if let Some(minutes) = response_minutes {
                    deltas.push(CounterDelta::by(StatCounter::TotalResponseMinutes, u64::from(*minutes)));
                    deltas.push(CounterDelta::one(StatCounter::TimedResponses));
                }
                deltas
            }
            DomainEvent::FileUploaded => vec![CounterDelta::one(StatCounter::TotalFilesUploaded)],
            DomainEvent::AdvanceBookingMade => vec![CounterDelta::one(StatCounter::TotalAdvanceBookings)],
            DomainEvent::RatingGiven => vec![CounterDelta::one(StatCounter::TotalRatingsGiven)],
        };

        let mut statistics = self.statistics.apply_delta(user_id, role, &deltas).await?;

        let derived = self.derived_after(event, &statistics);
        if !derived.is_empty() {
            match self.statistics.write_derived(user_id, &derived).await {
                Ok(()) => statistics.apply_derived(&derived),
                Err(e) => warn!("Failed to update averages for {}: {}", user_id, e),
            }
        }

        let rating_checkpoint_crossed = match event {
            DomainEvent::RatingAdded(_) => {
                let after = statistics.total_ratings_received();
                self.policy.checkpoint_crossed(after.saturating_sub(1), after)
            }
            _ => false,
        };

        Ok(IngestOutcome {
            statistics: statistics.normalized(),
            rating_checkpoint_crossed,
        })
    }

    /// The ledger already holds the completed turn, so a pair count of one
    /// means this is the first turn between the two parties.
    async fn turn_completed_deltas(&self, user_id: Uuid, role: UserRole, counterparty_id: Uuid) -> Vec<CounterDelta> {
        let mut deltas = vec![
            CounterDelta::one(StatCounter::TotalTurnsCompleted),
            CounterDelta::one(StatCounter::TurnsLast90Days),
        ];

        match self.turns.completed_turns_between(user_id, role, counterparty_id).await {
            Ok(pair_count) if pair_count <= 1 => {
                deltas.push(CounterDelta::one(StatCounter::unique_counterparts(role)));
            }
            Ok(_) => deltas.push(CounterDelta::one(StatCounter::returning_counterparts(role))),
            Err(e) => warn!(
                "Turn ledger unavailable for {} {}; counting the turn only: {}",
                role, user_id, e
            ),
        }

        deltas
    }

    fn derived_after(&self, event: &DomainEvent, statistics: &UserStatistics) -> DerivedAverages {
        let UserStatistics::Doctor(doctor) = statistics else {
            return DerivedAverages::default();
        };

        match event {
            DomainEvent::RatingAdded(RatingScores { overall: Some(_), .. }) if doctor.rated_count > 0 => {
                DerivedAverages {
                    avg_rating: Some(doctor.rating_score_sum as f64 / doctor.rated_count as f64),
                    ..DerivedAverages::default()
                }
            }
            DomainEvent::DocumentAdded { .. } => {
                // Windowed count from the last sweep, else the lifetime count
                // bounded by the window size.
                let denominator = if doctor.documented_entries_window > 0 {
                    doctor.documented_entries_window
                } else {
                    doctor.total_documents_written.min(self.policy.documentation_window_size)
                };
                let avg = if denominator == 0 {
                    0.0
                } else {
                    doctor.documented_words_window as f64 / denominator as f64
                };
                DerivedAverages {
                    avg_words_per_document: Some(avg),
                    ..DerivedAverages::default()
                }
            }
            DomainEvent::ModifyRequestHandled { response_minutes: Some(_) } if doctor.timed_responses > 0 => {
                DerivedAverages {
                    avg_response_minutes: Some(
                        doctor.total_response_minutes as f64 / doctor.timed_responses as f64,
                    ),
                    ..DerivedAverages::default()
                }
            }
            _ => DerivedAverages::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(deltas: &[CounterDelta]) -> Vec<StatCounter> {
        deltas.iter().map(|d| d.counter).collect()
    }

    #[test]
    fn test_rating_without_scores_only_counts_the_rating() {
        let deltas = rating_deltas(&RatingScores::default());
        assert_eq!(counters(&deltas), vec![StatCounter::TotalRatingsReceived]);
    }

    #[test]
    fn test_rating_mentions_require_high_scores() {
        let deltas = rating_deltas(&RatingScores {
            overall: None,
            communication: Some(4),
            empathy: Some(3),
            punctuality: Some(5),
        });
        assert_eq!(
            counters(&deltas),
            vec![
                StatCounter::TotalRatingsReceived,
                StatCounter::CommunicationMentions,
                StatCounter::PunctualityMentions,
            ]
        );
    }

    #[test]
    fn test_overall_score_is_clamped() {
        let deltas = rating_deltas(&RatingScores { overall: Some(0), ..RatingScores::default() });
        assert!(deltas.contains(&CounterDelta::by(StatCounter::RatingScoreSum, 1)));
        assert!(deltas.contains(&CounterDelta::one(StatCounter::LowRatingCount)));

        let deltas = rating_deltas(&RatingScores { overall: Some(9), empathy: Some(9), ..RatingScores::default() });
        assert!(deltas.contains(&CounterDelta::by(StatCounter::RatingScoreSum, 5)));
        assert!(deltas.contains(&CounterDelta::one(StatCounter::EmpathyMentions)));
        assert!(!deltas.contains(&CounterDelta::one(StatCounter::LowRatingCount)));
    }
}
