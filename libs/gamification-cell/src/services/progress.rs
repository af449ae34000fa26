// libs/gamification-cell/src/services/progress.rs
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{catalog_for, BadgeDefinition};
use crate::models::{BadgeProgress, BadgeType, UserStatistics};

/// Highest percentage a badge that is not active can show.
pub const MAX_UNEARNED_PROGRESS: f64 = 99.0;

pub const STATUS_EARNED: &str = "earned";
pub const STATUS_ALMOST_THERE: &str = "almost there";
pub const STATUS_HALFWAY: &str = "halfway";
pub const STATUS_GOOD_PROGRESS: &str = "good progress";
pub const STATUS_JUST_STARTING: &str = "just starting";

pub fn badge_percentage(
    definition: &BadgeDefinition,
    stats: &UserStatistics,
    active: &BTreeSet<BadgeType>,
) -> f64 {
    if active.contains(&definition.badge_type) {
        return 100.0;
    }
    definition
        .formula_progress(stats)
        .unwrap_or(0.0)
        .clamp(0.0, MAX_UNEARNED_PROGRESS)
}

/// Percentage per badge in the user's catalog. Active badges are always 100.
pub fn calculate_progress(stats: &UserStatistics, active: &BTreeSet<BadgeType>) -> BTreeMap<BadgeType, f64> {
    catalog_for(stats.role())
        .iter()
        .map(|def| (def.badge_type, badge_percentage(def, stats, active)))
        .collect()
}

pub fn status_message(earned: bool, percentage: f64) -> &'static str {
    if earned {
        STATUS_EARNED
    } else if percentage >= 75.0 {
        STATUS_ALMOST_THERE
    } else if percentage >= 50.0 {
        STATUS_HALFWAY
    } else if percentage >= 25.0 {
        STATUS_GOOD_PROGRESS
    } else {
        STATUS_JUST_STARTING
    }
}

/// Progress rows in catalog order.
pub fn progress_report(stats: &UserStatistics, active: &BTreeSet<BadgeType>) -> Vec<BadgeProgress> {
    catalog_for(stats.role())
        .iter()
        .map(|def| {
            let earned = active.contains(&def.badge_type);
            let percentage = badge_percentage(def, stats, active);
            BadgeProgress {
                badge_type: def.badge_type,
                name: def.name.to_string(),
                category: def.category,
                percentage,
                earned,
                status_message: status_message(earned, percentage).to_string(),
            }
        })
        .collect()
}
