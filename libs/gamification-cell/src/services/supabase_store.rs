// libs/gamification-cell/src/services/supabase_store.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::auth::UserRole;

use crate::error::{GamificationError, GamificationResult};
use crate::models::{
    BadgeRecord, BadgeType, CounterDelta, DerivedAverages, DoctorStatistics, PatientStatistics,
    UserStatistics, WindowedValues,
};
use crate::services::store::{BadgeStore, StatisticsStore};

const BADGES_TABLE: &str = "user_badges";

fn statistics_table(role: UserRole) -> GamificationResult<&'static str> {
    match role {
        UserRole::Doctor => Ok("doctor_statistics"),
        UserRole::Patient => Ok("patient_statistics"),
        UserRole::Admin => Err(GamificationError::RoleMismatch {
            user_id: Uuid::nil(),
            role: role.to_string(),
        }),
    }
}

fn increment_function(role: UserRole) -> &'static str {
    match role {
        UserRole::Doctor => "increment_doctor_statistics",
        _ => "increment_patient_statistics",
    }
}

fn parse_row(role: UserRole, row: Value) -> GamificationResult<UserStatistics> {
    let stats = match role {
        UserRole::Doctor => UserStatistics::Doctor(serde_json::from_value::<DoctorStatistics>(row)?),
        _ => UserStatistics::Patient(serde_json::from_value::<PatientStatistics>(row)?),
    };
    Ok(stats.normalized())
}

/// Column patch for the windowed groups present in `values`.
fn windowed_patch(role: UserRole, values: &WindowedValues) -> Map<String, Value> {
    let mut patch = Map::new();

    if let Some(turns) = &values.turns {
        patch.insert("turns_last_90_days".into(), json!(turns.completed));
        patch.insert("cancellations_last_90_days".into(), json!(turns.cancelled));
    }

    match role {
        UserRole::Doctor => {
            if let Some(ratings) = &values.ratings {
                patch.insert("communication_mentions".into(), json!(ratings.communication));
                patch.insert("empathy_mentions".into(), json!(ratings.empathy));
                patch.insert("punctuality_mentions".into(), json!(ratings.punctuality));
            }
            if let Some(docs) = &values.documentation {
                patch.insert("documented_entries_window".into(), json!(docs.entries));
                patch.insert("documented_words_window".into(), json!(docs.words));
                patch.insert("avg_words_per_document".into(), json!(docs.avg_words));
            }
            if let Some(availability) = &values.availability {
                patch.insert("available_days_per_week".into(), json!(availability.enabled_days));
                patch.insert("weekly_available_minutes".into(), json!(availability.weekly_minutes));
            }
            if let Some(unique) = values.unique_counterparts {
                patch.insert("unique_patients".into(), json!(unique));
            }
        }
        _ => {
            if let Some(unique) = values.unique_counterparts {
                patch.insert("unique_doctors".into(), json!(unique));
            }
        }
    }

    patch
}

/// Statistics and badge persistence over PostgREST.
pub struct SupabaseGamificationStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseGamificationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn token(&self) -> Option<&str> {
        self.supabase.service_token()
    }

    fn prefer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static(value));
        headers
    }

    async fn patch_row(&self, user_id: Uuid, role: UserRole, patch: Value) -> GamificationResult<()> {
        let path = format!("/rest/v1/{}?user_id=eq.{}", statistics_table(role)?, user_id);
        self.supabase
            .execute(Method::PATCH, &path, self.token(), Some(patch))
            .await
            .map_err(GamificationError::storage)
    }
}

#[async_trait]
impl StatisticsStore for SupabaseGamificationStore {
    async fn get_or_create(&self, user_id: Uuid, role: UserRole) -> GamificationResult<UserStatistics> {
        let table = statistics_table(role)?;
        debug!("Getting or creating {} row for user: {}", table, user_id);

        let now = Utc::now().to_rfc3339();
        let body = json!({
            "user_id": user_id,
            "badge_progress": {},
            "created_at": now,
            "updated_at": now
        });
        let path = format!("/rest/v1/{}?on_conflict=user_id", table);

        let created: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                self.token(),
                Some(body),
                Some(Self::prefer("resolution=ignore-duplicates,return=representation")),
            )
            .await
            .map_err(GamificationError::storage)?;

        if let Some(row) = created.into_iter().next() {
            return parse_row(role, row);
        }

        // The row already existed, so the insert was ignored.
        self.read(user_id, role)
            .await?
            .ok_or_else(|| GamificationError::Storage(format!("{} row for {} vanished", table, user_id)))
    }

    async fn apply_delta(
        &self,
        user_id: Uuid,
        role: UserRole,
        deltas: &[CounterDelta],
    ) -> GamificationResult<UserStatistics> {
        let mut named = Map::new();
        for delta in deltas {
            if !delta.counter.applies_to(role) {
                return Err(GamificationError::InvalidData {
                    counter: delta.counter.column().to_string(),
                    role: role.to_string(),
                });
            }
            let current = named.get(delta.counter.column()).and_then(Value::as_u64).unwrap_or(0);
            named.insert(delta.counter.column().to_string(), json!(current + delta.amount));
        }

        statistics_table(role)?;
        let rows: Vec<Value> = self
            .supabase
            .rpc(
                increment_function(role),
                self.token(),
                json!({ "p_user_id": user_id, "p_deltas": named }),
            )
            .await
            .map_err(GamificationError::storage)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| GamificationError::Storage(format!("{} returned no row", increment_function(role))))?;
        parse_row(role, row)
    }

    async fn read(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Option<UserStatistics>> {
        let path = format!("/rest/v1/{}?user_id=eq.{}", statistics_table(role)?, user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(GamificationError::storage)?;

        rows.into_iter().next().map(|row| parse_row(role, row)).transpose()
    }

    async fn replace_windowed(
        &self,
        user_id: Uuid,
        role: UserRole,
        values: &WindowedValues,
    ) -> GamificationResult<()> {
        let mut patch = windowed_patch(role, values);
        if patch.is_empty() {
            return Ok(());
        }
        patch.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        self.patch_row(user_id, role, Value::Object(patch)).await
    }

    async fn write_derived(&self, user_id: Uuid, derived: &DerivedAverages) -> GamificationResult<()> {
        if derived.is_empty() {
            return Ok(());
        }

        let mut patch = Map::new();
        if let Some(avg) = derived.avg_rating {
            patch.insert("avg_rating".into(), json!(avg));
        }
        if let Some(avg) = derived.avg_words_per_document {
            patch.insert("avg_words_per_document".into(), json!(avg));
        }
        if let Some(avg) = derived.avg_response_minutes {
            patch.insert("avg_response_minutes".into(), json!(avg));
        }
        self.patch_row(user_id, UserRole::Doctor, Value::Object(patch)).await
    }

    async fn write_progress(
        &self,
        user_id: Uuid,
        role: UserRole,
        progress: &BTreeMap<BadgeType, f64>,
        evaluated_at: DateTime<Utc>,
    ) -> GamificationResult<()> {
        let patch = json!({
            "badge_progress": progress,
            "last_evaluated_at": evaluated_at.to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });
        self.patch_row(user_id, role, patch).await
    }
}

#[async_trait]
impl BadgeStore for SupabaseGamificationStore {
    async fn list_for_user(&self, user_id: Uuid) -> GamificationResult<Vec<BadgeRecord>> {
        let path = format!("/rest/v1/{}?user_id=eq.{}&order=earned_at.asc", BADGES_TABLE, user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(GamificationError::storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<BadgeRecord>(row) {
                Ok(record) => records.push(record),
                // Badge types retired from the catalog are ignored.
                Err(e) => warn!("Skipping unreadable badge row for {}: {}", user_id, e),
            }
        }
        Ok(records)
    }

    async fn upsert(&self, record: &BadgeRecord) -> GamificationResult<BadgeRecord> {
        let path = format!("/rest/v1/{}?on_conflict=user_id,badge_type", BADGES_TABLE);
        let body = serde_json::to_value(record)?;

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                self.token(),
                Some(body),
                Some(Self::prefer("resolution=merge-duplicates,return=representation")),
            )
            .await
            .map_err(GamificationError::storage)?;

        match rows.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Ok(record.clone()),
        }
    }
}
