// libs/gamification-cell/src/services/platform.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::auth::{User, UserRole};

use crate::error::{GamificationError, GamificationResult};
use crate::models::{
    DaySchedule, DocumentRecord, RatingRecord, TimeRange, TurnWindowCounts, WeeklySchedule,
};
use crate::services::store::{
    DocumentLedger, DoctorProfileSource, PeerRanking, RatingLedger, TurnLedger, UserDirectory,
};

/// (own column, counterpart column) in `appointments` for a role.
fn appointment_columns(role: UserRole) -> (&'static str, &'static str) {
    match role {
        UserRole::Doctor => ("doctor_id", "patient_id"),
        _ => ("patient_id", "doctor_id"),
    }
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    score: Option<f64>,
    subcategory: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl RatingRow {
    fn into_record(self) -> RatingRecord {
        let score = self
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.floor().clamp(1.0, 5.0) as u8)
            .unwrap_or(1);
        RatingRecord {
            score,
            subcategory: self.subcategory,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MedicalHistoryRow {
    notes: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityRow {
    day_of_week: u8,
    #[serde(default)]
    is_available: bool,
    morning_start_time: Option<String>,
    morning_end_time: Option<String>,
    afternoon_start_time: Option<String>,
    afternoon_end_time: Option<String>,
}

/// Accepts a plain `HH:MM[:SS]` time or a full timestamp.
fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.time()))
}

fn time_range(start: Option<&str>, end: Option<&str>) -> Option<TimeRange> {
    let start = parse_time(start?)?;
    let end = parse_time(end?)?;
    Some(TimeRange { start, end })
}

impl AvailabilityRow {
    fn into_day(self) -> DaySchedule {
        let ranges = [
            time_range(self.morning_start_time.as_deref(), self.morning_end_time.as_deref()),
            time_range(self.afternoon_start_time.as_deref(), self.afternoon_end_time.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect();

        DaySchedule {
            day_of_week: self.day_of_week,
            is_available: self.is_available,
            ranges,
        }
    }
}

/// Read-only platform collaborators backed by the Supabase tables owned by
/// the other cells.
pub struct SupabaseCollaborators {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseCollaborators {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn get_rows(&self, path: &str) -> GamificationResult<Vec<Value>> {
        self.supabase
            .request(Method::GET, path, self.supabase.service_token(), None)
            .await
            .map_err(GamificationError::external)
    }
}

#[async_trait]
impl UserDirectory for SupabaseCollaborators {
    async fn find_user(&self, user_id: Uuid) -> GamificationResult<Option<User>> {
        debug!("Looking up profile: {}", user_id);
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=id,email,role,is_active,created_at",
            user_id
        );
        let rows = self.get_rows(&path).await?;

        rows.into_iter()
            .next()
            .map(serde_json::from_value::<User>)
            .transpose()
            .map_err(GamificationError::from)
    }
}

#[async_trait]
impl TurnLedger for SupabaseCollaborators {
    async fn completed_turns_between(
        &self,
        user_id: Uuid,
        role: UserRole,
        counterparty_id: Uuid,
    ) -> GamificationResult<u64> {
        let (own, other) = appointment_columns(role);
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&{}=eq.{}&status=eq.completed&select=id",
            own, user_id, other, counterparty_id
        );
        Ok(self.get_rows(&path).await?.len() as u64)
    }

    async fn distinct_counterparts(&self, user_id: Uuid, role: UserRole) -> GamificationResult<Vec<Uuid>> {
        let (own, other) = appointment_columns(role);
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&status=eq.completed&select={}",
            own, user_id, other
        );
        let rows = self.get_rows(&path).await?;

        let mut seen = HashSet::new();
        let counterparts = rows
            .iter()
            .filter_map(|row| row.get(other).and_then(Value::as_str))
            .filter_map(|raw| Uuid::parse_str(raw).ok())
            .filter(|id| seen.insert(*id))
            .collect();
        Ok(counterparts)
    }

    async fn turns_since(
        &self,
        user_id: Uuid,
        role: UserRole,
        since: DateTime<Utc>,
    ) -> GamificationResult<TurnWindowCounts> {
        let (own, _) = appointment_columns(role);
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&appointment_date=gte.{}&status=in.(completed,cancelled)&select=status",
            own,
            user_id,
            since.format("%Y-%m-%dT%H:%M:%SZ")
        );
        let rows = self.get_rows(&path).await?;

        let mut counts = TurnWindowCounts::default();
        for row in &rows {
            match row.get("status").and_then(Value::as_str) {
                Some("completed") => counts.completed += 1,
                Some("cancelled") => counts.cancelled += 1,
                _ => {}
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RatingLedger for SupabaseCollaborators {
    async fn recent_ratings(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<RatingRecord>> {
        let path = format!(
            "/rest/v1/ratings?doctor_id=eq.{}&select=score,subcategory,created_at&order=created_at.desc&limit={}",
            doctor_id, limit
        );
        let rows = self.get_rows(&path).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let parsed: RatingRow = serde_json::from_value(row)?;
            records.push(parsed.into_record());
        }
        Ok(records)
    }
}

#[async_trait]
impl DocumentLedger for SupabaseCollaborators {
    async fn recent_documents(&self, doctor_id: Uuid, limit: u64) -> GamificationResult<Vec<DocumentRecord>> {
        let path = format!(
            "/rest/v1/medical_history?doctor_id=eq.{}&select=notes,created_at&order=created_at.desc&limit={}",
            doctor_id, limit
        );
        let rows = self.get_rows(&path).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let parsed: MedicalHistoryRow = serde_json::from_value(row)?;
            records.push(DocumentRecord {
                text: parsed.notes,
                created_at: parsed.created_at,
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl DoctorProfileSource for SupabaseCollaborators {
    async fn weekly_schedule(&self, doctor_id: Uuid) -> GamificationResult<Option<WeeklySchedule>> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&order=day_of_week.asc",
            doctor_id
        );
        let rows = self.get_rows(&path).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut days = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<AvailabilityRow>(row) {
                Ok(parsed) => days.push(parsed.into_day()),
                Err(e) => warn!("Skipping malformed availability row for doctor {}: {}", doctor_id, e),
            }
        }
        Ok(Some(WeeklySchedule { days }))
    }
}

#[async_trait]
impl PeerRanking for SupabaseCollaborators {
    async fn rating_percentile(&self, doctor_id: Uuid) -> GamificationResult<Option<f64>> {
        let value: Value = self
            .supabase
            .rpc(
                "doctor_rating_percentile",
                self.supabase.service_token(),
                json!({ "p_doctor_id": doctor_id }),
            )
            .await
            .map_err(GamificationError::external)?;

        Ok(value.as_f64().filter(|p| p.is_finite()).map(|p| p.clamp(0.0, 100.0)))
    }
}
