use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            ..AppConfig::default()
        }
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: UserRole::Patient,
            is_active: true,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            is_active: true,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, UserRole::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, UserRole::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, UserRole::Admin)
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            role: Some(self.role.as_str().to_string()),
            is_active: self.is_active,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn profile_response(user: &TestUser) -> serde_json::Value {
        json!({
            "id": user.id,
            "email": user.email,
            "role": user.role.as_str(),
            "is_active": user.is_active,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_statistics_response(user_id: Uuid) -> serde_json::Value {
        json!({
            "user_id": user_id,
            "total_turns_completed": 12,
            "total_turns_cancelled": 1,
            "total_ratings_received": 49,
            "rated_count": 40,
            "rating_score_sum": 180,
            "low_rating_count": 2,
            "unique_patients": 9,
            "returning_patients": 3,
            "total_documents_written": 10,
            "communication_mentions": 12,
            "empathy_mentions": 8,
            "punctuality_mentions": 5,
            "avg_rating": 4.5,
            "badge_progress": {},
            "last_evaluated_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_statistics_response(user_id: Uuid) -> serde_json::Value {
        json!({
            "user_id": user_id,
            "total_turns_completed": 1,
            "total_turns_cancelled": 0,
            "total_turns_no_show": 0,
            "total_ratings_given": 0,
            "unique_doctors": 1,
            "returning_doctors": 0,
            "badge_progress": {},
            "last_evaluated_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn user_badge_response(user_id: Uuid, badge_type: &str, is_active: bool) -> serde_json::Value {
        json!({
            "user_id": user_id,
            "badge_type": badge_type,
            "is_active": is_active,
            "earned_at": "2024-02-01T10:00:00Z",
            "last_evaluated_at": "2024-02-01T10:00:00Z"
        })
    }

    pub fn rating_response(score: u8, subcategory: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "score": score,
            "subcategory": subcategory,
            "created_at": "2024-03-01T09:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
