use std::sync::Arc;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    /// Points the stores at a mock server, e.g. `wiremock::MockServer::uri()`.
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
            store_timeout_secs: 5,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            slot_check_concurrency: 4,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Row shapes as PostgREST returns them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn provider_response(provider_id: &str) -> serde_json::Value {
        json!({ "id": provider_id })
    }

    pub fn weekly_schedule_response(
        provider_id: &str,
        day_of_week: u8,
        start_time: &str,
        end_time: &str,
        is_available: bool,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_available": is_available,
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn override_response(
        provider_id: &str,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        is_available: bool,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "date": date.format("%Y-%m-%d").to_string(),
            "start_time": start_time,
            "end_time": end_time,
            "is_available": is_available,
            "reason": null,
            "created_at": Utc::now().to_rfc3339()
        })
    }

    pub fn booking_response(
        provider_id: &str,
        start_date_time: NaiveDateTime,
        duration_minutes: u32,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "start_date_time": start_date_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "duration_minutes": duration_minutes,
            "status": status,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
