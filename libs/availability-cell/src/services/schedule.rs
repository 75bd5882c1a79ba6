use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{AvailabilityError, ClockTime, WeeklySchedule, DEFAULT_END_TIME, DEFAULT_START_TIME};

/// Recurring weekly availability, at most one record per (provider, day of week).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, DatabaseError>;

    /// All entries for the provider, ordered by day of week.
    async fn weekly_schedule(&self, provider_id: Uuid) -> Result<Vec<WeeklySchedule>, DatabaseError>;

    async fn schedule_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<WeeklySchedule>, DatabaseError>;

    /// Insert or overwrite the entry keyed on (provider, day of week).
    async fn upsert(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
        start_time: ClockTime,
        end_time: ClockTime,
        is_available: bool,
    ) -> Result<WeeklySchedule, DatabaseError>;

    async fn delete(&self, provider_id: Uuid, day_of_week: u8) -> Result<(), DatabaseError>;
}

pub fn validate_day_of_week(day_of_week: u8) -> Result<(), AvailabilityError> {
    if day_of_week > 6 {
        return Err(AvailabilityError::Validation(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the times to persist for a schedule or override entry.
///
/// Unavailable entries fall back to 09:00-17:00 when times are omitted; available
/// entries need both times with start before end.
pub fn resolve_entry_times(
    start_time: Option<ClockTime>,
    end_time: Option<ClockTime>,
    is_available: bool,
) -> Result<(ClockTime, ClockTime), AvailabilityError> {
    if !is_available {
        return Ok((
            start_time.unwrap_or(DEFAULT_START_TIME),
            end_time.unwrap_or(DEFAULT_END_TIME),
        ));
    }

    match (start_time, end_time) {
        (Some(start), Some(end)) if start < end => Ok((start, end)),
        (Some(_), Some(_)) => Err(AvailabilityError::Validation(
            "Start time must be before end time".to_string(),
        )),
        _ => Err(AvailabilityError::Validation(
            "Start and end times are required when available".to_string(),
        )),
    }
}

pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseScheduleStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/providers?id=eq.{}&select=id", provider_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await?;

        Ok(!result.is_empty())
    }

    async fn weekly_schedule(&self, provider_id: Uuid) -> Result<Vec<WeeklySchedule>, DatabaseError> {
        debug!("Fetching weekly schedule for provider: {}", provider_id);

        let path = format!(
            "/rest/v1/weekly_schedules?provider_id=eq.{}&order=day_of_week.asc",
            provider_id
        );
        self.supabase.request(Method::GET, &path, self.auth_token.as_deref(), None).await
    }

    async fn schedule_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<WeeklySchedule>, DatabaseError> {
        let path = format!(
            "/rest/v1/weekly_schedules?provider_id=eq.{}&day_of_week=eq.{}",
            provider_id, day_of_week
        );
        let mut result: Vec<WeeklySchedule> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await?;

        // The (provider_id, day_of_week) unique index keeps this at one row.
        Ok(if result.is_empty() { None } else { Some(result.swap_remove(0)) })
    }

    async fn upsert(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
        start_time: ClockTime,
        end_time: ClockTime,
        is_available: bool,
    ) -> Result<WeeklySchedule, DatabaseError> {
        debug!("Upserting schedule for provider {} on day {}", provider_id, day_of_week);

        let schedule_data = json!({
            "provider_id": provider_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_available": is_available,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let mut result: Vec<WeeklySchedule> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/weekly_schedules?on_conflict=provider_id,day_of_week",
            self.auth_token.as_deref(),
            Some(schedule_data),
            Some(headers),
        ).await?;

        if result.is_empty() {
            return Err(DatabaseError::Decode("Upsert returned no schedule row".to_string()));
        }

        Ok(result.swap_remove(0))
    }

    async fn delete(&self, provider_id: Uuid, day_of_week: u8) -> Result<(), DatabaseError> {
        debug!("Deleting schedule for provider {} on day {}", provider_id, day_of_week);

        let path = format!(
            "/rest/v1/weekly_schedules?provider_id=eq.{}&day_of_week=eq.{}",
            provider_id, day_of_week
        );
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            self.auth_token.as_deref(),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if result.is_empty() {
            return Err(DatabaseError::NotFound(format!(
                "No schedule for provider {} on day {}",
                provider_id, day_of_week
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_entry_gets_default_times() {
        let (start, end) = resolve_entry_times(None, None, false).unwrap();
        assert_eq!(start.to_string(), "09:00");
        assert_eq!(end.to_string(), "17:00");
    }

    #[test]
    fn test_available_entry_requires_ordered_times() {
        let nine = ClockTime::from_hm(9, 0);
        let five = ClockTime::from_hm(17, 0);

        assert!(resolve_entry_times(nine, five, true).is_ok());
        assert!(matches!(
            resolve_entry_times(five, nine, true),
            Err(AvailabilityError::Validation(_))
        ));
        assert!(matches!(
            resolve_entry_times(nine, None, true),
            Err(AvailabilityError::Validation(_))
        ));
    }

    #[test]
    fn test_day_of_week_bounds() {
        assert!(validate_day_of_week(0).is_ok());
        assert!(validate_day_of_week(6).is_ok());
        assert!(validate_day_of_week(7).is_err());
    }
}
