use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{day_bounds, DateOverride, NewDateOverride};

/// Date-specific availability exceptions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Overrides whose day falls in `start_date..=end_date`.
    async fn overrides_in_range(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DateOverride>, DatabaseError>;

    /// Fails with [`DatabaseError::Conflict`] if the provider already has an override that day.
    async fn create(
        &self,
        provider_id: Uuid,
        entry: NewDateOverride,
    ) -> Result<DateOverride, DatabaseError>;

    /// Removes the override only if it belongs to `provider_id`; otherwise [`DatabaseError::NotFound`].
    async fn delete(&self, provider_id: Uuid, override_id: Uuid) -> Result<(), DatabaseError>;

    async fn overrides_for_date(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<DateOverride>, DatabaseError> {
        let overrides = self.overrides_in_range(provider_id, date, date).await?;
        Ok(overrides.into_iter().filter(|entry| entry.date == date).collect())
    }
}

pub struct SupabaseOverrideStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseOverrideStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl OverrideStore for SupabaseOverrideStore {
    async fn overrides_in_range(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DateOverride>, DatabaseError> {
        debug!("Fetching overrides for provider {} from {} to {}", provider_id, start_date, end_date);

        let (range_start, range_end) = day_bounds(start_date, end_date);
        let path = format!(
            "/rest/v1/schedule_overrides?provider_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,created_at.asc",
            provider_id,
            range_start.format("%Y-%m-%dT%H:%M:%S%.3f"),
            range_end.format("%Y-%m-%dT%H:%M:%S%.3f"),
        );

        self.supabase.request(Method::GET, &path, self.auth_token.as_deref(), None).await
    }

    async fn create(
        &self,
        provider_id: Uuid,
        entry: NewDateOverride,
    ) -> Result<DateOverride, DatabaseError> {
        debug!("Creating override for provider {} on {}", provider_id, entry.date);

        // The unique index on (provider_id, date) is authoritative; this gives a clearer message.
        let existing = self.overrides_for_date(provider_id, entry.date).await?;
        if !existing.is_empty() {
            warn!("Override already exists for provider {} on {}", provider_id, entry.date);
            return Err(DatabaseError::Conflict(format!(
                "An override already exists for {}",
                entry.date
            )));
        }

        let override_data = json!({
            "provider_id": provider_id,
            "date": entry.date,
            "start_time": entry.start_time,
            "end_time": entry.end_time,
            "is_available": entry.is_available,
            "reason": entry.reason,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut result: Vec<DateOverride> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/schedule_overrides",
            self.auth_token.as_deref(),
            Some(override_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if result.is_empty() {
            return Err(DatabaseError::Decode("Insert returned no override row".to_string()));
        }

        Ok(result.swap_remove(0))
    }

    async fn delete(&self, provider_id: Uuid, override_id: Uuid) -> Result<(), DatabaseError> {
        debug!("Deleting override {} for provider {}", override_id, provider_id);

        let path = format!(
            "/rest/v1/schedule_overrides?provider_id=eq.{}&id=eq.{}",
            provider_id, override_id
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
                "Override {} not found for provider {}",
                override_id, provider_id
            )));
        }

        Ok(())
    }
}
