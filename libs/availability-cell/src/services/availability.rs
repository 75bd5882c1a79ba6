use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    AvailabilityError, Booking, CreateOverrideRequest, DateOverride, NewDateOverride,
    SlotResolution, UpsertWeeklyScheduleRequest, WeeklySchedule,
};
use crate::services::bookings::{BookingStore, SupabaseBookingStore};
use crate::services::clock::{Clock, SystemClock};
use crate::services::overrides::{OverrideStore, SupabaseOverrideStore};
use crate::services::resolver::AvailabilityResolver;
use crate::services::schedule::{
    resolve_entry_times, validate_day_of_week, ScheduleStore, SupabaseScheduleStore,
};

/// Request-scoped entry point behind the HTTP handlers.
pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleStore>,
    overrides: Arc<dyn OverrideStore>,
    resolver: AvailabilityResolver,
}

impl AvailabilityService {
    /// Supabase-backed service; `auth_token` is forwarded so row-level security applies.
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let token = auth_token.map(str::to_string);

        Self::with_stores(
            Arc::new(SupabaseScheduleStore::new(Arc::clone(&supabase), token.clone())),
            Arc::new(SupabaseOverrideStore::new(Arc::clone(&supabase), token.clone())),
            Arc::new(SupabaseBookingStore::new(supabase, token)),
            Arc::new(SystemClock::new(config.clinic_utc_offset_minutes)),
            config.slot_check_concurrency,
        )
    }

    pub fn with_stores(
        schedules: Arc<dyn ScheduleStore>,
        overrides: Arc<dyn OverrideStore>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        check_concurrency: usize,
    ) -> Self {
        let resolver = AvailabilityResolver::new(
            Arc::clone(&schedules),
            Arc::clone(&overrides),
            bookings,
            clock,
        )
        .with_check_concurrency(check_concurrency);

        Self {
            schedules,
            overrides,
            resolver,
        }
    }

    pub fn resolver(&self) -> &AvailabilityResolver {
        &self.resolver
    }

    pub async fn get_available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<SlotResolution, AvailabilityError> {
        self.resolver.resolve_slots(provider_id, date, duration_minutes).await
    }

    pub async fn get_weekly_schedule(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<WeeklySchedule>, AvailabilityError> {
        self.ensure_provider(provider_id).await?;
        Ok(self.schedules.weekly_schedule(provider_id).await?)
    }

    /// Creates or replaces the provider's entry for one weekday.
    pub async fn upsert_weekly_schedule(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
        request: UpsertWeeklyScheduleRequest,
    ) -> Result<WeeklySchedule, AvailabilityError> {
        validate_day_of_week(day_of_week)?;
        let (start_time, end_time) =
            resolve_entry_times(request.start_time, request.end_time, request.is_available)?;

        self.ensure_provider(provider_id).await?;

        let schedule = self
            .schedules
            .upsert(provider_id, day_of_week, start_time, end_time, request.is_available)
            .await?;

        info!(
            "Saved weekly schedule for provider {} on day {}: {}-{} (available: {})",
            provider_id, day_of_week, start_time, end_time, request.is_available
        );
        Ok(schedule)
    }

    pub async fn delete_weekly_schedule(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
    ) -> Result<(), AvailabilityError> {
        validate_day_of_week(day_of_week)?;
        self.schedules.delete(provider_id, day_of_week).await?;
        info!("Removed weekly schedule for provider {} on day {}", provider_id, day_of_week);
        Ok(())
    }

    pub async fn get_overrides(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DateOverride>, AvailabilityError> {
        if start_date > end_date {
            return Err(AvailabilityError::Validation(
                "start_date must not be after end_date".to_string(),
            ));
        }
        Ok(self.overrides.overrides_in_range(provider_id, start_date, end_date).await?)
    }

    pub async fn create_override(
        &self,
        provider_id: Uuid,
        request: CreateOverrideRequest,
    ) -> Result<DateOverride, AvailabilityError> {
        let (start_time, end_time) =
            resolve_entry_times(request.start_time, request.end_time, request.is_available)?;

        self.ensure_provider(provider_id).await?;

        let entry = NewDateOverride {
            date: request.date,
            start_time,
            end_time,
            is_available: request.is_available,
            reason: request.reason,
        };

        let created = self.overrides.create(provider_id, entry).await?;
        info!(
            "Created override {} for provider {} on {} (available: {})",
            created.id, provider_id, created.date, created.is_available
        );
        Ok(created)
    }

    pub async fn delete_override(
        &self,
        provider_id: Uuid,
        override_id: Uuid,
    ) -> Result<(), AvailabilityError> {
        self.overrides.delete(provider_id, override_id).await?;
        info!("Removed override {} for provider {}", override_id, provider_id);
        Ok(())
    }

    pub async fn attempt_booking(
        &self,
        provider_id: Uuid,
        start_date_time: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<Booking, AvailabilityError> {
        self.resolver
            .attempt_booking(provider_id, start_date_time, duration_minutes)
            .await
    }

    async fn ensure_provider(&self, provider_id: Uuid) -> Result<(), AvailabilityError> {
        if !self.schedules.provider_exists(provider_id).await? {
            debug!("Provider {} does not exist", provider_id);
            return Err(DatabaseError::NotFound(format!("Provider {} not found", provider_id)).into());
        }
        Ok(())
    }
}
