use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{end_of, Booking, NewBooking, MINUTES_PER_DAY};

/// Longest booking the engine accepts; bounds how far back an overlapping booking can start.
pub const MAX_BOOKING_MINUTES: u32 = MINUTES_PER_DAY;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Existing calendar occupancy for providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Scheduled or confirmed bookings overlapping `[from, to)`, ordered by start.
    async fn active_bookings(
        &self,
        provider_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Booking>, DatabaseError>;

    /// Atomically inserts the booking unless an active booking overlaps it,
    /// in which case [`DatabaseError::Conflict`] is returned and nothing is written.
    async fn reserve(&self, booking: NewBooking) -> Result<Booking, DatabaseError>;

    /// Whether `[start, start + duration)` is clear of active bookings. Takes no locks.
    async fn is_slot_free(
        &self,
        provider_id: Uuid,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<bool, DatabaseError> {
        let end = end_of(start, duration_minutes);
        let bookings = self.active_bookings(provider_id, start, end).await?;

        Ok(!bookings.iter().any(|booking| {
            booking.status.occupies_calendar() && booking.overlaps(start, duration_minutes)
        }))
    }
}

pub struct SupabaseBookingStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseBookingStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl BookingStore for SupabaseBookingStore {
    async fn active_bookings(
        &self,
        provider_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Booking>, DatabaseError> {
        debug!("Fetching active bookings for provider {} between {} and {}", provider_id, from, to);

        // Only the start is stored, so widen the lower bound by the longest possible booking.
        let earliest_start = from
            .checked_sub_signed(Duration::minutes(MAX_BOOKING_MINUTES as i64))
            .unwrap_or(NaiveDateTime::MIN);
        let lower = earliest_start.format(TIMESTAMP_FORMAT).to_string();
        let upper = to.format(TIMESTAMP_FORMAT).to_string();
        let path = format!(
            "/rest/v1/bookings?provider_id=eq.{}&status=in.(scheduled,confirmed)&start_date_time=gt.{}&start_date_time=lt.{}&order=start_date_time.asc",
            provider_id,
            urlencoding::encode(&lower),
            urlencoding::encode(&upper),
        );

        let bookings: Vec<Booking> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await?;

        Ok(bookings
            .into_iter()
            .filter(|booking| {
                booking.status.occupies_calendar() && booking.start_date_time < to && booking.end_date_time() > from
            })
            .collect())
    }

    async fn reserve(&self, booking: NewBooking) -> Result<Booking, DatabaseError> {
        debug!(
            "Reserving {} minutes for provider {} at {}",
            booking.duration_minutes, booking.provider_id, booking.start_date_time
        );

        // The database function checks for overlap and inserts in one transaction,
        // raising a conflict (HTTP 409) when the interval is taken.
        let body = json!({
            "p_provider_id": booking.provider_id,
            "p_start_date_time": booking.start_date_time.format(TIMESTAMP_FORMAT).to_string(),
            "p_duration_minutes": booking.duration_minutes
        });

        self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/reserve_booking_slot",
            self.auth_token.as_deref(),
            Some(body),
        ).await
    }
}
