//! In-process store implementations.
//!
//! Each store guards its records with a single async lock, which makes
//! [`InMemoryBookingStore::reserve`] atomic with respect to concurrent callers.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Booking, BookingStatus, ClockTime, DateOverride, NewBooking, NewDateOverride, WeeklySchedule};
use crate::services::bookings::BookingStore;
use crate::services::overrides::OverrideStore;
use crate::services::schedule::ScheduleStore;

#[derive(Default)]
pub struct InMemoryScheduleStore {
    providers: RwLock<HashSet<Uuid>>,
    entries: RwLock<BTreeMap<(Uuid, u8), WeeklySchedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(providers: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            providers: RwLock::new(providers.into_iter().collect()),
            entries: RwLock::default(),
        }
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.providers.read().await.contains(&provider_id))
    }

    async fn weekly_schedule(&self, provider_id: Uuid) -> Result<Vec<WeeklySchedule>, DatabaseError> {
        let entries = self.entries.read().await;
        // BTreeMap order on (provider, day) yields day-of-week order.
        Ok(entries
            .range((provider_id, 0)..=(provider_id, u8::MAX))
            .map(|(_, schedule)| schedule.clone())
            .collect())
    }

    async fn schedule_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<WeeklySchedule>, DatabaseError> {
        Ok(self.entries.read().await.get(&(provider_id, day_of_week)).cloned())
    }

    async fn upsert(
        &self,
        provider_id: Uuid,
        day_of_week: u8,
        start_time: ClockTime,
        end_time: ClockTime,
        is_available: bool,
    ) -> Result<WeeklySchedule, DatabaseError> {
        let mut entries = self.entries.write().await;

        let schedule = entries
            .entry((provider_id, day_of_week))
            .and_modify(|existing| {
                existing.start_time = start_time;
                existing.end_time = end_time;
                existing.is_available = is_available;
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| WeeklySchedule {
                id: Uuid::new_v4(),
                provider_id,
                day_of_week,
                start_time,
                end_time,
                is_available,
                updated_at: Utc::now(),
            });

        Ok(schedule.clone())
    }

    async fn delete(&self, provider_id: Uuid, day_of_week: u8) -> Result<(), DatabaseError> {
        self.entries
            .write()
            .await
            .remove(&(provider_id, day_of_week))
            .map(|_| ())
            .ok_or_else(|| {
                DatabaseError::NotFound(format!(
                    "No schedule for provider {} on day {}",
                    provider_id, day_of_week
                ))
            })
    }
}

#[derive(Default)]
pub struct InMemoryOverrideStore {
    entries: RwLock<Vec<DateOverride>>,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn overrides_in_range(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DateOverride>, DatabaseError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<DateOverride> = entries
            .iter()
            .filter(|entry| {
                entry.provider_id == provider_id && entry.date >= start_date && entry.date <= end_date
            })
            .cloned()
            .collect();
        matching.sort_by_key(|entry| (entry.date, entry.created_at));
        Ok(matching)
    }

    async fn create(
        &self,
        provider_id: Uuid,
        entry: NewDateOverride,
    ) -> Result<DateOverride, DatabaseError> {
        let mut entries = self.entries.write().await;

        if entries.iter().any(|existing| existing.provider_id == provider_id && existing.date == entry.date) {
            return Err(DatabaseError::Conflict(format!(
                "An override already exists for {}",
                entry.date
            )));
        }

        let created = DateOverride {
            id: Uuid::new_v4(),
            provider_id,
            date: entry.date,
            start_time: entry.start_time,
            end_time: entry.end_time,
            is_available: entry.is_available,
            reason: entry.reason,
            created_at: Utc::now(),
        };
        entries.push(created.clone());

        Ok(created)
    }

    async fn delete(&self, provider_id: Uuid, override_id: Uuid) -> Result<(), DatabaseError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !(entry.id == override_id && entry.provider_id == provider_id));

        if entries.len() == before {
            return Err(DatabaseError::NotFound(format!(
                "Override {} not found for provider {}",
                override_id, provider_id
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: Mutex<Vec<Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a booking as-is, bypassing the overlap check.
    pub async fn insert(
        &self,
        provider_id: Uuid,
        start_date_time: NaiveDateTime,
        duration_minutes: u32,
        status: BookingStatus,
    ) -> Booking {
        let booking = Booking {
            id: Uuid::new_v4(),
            provider_id,
            start_date_time,
            duration_minutes,
            status,
            created_at: Utc::now(),
        };
        self.bookings.lock().await.push(booking.clone());
        booking
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.bookings.lock().await.clone()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn active_bookings(
        &self,
        provider_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Booking>, DatabaseError> {
        let bookings = self.bookings.lock().await;
        let mut active: Vec<Booking> = bookings
            .iter()
            .filter(|booking| {
                booking.provider_id == provider_id
                    && booking.status.occupies_calendar()
                    && booking.start_date_time < to
                    && booking.end_date_time() > from
            })
            .cloned()
            .collect();
        active.sort_by_key(|booking| booking.start_date_time);
        Ok(active)
    }

    async fn reserve(&self, request: NewBooking) -> Result<Booking, DatabaseError> {
        let mut bookings = self.bookings.lock().await;

        let taken = bookings.iter().any(|existing| {
            existing.provider_id == request.provider_id
                && existing.status.occupies_calendar()
                && existing.overlaps(request.start_date_time, request.duration_minutes)
        });
        if taken {
            return Err(DatabaseError::Conflict(format!(
                "Provider {} is already booked at {}",
                request.provider_id, request.start_date_time
            )));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            start_date_time: request.start_date_time,
            duration_minutes: request.duration_minutes,
            status: BookingStatus::Scheduled,
            created_at: Utc::now(),
        };
        bookings.push(booking.clone());

        Ok(booking)
    }
}
