use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::DEFAULT_SLOT_CHECK_CONCURRENCY;
use shared_database::DatabaseError;

use crate::models::{
    AvailabilityError, Booking, ClockTime, DateOverride, NewBooking, SlotResolution,
    UnavailableReason,
};
use crate::services::bookings::{BookingStore, MAX_BOOKING_MINUTES};
use crate::services::clock::Clock;
use crate::services::overrides::OverrideStore;
use crate::services::schedule::ScheduleStore;
use crate::services::time_grid::generate_slots;

/// Open window for a date after merging the weekly entry with any override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveWindow {
    Open { start: ClockTime, end: ClockTime },
    Closed(UnavailableReason),
}

/// Turns schedules, overrides and bookings into bookable slots.
///
/// Holds no mutable state; every call reads the stores afresh. Dropping a
/// resolution future abandons its in-flight store calls.
pub struct AvailabilityResolver {
    schedules: Arc<dyn ScheduleStore>,
    overrides: Arc<dyn OverrideStore>,
    bookings: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    check_concurrency: usize,
}

impl AvailabilityResolver {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        overrides: Arc<dyn OverrideStore>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedules,
            overrides,
            bookings,
            clock,
            check_concurrency: DEFAULT_SLOT_CHECK_CONCURRENCY,
        }
    }

    /// Caps how many booking checks run at once for one resolution.
    pub fn with_check_concurrency(mut self, check_concurrency: usize) -> Self {
        self.check_concurrency = check_concurrency.max(1);
        self
    }

    /// Free slot start-times for `date`, in ascending order.
    pub async fn resolve_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<SlotResolution, AvailabilityError> {
        validate_duration(duration_minutes)?;
        validate_date(date)?;
        debug!("Resolving {}-minute slots for provider {} on {}", duration_minutes, provider_id, date);

        let now = self.clock.now();
        if date < now.date() {
            debug!("Requested date {} is before today", date);
            return Ok(SlotResolution::unavailable(UnavailableReason::DateInPast));
        }

        let (window_start, window_end) = match self.effective_window(provider_id, date).await? {
            EffectiveWindow::Open { start, end } => (start, end),
            EffectiveWindow::Closed(reason) => return Ok(SlotResolution::unavailable(reason)),
        };

        let candidates = generate_slots(window_start, window_end, duration_minutes);
        if candidates.is_empty() {
            return Ok(SlotResolution::unavailable(UnavailableReason::WindowTooSmall));
        }

        let upcoming: Vec<ClockTime> = candidates
            .into_iter()
            .filter(|slot| slot.on(date) > now)
            .collect();
        if upcoming.is_empty() {
            return Ok(SlotResolution::unavailable(UnavailableReason::DateInPast));
        }

        // `buffered` yields results in input order, so the output stays sorted.
        let checked: Vec<(ClockTime, bool)> = stream::iter(upcoming)
            .map(|slot| {
                let bookings = Arc::clone(&self.bookings);
                async move {
                    let free = bookings.is_slot_free(provider_id, slot.on(date), duration_minutes).await?;
                    Ok::<_, DatabaseError>((slot, free))
                }
            })
            .buffered(self.check_concurrency)
            .try_collect()
            .await?;

        let open: Vec<ClockTime> = checked
            .into_iter()
            .filter_map(|(slot, free)| free.then_some(slot))
            .collect();

        debug!("Found {} open slots for provider {} on {}", open.len(), provider_id, date);

        if open.is_empty() {
            return Ok(SlotResolution::unavailable(UnavailableReason::FullyBooked));
        }
        Ok(SlotResolution::open(open))
    }

    /// Final gate before a booking is persisted.
    ///
    /// The start must still be one of the date's grid slots and free; the store's
    /// atomic reserve settles any race that slips past the free check.
    pub async fn attempt_booking(
        &self,
        provider_id: Uuid,
        start_date_time: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<Booking, AvailabilityError> {
        validate_duration(duration_minutes)?;
        validate_date(start_date_time.date())?;
        let requested = ClockTime::try_from(start_date_time.time())?;

        if start_date_time <= self.clock.now() {
            return Err(AvailabilityError::Conflict(format!(
                "{} has already passed",
                start_date_time
            )));
        }

        let date = start_date_time.date();

        let on_grid = match self.effective_window(provider_id, date).await? {
            EffectiveWindow::Open { start, end } => {
                generate_slots(start, end, duration_minutes).contains(&requested)
            }
            EffectiveWindow::Closed(_) => false,
        };
        if !on_grid {
            warn!("Rejected booking for provider {} at {}: outside open window", provider_id, start_date_time);
            return Err(AvailabilityError::Conflict(format!(
                "{} is not an open slot for this provider",
                start_date_time
            )));
        }

        if !self.bookings.is_slot_free(provider_id, start_date_time, duration_minutes).await? {
            warn!("Rejected booking for provider {} at {}: slot occupied", provider_id, start_date_time);
            return Err(AvailabilityError::Conflict(format!(
                "{} has already been booked",
                start_date_time
            )));
        }

        let request = NewBooking {
            provider_id,
            start_date_time,
            duration_minutes,
        };

        match self.bookings.reserve(request).await {
            Ok(booking) => {
                info!("Booked provider {} at {} ({} minutes)", provider_id, start_date_time, duration_minutes);
                Ok(booking)
            }
            Err(DatabaseError::Conflict(msg)) => {
                warn!("Lost booking race for provider {} at {}: {}", provider_id, start_date_time, msg);
                Err(AvailabilityError::Conflict(msg))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merges the weekly entry and any override for `date` into one window.
    pub async fn effective_window(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<EffectiveWindow, AvailabilityError> {
        let day_of_week = date.weekday().num_days_from_sunday() as u8;

        let (exists, weekly, overrides) = tokio::try_join!(
            self.schedules.provider_exists(provider_id),
            self.schedules.schedule_for_day(provider_id, day_of_week),
            self.overrides.overrides_for_date(provider_id, date),
        )?;

        if !exists {
            return Err(DatabaseError::NotFound(format!("Provider {} not found", provider_id)).into());
        }

        if let Some(entry) = select_override(provider_id, date, &overrides) {
            debug!("Override {} applies to provider {} on {}", entry.id, provider_id, date);
            return Ok(if entry.is_available {
                EffectiveWindow::Open { start: entry.start_time, end: entry.end_time }
            } else {
                EffectiveWindow::Closed(UnavailableReason::DayClosed)
            });
        }

        Ok(match weekly {
            None => EffectiveWindow::Closed(UnavailableReason::NoScheduleConfigured),
            Some(schedule) if !schedule.is_available => EffectiveWindow::Closed(UnavailableReason::DayClosed),
            Some(schedule) => EffectiveWindow::Open { start: schedule.start_time, end: schedule.end_time },
        })
    }
}

/// Picks the override governing `date`. Duplicates predate the per-day unique
/// constraint; a closure among them wins, otherwise the earliest created.
fn select_override<'a>(
    provider_id: Uuid,
    date: NaiveDate,
    overrides: &'a [DateOverride],
) -> Option<&'a DateOverride> {
    let same_day: Vec<&DateOverride> = overrides.iter().filter(|entry| entry.date == date).collect();

    if same_day.len() > 1 {
        warn!("Provider {} has {} overrides for {}", provider_id, same_day.len(), date);
    }

    same_day
        .iter()
        .find(|entry| !entry.is_available)
        .or_else(|| same_day.iter().min_by_key(|entry| entry.created_at))
        .copied()
}

/// Calendar years the engine resolves. Keeps every booking interval, and the
/// one-day lookback used for overlap queries, inside chrono's range.
pub const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

pub fn validate_date(date: NaiveDate) -> Result<(), AvailabilityError> {
    if !SUPPORTED_YEARS.contains(&date.year()) {
        return Err(AvailabilityError::Validation(format!(
            "Date {} is outside the supported range (years {} to {})",
            date,
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        )));
    }
    Ok(())
}

pub fn validate_duration(duration_minutes: u32) -> Result<(), AvailabilityError> {
    if duration_minutes == 0 || duration_minutes > MAX_BOOKING_MINUTES {
        return Err(AvailabilityError::Validation(format!(
            "Duration must be between 1 and {} minutes",
            MAX_BOOKING_MINUTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike, Utc};
    use mockall::predicate::*;

    use crate::models::{BookingStatus, WeeklySchedule};
    use crate::services::bookings::MockBookingStore;
    use crate::services::clock::FixedClock;
    use crate::services::overrides::MockOverrideStore;
    use crate::services::schedule::MockScheduleStore;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn clock_at(at: NaiveDateTime) -> Arc<dyn Clock> {
        Arc::new(FixedClock(at))
    }

    fn week_before() -> Arc<dyn Clock> {
        clock_at((monday() - Duration::days(7)).and_hms_opt(8, 0, 0).unwrap())
    }

    fn time(raw: &str) -> ClockTime {
        raw.parse().unwrap()
    }

    fn weekly(provider_id: Uuid, start: &str, end: &str, is_available: bool) -> WeeklySchedule {
        WeeklySchedule {
            id: Uuid::new_v4(),
            provider_id,
            day_of_week: 1,
            start_time: time(start),
            end_time: time(end),
            is_available,
            updated_at: Utc::now(),
        }
    }

    fn override_entry(provider_id: Uuid, start: &str, end: &str, is_available: bool) -> DateOverride {
        DateOverride {
            id: Uuid::new_v4(),
            provider_id,
            date: monday(),
            start_time: time(start),
            end_time: time(end),
            is_available,
            reason: None,
            created_at: Utc::now(),
        }
    }

    fn schedule_mock(schedule: Option<WeeklySchedule>) -> MockScheduleStore {
        let mut schedules = MockScheduleStore::new();
        schedules.expect_provider_exists().returning(|_| Ok(true));
        schedules
            .expect_schedule_for_day()
            .with(always(), eq(1u8))
            .returning(move |_, _| Ok(schedule.clone()));
        schedules
    }

    fn override_mock(entries: Vec<DateOverride>) -> MockOverrideStore {
        let mut overrides = MockOverrideStore::new();
        overrides
            .expect_overrides_for_date()
            .returning(move |_, _| Ok(entries.clone()));
        overrides
    }

    fn resolver(
        schedules: MockScheduleStore,
        overrides: MockOverrideStore,
        bookings: MockBookingStore,
        clock: Arc<dyn Clock>,
    ) -> AvailabilityResolver {
        AvailabilityResolver::new(Arc::new(schedules), Arc::new(overrides), Arc::new(bookings), clock)
    }

    #[tokio::test]
    async fn test_filters_booked_candidates() {
        let provider_id = Uuid::new_v4();
        let booked = monday().and_hms_opt(9, 0, 0).unwrap();

        let mut bookings = MockBookingStore::new();
        bookings
            .expect_is_slot_free()
            .returning(move |_, start, _| Ok(start != booked));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.labels(), vec!["09:30"]);
        assert_eq!(resolution.reason, None);
    }

    #[tokio::test]
    async fn test_past_date_skips_every_store() {
        let resolver = resolver(
            MockScheduleStore::new(),
            MockOverrideStore::new(),
            MockBookingStore::new(),
            clock_at((monday() + Duration::days(1)).and_hms_opt(0, 0, 1).unwrap()),
        );

        let resolution = resolver.resolve_slots(Uuid::new_v4(), monday(), 30).await.unwrap();
        assert!(resolution.is_empty());
        assert_eq!(resolution.reason, Some(UnavailableReason::DateInPast));
    }

    #[tokio::test]
    async fn test_closed_override_beats_open_weekly_entry() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().never();

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "17:00", true))),
            override_mock(vec![override_entry(provider_id, "09:00", "17:00", false)]),
            bookings,
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert!(resolution.is_empty());
        assert_eq!(resolution.reason, Some(UnavailableReason::DayClosed));
    }

    #[tokio::test]
    async fn test_open_override_replaces_window() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().times(2).returning(|_, _, _| Ok(true));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "17:00", true))),
            override_mock(vec![override_entry(provider_id, "18:00", "19:00", true)]),
            bookings,
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.labels(), vec!["18:00", "18:30"]);
    }

    #[tokio::test]
    async fn test_open_override_on_unscheduled_day() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().returning(|_, _, _| Ok(true));

        let resolver = resolver(
            schedule_mock(None),
            override_mock(vec![override_entry(provider_id, "10:00", "11:00", true)]),
            bookings,
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 60).await.unwrap();
        assert_eq!(resolution.labels(), vec!["10:00"]);
    }

    #[tokio::test]
    async fn test_missing_and_closed_weekly_entries() {
        let provider_id = Uuid::new_v4();

        let missing = resolver(schedule_mock(None), override_mock(vec![]), MockBookingStore::new(), week_before());
        let resolution = missing.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.reason, Some(UnavailableReason::NoScheduleConfigured));

        let closed = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "17:00", false))),
            override_mock(vec![]),
            MockBookingStore::new(),
            week_before(),
        );
        let resolution = closed.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.reason, Some(UnavailableReason::DayClosed));
    }

    #[tokio::test]
    async fn test_inverted_window_is_too_small() {
        let provider_id = Uuid::new_v4();
        let resolver = resolver(
            schedule_mock(None),
            override_mock(vec![override_entry(provider_id, "12:00", "12:00", true)]),
            MockBookingStore::new(),
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.reason, Some(UnavailableReason::WindowTooSmall));
    }

    #[tokio::test]
    async fn test_all_taken_is_fully_booked() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().times(2).returning(|_, _, _| Ok(false));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.reason, Some(UnavailableReason::FullyBooked));
    }

    #[tokio::test]
    async fn test_today_only_checks_future_candidates() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings
            .expect_is_slot_free()
            .withf(|_, start, _| start.time() > chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap())
            .times(2)
            .returning(|_, _, _| Ok(true));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "11:00", true))),
            override_mock(vec![]),
            bookings,
            clock_at(monday().and_hms_opt(9, 30, 0).unwrap()),
        );

        // 09:30 itself is not strictly in the future.
        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.labels(), vec!["10:00", "10:30"]);
    }

    #[tokio::test]
    async fn test_elapsed_window_today_reports_past() {
        let provider_id = Uuid::new_v4();
        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            MockBookingStore::new(),
            clock_at(monday().and_hms_opt(18, 0, 0).unwrap()),
        );

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.reason, Some(UnavailableReason::DateInPast));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings
            .expect_is_slot_free()
            .returning(|_, _, _| Err(DatabaseError::Unavailable("timeout".to_string())));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let err = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let mut schedules = MockScheduleStore::new();
        schedules.expect_provider_exists().returning(|_| Ok(false));
        schedules.expect_schedule_for_day().returning(|_, _| Ok(None));

        let resolver = resolver(schedules, override_mock(vec![]), MockBookingStore::new(), week_before());

        let err = resolver.resolve_slots(Uuid::new_v4(), monday(), 30).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_duration_is_rejected_before_store_access() {
        let resolver = resolver(
            MockScheduleStore::new(),
            MockOverrideStore::new(),
            MockBookingStore::new(),
            week_before(),
        );

        let err = resolver.resolve_slots(Uuid::new_v4(), monday(), 0).await.unwrap_err();
        assert!(matches!(err, AvailabilityError::Validation(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_dates_are_rejected_before_store_access() {
        let resolver = resolver(
            MockScheduleStore::new(),
            MockOverrideStore::new(),
            MockBookingStore::new(),
            week_before(),
        );

        let err = resolver.resolve_slots(Uuid::new_v4(), NaiveDate::MAX, 60).await.unwrap_err();
        assert!(matches!(err, AvailabilityError::Validation(_)));

        let last_hour = NaiveDate::MAX.and_hms_opt(23, 0, 0).unwrap();
        let err = resolver.attempt_booking(Uuid::new_v4(), last_hour, 60).await.unwrap_err();
        assert!(matches!(err, AvailabilityError::Validation(_)));

        let far_future = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert!(validate_date(far_future).is_err());
        assert!(validate_date(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_attempt_booking_with_seconds_is_rejected() {
        let resolver = resolver(
            MockScheduleStore::new(),
            MockOverrideStore::new(),
            MockBookingStore::new(),
            week_before(),
        );

        let err = resolver
            .attempt_booking(Uuid::new_v4(), monday().and_hms_opt(9, 0, 30).unwrap(), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Validation(_)));
    }

    #[tokio::test]
    async fn test_attempt_booking_off_grid_is_conflict() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_reserve().never();

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let err = resolver
            .attempt_booking(provider_id, monday().and_hms_opt(9, 15, 0).unwrap(), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_attempt_booking_lost_race_is_conflict() {
        let provider_id = Uuid::new_v4();
        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().returning(|_, _, _| Ok(true));
        bookings
            .expect_reserve()
            .times(1)
            .returning(|_| Err(DatabaseError::Conflict("taken".to_string())));

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let err = resolver
            .attempt_booking(provider_id, monday().and_hms_opt(9, 30, 0).unwrap(), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_attempt_booking_commits_free_slot() {
        let provider_id = Uuid::new_v4();
        let start = monday().and_hms_opt(9, 0, 0).unwrap();

        let mut bookings = MockBookingStore::new();
        bookings.expect_is_slot_free().returning(|_, _, _| Ok(true));
        bookings.expect_reserve().times(1).returning(|request| {
            Ok(Booking {
                id: Uuid::new_v4(),
                provider_id: request.provider_id,
                start_date_time: request.start_date_time,
                duration_minutes: request.duration_minutes,
                status: BookingStatus::Scheduled,
                created_at: Utc::now(),
            })
        });

        let resolver = resolver(
            schedule_mock(Some(weekly(provider_id, "09:00", "10:00", true))),
            override_mock(vec![]),
            bookings,
            week_before(),
        );

        let booking = resolver.attempt_booking(provider_id, start, 30).await.unwrap();
        assert_eq!(booking.start_date_time, start);
        assert_eq!(booking.status, BookingStatus::Scheduled);
    }

    #[test]
    fn test_duplicate_overrides_prefer_closure() {
        let provider_id = Uuid::new_v4();
        let open = override_entry(provider_id, "09:00", "12:00", true);
        let closed = override_entry(provider_id, "09:00", "17:00", false);
        let entries = vec![open, closed.clone()];

        let selected = select_override(provider_id, monday(), &entries).unwrap();
        assert_eq!(selected.id, closed.id);
    }

    /// Answers later slots first so completion order differs from grid order.
    struct SlowBookings {
        booked: NaiveDateTime,
        completed: std::sync::Mutex<Vec<NaiveDateTime>>,
    }

    #[async_trait::async_trait]
    impl BookingStore for SlowBookings {
        async fn active_bookings(
            &self,
            _provider_id: Uuid,
            _from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<Booking>, DatabaseError> {
            Ok(vec![])
        }

        async fn reserve(&self, _booking: NewBooking) -> Result<Booking, DatabaseError> {
            Err(DatabaseError::Unavailable("read-only store".to_string()))
        }

        async fn is_slot_free(
            &self,
            _provider_id: Uuid,
            start: NaiveDateTime,
            _duration_minutes: u32,
        ) -> Result<bool, DatabaseError> {
            let minutes = start.time().num_seconds_from_midnight() as u64 / 60;
            tokio::time::sleep(std::time::Duration::from_millis((11 * 60 - minutes) * 2)).await;
            self.completed.lock().unwrap().push(start);
            Ok(start != self.booked)
        }
    }

    #[tokio::test]
    async fn test_slots_keep_grid_order_when_checks_finish_out_of_order() {
        let provider_id = Uuid::new_v4();
        let bookings = Arc::new(SlowBookings {
            booked: monday().and_hms_opt(9, 30, 0).unwrap(),
            completed: std::sync::Mutex::new(Vec::new()),
        });

        let resolver = AvailabilityResolver::new(
            Arc::new(schedule_mock(Some(weekly(provider_id, "09:00", "11:00", true)))),
            Arc::new(override_mock(vec![])),
            bookings.clone(),
            week_before(),
        )
        .with_check_concurrency(4);

        let resolution = resolver.resolve_slots(provider_id, monday(), 30).await.unwrap();
        assert_eq!(resolution.labels(), vec!["09:00", "10:00", "10:30"]);

        let completed = bookings.completed.lock().unwrap().clone();
        assert_eq!(completed.len(), 4);
        assert!(completed.windows(2).any(|pair| pair[0] > pair[1]));
    }
}
