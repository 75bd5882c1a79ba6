use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Stored for unavailable days when the caller omits explicit times.
pub const DEFAULT_START_TIME: ClockTime = ClockTime(9 * 60);
pub const DEFAULT_END_TIME: ClockTime = ClockTime(17 * 60);

// ==============================================================================
// CLOCK TIME
// ==============================================================================

/// A wall-clock time of day with minute precision, rendered as zero-padded `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

fn clock_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Postgres `time` columns come back as HH:MM:SS; only whole minutes are accepted.
    PATTERN.get_or_init(|| {
        Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])(?::00)?$").expect("valid clock time pattern")
    })
}

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then(|| Self(minutes as u16))
    }

    pub fn minutes(self) -> u32 {
        self.0 as u32
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    /// `None` once the sum would reach or pass midnight.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<Self> {
        Self::from_minutes(self.minutes().checked_add(minutes)?)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = AvailabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = clock_time_pattern()
            .captures(s.trim())
            .ok_or_else(|| AvailabilityError::Validation(format!("'{}' is not a valid HH:MM time", s)))?;

        let hour: u32 = captures[1].parse().unwrap_or_default();
        let minute: u32 = captures[2].parse().unwrap_or_default();

        ClockTime::from_hm(hour, minute)
            .ok_or_else(|| AvailabilityError::Validation(format!("'{}' is out of range", s)))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = AvailabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Only whole-minute times convert; seconds or sub-seconds are rejected.
impl TryFrom<NaiveTime> for ClockTime {
    type Error = AvailabilityError;

    fn try_from(value: NaiveTime) -> Result<Self, Self::Error> {
        if value.second() != 0 || value.nanosecond() != 0 {
            return Err(AvailabilityError::Validation(format!(
                "{} is not on a whole minute",
                value
            )));
        }
        Ok(Self((value.hour() * 60 + value.minute()) as u16))
    }
}

// ==============================================================================
// STORED RECORDS
// ==============================================================================

/// Recurring availability for one day of the week. `day_of_week` is 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub day_of_week: u8,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_available: bool,
    pub updated_at: DateTime<Utc>,
}

/// Single-date exception that replaces the weekly entry for `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateOverride {
    pub id: Uuid,
    pub provider_id: Uuid,
    #[serde(deserialize_with = "deserialize_calendar_day")]
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_available: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDateOverride {
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_available: bool,
    pub reason: Option<String>,
}

/// Accepts a plain date or a full timestamp and keeps only the calendar day.
fn deserialize_calendar_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    normalize_calendar_day(&raw).map_err(serde::de::Error::custom)
}

pub fn normalize_calendar_day(raw: &str) -> Result<NaiveDate, AvailabilityError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.naive_local().date());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|timestamp| timestamp.date())
        .map_err(|_| AvailabilityError::Validation(format!("'{}' is not a calendar date", raw)))
}

/// Inclusive timestamp bounds covering whole days: `00:00:00.000` .. `23:59:59.999`.
pub fn day_bounds(start_date: NaiveDate, end_date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = start_date.and_time(NaiveTime::MIN);
    let end = end_date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN));
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Only scheduled and confirmed bookings hold their time on the calendar.
    pub fn occupies_calendar(self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reserved interval. Timestamps are clinic-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub start_date_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn end_date_time(&self) -> NaiveDateTime {
        end_of(self.start_date_time, self.duration_minutes)
    }

    pub fn overlaps(&self, start: NaiveDateTime, duration_minutes: u32) -> bool {
        intervals_overlap(
            self.start_date_time,
            self.duration_minutes,
            start,
            duration_minutes,
        )
    }
}

/// Half-open interval test: `[s1, s1+d1)` and `[s2, s2+d2)` conflict iff `s1 < s2+d2 && s2 < s1+d1`.
pub fn intervals_overlap(s1: NaiveDateTime, d1: u32, s2: NaiveDateTime, d2: u32) -> bool {
    s1 < end_of(s2, d2) && s2 < end_of(s1, d1)
}

/// End of `[start, start + minutes)`, saturating at the last representable instant.
pub fn end_of(start: NaiveDateTime, duration_minutes: u32) -> NaiveDateTime {
    start
        .checked_add_signed(Duration::minutes(duration_minutes as i64))
        .unwrap_or(NaiveDateTime::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub provider_id: Uuid,
    pub start_date_time: NaiveDateTime,
    pub duration_minutes: u32,
}

// ==============================================================================
// REQUEST / RESPONSE DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertWeeklyScheduleRequest {
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOverrideRequest {
    pub date: NaiveDate,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub is_available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptBookingRequest {
    pub start_date_time: NaiveDateTime,
    pub duration_minutes: u32,
}

/// Why a resolution came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
    NoScheduleConfigured,
    DayClosed,
    WindowTooSmall,
    FullyBooked,
    DateInPast,
}

impl UnavailableReason {
    pub fn code(self) -> &'static str {
        match self {
            UnavailableReason::NoScheduleConfigured => "no-schedule-configured",
            UnavailableReason::DayClosed => "day-closed",
            UnavailableReason::WindowTooSmall => "window-too-small",
            UnavailableReason::FullyBooked => "fully-booked",
            UnavailableReason::DateInPast => "date-in-past",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            UnavailableReason::NoScheduleConfigured => "The provider has not configured a schedule for this day",
            UnavailableReason::DayClosed => "The provider is not available on this date",
            UnavailableReason::WindowTooSmall => "The open window is too short for the requested duration",
            UnavailableReason::FullyBooked => "All slots on this date are already taken",
            UnavailableReason::DateInPast => "Availability is not offered for past dates or times",
        }
    }
}

/// Outcome of one resolution call: the open slots, or why there are none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotResolution {
    pub slots: Vec<ClockTime>,
    pub reason: Option<UnavailableReason>,
}

impl SlotResolution {
    pub fn open(slots: Vec<ClockTime>) -> Self {
        Self { slots, reason: None }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self { slots: Vec::new(), reason: Some(reason) }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().map(ToString::to_string).collect()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot no longer available: {0}")]
    Conflict(String),

    #[error("Resolution failed: {0}")]
    ResolutionFailed(#[from] DatabaseError),
}

impl AvailabilityError {
    pub const CONFLICT_CODE: &'static str = "slot-no-longer-available";

    /// Safe to retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AvailabilityError::ResolutionFailed(e) if e.is_transient())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AvailabilityError::ResolutionFailed(DatabaseError::NotFound(_)))
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::Conflict(msg) => AppError::Conflict {
                code: AvailabilityError::CONFLICT_CODE.to_string(),
                message: msg,
            },
            AvailabilityError::ResolutionFailed(db) => match db {
                DatabaseError::NotFound(msg) => AppError::NotFound(msg),
                DatabaseError::Unauthorized(msg) => AppError::Auth(msg),
                DatabaseError::Conflict(msg) => AppError::Conflict {
                    code: "conflict".to_string(),
                    message: msg,
                },
                DatabaseError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
                DatabaseError::Rejected(msg) | DatabaseError::Decode(msg) => AppError::Database(msg),
            },
        }
    }
}
