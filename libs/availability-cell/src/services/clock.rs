use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use tracing::warn;

/// Source of the clinic-local current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock shifted into the clinic's fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("Invalid clinic UTC offset of {} minutes, falling back to UTC", utc_offset_minutes);
                Self::utc_offset()
            });
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Self::utc_offset() }
    }

    fn utc_offset() -> FixedOffset {
        Utc.fix()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
