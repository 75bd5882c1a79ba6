pub mod availability;
pub mod bookings;
pub mod clock;
pub mod memory;
pub mod overrides;
pub mod resolver;
pub mod schedule;
pub mod time_grid;

pub use availability::AvailabilityService;
pub use bookings::{BookingStore, SupabaseBookingStore, MAX_BOOKING_MINUTES};
pub use clock::{Clock, FixedClock, SystemClock};
pub use memory::{InMemoryBookingStore, InMemoryOverrideStore, InMemoryScheduleStore};
pub use overrides::{OverrideStore, SupabaseOverrideStore};
pub use resolver::{AvailabilityResolver, EffectiveWindow};
pub use schedule::{ScheduleStore, SupabaseScheduleStore};
pub use time_grid::{generate_slot_labels, generate_slots};
