use crate::models::{AvailabilityError, ClockTime};

/// Candidate slot start-times from `start`, stepping by `duration_minutes`.
///
/// A slot is emitted whenever its start is strictly before `end`; its own end is
/// allowed to run past `end`. `start >= end` or a zero duration yields no slots.
pub fn generate_slots(start: ClockTime, end: ClockTime, duration_minutes: u32) -> Vec<ClockTime> {
    if duration_minutes == 0 || start >= end {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut current = Some(start);

    while let Some(slot) = current {
        if slot >= end {
            break;
        }
        slots.push(slot);
        current = slot.checked_add_minutes(duration_minutes);
    }

    slots
}

/// String form of [`generate_slots`] for `HH:MM` inputs.
pub fn generate_slot_labels(
    start: &str,
    end: &str,
    duration_minutes: u32,
) -> Result<Vec<String>, AvailabilityError> {
    let start: ClockTime = start.parse()?;
    let end: ClockTime = end.parse()?;

    Ok(generate_slots(start, end, duration_minutes)
        .into_iter()
        .map(|slot| slot.to_string())
        .collect())
}
