use chrono::NaiveTime;
use tracing::debug;

use crate::models::{Availability, DayOfWeek, DaySchedule, ScheduleError};

fn default_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn default_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap()
}

fn default_break() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
    )
}

/// Business-hours template applied when a day is opened without times.
pub fn default_day(day_of_week: DayOfWeek) -> DaySchedule {
    let (break_start, break_end) = default_break();
    DaySchedule {
        day_of_week,
        available: true,
        start_time: Some(default_start()),
        end_time: Some(default_end()),
        break_start_time: Some(break_start),
        break_end_time: Some(break_end),
    }
}

/// Bring a submitted schedule into canonical form before validation.
///
/// Closed days are stripped of their time fields rather than trusting the
/// caller to have cleared them, and a day opened without any times gets the
/// business-hours template.
pub fn normalize(availability: &mut Availability) {
    for day in &mut availability.week_schedule {
        if !day.available {
            day.start_time = None;
            day.end_time = None;
            day.break_start_time = None;
            day.break_end_time = None;
        } else if day.start_time.is_none() && day.end_time.is_none() {
            debug!("Applying default working hours to {}", day.day_of_week);
            *day = default_day(day.day_of_week);
        }
    }
}

/// Check the weekly template invariants: all seven days present exactly
/// once, open days have an ordered working window, and any break window
/// lies inside it.
pub fn validate(availability: &Availability) -> Result<(), ScheduleError> {
    if availability.slot_duration == 0 {
        return Err(ScheduleError::InvalidSlotDuration);
    }

    for day_of_week in DayOfWeek::ALL {
        let count = availability
            .week_schedule
            .iter()
            .filter(|d| d.day_of_week == day_of_week)
            .count();
        if count == 0 {
            return Err(ScheduleError::MissingDay(day_of_week));
        }
        if count > 1 {
            return Err(ScheduleError::DuplicateDay(day_of_week));
        }
    }

    for day in &availability.week_schedule {
        validate_day(day)?;
    }

    Ok(())
}

fn validate_day(day: &DaySchedule) -> Result<(), ScheduleError> {
    if !day.available {
        let has_times = day.start_time.is_some()
            || day.end_time.is_some()
            || day.break_start_time.is_some()
            || day.break_end_time.is_some();
        if has_times {
            return Err(ScheduleError::ClosedDayWithTimes(day.day_of_week));
        }
        return Ok(());
    }

    let (start, end) = match (day.start_time, day.end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ScheduleError::MissingTimes(day.day_of_week)),
    };

    if start >= end {
        return Err(ScheduleError::InvalidTimeOrder(day.day_of_week));
    }

    match (day.break_start_time, day.break_end_time) {
        (None, None) => Ok(()),
        (Some(break_start), Some(break_end)) => {
            // An empty window is treated as "no break".
            if break_start == break_end {
                return Ok(());
            }
            if break_start < break_end && start <= break_start && break_end <= end {
                Ok(())
            } else {
                Err(ScheduleError::InvalidBreak(day.day_of_week))
            }
        }
        _ => Err(ScheduleError::IncompleteBreak(day.day_of_week)),
    }
}
