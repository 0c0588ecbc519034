//! Timezone-aware calendar-day conversion.
//!
//! Observation timestamps are `time::OffsetDateTime`; day bucketing happens in
//! the deployment's civil timezone, which `chrono-tz` models. This module is
//! the only place the two time stacks meet.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use time::{Date, Month, OffsetDateTime, UtcOffset};

/// Calendar date of `at` in the timezone `tz`.
///
/// Sub-second precision is irrelevant for day bucketing, so a timestamp whose
/// nanosecond component cannot be represented falls back to whole seconds.
pub(crate) fn civil_date(at: OffsetDateTime, tz: Tz) -> Date {
    let utc = at.to_offset(UtcOffset::UTC);
    let base = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
        .or_else(|| DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), 0))
        .expect("unix timestamp within chrono's representable range");
    let local = tz.from_utc_datetime(&base.naive_utc());

    let month = Month::try_from(local.month() as u8).expect("chrono months are 1..=12");
    let day = u8::try_from(local.day()).expect("chrono days are 1..=31");
    Date::from_calendar_date(local.year(), month, day).expect("chrono produced a valid civil date")
}
