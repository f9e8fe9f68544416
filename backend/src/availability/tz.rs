//! Named-zone time arithmetic.
//!
//! All wall-clock math goes through the IANA database, never fixed offsets, so
//! daylight-saving days resolve correctly.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest stretch of non-existent local time we walk across.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Parse an IANA zone name such as `Asia/Kolkata`.
pub fn parse_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Resolve a wall-clock time in `tz` to an absolute instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times that do
/// not exist (clocks going forward) move to the first instant after the gap.
pub fn localize(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return dt;
    }

    let mut probe = local;
    for _ in 0..MAX_GAP_MINUTES {
        probe += Duration::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt;
        }
    }

    tracing::warn!("No valid local time near {} in {}, reading it as UTC", local, tz);
    tz.from_utc_datetime(&local)
}

/// Instant of `hour:minute` on `date` in `tz`.
pub fn local_instant(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    localize(tz, date.and_time(time)).with_timezone(&Utc)
}

/// First and last instants of `date` in `tz`, both inclusive.
pub fn day_bounds(tz: &Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_instant(tz, date, 0, 0);
    let end = match date.succ_opt() {
        Some(next) => local_instant(tz, next, 0, 0) - Duration::milliseconds(1),
        None => start + Duration::days(1) - Duration::milliseconds(1),
    };
    (start, end)
}

/// Calendar date of `instant` as seen in `tz`.
pub fn local_date(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
///
/// Intervals that only touch at an endpoint do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// 12-hour local label, e.g. `09:00 AM - 10:00 AM`.
pub fn format_range(tz: &Tz, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{} - {}",
        start.with_timezone(tz).format("%I:%M %p"),
        end.with_timezone(tz).format("%I:%M %p")
    )
}
