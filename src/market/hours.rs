//! Indian market-hours arithmetic.
//!
//! NSE trades 09:15-15:30 IST, Monday to Friday. Candle ranges are always
//! clamped to these windows so charts do not show dead air.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Timelike, Utc, Weekday};

use crate::types::{IST_OFFSET_SECS, MARKET_CLOSE_MINUTES, MARKET_OPEN_MINUTES};

/// IST fixed offset (+05:30). India has no DST.
pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is valid")
}

pub fn now_ist() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist_offset())
}

fn is_weekend(dt: &DateTime<FixedOffset>) -> bool {
    matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)
}

fn minutes_of_day(dt: &DateTime<FixedOffset>) -> u32 {
    dt.hour() * 60 + dt.minute()
}

/// True while the market is in session.
pub fn is_market_open(dt: &DateTime<FixedOffset>) -> bool {
    if is_weekend(dt) {
        return false;
    }
    let minutes = minutes_of_day(dt);
    (MARKET_OPEN_MINUTES..=MARKET_CLOSE_MINUTES).contains(&minutes)
}

fn at_minutes(dt: &DateTime<FixedOffset>, minutes: u32) -> DateTime<FixedOffset> {
    ist_offset()
        .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), minutes / 60, minutes % 60, 0)
        .single()
        .unwrap_or(*dt)
}

/// End bound for a candle fetch: now while the session runs, today's close
/// after hours, and the previous session's close before the open or on a
/// weekend.
pub fn market_end_time(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let mut dt = dt;

    while is_weekend(&dt) {
        dt = at_minutes(&(dt - Duration::days(1)), MARKET_CLOSE_MINUTES);
    }

    let open = at_minutes(&dt, MARKET_OPEN_MINUTES);
    let close = at_minutes(&dt, MARKET_CLOSE_MINUTES);

    if dt >= open && dt <= close {
        return dt;
    }
    if dt > close {
        return close;
    }

    // Before today's open: back up to the previous trading day's close
    let mut prev = dt - Duration::days(1);
    while is_weekend(&prev) {
        prev = prev - Duration::days(1);
    }
    at_minutes(&prev, MARKET_CLOSE_MINUTES)
}

/// Session open for the given date, rolled back off weekends.
pub fn market_start_time(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let mut dt = dt;
    while is_weekend(&dt) {
        dt = dt - Duration::days(1);
    }
    at_minutes(&dt, MARKET_OPEN_MINUTES)
}

/// Next weekly index expiry (Thursday) on or after the given date.
pub fn next_weekly_expiry(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let mut day = dt;
    while day.weekday() != Weekday::Thu {
        day = day + Duration::days(1);
    }
    day
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        ist_offset().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn session_bounds() {
        // 2025-06-11 is a Wednesday
        assert!(is_market_open(&ist(2025, 6, 11, 9, 15)));
        assert!(is_market_open(&ist(2025, 6, 11, 15, 30)));
        assert!(!is_market_open(&ist(2025, 6, 11, 9, 14)));
        assert!(!is_market_open(&ist(2025, 6, 11, 15, 31)));
        // Saturday
        assert!(!is_market_open(&ist(2025, 6, 14, 11, 0)));
    }

    #[test]
    fn end_time_during_session_is_now() {
        let now = ist(2025, 6, 11, 11, 0);
        assert_eq!(market_end_time(now), now);
    }

    #[test]
    fn end_time_after_close_snaps_to_close() {
        let evening = ist(2025, 6, 11, 20, 0);
        assert_eq!(market_end_time(evening), ist(2025, 6, 11, 15, 30));
    }

    #[test]
    fn end_time_before_open_uses_previous_session() {
        let early_monday = ist(2025, 6, 9, 8, 0);
        // Previous trading day is Friday 2025-06-06
        assert_eq!(market_end_time(early_monday), ist(2025, 6, 6, 15, 30));
    }

    #[test]
    fn end_time_on_weekend_uses_friday_close() {
        let sunday = ist(2025, 6, 8, 12, 0);
        assert_eq!(market_end_time(sunday), ist(2025, 6, 6, 15, 30));
    }

    #[test]
    fn start_time_rolls_off_weekend() {
        let saturday = ist(2025, 6, 14, 10, 0);
        assert_eq!(market_start_time(saturday), ist(2025, 6, 13, 9, 15));
    }

    #[test]
    fn weekly_expiry_is_thursday() {
        let monday = ist(2025, 6, 9, 10, 0);
        let expiry = next_weekly_expiry(monday);
        assert_eq!(expiry.weekday(), Weekday::Thu);
        assert_eq!(expiry.day(), 12);
        // A Thursday maps to itself
        assert_eq!(next_weekly_expiry(expiry).day(), 12);
    }
}
