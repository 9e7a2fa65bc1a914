use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Calendar date as rendered in API payloads.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wall-clock timestamp as rendered in API payloads.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time in the reference timezone.
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

pub fn format_date<Tz: TimeZone>(ts: &DateTime<Tz>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format(DATE_FORMAT).to_string()
}

pub fn format_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format(TIME_FORMAT).to_string()
}
