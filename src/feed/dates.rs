use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Parse a feed-supplied date string into a UTC instant.
///
/// RSS `pubDate` is almost always RFC 2822; Atom `updated`/`published`
/// is ISO 8601. RFC 2822 is tried first, then ISO 8601 with an explicit
/// offset, then ISO 8601 without one (assumed UTC), then a bare date at
/// midnight UTC.
///
/// Returns `None` for absent, empty, or unparseable input. The caller is
/// expected to drop the item rather than substitute "now"; fabricating
/// a publish time would invent history.
pub fn normalize_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Offset-less ISO 8601, with either separator. Assumed UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    None
}
