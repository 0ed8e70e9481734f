//! Display formatting shared by the console and overlay.
//!
//! Every user-facing rendering of names, timestamps, and lengths goes through
//! this module so both sinks show identical text.

use chrono::{DateTime, Local, Utc};

/// Minimum number of digits in a trailing instance id.
const INSTANCE_SUFFIX_MIN_DIGITS: usize = 10;

/// Strip a trailing `_<instance id>` from an entity name.
///
/// The game appends long numeric ids to spawned entities. Names without such
/// a suffix, or whose remaining stem would be empty, are returned unchanged.
///
/// # Examples
/// ```
/// use sclm_types::formatting::beautify_entity_name;
/// assert_eq!(
///     beautify_entity_name("PU_Pilots-Human-Criminal-Gunner_Light_2030254546339"),
///     "PU_Pilots-Human-Criminal-Gunner_Light"
/// );
/// assert_eq!(beautify_entity_name("Alice_123"), "Alice_123");
/// ```
pub fn beautify_entity_name(name: &str) -> &str {
    let Some((stem, suffix)) = name.rsplit_once('_') else {
        return name;
    };
    let is_instance_id =
        suffix.len() >= INSTANCE_SUFFIX_MIN_DIGITS && suffix.bytes().all(|b| b.is_ascii_digit());
    let stem_ok = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');

    if is_instance_id && stem_ok { stem } else { name }
}

/// Format an instant in local time as `YYYY-MM-DD hh:mm:ssAM`.
pub fn format_local_timestamp(ts: DateTime<Utc>) -> String {
    format_timestamp_in(ts.with_timezone(&Local))
}

/// Format an already-localized instant.
///
/// # Examples
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use sclm_types::formatting::format_timestamp_in;
/// let tz = FixedOffset::east_opt(0).unwrap();
/// let ts = tz.with_ymd_and_hms(2024, 3, 9, 21, 5, 7).unwrap();
/// assert_eq!(format_timestamp_in(ts), "2024-03-09 09:05:07PM");
/// ```
pub fn format_timestamp_in<Tz>(ts: DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ts.format("%Y-%m-%d %I:%M:%S%p").to_string()
}

/// Round a stall length to one decimal place.
///
/// Unparseable input is returned as-is.
///
/// # Examples
/// ```
/// use sclm_types::formatting::format_length;
/// assert_eq!(format_length("12.3456"), "12.3");
/// assert_eq!(format_length("3"), "3.0");
/// assert_eq!(format_length("n/a"), "n/a");
/// ```
pub fn format_length(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{:.1}", value),
        _ => raw.to_string(),
    }
}
