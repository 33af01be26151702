//! Human-entered durations (`7d`, `2hours`, `1y`) expressed in fractional days.

use std::sync::OnceLock;

use regex::Regex;

const HOURS_PER_DAY: f64 = 24.0;
const MINUTES_PER_DAY: f64 = 24.0 * 60.0;
const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;
const DAYS_PER_YEAR: f64 = 365.0;

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)([a-zA-Z]+)$").expect("valid regex"))
}

/// Parse `<integer><unit>` into days.
///
/// Spaces are stripped and the unit is case-insensitive. Returns `None` when the
/// pattern does not match or the unit is unknown.
pub fn parse_duration_days(input: &str) -> Option<f64> {
    let compact: String = input.chars().filter(|c| *c != ' ').collect();
    let caps = duration_re().captures(&compact)?;

    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let value = value as f64;
    let unit = caps.get(2)?.as_str().to_lowercase();

    match unit.as_str() {
        "d" | "day" | "days" => Some(value),
        "h" | "hour" | "hours" => Some(value / HOURS_PER_DAY),
        "m" | "minute" | "minutes" => Some(value / MINUTES_PER_DAY),
        "s" | "second" | "seconds" => Some(value / SECONDS_PER_DAY),
        "y" | "year" | "years" => Some(value * DAYS_PER_YEAR),
        _ => None,
    }
}

/// Render a day count using the largest whole unit that fits.
///
/// Counts are truncated, not rounded: `1.5` days renders as `1 day`.
pub fn format_duration_days(days: f64) -> String {
    if days >= DAYS_PER_YEAR {
        return unit_text((days / DAYS_PER_YEAR) as i64, "year");
    }
    if days >= 1.0 {
        return unit_text(days as i64, "day");
    }
    if days >= 1.0 / HOURS_PER_DAY {
        return unit_text((days * 24.0) as i64, "hour");
    }
    if days >= 1.0 / MINUTES_PER_DAY {
        return unit_text((days * 24.0 * 60.0) as i64, "minute");
    }
    unit_text((days * 24.0 * 60.0 * 60.0) as i64, "second")
}

fn unit_text(count: i64, unit: &str) -> String {
    if count > 1 {
        format!("{count} {unit}s")
    } else {
        format!("{count} {unit}")
    }
}
