//! Telegram HTML helpers.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::domain::UserId;

pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %I:%M:%S %p";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `31-12-2026 09:05:00 PM` style timestamp.
pub fn format_timestamp<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Inline mention that links to the user's profile.
pub fn mention_html(user_id: UserId, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id.0,
        escape_html(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"Tom\" & Jerry</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; Jerry&lt;/b&gt;"
        );
    }

    #[test]
    fn timestamp_uses_twelve_hour_clock() {
        let dt = Utc.with_ymd_and_hms(2026, 12, 31, 21, 5, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "31-12-2026 09:05:00 PM");
    }

    #[test]
    fn mention_escapes_name() {
        assert_eq!(
            mention_html(UserId(42), "A<B"),
            "<a href=\"tg://user?id=42\">A&lt;B</a>"
        );
    }
}
