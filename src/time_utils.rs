use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Timezone used to render timestamps on pages.
#[derive(Clone, Copy, Debug)]
pub enum DisplayZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Default for DisplayZone {
    fn default() -> Self {
        DisplayZone::Named(Tz::UTC)
    }
}

impl DisplayZone {
    /// Accepts IANA names (`Europe/Kyiv`), `UTC`/`GMT` and offsets such as
    /// `UTC+2`, `+05:30` or `-0300`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("gmt") {
            return Some(DisplayZone::Named(Tz::UTC));
        }

        if let Some((prefix, offset)) = trimmed.get(..3).zip(trimmed.get(3..)) {
            if prefix.eq_ignore_ascii_case("utc") || prefix.eq_ignore_ascii_case("gmt") {
                return parse_fixed_offset(offset).map(DisplayZone::Fixed);
            }
        }
        if trimmed.starts_with('+') || trimmed.starts_with('-') {
            return parse_fixed_offset(trimmed).map(DisplayZone::Fixed);
        }

        let name = if trimmed == "Europe/Kiev" { "Europe/Kyiv" } else { trimmed };
        name.parse::<Tz>().ok().map(DisplayZone::Named)
    }

    pub fn format(&self, utc_dt: DateTime<Utc>) -> String {
        const FMT: &str = "%Y-%m-%d %H:%M";
        match self {
            DisplayZone::Named(tz) => utc_dt.with_timezone(tz).format(FMT).to_string(),
            DisplayZone::Fixed(offset) => utc_dt.with_timezone(offset).format(FMT).to_string(),
        }
    }

    pub fn format_date(&self, utc_dt: DateTime<Utc>) -> String {
        match self {
            DisplayZone::Named(tz) => utc_dt.with_timezone(tz).date_naive().to_string(),
            DisplayZone::Fixed(offset) => utc_dt.with_timezone(offset).date_naive().to_string(),
        }
    }
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let rest = rest.trim();
    if rest.is_empty() || !rest.is_ascii() {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() > 2 {
        let (h, m) = rest.split_at(rest.len() - 2);
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };

    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
