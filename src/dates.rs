//! Date normalization and calendar bucketing.
//!
//! Uploaded sheets carry dates in whatever shape the exporting tool chose.
//! [`DateNormalizer`] turns the common shapes into a [`NaiveDate`]:
//!
//! - ISO `YYYY-MM-DD` (an optional trailing time part is ignored) and `YYYY/MM/DD`
//! - slash dates: `DD/MM/YYYY` when the first segment exceeds 12, otherwise `MM/DD/YYYY`
//! - dash dates with a short first segment: `DD-MM-YYYY`
//! - dotted dates: `DD.MM.YYYY`
//! - month-name dates such as `15 March 2024` or `Mar 15, 2024`
//!
//! Two-digit years expand through a [`CenturyRule`]. Anything else yields
//! `None` and callers drop the row from date-dependent work.

use std::{fmt, str::FromStr, sync::OnceLock};

use anyhow::{Result, anyhow};
use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{Value, parse_number};

pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_CENTURY_PIVOT: i32 = 50;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const NAMED_MONTH_FORMATS: &[&str] = &[
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d-%b-%Y",
];

// Spreadsheet serial day numbers between 1954-10-03 and 2119-01-10.
const SERIAL_DATE_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// How a two-digit year is placed in a century.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenturyRule {
    /// Years below the pivot land in the 2000s, the rest in the 1900s.
    Pivot(i32),
    /// Every two-digit year lands in the 2000s.
    AlwaysCurrent,
}

impl Default for CenturyRule {
    fn default() -> Self {
        CenturyRule::Pivot(DEFAULT_CENTURY_PIVOT)
    }
}

impl CenturyRule {
    pub fn expand(self, two_digit: i32) -> i32 {
        match self {
            CenturyRule::AlwaysCurrent => 2000 + two_digit,
            CenturyRule::Pivot(pivot) if two_digit < pivot => 2000 + two_digit,
            CenturyRule::Pivot(_) => 1900 + two_digit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    pub century: CenturyRule,
}

struct DatePatterns {
    iso: Regex,
    year_first_slash: Regex,
    slash: Regex,
    dash: Regex,
    dotted: Regex,
}

fn patterns() -> &'static DatePatterns {
    static PATTERNS: OnceLock<DatePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DatePatterns {
        iso: Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").expect("iso pattern"),
        year_first_slash: Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})(?:[T ].*)?$")
            .expect("year-first pattern"),
        slash: Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})(?:\s.*)?$").expect("slash pattern"),
        dash: Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{2}|\d{4})(?:\s.*)?$").expect("dash pattern"),
        dotted: Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{2}|\d{4})$").expect("dotted pattern"),
    })
}

impl DateNormalizer {
    pub fn new(century: CenturyRule) -> Self {
        Self { century }
    }

    pub fn normalize(&self, raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let patterns = patterns();

        if let Some(caps) = patterns
            .iso
            .captures(trimmed)
            .or_else(|| patterns.year_first_slash.captures(trimmed))
        {
            return ymd(&caps[1], &caps[2], &caps[3]);
        }

        if let Some(caps) = patterns.slash.captures(trimmed) {
            let first: u32 = caps[1].parse().ok()?;
            let year = self.expand_year(&caps[3])?;
            return if first > 12 {
                date_from_parts(year, &caps[2], &caps[1])
            } else {
                date_from_parts(year, &caps[1], &caps[2])
            };
        }

        if let Some(caps) = patterns
            .dash
            .captures(trimmed)
            .or_else(|| patterns.dotted.captures(trimmed))
        {
            let year = self.expand_year(&caps[3])?;
            return date_from_parts(year, &caps[2], &caps[1]);
        }

        NAMED_MONTH_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
    }

    /// Normalizes a cell. Numbers in the spreadsheet serial-day range are read
    /// as serial dates, whether stored as numbers or as numeric text; everything
    /// else goes through [`DateNormalizer::normalize`].
    pub fn normalize_value(&self, value: &Value) -> Option<NaiveDate> {
        match value {
            Value::Text(s) => self
                .normalize(s)
                .or_else(|| parse_number(s).and_then(serial_date)),
            Value::Number(n) => serial_date(*n),
            Value::Null => None,
        }
    }

    fn expand_year(&self, raw: &str) -> Option<i32> {
        let year: i32 = raw.parse().ok()?;
        match raw.len() {
            4 => Some(year),
            2 => Some(self.century.expand(year)),
            _ => None,
        }
    }
}

fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !SERIAL_DATE_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    date_from_parts(year.parse().ok()?, month, day)
}

fn date_from_parts(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Normalizes with the default century rule.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    DateNormalizer::default().normalize(raw)
}

pub fn format_canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// One-based month number for a full or three-letter English month name.
pub fn month_index(name: &str) -> Option<u32> {
    let lowered = name.trim().to_ascii_lowercase();
    if lowered.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|month| {
            let month = month.to_ascii_lowercase();
            month == lowered || (lowered.len() == 3 && month.starts_with(&lowered))
        })
        .map(|idx| idx as u32 + 1)
}

pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Sorts month names chronologically; unrecognized names trail alphabetically.
pub fn sort_month_names(names: &mut [String]) {
    names.sort_by(|a, b| match (month_index(a), month_index(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// First calendar day of the bucket containing `date`. Weeks start on Sunday.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_sunday() as i64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn period_key(&self, bucket: NaiveDate) -> String {
        match self {
            Granularity::Month => bucket.format("%Y-%m").to_string(),
            Granularity::Day | Granularity::Week => format_canonical(bucket),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            other => Err(anyhow!(
                "Unknown granularity '{other}'. Supported: day, week, month"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn slash_dates_resolve_day_month_ambiguity_on_first_segment() {
        assert_eq!(normalize_date("15/03/2024"), Some(date(2024, 3, 15)));
        assert_eq!(normalize_date("03/04/2024"), Some(date(2024, 3, 4)));
        assert_eq!(normalize_date("12/31/2023"), Some(date(2023, 12, 31)));
    }

    #[test]
    fn dash_dates_with_short_first_segment_are_day_first() {
        assert_eq!(normalize_date("05-06-24"), Some(date(2024, 6, 5)));
        assert_eq!(normalize_date("5-6-2024"), Some(date(2024, 6, 5)));
    }

    #[test]
    fn iso_dates_ignore_time_suffix() {
        assert_eq!(normalize_date("2024-1-7"), Some(date(2024, 1, 7)));
        assert_eq!(normalize_date("2024-01-07T13:45:00Z"), Some(date(2024, 1, 7)));
        assert_eq!(normalize_date("2024/01/07"), Some(date(2024, 1, 7)));
    }

    #[test]
    fn century_rules_differ_only_above_the_pivot() {
        let pivot = DateNormalizer::default();
        let current = DateNormalizer::new(CenturyRule::AlwaysCurrent);
        assert_eq!(pivot.normalize("01/02/49"), Some(date(2049, 1, 2)));
        assert_eq!(pivot.normalize("01/02/75"), Some(date(1975, 1, 2)));
        assert_eq!(current.normalize("01/02/75"), Some(date(2075, 1, 2)));
    }

    #[test]
    fn month_name_and_dotted_formats_parse() {
        assert_eq!(normalize_date("15 March 2024"), Some(date(2024, 3, 15)));
        assert_eq!(normalize_date("Mar 15, 2024"), Some(date(2024, 3, 15)));
        assert_eq!(normalize_date("15.03.2024"), Some(date(2024, 3, 15)));
    }

    #[test]
    fn invalid_inputs_return_none() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("not a date"), None);
        assert_eq!(normalize_date("2024-02-30"), None);
        assert_eq!(normalize_date("13/13/2024"), None);
        assert_eq!(normalize_date("1/2/123"), None);
    }

    #[test]
    fn serial_numbers_in_range_become_dates() {
        let normalizer = DateNormalizer::default();
        assert_eq!(
            normalizer.normalize_value(&Value::Number(45366.0)),
            Some(date(2024, 3, 15))
        );
        assert_eq!(normalizer.normalize_value(&Value::Number(12.0)), None);
        assert_eq!(
            normalizer.normalize_value(&Value::from(" 45366 ")),
            Some(date(2024, 3, 15))
        );
        assert_eq!(normalizer.normalize_value(&Value::from("12")), None);
    }

    #[test]
    fn week_buckets_start_on_sunday() {
        // 2024-03-13 is a Wednesday.
        assert_eq!(
            Granularity::Week.bucket_start(date(2024, 3, 13)),
            date(2024, 3, 10)
        );
        assert_eq!(
            Granularity::Week.bucket_start(date(2024, 3, 10)),
            date(2024, 3, 10)
        );
        assert_eq!(Granularity::Month.period_key(date(2024, 3, 13)), "2024-03");
    }

    #[test]
    fn month_names_sort_chronologically() {
        let mut names = vec![
            "December".to_string(),
            "april".to_string(),
            "Feb".to_string(),
            "Zeta".to_string(),
        ];
        sort_month_names(&mut names);
        assert_eq!(names, vec!["Feb", "april", "December", "Zeta"]);
        assert_eq!(month_index("sept"), None);
        assert_eq!(month_name(9), Some("September"));
    }
}
