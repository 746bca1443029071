//! Years-of-experience estimation for résumés and job descriptions.
//!
//! Each tier is a pure function returning `Option`; `estimate_years` chains
//! them from most to least trustworthy. Fragments that fail to parse are
//! skipped rather than reported.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const MONTHS: &str = "january|february|march|april|june|july|august|september|october|november|december|jan|feb|mar|apr|may|jun|jul|aug|sept|sep|oct|nov|dec";
const EARLIEST_PLAUSIBLE_YEAR: i32 = 1950;

fn explicit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\+?\s+years?\s+of\s+experience")
            .expect("explicit experience pattern is valid")
    })
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)\b((?:{MONTHS})\.?\s+\d{{4}})\s*(?:-|–|—|to)\s*((?:{MONTHS})\.?\s+\d{{4}}|present|current)\b"
        );
        Regex::new(&pattern).expect("date range pattern is valid")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("year pattern is valid"))
}

fn min_experience_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:minimum|min\.?|at\s+least)\s+(?:of\s+)?(\d+(?:\.\d+)?)\+?\s+years?")
            .expect("minimum experience pattern is valid")
    })
}

fn bare_years_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\+?\s+years?\b").expect("years pattern is valid")
    })
}

fn seniority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(junior|sr\.?|senior|lead|principal)\b")
            .expect("seniority pattern is valid")
    })
}

pub fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().trim_end_matches('.') {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses "Jan 2019" / "sept. 2020" into the first day of that month.
pub fn parse_month_year(token: &str) -> Option<NaiveDate> {
    let cleaned = token.replace('.', "");
    let mut parts = cleaned.split_whitespace();
    let month = month_number(parts.next()?)?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let years = i64::from(end.year() - start.year());
    let months = i64::from(end.month()) - i64::from(start.month());
    years * 12 + months
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Tier 1: an explicit "N years of experience" claim.
pub fn explicit_years(text: &str) -> Option<f64> {
    explicit_re()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse::<f64>().ok())
}

/// Tier 2: summed month spans of every well-formed date range.
pub fn date_range_years(text: &str, today: NaiveDate) -> Option<f64> {
    let current_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
    let mut total_months = 0i64;

    for captures in range_re().captures_iter(text) {
        let (Some(start_raw), Some(end_raw)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let Some(start) = parse_month_year(start_raw.as_str()) else {
            continue;
        };
        let end = match end_raw.as_str().to_lowercase().as_str() {
            "present" | "current" => Some(current_month),
            other => parse_month_year(other),
        };
        let Some(end) = end else {
            continue;
        };
        if end < start {
            continue;
        }
        total_months += months_between(start, end);
    }

    (total_months > 0).then(|| round_to(total_months as f64 / 12.0, 2))
}

/// Tier 3: span between the earliest and latest plausible year mentioned.
pub fn year_span(text: &str, today: NaiveDate) -> Option<f64> {
    let latest_plausible = today.year() + 1;
    let years: BTreeSet<i32> = year_re()
        .captures_iter(text)
        .filter_map(|captures| captures.get(1)?.as_str().parse::<i32>().ok())
        .filter(|year| *year > EARLIEST_PLAUSIBLE_YEAR && *year < latest_plausible)
        .collect();

    let (first, last) = (years.first()?, years.last()?);
    let span = last - first;
    (span > 0).then_some(f64::from(span))
}

/// Total professional experience in years as of `today`, or 0 when nothing
/// in the text supports an estimate.
pub fn estimate_years_at(text: &str, today: NaiveDate) -> f64 {
    explicit_years(text)
        .or_else(|| date_range_years(text, today))
        .or_else(|| year_span(text, today))
        .unwrap_or(0.0)
}

pub fn estimate_years(text: &str) -> f64 {
    estimate_years_at(text, Utc::now().date_naive())
}

/// Minimum experience a job description asks for; 0 means unspecified.
pub fn min_experience(jd_text: &str) -> f64 {
    let phrase = |re: &Regex| {
        re.captures(jd_text)
            .and_then(|captures| captures.get(1))
            .and_then(|number| number.as_str().parse::<f64>().ok())
    };

    phrase(min_experience_re())
        .or_else(|| explicit_years(jd_text))
        .or_else(|| phrase(bare_years_re()))
        .unwrap_or(0.0)
}

/// First seniority keyword in the text, lower-cased, or an empty string.
pub fn seniority(jd_text: &str) -> String {
    seniority_re()
        .captures(jd_text)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_lowercase().trim_end_matches('.').to_string())
        .unwrap_or_default()
}
