use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{MalltaxError, Result};
use crate::models::{Cell, Grid};

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

const CURRENCY_MARKS: &[&str] = &["₩", "$", "€", "£", "¥", "￦", "KRW", "krw", "USD", "원"];

/// Parse a money string. Returns `None` when the text is not a number.
pub fn parse_amount_str(raw: &str) -> Option<f64> {
    let mut s = raw.replace([',', '"'], "");
    for mark in CURRENCY_MARKS {
        s = s.replace(mark, "");
    }
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| -v);
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Strict amount read: empty cells are zero, unparsable text is `None`.
pub fn amount_from_cell(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => Some(0.0),
        Cell::Number(n) => Some(*n),
        Cell::Text(s) if s.trim().is_empty() => Some(0.0),
        Cell::Text(s) => parse_amount_str(s),
        Cell::Date(_) => None,
    }
}

/// Tolerant amount read: anything unusable counts as zero.
pub fn parse_amount(cell: &Cell) -> f64 {
    amount_from_cell(cell).unwrap_or(0.0)
}

/// True when the cell holds a number or numeric-looking text.
pub fn is_numeric_cell(cell: &Cell) -> bool {
    match cell {
        Cell::Number(_) | Cell::Date(_) => true,
        Cell::Text(s) => !s.trim().is_empty() && parse_amount_str(s).is_some(),
        Cell::Empty => false,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const EXCEL_SERIAL_MIN: f64 = 1.0;
const EXCEL_SERIAL_MAX: f64 = 2_958_465.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert an Excel day-count serial (1900 system) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(EXCEL_SERIAL_MIN..=EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    epoch
        .checked_add_signed(chrono::Duration::seconds(seconds))
        .map(|dt| dt.date())
}

/// Year/month taken from a title cell such as "2024년 03월 정산내역".
/// Resolves day-only cells ("15일") for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateContext {
    year_month: Option<(i32, u32)>,
}

const TITLE_SCAN_ROWS: usize = 5;

static TITLE_YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*년\s*(\d{1,2})\s*월").unwrap());

impl DateContext {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year_month: (1..=12).contains(&month).then_some((year, month)),
        }
    }

    /// Scan the first rows of a sheet for a "YYYY년 MM월" title.
    pub fn from_grid(grid: &Grid) -> Self {
        for r in 0..grid.height().min(TITLE_SCAN_ROWS) {
            for cell in grid.row(r) {
                let Some(text) = cell.as_str() else { continue };
                if let Some(caps) = TITLE_YEAR_MONTH.captures(text) {
                    let year = caps[1].parse().unwrap_or(0);
                    let month = caps[2].parse().unwrap_or(0);
                    let ctx = Self::new(year, month);
                    if ctx.year_month.is_some() {
                        return ctx;
                    }
                }
            }
        }
        Self::default()
    }

    pub fn year_month(&self) -> Option<(i32, u32)> {
        self.year_month
    }
}

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s*~\s*(.+)$").unwrap());
static YEAR_MONTH_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\.\s*(\d{1,2})\.?$").unwrap());
static YEAR_MONTH_KO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\s*년\s*(\d{1,2})\s*월$").unwrap());
static DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static DATE_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\.\s*(\d{1,2})\.\s*(\d{1,2})\.?$").unwrap());
static DATE_SLASH_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").unwrap());
static DATE_KO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\s*년\s*(\d{1,2})\s*월\s*(\d{1,2})\s*일$").unwrap());
static DATE_SLASH_XY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})[-./]\s*(\d{1,2})[-./]\s*(\d{1,2})\.?(?:T|\s+)(오전|오후|AM|PM|am|pm)?\s*(\d{1,2}):(\d{2})(?::(\d{2}))?",
    )
    .unwrap()
});
static DAY_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\s*일$").unwrap());

const FALLBACK_FORMATS: &[&str] = &["%Y%m%d", "%d %b %Y", "%b %d, %Y", "%B %d, %Y", "%d-%b-%Y"];

fn ymd(caps: &Captures, y: usize, m: usize, d: usize) -> Option<NaiveDate> {
    let year = caps.get(y)?.as_str().parse().ok()?;
    let month = caps.get(m)?.as_str().parse().ok()?;
    let day = caps.get(d)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn year_month_first(caps: &Captures) -> Option<NaiveDate> {
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn full_date(s: &str) -> Option<NaiveDate> {
    if let Some(caps) = DATE_ISO.captures(s) {
        return ymd(&caps, 1, 2, 3);
    }
    if let Some(caps) = DATE_DOT.captures(s) {
        return ymd(&caps, 1, 2, 3);
    }
    if let Some(caps) = DATE_SLASH_YMD.captures(s) {
        return ymd(&caps, 1, 2, 3);
    }
    if let Some(caps) = DATE_KO.captures(s) {
        return ymd(&caps, 1, 2, 3);
    }
    if let Some(caps) = DATE_SLASH_XY.captures(s) {
        let first: u32 = caps[1].parse().ok()?;
        // D/M/Y only when the first part cannot be a month
        return if first > 12 {
            ymd(&caps, 3, 2, 1)
        } else {
            ymd(&caps, 3, 1, 2)
        };
    }
    None
}

fn date_time(s: &str) -> Option<NaiveDate> {
    let caps = DATE_TIME.captures(s)?;
    let date = ymd(&caps, 1, 2, 3)?;
    let mut hour: u32 = caps[5].parse().ok()?;
    let minute: u32 = caps[6].parse().ok()?;
    let second: u32 = caps.get(7).map_or(Some(0), |m| m.as_str().parse().ok())?;
    match caps.get(4).map(|m| m.as_str()) {
        Some("오후" | "PM" | "pm") if hour < 12 => hour += 12,
        Some("오전" | "AM" | "am") if hour == 12 => hour = 0,
        _ => {}
    }
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(NaiveDateTime::new(date, time).date())
}

fn fallback_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a date string against the known pattern families, in priority order.
pub fn parse_date_str(raw: &str, ctx: &DateContext) -> Result<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(MalltaxError::InvalidDate(raw.to_string()));
    }
    if let Some(caps) = DATE_RANGE.captures(s) {
        // Ranges resolve to their start date
        let start = caps[1].trim();
        return full_date(start)
            .or_else(|| date_time(start))
            .ok_or_else(|| MalltaxError::InvalidDate(raw.to_string()));
    }
    if let Some(caps) = YEAR_MONTH_DOT.captures(s).or_else(|| YEAR_MONTH_KO.captures(s)) {
        return year_month_first(&caps).ok_or_else(|| MalltaxError::InvalidDate(raw.to_string()));
    }
    if let Some(date) = full_date(s).or_else(|| date_time(s)) {
        return Ok(date);
    }
    if let Some(caps) = DAY_ONLY.captures(s) {
        let (year, month) = ctx
            .year_month()
            .ok_or_else(|| MalltaxError::MissingDateContext(raw.to_string()))?;
        let day: u32 = caps[1].parse().unwrap_or(0);
        return NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| MalltaxError::InvalidDate(raw.to_string()));
    }
    fallback_date(s).ok_or_else(|| MalltaxError::InvalidDate(raw.to_string()))
}

/// Date cell normalizer: native dates pass through, numbers are Excel serials,
/// strings go through [`parse_date_str`].
pub fn parse_date(cell: &Cell, ctx: &DateContext) -> Result<NaiveDate> {
    match cell {
        Cell::Date(d) => Ok(*d),
        Cell::Number(n) => {
            excel_serial_to_date(*n).ok_or_else(|| MalltaxError::InvalidDate(n.to_string()))
        }
        Cell::Text(s) => parse_date_str(s, ctx),
        Cell::Empty => Err(MalltaxError::InvalidDate(String::new())),
    }
}

/// (year, month) bucket of a date.
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

// ---------------------------------------------------------------------------
// Summary rows
// ---------------------------------------------------------------------------

const SUMMARY_TOKENS: &[&str] = &[
    "합계", "총계", "소계", "누계", "총합", "total", "subtotal", "sum", "grand total",
];

/// True when a date cell marks a total/subtotal line rather than data.
pub fn is_summary_row(cell: &Cell) -> bool {
    let Some(text) = cell.as_str() else {
        return false;
    };
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    SUMMARY_TOKENS.iter().any(|t| lower.contains(t))
}
