//! Day-first date coercion and the `DD/MM/YYYY` save format.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::table::Cell;

/// Format used when a date is written back to a sheet.
pub const SAVE_FORMAT: &str = "%d/%m/%Y";

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d/%m/%y",
    "%d-%m-%Y",
    "%d-%m-%y",
    "%d.%m.%Y",
    "%d.%m.%y",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

/// `%Y` also accepts one to three digit years; those are left to `%y`.
const MIN_FULL_YEAR: i32 = 1000;

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Serial numbers outside this window are not dates (1900-01-01 .. 2199-12-31).
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=109_574.0;

/// Read a cell as a calendar date. Unreadable values give `None`.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => from_serial(*n),
        Cell::Text(s) => parse_date_str(s),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

/// Parse day-first text, then ISO forms.
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    DAY_FIRST_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .filter(|d| !fmt.contains("%Y") || d.year() >= MIN_FULL_YEAR)
        })
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Spreadsheet serial day number (epoch 1899-12-30) to a date.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(SAVE_FORMAT).to_string()
}
