//! Display formatting for amounts and timestamps, Indian locale.

use crate::types::TransactionDirection;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// Signed amount, `-` for outflow and `+` otherwise: `-₹1,23,456.78`.
pub fn format_currency(amount: f64, direction: TransactionDirection, symbol: &str) -> String {
    let sign = match direction {
        TransactionDirection::Outflow => "-",
        TransactionDirection::Inflow => "+",
    };
    format!("{}{}{}", sign, symbol, format_grouped(amount))
}

/// Unsigned amount: `₹1,23,456.78`.
pub fn format_currency_value(amount: f64, symbol: &str) -> String {
    format!("{}{}", symbol, format_grouped(amount))
}

/// `1234567.891` → `12,34,567.89`. At most two fraction digits, trailing
/// zeros dropped, halves rounded away from zero. Non-finite values are `0`.
pub fn format_grouped(amount: f64) -> String {
    if !amount.is_finite() {
        return "0".to_string();
    }

    let (int_digits, frac_digits) = round_to_cents(amount.abs());
    let mut out = String::new();
    if amount < 0.0 {
        out.push('-');
    }
    out.push_str(&group_indian(&int_digits));
    let frac = frac_digits.trim_end_matches('0');
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Round the shortest decimal form of `value` to two places.
fn round_to_cents(value: f64) -> (String, String) {
    let repr = value.to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    let frac: Vec<u8> = frac_part.bytes().map(|b| b - b'0').collect();
    digits.push(frac.first().copied().unwrap_or(0));
    digits.push(frac.get(1).copied().unwrap_or(0));

    if frac.get(2).copied().unwrap_or(0) >= 5 {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - 2;
    let to_text = |ds: &[u8]| ds.iter().map(|d| char::from(b'0' + d)).collect::<String>();
    (to_text(&digits[..split]), to_text(&digits[split..]))
}

/// Last three digits, then groups of two.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    groups.push(rest);
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// `19 Oct 2026, 3:04 pm` in the device's local time zone. Input that is not
/// a recognizable timestamp is returned unchanged.
pub fn format_date_time(value: &str) -> String {
    format_date_time_in(value, &Local)
}

pub fn format_date_time_in<Tz: TimeZone>(value: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match parse_timestamp(value, tz) {
        Some(instant) => instant
            .with_timezone(tz)
            .format("%-d %b %Y, %-I:%M %P")
            .to_string(),
        None => value.to_string(),
    }
}

fn parse_timestamp<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Without an offset the time is wall-clock time in `tz`.
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    // Bare dates are midnight UTC.
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
