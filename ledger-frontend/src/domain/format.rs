//! Phone, date and currency formatting for Brazilian users.

use crate::domain::pricing::round_money;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\d{2}\) \d{4,5}-\d{4}$").expect("valid phone regex"));

static BR_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid date regex"));

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));

pub const MISSING: &str = "—";

pub fn phone_digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).take(11).collect()
}

/// Progressive mask: `(11`, `(11) 9876`, `(11) 98765-4321`.
pub fn format_phone(input: &str) -> String {
    let digits = phone_digits(input);
    let len = digits.len();
    match len {
        0 => String::new(),
        1..=2 => format!("({}", digits),
        3..=6 => format!("({}) {}", &digits[..2], &digits[2..]),
        _ => format!(
            "({}) {}-{}",
            &digits[..2],
            &digits[2..len - 4],
            &digits[len - 4..]
        ),
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Progressive `dd/mm/yyyy` mask over whatever digits were typed.
pub fn mask_br_date(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).take(8).collect();
    match digits.len() {
        0..=2 => digits,
        3..=4 => format!("{}/{}", &digits[..2], &digits[2..]),
        _ => format!("{}/{}/{}", &digits[..2], &digits[2..4], &digits[4..]),
    }
}

/// `31/12/2024` -> `2024-12-31`. Shape only; see [`is_valid_iso_date`].
pub fn br_to_iso(display: &str) -> Option<String> {
    let caps = BR_DATE_RE.captures(display.trim())?;
    Some(format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]))
}

/// `2024-12-31` -> `31/12/2024`; anything else yields an empty string.
pub fn iso_to_br(iso: &str) -> String {
    let iso = iso.trim();
    if BR_DATE_RE.is_match(iso) {
        return iso.to_string();
    }
    match ISO_DATE_RE.captures(iso) {
        Some(caps) if iso.len() == 10 => format!("{}/{}/{}", &caps[3], &caps[2], &caps[1]),
        _ => String::new(),
    }
}

/// Strict `YYYY-MM-DD` with a real day of month.
pub fn is_valid_iso_date(iso: &str) -> bool {
    iso.len() == 10
        && ISO_DATE_RE.is_match(iso)
        && NaiveDate::parse_from_str(iso, "%Y-%m-%d").is_ok()
}

/// Tolerant parse: `YYYY-MM-DD`, timestamps starting with one, or `DD/MM/YYYY`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Some(caps) = ISO_DATE_RE.captures(input) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }
    if input.contains('/') {
        let mut parts = input.split('/').map(str::trim);
        let day = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let year = parts.next()?.get(..4)?.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    chrono::DateTime::parse_from_rfc2822(input)
        .ok()
        .map(|dt| dt.date_naive())
}

/// `dd/mm/yyyy` for display; `—` when missing, the input when unparseable.
pub fn display_date(input: Option<&str>) -> String {
    match input.map(str::trim) {
        None | Some("") => MISSING.to_string(),
        Some(raw) => parse_date(raw)
            .map(|date| date.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

pub fn birthday_month(input: &str) -> Option<u32> {
    parse_date(input).map(|date| date.month())
}

/// `R$ 1.234,56`.
pub fn format_brl(value: Decimal) -> String {
    let rounded = round_money(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!(
        "R$ {}{},{}",
        if negative { "-" } else { "" },
        grouped,
        frac_part
    )
}
