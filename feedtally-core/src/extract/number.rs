//! Compact number parsing
//!
//! Counts are rendered in locale-dependent compact forms: `1,234`, `2.5K`,
//! `3 M`, `1.8万`, `3億`. [`parse_compact_number`] turns any of them into an
//! integer and never fails; input without a number yields `0`.
//!
//! Forms are tried in a fixed order and the first match wins:
//!
//! 1. decimal immediately followed by a myriad unit (`1.8万`)
//! 2. digits with thousands separators removed (`1,234`)
//! 3. decimal with an English magnitude suffix, optional space (`2.5K`, `3 m`)
//! 4. decimal with a myriad unit, optional space (`1.8 万`)
//! 5. the first numeric run anywhere in the text (`1,234 Likes`)
//!
//! Scaled values are rounded to the nearest integer, never truncated.

use regex::Regex;
use std::sync::LazyLock;

static MYRIAD_TIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.]+)(万|萬|億|亿)$").expect("valid regex"));
static PLAIN_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));
static MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([0-9.]+)\s*([KMB])$").expect("valid regex"));
static MYRIAD_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.]+)\s*(万|萬|億|亿)$").expect("valid regex"));
static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9,.]+(?:\.[0-9]+)?").expect("valid regex"));
static METRIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9.,]*[0-9][0-9.,]*(?:[KMB万萬億亿])?$").expect("valid regex")
});

/// Parse a locale-formatted compact count into an integer.
///
/// Total: empty or number-free input returns `0`.
pub fn parse_compact_number(raw: &str) -> u64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }

    if let Some(caps) = MYRIAD_TIGHT.captures(s) {
        return scale(&caps[1], myriad_factor(&caps[2]));
    }

    let stripped = s.replace(',', "");
    let basic = stripped.trim();
    if PLAIN_DIGITS.is_match(basic) {
        if let Ok(n) = basic.parse::<u64>() {
            return n;
        }
    }

    if let Some(caps) = MAGNITUDE.captures(basic) {
        let factor = match caps[2].to_ascii_uppercase().as_str() {
            "K" => 1e3,
            "M" => 1e6,
            _ => 1e9,
        };
        return scale(&caps[1], factor);
    }

    if let Some(caps) = MYRIAD_SPACED.captures(basic) {
        return scale(&caps[1], myriad_factor(&caps[2]));
    }

    match FIRST_NUMBER.find(s) {
        Some(m) => leading_float(&m.as_str().replace(',', ""))
            .map(round_count)
            .unwrap_or(0),
        None => 0,
    }
}

/// Whether a rendered text node looks like a bare metric count (`12`, `1.2K`, `3万`).
pub fn looks_like_metric(text: &str) -> bool {
    METRIC_TOKEN.is_match(text.trim())
}

fn myriad_factor(unit: &str) -> f64 {
    match unit {
        "万" | "萬" => 1e4,
        _ => 1e8,
    }
}

fn scale(mantissa: &str, factor: f64) -> u64 {
    leading_float(mantissa)
        .map(|n| round_count(n * factor))
        .unwrap_or(0)
}

/// Parse the longest decimal prefix (`1.2.3` reads as `1.2`).
fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}

/// Round to a count, saturating at `u64::MAX`.
fn round_count(n: f64) -> u64 {
    if n.is_nan() || n <= 0.0 {
        0
    } else if n.is_infinite() {
        u64::MAX
    } else {
        n.round() as u64
    }
}
