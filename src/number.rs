//! Precision-aware rounding and compact rendering of numbers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::Document;
use crate::attrs::{NUMERIC_ATTRS, NUMERIC_LIST_ATTRS};

/// A numeric literal inside an attribute value or path data.
static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("valid regex"));

/// Leading numeric prefix, as accepted by a lenient `parseFloat`.
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("valid regex")
});

/// Digits past the requested precision used to detect exact decimal ties.
const GUARD_DIGITS: usize = 30;

/// Round a numeric literal to `precision` fractional digits and render it
/// compactly. Anything that is not a finite number is returned unchanged.
///
/// Ties round away from zero on the exact decimal value of the parsed
/// double, so `-0.25` becomes `-.3` while `1.005` (stored as
/// `1.00499...`) becomes `1`.
pub fn round_fixed(value: &str, precision: u8) -> String {
    match parse_number(value) {
        Some(n) => format_compact(round_to(n, precision)),
        None => value.to_string(),
    }
}

/// Round a finite number to `precision` fractional digits, half away from zero.
pub fn round_to(n: f64, precision: u8) -> f64 {
    let fixed = to_fixed(n.abs(), precision as usize);
    let magnitude: f64 = fixed.parse().unwrap_or(n.abs());
    if n.is_sign_negative() { -magnitude } else { magnitude }
}

fn to_fixed(magnitude: f64, precision: usize) -> String {
    let expanded = format!("{:.*}", precision + GUARD_DIGITS, magnitude);
    let (int_part, frac_part) = expanded.split_once('.').unwrap_or((&expanded, ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(precision))
        .collect();
    let round_up = frac_part.as_bytes().get(precision).is_some_and(|d| *d >= b'5');

    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - precision;
    let mut out = String::from_utf8_lossy(&digits[..split]).into_owned();
    if precision > 0 {
        out.push('.');
        out.push_str(&String::from_utf8_lossy(&digits[split..]));
    }
    out
}

/// Render a number in its shortest round-tripping form without a leading
/// zero: `0.5` -> `.5`, `-0.5` -> `-.5`, `2.0` -> `2`.
pub fn format_compact(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n == 0.0 {
        return "0".into();
    }

    let mut buf = ryu::Buffer::new();
    let mut s = buf.format_finite(n).to_string();

    if let Some(stripped) = s.strip_suffix(".0") {
        s = stripped.to_string();
    }
    if let Some(rest) = s.strip_prefix("0.") {
        s = format!(".{}", rest);
    } else if let Some(rest) = s.strip_prefix("-0.") {
        s = format!("-.{}", rest);
    }
    s
}

/// Parse a complete numeric literal (surrounding whitespace allowed).
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse the leading number of a value the way a lenient `parseFloat` does:
/// `"0.95"`, `"95%"` and `"12px"` all yield their numeric prefix.
pub fn parse_leading_number(value: &str) -> Option<f64> {
    NUMBER_PREFIX
        .find(value)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Parse a whitespace/comma separated list of numbers. Fails if any item
/// is not a number.
pub fn parse_number_list(value: &str) -> Option<Vec<f64>> {
    value
        .split(|c: char| c.is_ascii_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(parse_number)
        .collect()
}

/// Round every number in a list value (`viewBox`, `points`, `stroke-dasharray`).
pub fn round_numeric_list(value: &str, precision: u8) -> String {
    rewrite_numbers(value, |token| round_fixed(token, precision))
}

/// Round every operand in path data, independent of its command.
///
/// Rounding can remove the decimal point that separated two numbers
/// (`-69.3.3` -> `-69` `0`); a space is inserted wherever the rounded tokens
/// would otherwise fuse.
pub fn round_path_data(value: &str, precision: u8) -> String {
    rewrite_numbers(value, |token| round_fixed(token, precision))
}

fn rewrite_numbers(value: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut prev: Option<String> = None;

    for m in NUMBER_TOKEN.find_iter(value) {
        let between = &value[last_end..m.start()];
        let replacement = f(m.as_str());
        if between.is_empty()
            && let Some(prev) = &prev
            && needs_separator(prev, &replacement)
        {
            out.push(' ');
        }
        out.push_str(between);
        out.push_str(&replacement);
        prev = Some(replacement);
        last_end = m.end();
    }

    out.push_str(&value[last_end..]);
    out
}

/// Whether `next` written straight after `prev` would read as one number.
pub(crate) fn needs_separator(prev: &str, next: &str) -> bool {
    match next.as_bytes().first() {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'.') => !prev.contains(['.', 'e', 'E']),
        _ => false,
    }
}

/// Round numeric attributes across the document: path data with
/// `path_precision`, scalar and list attributes with `precision`.
pub fn round_attributes(doc: &mut Document, precision: u8, path_precision: u8) {
    doc.for_each_element_mut(|elem| {
        for attr in &mut elem.attributes {
            let name = attr.name.full_name().to_ascii_lowercase();
            if name == "d" {
                attr.value = round_path_data(&attr.value, path_precision);
            } else if NUMERIC_ATTRS.contains(&name.as_str()) {
                attr.value = round_fixed(&attr.value, precision);
            } else if NUMERIC_LIST_ATTRS.contains(&name.as_str()) {
                attr.value = round_numeric_list(&attr.value, precision);
            }
        }
    });
}
