//! Numeric literal parsing.
//!
//! Accepts the usual notations plus engineering scale factors:
//! - optional leading sign
//! - `0x` hexadecimal, `0b` binary, leading-zero octal
//! - decimal integer or float with optional `e±digits` exponent
//! - scale suffix: `t g meg M k m u n p f mil`
//!
//! `meg` and `mil` match in any case and are recognized first. Otherwise
//! case only matters for `m`: `M` is mega and `m` is milli. A literal
//! with an exponent takes no scale suffix. Characters after the literal
//! are ignored, which lets unit names through (`10kOhm`, `5V`).

/// Parse a numeric literal, returning `None` if `text` has no digits.
pub fn parse_number(text: &str) -> Option<f64> {
    let s = text.trim().as_bytes();
    let mut i = 0;

    let mut sign = 1.0;
    match s.first() {
        Some(b'-') => {
            sign = -1.0;
            i += 1;
        }
        Some(b'+') => i += 1,
        _ => {}
    }

    // Radix prefixes and octal
    if s.get(i) == Some(&b'0') {
        match s.get(i + 1) {
            None => return Some(0.0),
            Some(b'x' | b'X') => return Some(sign * parse_radix(&s[i + 2..], 16)),
            Some(b'b' | b'B') => return Some(sign * parse_radix(&s[i + 2..], 2)),
            Some(c) if c.is_ascii_digit() => return Some(sign * parse_radix(&s[i + 1..], 8)),
            _ => {}
        }
    }

    let start = i;
    let mut digits = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if s.get(i) == Some(&b'.') {
        i += 1;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    // Exponent only counts if digits follow it, and replaces the suffix
    let mut exponent = false;
    if matches!(s.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if s.get(j).is_some_and(|c| c.is_ascii_digit()) {
            while j < s.len() && s[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
            exponent = true;
        }
    }

    // The slice is ASCII digits, '.', 'e' and a sign by construction
    let mantissa: f64 = std::str::from_utf8(&s[start..i]).ok()?.parse().ok()?;
    let scale = if exponent { 1.0 } else { scale_factor(&s[i..]) };
    Some(sign * mantissa * scale)
}

/// Parse a numeric literal, falling back to `default` if it has no digits.
pub fn parse_number_or(text: &str, default: f64) -> f64 {
    parse_number(text).unwrap_or(default)
}

fn parse_radix(digits: &[u8], radix: u32) -> f64 {
    let mut result = 0.0;
    for &c in digits {
        match (c as char).to_digit(radix) {
            Some(d) => result = result * radix as f64 + d as f64,
            None => break,
        }
    }
    result
}

fn scale_factor(suffix: &[u8]) -> f64 {
    let lower: Vec<u8> = suffix.iter().take(3).map(u8::to_ascii_lowercase).collect();
    if lower.starts_with(b"meg") {
        return 1e6;
    }
    if lower.starts_with(b"mil") {
        return 25.4e-6;
    }
    if suffix.first() == Some(&b'M') {
        return 1e6;
    }
    match lower.first() {
        Some(b't') => 1e12,
        Some(b'g') => 1e9,
        Some(b'k') => 1e3,
        Some(b'm') => 1e-3,
        Some(b'u') => 1e-6,
        Some(b'n') => 1e-9,
        Some(b'p') => 1e-12,
        Some(b'f') => 1e-15,
        _ => 1.0,
    }
}
