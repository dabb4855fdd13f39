//! Fixed-width number formatting as used by UFF records

use std::fmt::Write;

/// C `printf("%{width}.{precision}e")`: signed two-digit exponent,
/// right aligned
pub fn fmt_e(value: f64, width: usize, precision: usize) -> String {
    if !value.is_finite() {
        return format!("{:>width$}", value, width = width);
    }
    let raw = format!("{:.*e}", precision, value);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let body = format!("{}e{}{:02}", mantissa, sign, exp.abs());
    format!("{:>width$}", body, width = width)
}

/// `%13.5e`
pub fn e13(value: f64) -> String {
    fmt_e(value, 13, 5)
}

/// `%20.11e`
pub fn e20(value: f64) -> String {
    fmt_e(value, 20, 11)
}

/// `%-80s`, truncated to the record width
pub fn text80(text: &str) -> String {
    let clipped: String = text.chars().take(80).collect();
    format!("{:<80}", clipped)
}

/// Values `per_line` to a line, each formatted by `fmt`
pub fn columns<F>(values: &[f64], per_line: usize, fmt: F) -> String
where
    F: Fn(f64) -> String,
{
    let mut out = String::new();
    for chunk in values.chunks(per_line.max(1)) {
        for &v in chunk {
            out.push_str(&fmt(v));
        }
        out.push('\n');
    }
    out
}

/// `%10d` repeated
pub fn ints10(values: &[i64]) -> String {
    let mut out = String::with_capacity(values.len() * 10);
    for v in values {
        let _ = write!(out, "{:10}", v);
    }
    out
}
