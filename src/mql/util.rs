use crate::errors::{DurationError, UnquoteError};

const MS: i64 = 1;
const SECOND: i64 = 1000 * MS;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const YEAR: i64 = 365 * DAY;

/// Parses a duration literal into signed milliseconds.
///
/// The grammar is `[+-]?(number unit)+` where a number may carry a fraction (`1.5h`) and unit is
/// one of `ms s m h d w y`. Units have to appear from largest to smallest: `1h30m` is accepted,
/// `30m1h` and `1m1m` are rejected with `DurationError::RangeOrder`. A lone `0` needs no unit.
///
/// ```
/// use ncollectd_core::mql::parse_duration;
///
/// assert_eq!(parse_duration("1h30m"), Ok(5_400_000));
/// assert_eq!(parse_duration("-5s"), Ok(-5_000));
/// ```
pub fn parse_duration(text: &str) -> Result<i64, DurationError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut negative = false;

    if let Some(&sign) = bytes.first() {
        if sign == b'-' || sign == b'+' {
            negative = sign == b'-';
            pos += 1;
        }
    }

    if &bytes[pos..] == b"0" {
        return Ok(0);
    }

    if pos == bytes.len() {
        return Err(DurationError::Empty);
    }

    let mut last_scale: Option<i64> = None;
    let mut total: i64 = 0;

    while pos < bytes.len() {
        let start = pos;

        let mut whole: i64 = 0;
        while let Some(d) = digit_at(bytes, pos) {
            whole = whole
                .checked_mul(10)
                .and_then(|w| w.checked_add(d))
                .ok_or(DurationError::Overflow)?;
            pos += 1;
        }
        let has_whole = pos > start;

        let mut fraction: i64 = 0;
        let mut fraction_scale: i64 = 1;
        let mut has_fraction = false;
        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            while let Some(d) = digit_at(bytes, pos) {
                // Digits past millisecond-of-a-year precision cannot change the result.
                if fraction_scale < 1_000_000_000_000_000 {
                    fraction = fraction * 10 + d;
                    fraction_scale *= 10;
                }
                has_fraction = true;
                pos += 1;
            }
        }

        if !has_whole && !has_fraction {
            return Err(DurationError::MissingNumber(start));
        }

        let unit_pos = pos;
        let scale = match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(b'm'), Some(b's')) => {
                pos += 2;
                MS
            }
            (Some(b'm'), _) => {
                pos += 1;
                MINUTE
            }
            (Some(b's'), _) => {
                pos += 1;
                SECOND
            }
            (Some(b'h'), _) => {
                pos += 1;
                HOUR
            }
            (Some(b'd'), _) => {
                pos += 1;
                DAY
            }
            (Some(b'w'), _) => {
                pos += 1;
                WEEK
            }
            (Some(b'y'), _) => {
                pos += 1;
                YEAR
            }
            _ => return Err(DurationError::UnknownUnit(unit_pos)),
        };

        if let Some(last) = last_scale {
            if scale >= last {
                return Err(DurationError::RangeOrder(unit_pos));
            }
        }
        last_scale = Some(scale);

        let part = whole
            .checked_mul(scale)
            .and_then(|w| {
                let frac = i128::from(fraction) * i128::from(scale) / i128::from(fraction_scale);
                w.checked_add(frac as i64)
            })
            .ok_or(DurationError::Overflow)?;

        total = total.checked_add(part).ok_or(DurationError::Overflow)?;
    }

    Ok(if negative { -total } else { total })
}

fn digit_at(bytes: &[u8], pos: usize) -> Option<i64> {
    match bytes.get(pos) {
        Some(&c) if c.is_ascii_digit() => Some(i64::from(c - b'0')),
        _ => None,
    }
}

/// Strips the quotes off a `'single'` or `"double"` quoted literal.
///
/// Single quoted text is returned verbatim. Double quoted text has the backslash escapes
/// `\a \b \f \n \r \t \v \\ \"` replaced; any other escaped character stands for itself.
pub fn unquote(s: &str) -> Result<String, UnquoteError> {
    if s.len() < 2 {
        return Err(UnquoteError::TooShort);
    }

    let quote = s.as_bytes()[0];
    if quote != b'\'' && quote != b'"' {
        return Err(UnquoteError::NotQuoted);
    }
    if s.as_bytes()[s.len() - 1] != quote {
        return Err(UnquoteError::MismatchedQuotes);
    }

    let inner = &s[1..s.len() - 1];
    if quote == b'\'' {
        return Ok(inner.to_owned());
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => break,
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0b}'),
            Some(other) => out.push(other),
        }
    }

    Ok(out)
}

/// Label names match `[a-zA-Z_][a-zA-Z0-9_]*`. Names starting with `__` are syntactically valid,
/// reserving them is left to the caller.
pub fn is_label_name(s: &str) -> bool {
    check_name(s.as_bytes(), false)
}

/// Metric names match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_metric_name(s: &str) -> bool {
    check_name(s.as_bytes(), true)
}

pub(crate) fn is_label_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn check_name(s: &[u8], colon: bool) -> bool {
    let first = match s.first() {
        Some(&c) => c,
        None => return false,
    };

    if !(first.is_ascii_alphabetic() || first == b'_' || (colon && first == b':')) {
        return false;
    }

    s[1..]
        .iter()
        .all(|&c| is_label_char(c) || (colon && c == b':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_examples() {
        assert_eq!(parse_duration("1h30m"), Ok(5_400_000));
        assert_eq!(parse_duration("-5s"), Ok(-5_000));
        assert_eq!(parse_duration("0"), Ok(0));
        assert_eq!(parse_duration("-0"), Ok(0));
        assert_eq!(parse_duration("+0"), Ok(0));
        assert_eq!(parse_duration("500ms"), Ok(500));
        assert_eq!(parse_duration("1y"), Ok(31_536_000_000));
        assert_eq!(parse_duration("2w1d"), Ok(15 * DAY));
        assert_eq!(parse_duration("1m1s1ms"), Ok(61_001));
    }

    #[test]
    fn test_parse_duration_fraction() {
        assert_eq!(parse_duration("1.5h"), Ok(5_400_000));
        assert_eq!(parse_duration(".5s"), Ok(500));
        assert_eq!(parse_duration("1.s"), Ok(1000));
        assert_eq!(parse_duration("0.001s"), Ok(1));
    }

    #[test]
    fn test_parse_duration_increasing_units_is_range_order_error() {
        assert_eq!(parse_duration("30m1h"), Err(DurationError::RangeOrder(4)));
        assert_eq!(parse_duration("1m1m"), Err(DurationError::RangeOrder(3)));
        assert_eq!(parse_duration("1s5m"), Err(DurationError::RangeOrder(3)));
    }

    #[test]
    fn test_parse_duration_malformed() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("-"), Err(DurationError::Empty));
        assert_eq!(parse_duration("h"), Err(DurationError::MissingNumber(0)));
        assert_eq!(parse_duration("1h.m"), Err(DurationError::MissingNumber(2)));
        assert_eq!(parse_duration("5"), Err(DurationError::UnknownUnit(1)));
        assert_eq!(parse_duration("5x"), Err(DurationError::UnknownUnit(1)));
        assert_eq!(parse_duration("00"), Err(DurationError::UnknownUnit(2)));
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert_eq!(
            parse_duration("999999999999999y"),
            Err(DurationError::Overflow)
        );
        assert_eq!(
            parse_duration("99999999999999999999ms"),
            Err(DurationError::Overflow)
        );
    }

    #[test]
    fn test_unquote_double() {
        assert_eq!(unquote(r#""a\tb\"c\\""#), Ok(String::from("a\tb\"c\\")));
        assert_eq!(unquote(r#""\a\b\f\v\q""#), Ok(String::from("\u{7}\u{8}\u{c}\u{b}q")));
        assert_eq!(unquote(r#""""#), Ok(String::new()));
    }

    #[test]
    fn test_unquote_single_is_verbatim() {
        assert_eq!(unquote(r"'a\nb'"), Ok(String::from(r"a\nb")));
    }

    #[test]
    fn test_unquote_errors() {
        assert_eq!(unquote("\""), Err(UnquoteError::TooShort));
        assert_eq!(unquote("abc"), Err(UnquoteError::NotQuoted));
        assert_eq!(unquote("'abc\""), Err(UnquoteError::MismatchedQuotes));
        assert_eq!(unquote("\"abc'"), Err(UnquoteError::MismatchedQuotes));
    }

    #[test]
    fn test_label_names() {
        assert!(is_label_name("__reserved"));
        assert!(is_label_name("job"));
        assert!(is_label_name("_"));
        assert!(is_label_name("a1_B2"));
        assert!(!is_label_name("1abc"));
        assert!(!is_label_name(""));
        assert!(!is_label_name("a:b"));
        assert!(!is_label_name("a-b"));
        assert!(!is_label_name("añ"));
    }

    #[test]
    fn test_metric_names() {
        assert!(is_metric_name("node:cpu_seconds"));
        assert!(is_metric_name(":leading"));
        assert!(is_metric_name("up"));
        assert!(!is_metric_name("9lives"));
        assert!(!is_metric_name(""));
        assert!(!is_metric_name("a b"));
    }
}
