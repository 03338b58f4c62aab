use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

/// Default pattern used for [`Value::DateTime`] when a column has no format string.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Pattern an editor shows for a date-time column without a format string.
pub const EDIT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses user input for a date-time column.
///
/// Tries `format` first (as a date-time, then as a bare date at midnight), then the ISO-like
/// fallbacks.
pub fn parse_datetime(input: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let input = input.trim();
    format
        .into_iter()
        .chain([EDIT_DATETIME_FORMAT, DEFAULT_DATETIME_FORMAT, "%Y-%m-%d"])
        .find_map(|pattern| {
            NaiveDateTime::parse_from_str(input, pattern).ok().or_else(|| {
                NaiveDate::parse_from_str(input, pattern)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}

/// A single field value stored in a [`crate::record::Record`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
    /// A reference to another entity, rendered by its label.
    Ref {
        id: u64,
        label: String,
    },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, empty text and empty reference labels count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Ref { label, .. } => label.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => matches!(s.as_str(), "true" | "1" | "yes"),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Ref { label, .. } => Some(label),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::DateTime(_) => 3,
            Value::Text(_) => 4,
            Value::Ref { .. } => 5,
        }
    }

    /// Total ordering used by sorting: nulls first, then by kind, then by value.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Ref { label: a, .. }, Value::Ref { label: b, .. }) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Case-insensitive substring test against the value's plain display text.
    pub fn contains_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.format(None)
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// Formats the value for display.
    ///
    /// Numbers accept `0`, `0.00` and `#,##0.00`-style patterns; date-times accept `chrono`
    /// strftime patterns. Other kinds ignore `format`.
    pub fn format(&self, format: Option<&str>) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n, format),
            Value::Text(s) => s.clone(),
            Value::DateTime(dt) => dt
                .format(format.unwrap_or(DEFAULT_DATETIME_FORMAT))
                .to_string(),
            Value::Ref { label, .. } => label.clone(),
        }
    }
}

fn format_number(n: f64, format: Option<&str>) -> String {
    if n.is_nan() {
        return String::new();
    }
    let Some(pattern) = format else {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            return format!("{}", n as i64);
        }
        return n.to_string();
    };

    let decimals = pattern
        .split_once('.')
        .map(|(_, frac)| frac.chars().filter(|c| matches!(c, '0' | '#')).count())
        .unwrap_or(0);
    let grouping = pattern.contains(',');

    let raw = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (raw, None),
    };

    let int_part = if grouping {
        group_thousands(&int_part)
    } else {
        int_part
    };

    let mut out = String::new();
    if n < 0.0 && (n * 10f64.powi(decimals as i32)).round() != 0.0 {
        out.push('-');
    }
    out.push_str(&int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn number_patterns() {
        assert_eq!(Value::Number(1234567.891).format(Some("#,##0.00")), "1,234,567.89");
        assert_eq!(Value::Number(3.0).format(Some("0.00")), "3.00");
        assert_eq!(Value::Number(-2.6).format(Some("0")), "-3");
        assert_eq!(Value::Number(42.0).format(None), "42");
        assert_eq!(Value::Number(-0.001).format(Some("0.00")), "0.00");
    }

    #[test]
    fn datetime_uses_strftime_pattern() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap();
        assert_eq!(Value::DateTime(dt).format(Some("%d.%m.%Y")), "09.03.2024");
        assert_eq!(Value::DateTime(dt).format(None), "2024-03-09 14:05");
    }

    #[test]
    fn datetime_input_uses_column_pattern_then_fallbacks() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            parse_datetime("09.03.2024", Some("%d.%m.%Y")),
            day.and_hms_opt(0, 0, 0)
        );
        assert_eq!(
            parse_datetime(" 2024-03-09 14:05:07 ", None),
            day.and_hms_opt(14, 5, 7)
        );
        assert_eq!(parse_datetime("2024-03-09 14:05", None), day.and_hms_opt(14, 5, 0));
        assert_eq!(parse_datetime("2024-03-09", None), day.and_hms_opt(0, 0, 0));
        assert_eq!(parse_datetime("next tuesday", None), None);
    }

    #[test]
    fn nulls_sort_first() {
        let mut v = vec![Value::from(2), Value::Null, Value::from(1)];
        v.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(v, vec![Value::Null, Value::from(1), Value::from(2)]);
    }
}
