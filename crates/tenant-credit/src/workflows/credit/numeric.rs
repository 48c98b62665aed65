//! Tolerant numeric normalisation shared by scoring and report rendering.
//!
//! Extracted documents deliver amounts and scores interchangeably as native
//! numbers or as formatted strings (`"1.000"`, `"R$ 12.500,00"`, `"72,5%"`).
//! Every numeric read of a [`FieldValue`] goes through [`NumericReading`] so a
//! malformed value degrades to a caller-supplied default instead of failing.

use super::record::FieldValue;

const CURRENCY_PREFIXES: [&str; 4] = ["R$", "US$", "$", "€"];

/// Outcome of reading a numeric field from a case record.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericReading {
    Parsed(f64),
    Missing,
    Malformed(String),
}

impl NumericReading {
    pub fn from_value(value: Option<&FieldValue>) -> Self {
        match value {
            None => Self::Missing,
            Some(value) if value.is_empty() => Self::Missing,
            Some(FieldValue::Number(number)) if number.is_finite() => Self::Parsed(*number),
            Some(FieldValue::Number(number)) => Self::Malformed(number.to_string()),
            Some(FieldValue::Text(raw)) => match parse_numeric(raw) {
                Some(number) => Self::Parsed(number),
                None => Self::Malformed(raw.clone()),
            },
            Some(FieldValue::Series(items)) => Self::Malformed(format!("[{}]", items.join(", "))),
        }
    }

    pub fn or_default(&self, default: f64) -> f64 {
        match self {
            Self::Parsed(number) => *number,
            Self::Missing | Self::Malformed(_) => default,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Parsed(number) => Some(*number),
            Self::Missing | Self::Malformed(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Parsed(_))
    }
}

/// Parse a number that may carry currency symbols, grouping separators, or a
/// comma decimal mark.
///
/// When both `.` and `,` appear, the last one is the decimal mark. A single
/// separator followed by exactly three digits is treated as grouping
/// (`"1.000"` is one thousand); repeated separators are always grouping.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    for prefix in CURRENCY_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
            break;
        }
    }
    let text = text.trim_end_matches('%');

    let cleaned: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '_' && *ch != '\'')
        .collect();

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    if body.is_empty()
        || !body
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == '.' || ch == ',')
        || !body.chars().any(|ch| ch.is_ascii_digit())
    {
        return None;
    }

    let decimal_mark = decimal_mark(body);
    let normalized: String = body
        .chars()
        .filter_map(|ch| match ch {
            '.' | ',' if Some(ch) == decimal_mark => Some('.'),
            '.' | ',' => None,
            digit => Some(digit),
        })
        .collect();

    let parsed = normalized.parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    Some(if negative { -parsed } else { parsed })
}

fn decimal_mark(body: &str) -> Option<char> {
    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    match (dots, commas) {
        (0, 0) => None,
        (_, 0) | (0, _) => {
            let mark = if dots > 0 { '.' } else { ',' };
            if dots + commas > 1 {
                return None;
            }
            let (head, tail) = body.split_once(mark)?;
            let looks_grouped = tail.len() == 3 && (1..=3).contains(&head.len());
            if looks_grouped {
                None
            } else {
                Some(mark)
            }
        }
        _ => body.chars().rev().find(|ch| *ch == '.' || *ch == ','),
    }
}

/// Format an amount with thousands grouping and two decimals (`1,234.56`).
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && !fixed.trim_start_matches(['0', '.']).is_empty() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_grouped_numbers() {
        assert_eq!(parse_numeric("850"), Some(850.0));
        assert_eq!(parse_numeric(" 1.000 "), Some(1000.0));
        assert_eq!(parse_numeric("1,250"), Some(1250.0));
        assert_eq!(parse_numeric("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_numeric("72.5"), Some(72.5));
        assert_eq!(parse_numeric("0,25"), Some(0.25));
    }

    #[test]
    fn parses_currency_and_mixed_separators() {
        assert_eq!(parse_numeric("R$ 12.500,75"), Some(12_500.75));
        assert_eq!(parse_numeric("$1,234.50"), Some(1_234.5));
        assert_eq!(parse_numeric("-3.200,00"), Some(-3_200.0));
        assert_eq!(parse_numeric("64%"), Some(64.0));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("..."), None);
        assert_eq!(parse_numeric("12 points"), None);
    }

    #[test]
    fn reading_distinguishes_missing_and_malformed() {
        assert_eq!(NumericReading::from_value(None), NumericReading::Missing);
        let blank = FieldValue::Text("  ".to_string());
        assert_eq!(
            NumericReading::from_value(Some(&blank)),
            NumericReading::Missing
        );
        let bad = FieldValue::Text("n/a".to_string());
        let reading = NumericReading::from_value(Some(&bad));
        assert_eq!(reading, NumericReading::Malformed("n/a".to_string()));
        assert_eq!(reading.or_default(50.0), 50.0);
        assert!(reading.is_degraded());
    }

    #[test]
    fn formats_amounts_with_grouping() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(12_500.75), "12,500.75");
        assert_eq!(format_amount(1_234_567.0), "1,234,567.00");
        assert_eq!(format_amount(-3_200.0), "-3,200.00");
    }
}
