// Cell values as they come out of (and go back into) SQLite.
// Columns in the company dataset are loosely typed, so nothing here assumes
// a declared type: a cell is whatever the row actually stores.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn text(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null, empty text and empty blobs count as "missing" for the cleaning rules.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Blob(b) => b.is_empty(),
            CellValue::Integer(_) | CellValue::Real(_) => false,
        }
    }

    /// Textual rendering used for pattern matching. Null and binary cells have none.
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            CellValue::Text(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
            CellValue::Integer(i) => Some(std::borrow::Cow::Owned(i.to_string())),
            CellValue::Real(f) => Some(std::borrow::Cow::Owned(format_real(*f))),
            CellValue::Null | CellValue::Blob(_) => None,
        }
    }

    /// Numeric reading of the cell; text is parsed (the dataset stores counts as text).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(f) => Some(*f),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            CellValue::Null | CellValue::Blob(_) => None,
        }
    }
}

/// Render a REAL the way SQLite casts it to TEXT (`%!.15g`): `1998.0`, `0.1`, `1.0e+20`.
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // 15 significant digits, rounded once; the exponent decides the layout
    let sci = format!("{:.14e}", value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if !(-4..15).contains(&exp) {
        let mantissa = with_point(trim_zeros(mantissa));
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (14 - exp) as usize;
        with_point(trim_zeros(&format!("{:.*}", decimals, value)))
    }
}

fn trim_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0')
    } else {
        digits
    }
}

fn with_point(digits: &str) -> String {
    match digits.strip_suffix('.') {
        Some(whole) => format!("{}.0", whole),
        None if !digits.contains('.') => format!("{}.0", digits),
        None => digits.to_string(),
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => f.write_str(&format_real(*r)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

impl FromSql for CellValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            // Invalid UTF-8 is an error rather than a silently rewritten value
            ValueRef::Text(t) => CellValue::Text(
                std::str::from_utf8(t)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))?
                    .to_string(),
            ),
            ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
        })
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}
