// 🔎 Query Engine - sparse predicates over the canonical table
//
// Every supplied predicate must hold (AND). Rows come back in table order,
// reshaped column-wise.

use crate::db::Table;
use crate::error::{Error, Result};
use crate::value::CellValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Write;
use tracing::debug;

// ============================================================================
// PREDICATES
// ============================================================================

/// One optional filter per searchable column. `None` and empty strings are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    /// Minimum `current_employees` (inclusive).
    pub current_employees: Option<f64>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn domain(mut self, value: impl Into<String>) -> Self {
        self.domain = Some(value.into());
        self
    }

    pub fn industry(mut self, value: impl Into<String>) -> Self {
        self.industry = Some(value.into());
        self
    }

    pub fn locality(mut self, value: impl Into<String>) -> Self {
        self.locality = Some(value.into());
        self
    }

    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    pub fn min_employees(mut self, value: impl Into<f64>) -> Self {
        self.current_employees = Some(value.into());
        self
    }

    /// Build predicates from string pairs, e.g. an HTTP query string.
    /// Unknown keys and non-numeric employee thresholds are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut predicates = Predicates::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "name" => predicates.name = Some(value.to_string()),
                "domain" => predicates.domain = Some(value.to_string()),
                "industry" => predicates.industry = Some(value.to_string()),
                "locality" => predicates.locality = Some(value.to_string()),
                "country" => predicates.country = Some(value.to_string()),
                "current_employees" => {
                    predicates.current_employees = Some(parse_threshold(value)?);
                }
                other => {
                    return Err(Error::invalid_predicate(other, "unknown predicate"));
                }
            }
        }
        Ok(predicates)
    }

    /// The active filters, in a fixed column order.
    pub fn filters(&self) -> Vec<Filter> {
        let text = [
            ("name", &self.name),
            ("domain", &self.domain),
            ("industry", &self.industry),
            ("locality", &self.locality),
            ("country", &self.country),
        ];

        let mut filters: Vec<Filter> = text
            .into_iter()
            .filter_map(|(column, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| Filter {
                        column,
                        matcher: Matcher::Contains(v.to_lowercase()),
                    })
            })
            .collect();

        if let Some(min) = self.current_employees {
            filters.push(Filter {
                column: "current_employees",
                matcher: Matcher::AtLeast(min),
            });
        }

        filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters().is_empty()
    }
}

fn parse_threshold(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| {
            Error::invalid_predicate(
                "current_employees",
                format!("expected a number, got {:?}", value),
            )
        })
}

/// Parse a row limit given as text.
pub fn parse_limit(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::invalid_predicate("limit", format!("expected a non-negative integer, got {:?}", value)))
}

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Case-insensitive substring; the needle is stored lowercased.
    Contains(String),
    /// Numeric `>=`.
    AtLeast(f64),
}

impl Matcher {
    /// NULL (or unreadable) cells never match.
    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            Matcher::Contains(needle) => cell
                .as_text()
                .map(|text| text.to_lowercase().contains(needle.as_str()))
                .unwrap_or(false),
            Matcher::AtLeast(min) => cell
                .as_f64()
                .map(|value| value >= *min)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub matcher: Matcher,
}

// ============================================================================
// RESULT
// ============================================================================

/// Column-oriented query result. Every column has a sequence of the same length;
/// index `i` in each sequence belongs to the same matched record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    columns: Vec<String>,
    values: Vec<Vec<CellValue>>,
}

impl QueryResult {
    fn empty(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            values: vec![Vec::new(); columns.len()],
        }
    }

    fn push_row(&mut self, row: &[CellValue]) {
        for (column, cell) in self.values.iter_mut().zip(row) {
            column.push(cell.clone());
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values of one column, in match order.
    pub fn get(&self, column: &str) -> Option<&[CellValue]> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(&self.values[idx])
    }

    /// Number of matched records.
    pub fn len(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matched record `i`, reassembled across columns.
    pub fn row(&self, i: usize) -> Option<Vec<&CellValue>> {
        if i >= self.len() {
            return None;
        }
        Some(self.values.iter().map(|column| &column[i]).collect())
    }

    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[CellValue])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write one header line plus one line per matched record. NULL is written as an empty field.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for i in 0..self.len() {
            wtr.write_record(self.values.iter().map(|column| column[i].to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, values) in self.iter_columns() {
            map.serialize_entry(column, values)?;
        }
        map.end()
    }
}

// ============================================================================
// EXECUTION
// ============================================================================

/// Run `predicates` against `table`, keeping at most `limit` matches in table order.
pub fn query(table: &Table, predicates: &Predicates, limit: Option<usize>) -> Result<QueryResult> {
    let filters = predicates.filters();

    let bound = filters
        .iter()
        .map(|f| {
            table
                .column_index(f.column)
                .map(|idx| (idx, &f.matcher))
                .ok_or_else(|| Error::StructuralMismatch {
                    table: "canonical".to_string(),
                    column: f.column.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = QueryResult::empty(&table.columns);
    let cap = limit.unwrap_or(usize::MAX);

    for row in table
        .rows
        .iter()
        .filter(|row| bound.iter().all(|(idx, m)| m.matches(&row[*idx])))
        .take(cap)
    {
        result.push_row(row);
    }

    debug!(
        filters = filters.len(),
        limit = ?limit,
        matched = result.len(),
        "query executed"
    );

    Ok(result)
}
