// 🧹 Normalizer - raw companies → canonical companies
//
// Two rules, applied per row in scan order:
//   * domain is cut down to its trailing "label.tld" (no match → NULL)
//   * rows with neither a domain nor a locality are dropped
// and the name column is reduced to lowercase ASCII letters.

use crate::db::{self, Table};
use crate::error::{Error, Result};
use crate::value::CellValue;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Columns every raw company table must carry.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "id",
    "name",
    "domain",
    "locality",
    "industry",
    "country",
    "year_founded",
    "size range",
    "current_employees",
    "total_employees",
];

// `\n?\z` mirrors a `$` that also accepts one trailing newline.
static DOMAIN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\w-]+\.\w+)\n?\z").expect("domain pattern is valid"));

// ============================================================================
// CELL RULES
// ============================================================================

/// Trailing `label.tld` of a domain string, if any.
///
/// `"http://sub.acme-co.io"` → `"acme-co.io"`, `"a.b.co.uk"` → `"co.uk"`.
pub fn simplify_domain(domain: &str) -> Option<String> {
    DOMAIN_SUFFIX
        .captures(domain)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Keep ASCII letters only, lowercased.
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn simplify_domain_cell(cell: &CellValue) -> CellValue {
    if cell.is_blank() {
        return cell.clone();
    }
    cell.as_text()
        .and_then(|text| simplify_domain(&text))
        .map(CellValue::Text)
        .unwrap_or(CellValue::Null)
}

fn clean_name_cell(cell: &CellValue) -> CellValue {
    if cell.is_blank() {
        return cell.clone();
    }
    match cell.as_text() {
        Some(text) => CellValue::Text(clean_name(&text)),
        None => cell.clone(),
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeReport {
    pub raw_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub domains_simplified: usize,
    pub domains_unmatched: usize,
    pub fingerprint: String,
    pub completed_at: DateTime<Utc>,
}

impl NormalizeReport {
    pub fn summary(&self) -> String {
        format!(
            "Kept {} of {} rows ({} dropped), {} domains simplified, {} unmatched",
            self.kept_rows,
            self.raw_rows,
            self.dropped_rows,
            self.domains_simplified,
            self.domains_unmatched
        )
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

struct Layout {
    name: usize,
    domain: usize,
    locality: usize,
}

fn resolve_layout(raw: &Table, table_name: &str) -> Result<Layout> {
    for column in REQUIRED_COLUMNS {
        if raw.column_index(column).is_none() {
            return Err(Error::StructuralMismatch {
                table: table_name.to_string(),
                column: column.to_string(),
            });
        }
    }

    // All present, checked above
    let idx = |c: &str| raw.column_index(c).unwrap_or_default();
    Ok(Layout {
        name: idx("name"),
        domain: idx("domain"),
        locality: idx("locality"),
    })
}

/// Build the canonical table from a raw one. The raw table is not touched.
pub fn normalize(raw: &Table) -> Result<(Table, NormalizeReport)> {
    normalize_named(raw, "companies")
}

fn normalize_named(raw: &Table, table_name: &str) -> Result<(Table, NormalizeReport)> {
    let layout = resolve_layout(raw, table_name)?;

    let mut canonical = Table::new(raw.columns.clone());
    let mut domains_simplified = 0;
    let mut domains_unmatched = 0;

    for row in &raw.rows {
        let domain = simplify_domain_cell(&row[layout.domain]);
        if !row[layout.domain].is_blank() {
            if domain.is_null() {
                domains_unmatched += 1;
            } else {
                domains_simplified += 1;
            }
        }

        if domain.is_blank() && row[layout.locality].is_blank() {
            continue;
        }

        let mut cleaned = row.clone();
        cleaned[layout.domain] = domain;
        cleaned[layout.name] = clean_name_cell(&row[layout.name]);
        canonical.rows.push(cleaned);
    }

    let report = NormalizeReport {
        raw_rows: raw.len(),
        kept_rows: canonical.len(),
        dropped_rows: raw.len() - canonical.len(),
        domains_simplified,
        domains_unmatched,
        fingerprint: canonical.fingerprint(),
        completed_at: Utc::now(),
    };

    debug!(
        table = table_name,
        dropped = report.dropped_rows,
        unmatched_domains = report.domains_unmatched,
        "normalized rows"
    );

    Ok((canonical, report))
}

/// Read `raw_table`, normalize it and replace `canonical_table` with the result.
/// Returns the new canonical snapshot alongside the run report.
pub fn normalize_store(
    conn: &Connection,
    raw_table: &str,
    canonical_table: &str,
) -> Result<(Arc<Table>, NormalizeReport)> {
    let raw = db::read_table(conn, raw_table)?;
    let (canonical, report) = normalize_named(&raw, raw_table)?;

    db::replace_table(conn, canonical_table, raw_table, &canonical.rows)?;

    info!(
        raw_table,
        canonical_table,
        raw_rows = report.raw_rows,
        kept_rows = report.kept_rows,
        dropped_rows = report.dropped_rows,
        "normalization complete"
    );

    Ok((Arc::new(canonical), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::company_store;

    fn raw_table(rows: Vec<(i64, CellValue, CellValue, CellValue)>) -> Table {
        // (id, name, domain, locality); other columns get fixed values
        let mut table = Table::new(REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect());
        for (id, name, domain, locality) in rows {
            table.rows.push(vec![
                CellValue::Integer(id),
                name,
                domain,
                locality,
                CellValue::text("computer software"),
                CellValue::text("oman"),
                CellValue::Null,
                CellValue::text("1 - 10"),
                CellValue::text("3"),
                CellValue::text("4"),
            ]);
        }
        table
    }

    #[test]
    fn test_simplify_domain() {
        assert_eq!(simplify_domain("http://sub.acme-co.io"), Some("acme-co.io".into()));
        assert_eq!(simplify_domain("globcom-oman.com"), Some("globcom-oman.com".into()));
        assert_eq!(simplify_domain("www.example.com"), Some("example.com".into()));
        assert_eq!(simplify_domain("a.b.co.uk"), Some("co.uk".into()));
        assert_eq!(simplify_domain("acme.com\n"), Some("acme.com".into()));
        assert_eq!(simplify_domain("localhost"), None);
        assert_eq!(simplify_domain("acme.com/"), None);
        assert_eq!(simplify_domain("trailing."), None);
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("Acme-123!"), "acme");
        assert_eq!(clean_name("Global Computer Services LLC"), "globalcomputerservicesllc");
        assert_eq!(clean_name("Société Générale"), "socitgnrale");
        assert_eq!(clean_name("123"), "");
    }

    #[test]
    fn test_acme_scenario() {
        let raw = raw_table(vec![(
            1,
            CellValue::text("Acme-123!"),
            CellValue::text("http://sub.acme-co.io"),
            CellValue::Null,
        )]);

        let (canonical, report) = normalize(&raw).unwrap();

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.cell(0, "id"), Some(&CellValue::Integer(1)));
        assert_eq!(canonical.cell(0, "name"), Some(&CellValue::text("acme")));
        assert_eq!(canonical.cell(0, "domain"), Some(&CellValue::text("acme-co.io")));
        assert_eq!(canonical.cell(0, "locality"), Some(&CellValue::Null));
        assert_eq!(report.domains_simplified, 1);
    }

    #[test]
    fn test_drop_rule() {
        let raw = raw_table(vec![
            (2, CellValue::text("X"), CellValue::Null, CellValue::Null),
            // Unmatched domain becomes NULL, and with no locality the row goes
            (3, CellValue::text("Y"), CellValue::text("localhost"), CellValue::text("")),
            // Unmatched domain but a locality: kept with NULL domain
            (4, CellValue::text("Z"), CellValue::text("localhost"), CellValue::text("lyon, france")),
        ]);

        let (canonical, report) = normalize(&raw).unwrap();

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.cell(0, "id"), Some(&CellValue::Integer(4)));
        assert_eq!(canonical.cell(0, "domain"), Some(&CellValue::Null));
        assert_eq!(report.dropped_rows, 2);
        assert_eq!(report.domains_unmatched, 2);
    }

    #[test]
    fn test_blank_name_and_other_columns_pass_through() {
        let raw = raw_table(vec![
            (5, CellValue::Null, CellValue::text("acme.io"), CellValue::Null),
            (6, CellValue::text(""), CellValue::Null, CellValue::text("cotonou, benin")),
        ]);

        let (canonical, _) = normalize(&raw).unwrap();

        assert_eq!(canonical.cell(0, "name"), Some(&CellValue::Null));
        assert_eq!(canonical.cell(1, "name"), Some(&CellValue::text("")));
        assert_eq!(canonical.cell(1, "domain"), Some(&CellValue::Null));
        for row in 0..2 {
            assert_eq!(canonical.rows[row][4..], raw.rows[row][4..]);
        }
    }

    #[test]
    fn test_missing_column_is_structural_mismatch() {
        let mut raw = raw_table(vec![]);
        let locality = raw.column_index("locality").unwrap();
        raw.columns.remove(locality);

        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StructuralMismatch);
        assert!(err.to_string().contains("locality"));
    }

    #[test]
    fn test_empty_raw_table() {
        let (canonical, report) = normalize(&raw_table(vec![])).unwrap();
        assert!(canonical.is_empty());
        assert_eq!(canonical.columns.len(), REQUIRED_COLUMNS.len());
        assert_eq!(report.raw_rows, 0);
    }

    #[test]
    fn test_canonical_invariants_hold() {
        let raw = raw_table(vec![
            (1, CellValue::text("Acme-123!"), CellValue::text("http://sub.acme-co.io"), CellValue::Null),
            (2, CellValue::text("X"), CellValue::Null, CellValue::Null),
            (3, CellValue::text("Ünïcode Ltd."), CellValue::text("ftp://files.ex_ample.org"), CellValue::Null),
            (4, CellValue::text("B&B 2"), CellValue::text("nope"), CellValue::text("riga, latvia")),
            (5, CellValue::Null, CellValue::text(""), CellValue::text("nantes, france")),
        ]);
        let (canonical, _) = normalize(&raw).unwrap();
        let shape = Regex::new(r"^[\w-]+\.\w+$").unwrap();

        for i in 0..canonical.len() {
            let domain = canonical.cell(i, "domain").unwrap();
            let locality = canonical.cell(i, "locality").unwrap();
            assert!(!domain.is_blank() || !locality.is_blank());

            if let CellValue::Text(name) = canonical.cell(i, "name").unwrap() {
                assert!(name.chars().all(|c| c.is_ascii_lowercase()), "bad name {name:?}");
            }

            if let CellValue::Text(d) = domain {
                if !d.is_empty() {
                    assert!(shape.is_match(d), "bad domain {d:?}");
                    let id = canonical.cell(i, "id").unwrap();
                    let raw_row = raw.rows.iter().position(|r| &r[0] == id).unwrap();
                    let raw_domain = raw.cell(raw_row, "domain").unwrap().to_string();
                    assert!(raw_domain.ends_with(d.as_str()));
                }
            }
        }
        assert_eq!(canonical.len(), 4);
    }

    #[test]
    fn test_normalize_store_is_idempotent() {
        let conn = company_store(&[
            (159, Some("Global Computer Services LLC"), Some("https://www.globcom-oman.com"), "computer software", Some("burnsville, minnesota, united states"), "oman", "24"),
            (2, Some("X"), None, "x", None, "benin", "1"),
            (1422, Some("Anthony G."), Some("anthonyg.design"), "architecture & planning", Some("nantes, pays de la loire, france"), "benin", "1"),
        ]);

        let (first, report1) = normalize_store(&conn, "companies", "companies_cleaned").unwrap();
        let stored1 = db::read_table(&conn, "companies_cleaned").unwrap();
        let (second, report2) = normalize_store(&conn, "companies", "companies_cleaned").unwrap();
        let stored2 = db::read_table(&conn, "companies_cleaned").unwrap();

        assert_eq!(first, second);
        assert_eq!(stored1, stored2);
        assert_eq!(*first, stored1);
        assert_eq!(report1.fingerprint, report2.fingerprint);
        assert_eq!(stored2.len(), 2, "re-running must replace, not append");
        assert_eq!(
            stored2.cell(0, "name"),
            Some(&CellValue::text("globalcomputerservicesllc"))
        );
        assert_eq!(stored2.cell(0, "domain"), Some(&CellValue::text("globcom-oman.com")));

        let json = serde_json::to_value(&report2).unwrap();
        assert_eq!(json["kept_rows"], 2);
        assert_eq!(json["dropped_rows"], 1);
        assert_eq!(json["fingerprint"], report1.fingerprint.as_str());

        println!("✅ {}", report2.summary());
    }
}
