// Company Lookup - Core Library
// Cleans the company dataset and answers lookups over it; used by the CLI and API server

pub mod companies;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use companies::{CompanyDatabase, CompanyLookup};
pub use config::Config;
pub use db::{count_rows, read_table, replace_table, table_exists, Table};
pub use error::{Error, ErrorKind, Result};
pub use fetch::{ensure_downloaded, Fetcher, HttpFetcher};
pub use normalize::{clean_name, normalize, normalize_store, simplify_domain, NormalizeReport, REQUIRED_COLUMNS};
pub use query::{parse_limit, query, Filter, Matcher, Predicates, QueryResult};
pub use value::CellValue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
