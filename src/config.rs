use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str =
    "https://github.com/hiblackai/public-datasets/raw/refs/heads/main/companies.db";

/// Where the company store comes from, where it lives and which tables to use.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub database_path: PathBuf,
    pub raw_table: String,
    pub canonical_table: String,
    /// Bind address for the HTTP server.
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_path: PathBuf::from("companies.db"),
            raw_table: "companies".to_string(),
            canonical_table: "companies_cleaned".to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overridden by any `COMPANY_*` environment variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(url) = lookup("COMPANY_DB_URL") {
            config.database_url = url;
        }
        if let Some(path) = lookup("COMPANY_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(table) = lookup("COMPANY_RAW_TABLE") {
            config.raw_table = table;
        }
        if let Some(table) = lookup("COMPANY_CLEAN_TABLE") {
            config.canonical_table = table;
        }
        if let Some(addr) = lookup("COMPANY_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("COMPANY_DB_PATH", "/tmp/c.db"),
            ("COMPANY_CLEAN_TABLE", "clean"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.canonical_table, "clean");
        assert_eq!(config.raw_table, "companies");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }
}
