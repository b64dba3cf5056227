use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use company_lookup::{fetch, CompanyDatabase, Config, HttpFetcher, Predicates};

#[derive(Parser)]
#[command(name = "company-lookup")]
#[command(about = "Clean the company dataset and look companies up", version)]
struct Cli {
    /// Path to the SQLite store (default: ./companies.db or COMPANY_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Where to download the store from when it is missing
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the store if it is not on disk yet
    Fetch,
    /// Rebuild the cleaned table from the raw one
    Clean {
        /// Print the run report as JSON instead of a summary line
        #[arg(long)]
        json: bool,
    },
    /// Look up companies in the cleaned table
    Query(QueryArgs),
}

#[derive(clap::Args)]
struct QueryArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    industry: Option<String>,
    #[arg(long)]
    locality: Option<String>,
    #[arg(long)]
    country: Option<String>,
    /// Minimum number of current employees
    #[arg(long)]
    current_employees: Option<f64>,
    /// Maximum number of companies to return
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

impl From<&QueryArgs> for Predicates {
    fn from(args: &QueryArgs) -> Self {
        Predicates {
            name: args.name.clone(),
            domain: args.domain.clone(),
            industry: args.industry.clone(),
            locality: args.locality.clone(),
            country: args.country.clone(),
            current_employees: args.current_employees,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.db {
        config.database_path = path;
    }
    if let Some(url) = cli.url {
        config.database_url = url;
    }

    match cli.command {
        Command::Fetch => run_fetch(&config),
        Command::Clean { json } => run_clean(config, json),
        Command::Query(args) => run_query(config, &args),
    }
}

fn run_fetch(config: &Config) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let downloaded = fetch::ensure_downloaded(&fetcher, &config.database_url, &config.database_path)
        .context("Failed to download the company store")?;

    if downloaded {
        println!("✓ Downloaded {}", config.database_path.display());
    } else {
        println!("✓ {} already present", config.database_path.display());
    }
    Ok(())
}

fn run_clean(config: Config, json: bool) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let mut db = CompanyDatabase::open(config, &fetcher).context("Failed to open the company store")?;

    let report = db.clean().context("Failed to clean the company table")?;
    info!(fingerprint = %report.fingerprint, "cleaned table ready");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("✓ {}", report.summary());
    }
    Ok(())
}

fn run_query(config: Config, args: &QueryArgs) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let canonical = config.canonical_table.clone();
    let db = CompanyDatabase::open(config, &fetcher).context("Failed to open the company store")?;

    let result = db
        .query(&Predicates::from(args), args.limit)
        .with_context(|| format!("Query on `{}` failed (run `company-lookup clean` first?)", canonical))?;

    match args.format {
        Format::Json => println!("{}", result.to_json_pretty()?),
        Format::Csv => result.write_csv(io::stdout().lock())?,
    }
    Ok(())
}
