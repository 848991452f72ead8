use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{
    env,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

const ENV_PREFIX: &str = "OBJECT_SCANNER_";

/// Centralized scanner configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub bucket_name: Option<String>,
    pub max_file_size_mb: u64,
    pub scan_timeout: Duration,
    pub time_budget_margin: Duration,
    pub invocation_budget: Duration,
    pub store_timeout: Duration,
    pub list_page_size: usize,
    pub max_concurrency: usize,
    pub storage_dir: String,
    pub database_url: String,
    pub workspace_root: PathBuf,
    pub scanner_program: String,
    pub scanner_args: Vec<String>,
    pub host: String,
    pub port: u16,
}

/// How this process was asked to run.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Serve `/invoke` and friends over HTTP.
    Serve,
    /// Handle the event in this file (`-` for stdin) and exit.
    Event(PathBuf),
    /// Batch-scan the configured bucket once and exit.
    Once,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Malware scan orchestrator for object-store buckets")]
pub struct Args {
    /// Bucket scanned in batch mode (overrides OBJECT_SCANNER_BUCKET_NAME)
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Objects larger than this are skipped (overrides OBJECT_SCANNER_MAX_FILE_SIZE_MB)
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    /// Per-object scanner timeout (overrides OBJECT_SCANNER_SCAN_TIMEOUT_SECONDS)
    #[arg(long)]
    pub scan_timeout_seconds: Option<u64>,

    /// Stop a batch when less than this remains (overrides OBJECT_SCANNER_TIME_BUDGET_MARGIN_SECONDS)
    #[arg(long)]
    pub time_budget_margin_seconds: Option<u64>,

    /// Total execution budget per invocation (overrides OBJECT_SCANNER_INVOCATION_BUDGET_SECONDS)
    #[arg(long)]
    pub invocation_budget_seconds: Option<u64>,

    /// Bound on each object-store request (overrides OBJECT_SCANNER_STORE_TIMEOUT_SECONDS)
    #[arg(long)]
    pub store_timeout_seconds: Option<u64>,

    /// Keys requested per listing page (overrides OBJECT_SCANNER_LIST_PAGE_SIZE)
    #[arg(long)]
    pub list_page_size: Option<usize>,

    /// Objects scanned in parallel during a batch (overrides OBJECT_SCANNER_MAX_CONCURRENCY)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Object store payload directory (overrides OBJECT_SCANNER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Object store metadata database (overrides OBJECT_SCANNER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Where per-object workspaces are created (overrides OBJECT_SCANNER_WORKSPACE_ROOT)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Scanner executable (overrides OBJECT_SCANNER_SCANNER_PROGRAM)
    #[arg(long)]
    pub scanner_program: Option<String>,

    /// Extra scanner arguments, whitespace separated (overrides OBJECT_SCANNER_SCANNER_ARGS)
    #[arg(long)]
    pub scanner_args: Option<String>,

    /// Host to bind to (overrides OBJECT_SCANNER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_SCANNER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Handle one invocation event from this JSON file (`-` for stdin) and exit
    #[arg(long, conflicts_with = "once")]
    pub event: Option<PathBuf>,

    /// Batch-scan the configured bucket once and exit
    #[arg(long)]
    pub once: bool,
}

impl ScannerConfig {
    /// Parse environment variables + CLI args into a config and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();
        let mode = match (&args.event, args.once) {
            (Some(path), _) => RunMode::Event(path.clone()),
            (None, true) => RunMode::Once,
            (None, false) => RunMode::Serve,
        };
        let cfg = Self::merge(args, |name| env::var(format!("{ENV_PREFIX}{name}")))?;
        Ok((cfg, mode))
    }

    /// Merge CLI values over environment lookups over defaults.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let text = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {ENV_PREFIX}{name}")),
            }
        };
        let parsed = |name: &str| -> Result<Option<u64>> { parse_env(name, text(name)?) };

        let secs = |cli: Option<u64>, name: &str, default: u64| -> Result<Duration> {
            let value = match cli {
                Some(v) => v,
                None => parsed(name)?.unwrap_or(default),
            };
            if value == 0 {
                bail!("{ENV_PREFIX}{name} must be greater than zero");
            }
            Ok(Duration::from_secs(value))
        };

        let count = |cli: Option<usize>, name: &str, default: usize| -> Result<usize> {
            let value = match cli {
                Some(v) => v,
                None => parse_env::<usize>(name, text(name)?)?.unwrap_or(default),
            };
            if value == 0 {
                bail!("{ENV_PREFIX}{name} must be greater than zero");
            }
            Ok(value)
        };

        let port = match args.port {
            Some(p) => p,
            None => parse_env::<u16>("PORT", text("PORT")?)?.unwrap_or(3100),
        };

        let scanner_args = args
            .scanner_args
            .or(text("SCANNER_ARGS")?)
            .unwrap_or_else(|| "--no-summary".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let cfg = Self {
            bucket_name: args
                .bucket_name
                .or(text("BUCKET_NAME")?)
                .filter(|b| !b.trim().is_empty()),
            max_file_size_mb: match args.max_file_size_mb {
                Some(v) => v,
                None => parsed("MAX_FILE_SIZE_MB")?.unwrap_or(100),
            },
            scan_timeout: secs(args.scan_timeout_seconds, "SCAN_TIMEOUT_SECONDS", 300)?,
            time_budget_margin: secs(
                args.time_budget_margin_seconds,
                "TIME_BUDGET_MARGIN_SECONDS",
                30,
            )?,
            invocation_budget: secs(
                args.invocation_budget_seconds,
                "INVOCATION_BUDGET_SECONDS",
                900,
            )?,
            store_timeout: secs(args.store_timeout_seconds, "STORE_TIMEOUT_SECONDS", 60)?,
            list_page_size: count(args.list_page_size, "LIST_PAGE_SIZE", 1000)?,
            max_concurrency: count(args.max_concurrency, "MAX_CONCURRENCY", 1)?,
            storage_dir: args
                .storage_dir
                .or(text("STORAGE_DIR")?)
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .or(text("DATABASE_URL")?)
                .unwrap_or_else(|| "sqlite://./data/meta/object_store.db".into()),
            workspace_root: args
                .workspace_root
                .or(text("WORKSPACE_ROOT")?.map(PathBuf::from))
                .unwrap_or_else(|| env::temp_dir().join("object-scanner")),
            scanner_program: args
                .scanner_program
                .or(text("SCANNER_PROGRAM")?)
                .unwrap_or_else(|| "clamscan".into()),
            scanner_args,
            host: args
                .host
                .or(text("HOST")?)
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
        };

        if cfg.time_budget_margin >= cfg.invocation_budget {
            bail!(
                "time budget margin ({}s) must be smaller than the invocation budget ({}s)",
                cfg.time_budget_margin.as_secs(),
                cfg.invocation_budget.as_secs()
            );
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("parsing {ENV_PREFIX}{name} value `{raw}`"))
        })
        .transpose()
}
