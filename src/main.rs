use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::{fs, io::AsyncReadExt, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{RunMode, ScannerConfig};
use handlers::AppState;
use models::event::InvocationEvent;
use services::{
    batch::BatchDriver,
    fetcher::ObjectFetcher,
    invoker::Invoker,
    object_store::ObjectStore,
    pipeline::ScanPipeline,
    scanner::ClamScanner,
    sqlite_store::SqliteObjectStore,
    workspace::TempWorkspaceManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr, so one-shot summaries own stdout) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = ScannerConfig::from_env_and_args()?;
    tracing::info!("Starting object-scanner with config: {:?}", cfg);

    // --- Object store (read-only view of the store service's state) ---
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&cfg.database_url)
            .await
            .with_context(|| format!("connecting to {}", cfg.database_url))?,
    );
    if !Path::new(&cfg.storage_dir).is_dir() {
        tracing::warn!(
            "storage directory {} does not exist; every download will fail",
            cfg.storage_dir
        );
    }
    let store: Arc<dyn ObjectStore> = Arc::new(SqliteObjectStore::new(
        db,
        cfg.storage_dir.clone(),
        cfg.list_page_size,
    ));

    // --- Workspaces ---
    fs::create_dir_all(&cfg.workspace_root)
        .await
        .with_context(|| format!("creating workspace root {}", cfg.workspace_root.display()))?;

    // --- Orchestration ---
    let invoker = Arc::new(build_invoker(&cfg, store.clone()));

    match mode {
        RunMode::Event(path) => {
            let event = read_event(&path).await?;
            print_summary(&invoker.invoke(&event).await)
        }
        RunMode::Once => print_summary(&invoker.invoke(&InvocationEvent::default()).await),
        RunMode::Serve => serve(&cfg, invoker, store).await,
    }
}

fn build_invoker(cfg: &ScannerConfig, store: Arc<dyn ObjectStore>) -> Invoker {
    let scanner = Arc::new(ClamScanner::new(
        cfg.scanner_program.clone(),
        cfg.scanner_args.clone(),
    ));
    let workspaces = Arc::new(TempWorkspaceManager::new(cfg.workspace_root.clone()));
    let pipeline = Arc::new(ScanPipeline::new(
        ObjectFetcher::new(store.clone(), cfg.max_file_size_mb, cfg.store_timeout),
        scanner,
        workspaces,
        cfg.scan_timeout,
    ));
    let batch = BatchDriver::new(
        store,
        pipeline.clone(),
        cfg.time_budget_margin,
        cfg.store_timeout,
        cfg.max_concurrency,
    );
    Invoker::new(
        pipeline,
        batch,
        cfg.bucket_name.clone(),
        cfg.invocation_budget,
    )
}

/// Read an invocation event from a JSON file, or stdin when `path` is `-`.
async fn read_event(path: &Path) -> Result<InvocationEvent> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("reading event from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("reading event file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("parsing invocation event")
}

fn print_summary(summary: &models::summary::ScanSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

async fn serve(cfg: &ScannerConfig, invoker: Arc<Invoker>, store: Arc<dyn ObjectStore>) -> Result<()> {
    let state = AppState {
        invoker,
        store,
        workspace_root: cfg.workspace_root.clone(),
    };
    let app: Router = routes::routes::routes().with_state(state);

    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Scanner listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
