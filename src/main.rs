use anyhow::{Context, Result};
use oplloader::{fetch, filter, sink};
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DATA_URL: &str =
    "https://openpowerlifting.gitlab.io/opl-csv/files/openpowerlifting-latest.zip";
const THRESHOLD_COLUMN: &str = "TotalKg";
const THRESHOLD_KG: f64 = 1000.0;
const TABLE_NAME: &str = "raw_openpowerlifting";

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) fetch the archive ────────────────────────────────────────
    let client = Client::new();
    info!("fetching dataset from {}", DATA_URL);
    let archive = fetch::download_archive(&client, DATA_URL).await?;

    let (member, csv_bytes) = fetch::extract_csv_member(&archive)?;
    info!(member = %member, "found tabular member");

    // ─── 3) filter rows ──────────────────────────────────────────────
    // The uncompressed dataset is large; keep the pass off the async workers.
    let (table, report) = tokio::task::spawn_blocking(move || {
        filter::filter_csv(csv_bytes.as_slice(), THRESHOLD_COLUMN, THRESHOLD_KG)
    })
    .await??;
    info!(
        seen = report.rows_seen,
        kept = report.rows_kept,
        "filtering done"
    );

    // ─── 4) relational sink ──────────────────────────────────────────
    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await
        .context("connecting to Postgres")?;
    let loaded = sink::postgres::replace_table(&pool, TABLE_NAME, &table).await?;
    info!(rows = loaded, "relational load complete");

    // ─── 5) optional spreadsheet sink ────────────────────────────────
    match sink::sheets::SheetsConfig::from_env() {
        Some(cfg) => {
            if let Err(err) = sink::sheets::replace_sheet(&client, &cfg, &table).await {
                warn!("spreadsheet sink failed: {:#}", err);
            }
        }
        None => info!("spreadsheet credential absent; skipping spreadsheet sink"),
    }

    info!("all done");
    Ok(())
}
