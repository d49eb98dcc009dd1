use anyhow::{Context, Result};
use sqlx::postgres::PgPoolCopyExt;
use sqlx::PgPool;
use tracing::info;

use crate::filter::FilteredTable;

/// Quote a SQL identifier. Column names come straight from the CSV header,
/// so they are quoted verbatim rather than trusted as bare identifiers.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|col| format!("{} TEXT", quote_ident(col)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table), cols)
}

fn copy_sql(table: &str) -> String {
    format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, HEADER true)",
        quote_ident(table)
    )
}

/// Replace `table` with the filtered dataset: drop, recreate with one TEXT
/// column per header field, bulk-load via COPY. Rerunning always leaves the
/// table holding exactly the latest dataset, even if the upstream header
/// gained or lost columns since the previous run.
pub async fn replace_table(pool: &PgPool, table: &str, data: &FilteredTable) -> Result<u64> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
        .execute(pool)
        .await
        .context("dropping previous table")?;
    sqlx::query(&create_table_sql(table, data.header()))
        .execute(pool)
        .await
        .with_context(|| format!("creating table {}", table))?;

    let payload = data.to_csv()?;
    let mut copy = pool
        .copy_in_raw(&copy_sql(table))
        .await
        .context("starting COPY")?;
    copy.send(payload.as_slice())
        .await
        .context("sending COPY payload")?;
    let rows = copy.finish().await.context("finishing COPY")?;

    info!(rows, table, "bulk load complete");
    Ok(rows)
}
