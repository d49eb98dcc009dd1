use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::io::Read;
use tracing::info;

mod table;

pub use table::FilteredTable;

/// Diagnostic counters from a filter pass. Not persisted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub rows_seen: u64,
    pub rows_kept: u64,
}

/// Single pass over a CSV stream: normalize the header, resolve `column`,
/// keep every data row whose value in that column is a finite number
/// `>= min_value`.
///
/// The header is normalized by stripping every `"` from each field (the
/// upstream export leaks stray quotes into column names). Kept rows are the
/// original records, untouched. Short rows and rows whose threshold field is
/// not numeric are skipped silently; only a missing `column` is an error, and
/// it fires before any data row is buffered.
pub fn filter_csv<R: Read>(
    input: R,
    column: &str,
    min_value: f64,
) -> Result<(FilteredTable, FilterReport)> {
    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut records = reader.into_records();

    let header = records
        .next()
        .ok_or_else(|| anyhow!("input stream is empty, no header row"))?
        .context("reading header row")?;
    let header: Vec<String> = header.iter().map(|field| field.replace('"', "")).collect();

    let total_index = header
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| anyhow!("column {:?} not found in header {:?}", column, header))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut report = FilterReport {
        rows_seen: 0,
        rows_kept: 0,
    };

    for record in records {
        report.rows_seen += 1;

        // Row-level problems never escalate: unreadable or short rows are
        // dropped, as are rows whose threshold field is not numeric.
        let Ok(record) = record else { continue };
        let Some(raw) = record.get(total_index) else {
            continue;
        };
        let Ok(value) = raw.parse::<f64>() else {
            continue;
        };

        if value.is_finite() && value >= min_value {
            rows.push(record.iter().map(str::to_string).collect());
            report.rows_kept += 1;
        }
    }

    info!(
        seen = report.rows_seen,
        kept = report.rows_kept,
        "filter pass complete"
    );
    Ok((FilteredTable::new(header, rows), report))
}
