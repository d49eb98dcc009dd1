use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::filter::FilteredTable;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Destination + credential for the optional spreadsheet mirror, both taken
/// from the environment. Either one missing means the stage is skipped, not
/// failed.
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    access_token: String,
}

impl SheetsConfig {
    pub fn from_env() -> Option<Self> {
        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID").ok()?;
        let access_token = std::env::var("SHEETS_ACCESS_TOKEN").ok()?;
        Some(Self {
            spreadsheet_id,
            access_token,
        })
    }
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

/// A1-notation reference to a whole worksheet. Titles with spaces or
/// punctuation must be single-quoted, with embedded quotes doubled.
fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Best-effort typed conversion for one cell: text that parses as a finite
/// number is sent as a number so the sheet treats it as a value, everything
/// else stays text. Purely presentational; the relational sink never sees it.
fn cell_value(text: &str) -> Value {
    match text
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        Some(n) => Value::Number(n),
        None => Value::String(text.to_string()),
    }
}

/// Header as plain text, data cells through the typed conversion.
fn table_values(data: &FilteredTable) -> Vec<Vec<Value>> {
    let mut values = Vec::with_capacity(data.row_count() + 1);
    values.push(
        data.header()
            .iter()
            .map(|name| Value::String(name.clone()))
            .collect(),
    );
    for row in data.rows() {
        values.push(row.iter().map(|cell| cell_value(cell)).collect());
    }
    values
}

async fn first_sheet_title(client: &Client, cfg: &SheetsConfig) -> Result<String> {
    let url = format!(
        "{}/{}?fields=sheets.properties.title",
        API_BASE, cfg.spreadsheet_id
    );
    let meta: SpreadsheetMeta = client
        .get(&url)
        .bearer_auth(&cfg.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    meta.sheets
        .into_iter()
        .next()
        .map(|sheet| sheet.properties.title)
        .ok_or_else(|| anyhow!("spreadsheet {} has no worksheets", cfg.spreadsheet_id))
}

/// Clear the first worksheet and rewrite it with the full filtered table.
pub async fn replace_sheet(client: &Client, cfg: &SheetsConfig, data: &FilteredTable) -> Result<()> {
    let title = first_sheet_title(client, cfg)
        .await
        .context("looking up destination worksheet")?;

    let range = sheet_range(&title);
    let clear_url = format!("{}/{}/values/{}:clear", API_BASE, cfg.spreadsheet_id, range);
    client
        .post(&clear_url)
        .bearer_auth(&cfg.access_token)
        .json(&json!({}))
        .send()
        .await?
        .error_for_status()
        .context("clearing worksheet")?;

    let update_url = format!(
        "{}/{}/values/{}!A1?valueInputOption=RAW",
        API_BASE, cfg.spreadsheet_id, range
    );
    client
        .put(&update_url)
        .bearer_auth(&cfg.access_token)
        .json(&json!({ "values": table_values(data) }))
        .send()
        .await?
        .error_for_status()
        .context("writing worksheet values")?;

    info!(rows = data.row_count(), sheet = %title, "spreadsheet updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sheet_range_quotes_titles() {
        assert_eq!(sheet_range("Sheet1"), "'Sheet1'");
        assert_eq!(sheet_range("Form Responses 1"), "'Form Responses 1'");
        assert_eq!(sheet_range("Bob's data"), "'Bob''s data'");
    }

    #[test]
    fn config_requires_both_env_vars() {
        // Serialize env mutation; nothing else in the crate touches these vars.
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::remove_var("SHEETS_SPREADSHEET_ID");
        std::env::remove_var("SHEETS_ACCESS_TOKEN");
        assert!(SheetsConfig::from_env().is_none());

        std::env::set_var("SHEETS_SPREADSHEET_ID", "sheet-id");
        assert!(SheetsConfig::from_env().is_none());

        std::env::set_var("SHEETS_ACCESS_TOKEN", "token");
        let cfg = SheetsConfig::from_env().expect("both vars set");
        assert_eq!(cfg.spreadsheet_id, "sheet-id");

        std::env::remove_var("SHEETS_SPREADSHEET_ID");
        std::env::remove_var("SHEETS_ACCESS_TOKEN");
    }

    #[test]
    fn numeric_text_becomes_a_number() {
        assert_eq!(cell_value("82.5"), json!(82.5));
        assert_eq!(cell_value("1e3"), json!(1000.0));
        assert_eq!(cell_value("-15"), json!(-15.0));
    }

    #[test]
    fn non_numeric_text_stays_text() {
        assert_eq!(cell_value("Alice"), json!("Alice"));
        assert_eq!(cell_value(""), json!(""));
        // Parses as f64 but is not a representable JSON number.
        assert_eq!(cell_value("inf"), json!("inf"));
    }

    #[test]
    fn mixed_row_converts_per_cell() {
        let table = FilteredTable::new(
            vec!["Name".into(), "TotalKg".into()],
            vec![vec!["Alice".into(), "1000".into()]],
        );
        let values = table_values(&table);
        assert_eq!(values[0], vec![json!("Name"), json!("TotalKg")]);
        assert_eq!(values[1], vec![json!("Alice"), json!(1000.0)]);
    }
}
