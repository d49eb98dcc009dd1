use anyhow::Result;

/// The filtered dataset, materialized once and read by each sink in turn.
/// Immutable after construction; every accessor hands out a fresh cursor so
/// repeated full reads are cheap and identical.
#[derive(Debug)]
pub struct FilteredTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FilteredTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Fresh iterator over the data rows (header excluded).
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|row| row.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize header + rows as RFC-4180 CSV, the payload format for the
    /// Postgres COPY load.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            writer.write_record(&self.header)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        Ok(buf)
    }
}
