use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::io::{Cursor, Read};
use tracing::info;
use zip::ZipArchive;

/// Download the archive at `url` into memory.
/// The dataset is published as a single ZIP; it is consumed once and never
/// needed again, so it is not persisted to disk.
pub async fn download_archive(client: &Client, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    info!(bytes = bytes.len(), "download complete");
    Ok(bytes.to_vec())
}

/// Cap on the capacity preallocated from a member's declared uncompressed
/// size; the declared size is attacker-controlled header data, so a corrupt
/// archive must not translate into an arbitrary allocation. The buffer still
/// grows past this as real bytes arrive.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

fn prealloc_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC as u64) as usize
}

/// Scan the ZIP for its tabular member and return the member's name plus its
/// decompressed contents. The first `.csv` entry wins; an archive without one
/// is a fatal error.
pub fn extract_csv_member(bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("opening ZIP archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if !name.to_lowercase().ends_with(".csv") {
            continue;
        }
        let mut buf = Vec::with_capacity(prealloc_capacity(entry.size()));
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("decompressing {}", name))?;
        return Ok((name, buf));
    }

    Err(anyhow!("no CSV member found in the archive"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{ExtendedFileOptions, FileOptions};
    use zip::CompressionMethod;

    fn build_zip(members: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, content) in members {
                let options = FileOptions::<ExtendedFileOptions>::default()
                    .compression_method(CompressionMethod::Stored);
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extracts_first_csv_member() -> Result<()> {
        let zip = build_zip(&[
            ("README.txt", "not tabular"),
            ("openpowerlifting-2024.csv", "Name,TotalKg\nAlice,1000\n"),
            ("extra.csv", "ignored"),
        ]);

        let (name, contents) = extract_csv_member(&zip)?;
        assert_eq!(name, "openpowerlifting-2024.csv");
        assert_eq!(contents, b"Name,TotalKg\nAlice,1000\n");
        Ok(())
    }

    #[test]
    fn csv_extension_match_is_case_insensitive() -> Result<()> {
        let zip = build_zip(&[("DATA.CSV", "a,b\n1,2\n")]);
        let (name, _) = extract_csv_member(&zip)?;
        assert_eq!(name, "DATA.CSV");
        Ok(())
    }

    #[test]
    fn declared_member_size_does_not_drive_allocation() {
        assert_eq!(prealloc_capacity(64), 64);
        assert_eq!(prealloc_capacity(u64::MAX), MAX_PREALLOC);
    }

    #[test]
    fn archive_without_csv_member_is_fatal() {
        let zip = build_zip(&[("notes.txt", "nothing tabular here")]);
        let err = extract_csv_member(&zip).unwrap_err();
        assert!(err.to_string().contains("no CSV member"));
    }
}
