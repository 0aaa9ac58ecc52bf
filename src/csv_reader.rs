use crate::data::PlotData;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Parse CSV with a header row. Cells stay strings; numeric coercion happens
/// when records are materialized.
pub fn read_csv<R: Read>(reader: R) -> Result<PlotData> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV record {}", i + 1))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        anyhow::bail!("CSV input must contain a header and at least one data row");
    }

    Ok(PlotData::from_strings(headers, rows))
}

pub fn read_csv_from_stdin() -> Result<PlotData> {
    read_csv(io::stdin().lock())
}

pub fn read_csv_file(path: &Path) -> Result<PlotData> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_csv(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_csv() {
        let input = "x, y,species\n1, 2.5,setosa\n3,4,virginica\n";
        let data = read_csv(input.as_bytes()).unwrap();
        assert_eq!(data.headers, vec!["x", "y", "species"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.row(0).unwrap().get("y"), Some(&json!("2.5")));
    }

    #[test]
    fn test_header_only_is_rejected() {
        let err = read_csv("x,y\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("at least one data row"));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        assert!(read_csv("x,y\n1,2\n3\n".as_bytes()).is_err());
    }
}
