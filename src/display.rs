// src/display.rs

use arrow::{csv::Writer as CsvWriter, json::ArrayWriter, util::pretty::pretty_format_batches};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io;

use crate::{error::Result, table::Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII grid with a shape footer
    #[default]
    Table,
    Csv,
    /// JSON array of row objects
    Json,
}

/// Render `table` for the console.
///
/// `max_rows` only limits the grid format; CSV and JSON always carry every row.
pub fn render(table: &Table, format: OutputFormat, max_rows: usize) -> Result<String> {
    match format {
        OutputFormat::Table => render_grid(table, max_rows),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            {
                let mut writer = CsvWriter::new(&mut buf);
                writer.write(table.batch())?;
            }
            utf8(buf)
        }
        OutputFormat::Json => {
            let mut buf = Vec::new();
            {
                let mut writer = ArrayWriter::new(&mut buf);
                writer.write(table.batch())?;
                writer.finish()?;
            }
            let mut out = utf8(buf)?;
            out.push('\n');
            Ok(out)
        }
    }
}

fn render_grid(table: &Table, max_rows: usize) -> Result<String> {
    let shown = table.head(max_rows);
    let mut out = String::new();
    if table.num_columns() > 0 {
        let grid = pretty_format_batches(&[shown.batch().clone()])?;
        out.push_str(&format!("{grid}\n"));
    }
    if table.num_rows() > shown.num_rows() {
        out.push_str(&format!(
            "... showing first {} of {} rows\n",
            shown.num_rows(),
            table.num_rows()
        ));
    }
    out.push_str(&format!(
        "[{} rows x {} columns]\n",
        table.num_rows(),
        table.num_columns()
    ));
    Ok(out)
}

fn utf8(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;

    fn prices() -> Table {
        Table::try_new(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            (
                "list_price",
                Arc::new(Float64Array::from(vec![19.99, 17.99, 9.99])) as ArrayRef,
            ),
        ])
        .expect("valid table")
    }

    #[test]
    fn test_grid_has_header_rows_and_footer() -> Result<()> {
        let out = render(&prices(), OutputFormat::Table, 10)?;
        assert!(out.contains("| id | list_price |"));
        assert!(out.contains("| 2  | 17.99      |"));
        assert!(out.ends_with("[3 rows x 2 columns]\n"));
        assert!(!out.contains("showing first"));
        Ok(())
    }

    #[test]
    fn test_grid_truncates() -> Result<()> {
        let out = render(&prices(), OutputFormat::Table, 2)?;
        assert!(out.contains("... showing first 2 of 3 rows"));
        assert!(!out.contains("| 3  |"));
        Ok(())
    }

    #[test]
    fn test_grid_with_no_columns() -> Result<()> {
        let t = prices().drop_columns(["id", "list_price"])?;
        assert_eq!(render(&t, OutputFormat::Table, 10)?, "[3 rows x 0 columns]\n");
        Ok(())
    }

    #[test]
    fn test_csv_and_json_carry_every_row() -> Result<()> {
        let csv = render(&prices(), OutputFormat::Csv, 1)?;
        assert_eq!(csv, "id,list_price\n1,19.99\n2,17.99\n3,9.99\n");

        let json = render(&prices(), OutputFormat::Json, 1)?;
        let rows: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(rows.as_array().map(Vec::len), Some(3));
        assert_eq!(rows[2]["list_price"], serde_json::json!(9.99));
        Ok(())
    }
}
