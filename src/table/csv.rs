// src/table/csv.rs

use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
};
use std::{
    fs::File,
    io::{Read, Seek},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info};

use super::Table;
use crate::error::Result;

/// How a delimited file is read.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Rows scanned to infer column types; `None` scans the whole file.
    pub infer_rows: Option<usize>,
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            has_header: true,
            infer_rows: Some(1000),
            batch_size: 8192,
        }
    }
}

/// Load a delimited text file into a single in-memory table.
#[tracing::instrument(level = "info", skip(path, options), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Table> {
    let file = File::open(path.as_ref())?;
    let table = read_csv_from(file, options)?;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded csv"
    );
    Ok(table)
}

/// Load delimited text from any seekable reader. The reader is scanned once
/// for type inference, rewound, then read in full.
pub fn read_csv_from<R: Read + Seek>(mut reader: R, options: &CsvOptions) -> Result<Table> {
    let format = Format::default()
        .with_header(options.has_header)
        .with_delimiter(options.delimiter);
    let (schema, scanned) = format.infer_schema(&mut reader, options.infer_rows)?;
    debug!(scanned, fields = schema.fields().len(), "inferred csv schema");
    reader.rewind()?;

    let schema = Arc::new(schema);
    let csv = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(options.has_header)
        .with_delimiter(options.delimiter)
        .with_batch_size(options.batch_size)
        .build(reader)?;

    let batches = csv.collect::<Result<Vec<_>, _>>()?;
    let combined = concat_batches(&schema, &batches)?;
    Table::from_batch(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use anyhow::Result;
    use arrow::{
        array::{Array, AsArray},
        datatypes::{DataType, Float64Type, Int64Type},
    };
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,colassign::table=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const GAMES: &str = "id,name,inventor,year,min_age,min_players,max_players,list_price
1,Monopoly,Elizabeth Magie,1903,8,2,6,19.99
2,Scrabble,Alfred Mosher Butts,1938,8,2,4,17.99
3,Clue,Anthony E. Pratt,1944,8,2,6,9.99
";

    #[test]
    fn test_read_csv_file() -> Result<()> {
        init_test_logging();
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(GAMES.as_bytes())?;

        let t = read_csv(tmp.path(), &CsvOptions::default())?;
        assert_eq!(t.num_rows(), 3);
        assert_eq!(
            t.column_names(),
            vec!["id", "name", "inventor", "year", "min_age", "min_players", "max_players", "list_price"]
        );
        assert_eq!(t.column("id")?.data_type(), &DataType::Int64);
        assert_eq!(t.column("list_price")?.data_type(), &DataType::Float64);
        assert_eq!(
            t.column("list_price")?.as_primitive::<Float64Type>().values().to_vec(),
            vec![19.99, 17.99, 9.99]
        );
        assert_eq!(
            t.column("name")?.as_string::<i32>().value(1),
            "Scrabble"
        );
        Ok(())
    }

    #[test]
    fn test_small_batches_are_concatenated() -> Result<()> {
        let opts = CsvOptions {
            batch_size: 1,
            ..CsvOptions::default()
        };
        let t = read_csv_from(Cursor::new(GAMES.as_bytes()), &opts)?;
        assert_eq!(t.num_rows(), 3);
        assert_eq!(
            t.column("year")?.as_primitive::<Int64Type>().values().to_vec(),
            vec![1903, 1938, 1944]
        );
        Ok(())
    }

    #[test]
    fn test_other_delimiter() -> Result<()> {
        let opts = CsvOptions {
            delimiter: b';',
            ..CsvOptions::default()
        };
        let t = read_csv_from(Cursor::new("a;b\n1;x\n".as_bytes()), &opts)?;
        assert_eq!(t.column_names(), vec!["a", "b"]);
        assert_eq!(t.num_rows(), 1);
        Ok(())
    }

    #[test]
    fn test_header_only_file_has_no_rows() -> Result<()> {
        let t = read_csv_from(Cursor::new("id,list_price\n".as_bytes()), &CsvOptions::default())?;
        assert_eq!(t.num_rows(), 0);
        assert_eq!(t.column_names(), vec!["id", "list_price"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        let err = read_csv_from(Cursor::new("a,a\n1,2\n".as_bytes()), &CsvOptions::default())
            .unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn(ref n) if n == "a"));
    }

    #[test]
    fn test_missing_file_propagates_io_error() {
        let err = read_csv("does/not/exist.csv", &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, TableError::Io(_)));
    }
}
