// src/config.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::{display::OutputFormat, expr::ScalarValue, table::CsvOptions};

pub const DEFAULT_DATA: &str = "data/games/games.csv";

#[derive(Debug, Parser)]
#[command(name = "colassign")]
#[command(version)]
#[command(about = "Derive new columns on an in-memory table", long_about = None)]
pub struct Cli {
    /// CSV file to load
    #[arg(long, short = 'd', env = "COLASSIGN_DATA", default_value = DEFAULT_DATA)]
    pub data: PathBuf,

    /// Field delimiter of the CSV file
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Rows shown in the table format
    #[arg(long, short = 'n', env = "COLASSIGN_ROWS", default_value_t = 10)]
    pub rows: usize,

    #[arg(long, short = 'f', env = "COLASSIGN_FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Default, Subcommand)]
pub enum Command {
    /// Walk through every assignment example (default)
    #[default]
    Demo,
    /// Print the loaded table
    Show,
    /// Run `target = expression` statements against the table
    Eval {
        #[arg(long, short = 'e')]
        expr: String,
        /// Bind a value for `@name`, as `name=value`
        #[arg(long = "bind", short = 'b', value_parser = parse_binding)]
        bind: Vec<(String, ScalarValue)>,
    },
    /// Apply a YAML or JSON recipe
    Apply {
        #[arg(long, short = 'r')]
        recipe: PathBuf,
    },
}

/// Resolved, validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_path: PathBuf,
    pub delimiter: u8,
    pub display_rows: usize,
    pub format: OutputFormat,
    pub command: Command,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let delimiter = parse_delimiter(&cli.delimiter)?;
        let settings = Settings {
            data_path: cli.data,
            delimiter,
            display_rows: cli.rows,
            format: cli.format,
            command: cli.command.unwrap_or_default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.display_rows == 0 {
            bail!("--rows must be at least 1");
        }
        if self.data_path.as_os_str().is_empty() {
            bail!("--data must not be empty");
        }
        Ok(())
    }

    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            delimiter: self.delimiter,
            ..CsvOptions::default()
        }
    }
}

fn parse_delimiter(s: &str) -> Result<u8> {
    let s = if s == "\\t" { "\t" } else { s };
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => bail!("delimiter must be a single ASCII character, got {s:?}"),
    }
}

/// `name=value`; integers, floats and `true`/`false` are typed, anything
/// else is kept as a string.
pub fn parse_binding(s: &str) -> Result<(String, ScalarValue)> {
    let (name, raw) = s
        .split_once('=')
        .with_context(|| format!("expected name=value, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("binding name is empty in {s:?}");
    }
    let raw = raw.trim();
    let value = if let Ok(i) = raw.parse::<i64>() {
        ScalarValue::Int64(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        ScalarValue::Float64(f)
    } else {
        match raw {
            "true" => ScalarValue::Boolean(true),
            "false" => ScalarValue::Boolean(false),
            _ => ScalarValue::Utf8(raw.to_string()),
        }
    };
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Result<Settings> {
        let cli = Cli::try_parse_from(std::iter::once("colassign").chain(args.iter().copied()))?;
        Settings::from_cli(cli)
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let s = settings(&[])?;
        assert_eq!(s.command, Command::Demo);
        assert_eq!(s.delimiter, b',');
        assert_eq!(s.format, OutputFormat::Table);
        assert!(s.display_rows > 0);
        Ok(())
    }

    #[test]
    fn test_eval_with_bindings() -> Result<()> {
        let s = settings(&[
            "-f",
            "csv",
            "--delimiter",
            ";",
            "eval",
            "-e",
            "total = list_price * @rate",
            "-b",
            "rate=1.08875",
            "--bind",
            "label=retail",
        ])?;
        assert_eq!(s.format, OutputFormat::Csv);
        assert_eq!(s.delimiter, b';');
        let Command::Eval { expr, bind } = s.command else {
            panic!("expected eval");
        };
        assert_eq!(expr, "total = list_price * @rate");
        assert_eq!(
            bind,
            vec![
                ("rate".to_string(), ScalarValue::Float64(1.08875)),
                ("label".to_string(), ScalarValue::Utf8("retail".into())),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_validation() {
        assert!(settings(&["--rows", "0"]).is_err());
        assert!(settings(&["--delimiter", ",,"]).is_err());
        assert!(settings(&["--delimiter", "é"]).is_err());
        assert_eq!(settings(&["--delimiter", "\\t"]).map(|s| s.delimiter).ok(), Some(b'\t'));
    }

    #[test]
    fn test_parse_binding() -> Result<()> {
        assert_eq!(parse_binding("n=3")?, ("n".into(), ScalarValue::Int64(3)));
        assert_eq!(parse_binding("ok = true")?, ("ok".into(), ScalarValue::Boolean(true)));
        assert!(parse_binding("novalue").is_err());
        assert!(parse_binding("=1").is_err());
        Ok(())
    }
}
