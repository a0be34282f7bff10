// src/lib.rs

//! Derive new columns on an immutable, in-memory table: constant columns,
//! row-wise expressions, closures, and `target = expression` statements,
//! plus renaming and dropping columns.

pub mod config;
pub mod display;
pub mod error;
pub mod expr;
pub mod recipe;
pub mod table;
pub mod walkthrough;

pub use error::{Result, TableError};
pub use expr::{bound, call, col, lit, Bindings, ColumnarValue, Expr, ScalarValue};
pub use table::{read_csv, ColumnSpec, CsvOptions, Table};
