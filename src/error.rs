// src/error.rs

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use thiserror::Error;

/// Everything that can go wrong while building, transforming or loading a table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("column `{name}` not found (available: {})", .available.join(", "))]
    MissingColumn { name: String, available: Vec<String> },

    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),

    #[error("column `{name}` has {actual} values but the table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot apply `{op}` to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: DataType,
        right: DataType,
    },

    #[error("unsupported type {data_type} in {context}")]
    UnsupportedType { context: String, data_type: DataType },

    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("function `{0}` cannot be called directly; bind it and call `@{0}(...)` instead")]
    UnsupportedFunction(String),

    #[error("nothing is bound to `@{0}`")]
    UnboundName(String),

    #[error("invalid arguments to `{function}`: {message}")]
    InvalidArguments { function: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl TableError {
    pub(crate) fn missing_column<'a>(
        name: &str,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        TableError::MissingColumn {
            name: name.to_string(),
            available: available.into_iter().map(str::to_string).collect(),
        }
    }

    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        TableError::Parse {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T, E = TableError> = std::result::Result<T, E>;
