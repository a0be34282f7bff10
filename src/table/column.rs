// src/table/column.rs

use arrow::array::{Array, ArrayRef};
use std::fmt;

use super::Table;
use crate::{
    error::Result,
    expr::{evaluate, Bindings, ColumnarValue, Expr, ScalarValue},
};

type ComputeFn = Box<dyn Fn(&Table) -> Result<ColumnarValue> + Send + Sync>;

/// Where the values of a newly assigned column come from.
pub enum ColumnSpec {
    /// The same value in every row.
    Scalar(ScalarValue),
    /// Values already computed, typically from another reference to the same table.
    Values(ArrayRef),
    /// An expression evaluated against the table being assigned to.
    Expr(Expr),
    /// A closure evaluated against the table being assigned to.
    Computed(ComputeFn),
}

impl ColumnSpec {
    pub fn scalar(value: impl Into<ScalarValue>) -> Self {
        ColumnSpec::Scalar(value.into())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Table) -> Result<ColumnarValue> + Send + Sync + 'static,
    {
        ColumnSpec::Computed(Box::new(f))
    }

    /// Produce the column for `table`. Length is checked by the caller.
    pub(crate) fn resolve(&self, table: &Table, bindings: &Bindings) -> Result<ArrayRef> {
        let value = match self {
            ColumnSpec::Scalar(v) => ColumnarValue::Scalar(v.clone()),
            ColumnSpec::Values(a) => ColumnarValue::Array(a.clone()),
            ColumnSpec::Expr(e) => evaluate(e, table, bindings)?,
            ColumnSpec::Computed(f) => f(table)?,
        };
        Ok(value.into_array(table.num_rows()))
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            ColumnSpec::Values(a) => write!(f, "Values({} x {})", a.len(), a.data_type()),
            ColumnSpec::Expr(e) => write!(f, "Expr({e})"),
            ColumnSpec::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<ScalarValue> for ColumnSpec {
    fn from(v: ScalarValue) -> Self {
        ColumnSpec::Scalar(v)
    }
}

impl From<Expr> for ColumnSpec {
    fn from(e: Expr) -> Self {
        ColumnSpec::Expr(e)
    }
}

impl From<ArrayRef> for ColumnSpec {
    fn from(a: ArrayRef) -> Self {
        ColumnSpec::Values(a)
    }
}
