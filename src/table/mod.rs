// src/table/mod.rs

//! The in-memory [`Table`] and its derived transformations.
//!
//! Every operation borrows the input and returns a new `Table`. Column data
//! is reference counted, so untouched columns are shared rather than copied.

pub mod column;
pub mod csv;

pub use column::ColumnSpec;
pub use csv::{read_csv, read_csv_from, CsvOptions};

use arrow::{
    array::{Array, ArrayRef},
    datatypes::{Field, FieldRef, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, trace};

use crate::{
    error::{Result, TableError},
    expr::{parse_program, Bindings, ColumnarValue, Expr, ScalarValue, Statement},
};

/// Named, ordered columns of equal length. Column names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap an existing batch, rejecting duplicate column names.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in batch.schema_ref().fields() {
            if !seen.insert(field.name().as_str()) {
                return Err(TableError::DuplicateColumn(field.name().clone()));
            }
        }
        Ok(Table { batch })
    }

    /// Build from `(name, values)` pairs. The row count is taken from the
    /// first column; a table with no columns has no rows.
    pub fn try_new<I, N>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, ArrayRef)>,
        N: Into<String>,
    {
        let (fields, arrays): (Vec<FieldRef>, Vec<ArrayRef>) = columns
            .into_iter()
            .map(|(name, values)| {
                let field = Arc::new(Field::new(name.into(), values.data_type().clone(), true));
                (field, values)
            })
            .unzip();
        let num_rows = arrays.first().map_or(0, |a| a.len());
        Self::from_fields(fields, arrays, num_rows)
    }

    fn from_fields(fields: Vec<FieldRef>, arrays: Vec<ArrayRef>, num_rows: usize) -> Result<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for (field, values) in fields.iter().zip(&arrays) {
            if !seen.insert(field.name().as_str()) {
                return Err(TableError::DuplicateColumn(field.name().clone()));
            }
            if values.len() != num_rows {
                return Err(TableError::LengthMismatch {
                    name: field.name().clone(),
                    expected: num_rows,
                    actual: values.len(),
                });
            }
        }
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
        Ok(Table { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .position(|f| f.name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.position(name)
            .map(|i| self.batch.column(i))
            .ok_or_else(|| TableError::missing_column(name, self.column_names()))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// The first `n` rows (or all of them, if there are fewer).
    pub fn head(&self, n: usize) -> Table {
        Table {
            batch: self.batch.slice(0, n.min(self.num_rows())),
        }
    }

    /// Add or replace columns.
    ///
    /// Every spec is evaluated against `self`, so a column introduced by this
    /// call cannot be referenced by another spec of the same call; chain a
    /// second `assign` for that. Existing names keep their position, new
    /// names are appended in order.
    pub fn assign<I, N>(&self, columns: I) -> Result<Table>
    where
        I: IntoIterator<Item = (N, ColumnSpec)>,
        N: Into<String>,
    {
        self.assign_with_bindings(columns, &Bindings::default())
    }

    /// [`Table::assign`], resolving `@` names in expression specs against `bindings`.
    pub fn assign_with_bindings<I, N>(&self, columns: I, bindings: &Bindings) -> Result<Table>
    where
        I: IntoIterator<Item = (N, ColumnSpec)>,
        N: Into<String>,
    {
        let mut fields: Vec<FieldRef> = self.batch.schema_ref().fields().iter().cloned().collect();
        let mut arrays: Vec<ArrayRef> = self.batch.columns().to_vec();
        let mut assigned = HashSet::new();

        for (name, spec) in columns {
            let name: String = name.into();
            if !assigned.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            let values = spec.resolve(self, bindings)?;
            if values.len() != self.num_rows() {
                return Err(TableError::LengthMismatch {
                    name,
                    expected: self.num_rows(),
                    actual: values.len(),
                });
            }
            let field = Arc::new(Field::new(&name, values.data_type().clone(), true));
            match fields.iter().position(|f| f.name() == &name) {
                Some(i) => {
                    trace!(column = %name, "replacing existing column");
                    fields[i] = field;
                    arrays[i] = values;
                }
                None => {
                    fields.push(field);
                    arrays.push(values);
                }
            }
            debug!(column = %name, spec = ?spec, "assigned column");
        }

        Self::from_fields(fields, arrays, self.num_rows())
    }

    pub fn assign_scalar(&self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Result<Table> {
        self.assign([(name.into(), ColumnSpec::Scalar(value.into()))])
    }

    pub fn assign_expr(&self, name: impl Into<String>, expr: Expr) -> Result<Table> {
        self.assign([(name.into(), ColumnSpec::Expr(expr))])
    }

    /// Closure form: `f` receives the table being assigned to, which makes it
    /// safe to use at any point of a chain.
    pub fn assign_with<F>(&self, name: impl Into<String>, f: F) -> Result<Table>
    where
        F: Fn(&Table) -> Result<ColumnarValue> + Send + Sync + 'static,
    {
        self.assign([(name.into(), ColumnSpec::computed(f))])
    }

    pub fn assign_values(&self, name: impl Into<String>, values: ArrayRef) -> Result<Table> {
        self.assign([(name.into(), ColumnSpec::Values(values))])
    }

    /// Run `target = expression` statements with no `@` bindings.
    pub fn eval(&self, source: &str) -> Result<Table> {
        self.eval_with(source, &Bindings::default())
    }

    /// Run `target = expression` statements in order. Each statement sees the
    /// columns produced by the ones before it.
    pub fn eval_with(&self, source: &str, bindings: &Bindings) -> Result<Table> {
        let statements = parse_program(source)?;
        let mut table = self.clone();
        for Statement { target, expr } in statements {
            debug!(
                target = %target,
                expr = %expr,
                reads = ?expr.referenced_columns(),
                "eval statement"
            );
            table = table.assign_with_bindings([(target, ColumnSpec::Expr(expr))], bindings)?;
        }
        Ok(table)
    }

    /// Rename columns through an `old -> new` mapping. Keys that match no
    /// column are ignored.
    pub fn rename_columns<I, K, V>(&self, mapping: I) -> Result<Table>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mapping: HashMap<String, String> = mapping
            .into_iter()
            .map(|(old, new)| (old.as_ref().to_string(), new.into()))
            .collect();

        for old in mapping.keys().filter(|k| !self.has_column(k)) {
            debug!(column = %old, "rename key matches no column; ignored");
        }

        let fields = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| match mapping.get(f.name()) {
                Some(new) => Arc::new(f.as_ref().clone().with_name(new)),
                None => Arc::clone(f),
            })
            .collect();
        Self::from_fields(fields, self.batch.columns().to_vec(), self.num_rows())
    }

    /// Remove the named columns. Every name must exist.
    pub fn drop_columns<I, S>(&self, names: I) -> Result<Table>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|s| s.as_ref().to_string()).collect();
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(TableError::missing_column(missing, self.column_names()));
        }
        let drop: HashSet<&str> = names.iter().map(String::as_str).collect();

        let (fields, arrays): (Vec<FieldRef>, Vec<ArrayRef>) = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter(|(f, _)| !drop.contains(f.name().as_str()))
            .map(|(f, a)| (Arc::clone(f), Arc::clone(a)))
            .unzip();
        Self::from_fields(fields, arrays, self.num_rows())
    }
}
