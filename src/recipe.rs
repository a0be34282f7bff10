// src/recipe.rs

//! Declarative step lists, loaded from YAML or JSON, applied to a table in order.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{debug, info};

use crate::{
    expr::{parse_expr, Bindings, ScalarValue},
    table::{ColumnSpec, Table},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Columns are evaluated against the step's input, like a single `assign` call.
    Assign { columns: Vec<AssignColumn> },
    Eval { expr: String },
    Rename { columns: BTreeMap<String, String> },
    Drop { columns: Vec<String> },
}

/// One new column: exactly one of `value` / `expr` must be given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignColumn {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

impl AssignColumn {
    fn to_spec(&self) -> Result<ColumnSpec> {
        match (&self.value, &self.expr) {
            (Some(v), None) => Ok(ColumnSpec::Scalar(v.clone())),
            (None, Some(e)) => {
                let expr = parse_expr(e)
                    .with_context(|| format!("parsing expression for column `{}`", self.name))?;
                Ok(ColumnSpec::Expr(expr))
            }
            _ => bail!(
                "column `{}` needs exactly one of `value` or `expr`",
                self.name
            ),
        }
    }
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Assign { .. } => "assign",
            Step::Eval { .. } => "eval",
            Step::Rename { .. } => "rename",
            Step::Drop { .. } => "drop",
        }
    }

    pub fn apply(&self, table: &Table, bindings: &Bindings) -> Result<Table> {
        let out = match self {
            Step::Assign { columns } => {
                let specs = columns
                    .iter()
                    .map(|c| Ok((c.name.clone(), c.to_spec()?)))
                    .collect::<Result<Vec<_>>>()?;
                table.assign_with_bindings(specs, bindings)?
            }
            Step::Eval { expr } => table.eval_with(expr, bindings)?,
            Step::Rename { columns } => table.rename_columns(columns)?,
            Step::Drop { columns } => table.drop_columns(columns)?,
        };
        Ok(out)
    }
}

impl Recipe {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("parsing YAML recipe")
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parsing JSON recipe")
    }

    /// Read a recipe file; `.json` files are JSON, anything else is YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading recipe {:?}", path))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let recipe = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
        .with_context(|| format!("loading recipe {:?}", path))?;
        debug!(steps = recipe.steps.len(), path = %path.display(), "loaded recipe");
        Ok(recipe)
    }

    /// Run every step in order, each on the previous step's output.
    #[tracing::instrument(level = "info", skip_all, fields(steps = self.steps.len()))]
    pub fn apply(&self, table: &Table, bindings: &Bindings) -> Result<Table> {
        let mut current = table.clone();
        for (i, step) in self.steps.iter().enumerate() {
            current = step
                .apply(&current, bindings)
                .with_context(|| format!("step {} ({})", i + 1, step.op()))?;
            debug!(
                step = i + 1,
                op = step.op(),
                columns = current.num_columns(),
                "applied step"
            );
        }
        info!(
            rows = current.num_rows(),
            columns = current.num_columns(),
            "recipe applied"
        );
        Ok(current)
    }
}
