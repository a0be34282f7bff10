// src/walkthrough.rs

//! The guided tour of column assignment over the board games table, one
//! [`Demo`] per step. Two of the steps fail on purpose.

use tracing::{debug, warn};

use crate::{
    error::{Result, TableError},
    expr::{col, evaluate, functions, lit, Bindings},
    table::{ColumnSpec, Table},
};

pub const TAX_PERCENT: f64 = 0.08875;
pub const TAX_RATE: f64 = 1.08875;

#[derive(Debug)]
pub struct Demo {
    pub title: &'static str,
    /// How the step reads as code.
    pub source: &'static str,
    pub expects_error: bool,
    pub outcome: Result<Table, TableError>,
}

impl Demo {
    fn new(
        title: &'static str,
        source: &'static str,
        expects_error: bool,
        outcome: Result<Table>,
    ) -> Self {
        match (&outcome, expects_error) {
            (Ok(t), _) => debug!(title, columns = t.num_columns(), "demo step ok"),
            (Err(e), true) => debug!(title, error = %e, "demo step failed as expected"),
            (Err(e), false) => warn!(title, error = %e, "demo step failed"),
        }
        Demo {
            title,
            source,
            expects_error,
            outcome,
        }
    }

    /// Succeeded when it should, or failed when it should.
    pub fn went_as_expected(&self) -> bool {
        self.outcome.is_err() == self.expects_error
    }
}

/// Run every step against `games`. Each step starts from `games` itself;
/// chained steps build on their own intermediate tables.
pub fn run(games: &Table) -> Vec<Demo> {
    let with_tax = || (col("list_price") * lit(TAX_RATE)).round(2);
    let round_only = Bindings::new().with_function("round", functions::round);

    vec![
        Demo::new("Loaded table", "games", false, Ok(games.clone())),
        Demo::new(
            "Scalar column",
            "games.assign(tax_percent = 0.08875)",
            false,
            games.assign_scalar("tax_percent", TAX_PERCENT),
        ),
        Demo::new(
            "Computed column from the original table reference",
            "games.assign(list_price_with_tax = round(games.list_price * 1.08875, 2))",
            false,
            with_tax()
                .to_array(games, &Bindings::default())
                .and_then(|values| games.assign_values("list_price_with_tax", values)),
        ),
        Demo::new(
            "Computed column from a closure",
            "games.assign(list_price_with_tax = |x| round(x.list_price * 1.08875, 2))",
            false,
            games.assign_with("list_price_with_tax", move |x| {
                evaluate(&with_tax(), x, &Bindings::default())
            }),
        ),
        Demo::new(
            "Scalar and closure in one call",
            "games.assign(tax_percent = 0.08875, list_price_with_tax = |x| round(x.list_price * 1.08875, 2))",
            false,
            games.assign([
                ("tax_percent", ColumnSpec::scalar(TAX_PERCENT)),
                (
                    "list_price_with_tax",
                    ColumnSpec::computed(move |x| evaluate(&with_tax(), x, &Bindings::default())),
                ),
            ]),
        ),
        Demo::new(
            "Referencing a column created in the same call",
            "games.assign(tax_percent = 0.08875, list_price_with_tax = |x| round(x.list_price * (1 + x.tax_percent), 2))",
            true,
            games.assign([
                ("tax_percent", ColumnSpec::scalar(TAX_PERCENT)),
                (
                    "list_price_with_tax",
                    ColumnSpec::computed(|x| {
                        evaluate(
                            &(col("list_price") * (lit(1) + col("tax_percent"))).round(2),
                            x,
                            &Bindings::default(),
                        )
                    }),
                ),
            ]),
        ),
        Demo::new(
            "Chained assigns",
            "games.assign(tax_percent = 0.08875).assign(list_price_with_tax = |x| round(x.list_price * (1 + x.tax_percent), 2))",
            false,
            games.assign_scalar("tax_percent", TAX_PERCENT).and_then(|t| {
                t.assign_with("list_price_with_tax", |x| {
                    evaluate(
                        &(col("list_price") * (lit(1) + col("tax_percent"))).round(2),
                        x,
                        &Bindings::default(),
                    )
                })
            }),
        ),
        Demo::new(
            "eval with a constant",
            "games.eval(\"tax_percent = 0.08875\")",
            false,
            games.eval("tax_percent = 0.08875"),
        ),
        Demo::new(
            "eval with an unbound function",
            "games.eval(\"list_price_with_tax = round(list_price * 1.08875, 2)\")",
            true,
            games.eval("list_price_with_tax = round(list_price * 1.08875, 2)"),
        ),
        Demo::new(
            "eval with a bound function over two statements",
            "games.eval(\"list_price_with_tax = list_price * 1.08875\n           list_price_with_tax = @round(list_price_with_tax, 2)\")",
            false,
            games.eval_with(
                "list_price_with_tax = list_price * 1.08875\n\
                 list_price_with_tax = @round(list_price_with_tax, 2)",
                &round_only,
            ),
        ),
        Demo::new(
            "Rename one column",
            "games.rename(columns = {id: game_id})",
            false,
            games.rename_columns([("id", "game_id")]),
        ),
        Demo::new(
            "Rename several columns",
            "games.rename(columns = {id: game_id, list_price: price})",
            false,
            games.rename_columns([("id", "game_id"), ("list_price", "price")]),
        ),
        Demo::new(
            "Drop columns",
            "games.drop(columns = [inventor, min_age])",
            false,
            games.drop_columns(["inventor", "min_age"]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expr::functions::round_half_even,
        table::{read_csv_from, CsvOptions},
    };
    use anyhow::Result;
    use arrow::{array::AsArray, datatypes::Float64Type};
    use std::io::Cursor;

    const BUNDLED: &str = include_str!("../data/games/games.csv");

    fn games() -> Table {
        read_csv_from(Cursor::new(BUNDLED.as_bytes()), &CsvOptions::default())
            .expect("bundled csv loads")
    }

    fn prices(t: &Table, name: &str) -> Vec<f64> {
        t.column(name)
            .expect("column exists")
            .as_primitive::<Float64Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn test_every_step_goes_as_expected() {
        let demos = run(&games());
        assert_eq!(demos.len(), 13);
        for d in &demos {
            assert!(d.went_as_expected(), "{}: {:?}", d.title, d.outcome);
        }
    }

    #[test]
    fn test_expected_failures_are_the_right_ones() {
        let demos = run(&games());
        assert!(matches!(
            &demos[5].outcome,
            Err(TableError::MissingColumn { name, .. }) if name == "tax_percent"
        ));
        assert!(matches!(
            &demos[8].outcome,
            Err(TableError::UnsupportedFunction(name)) if name == "round"
        ));
    }

    #[test]
    fn test_tax_variants_agree() -> Result<()> {
        let g = games();
        let expected: Vec<f64> = prices(&g, "list_price")
            .into_iter()
            .map(|p| round_half_even(p * TAX_RATE, 2))
            .collect();

        let demos = run(&g);
        for i in [2, 3, 4, 9] {
            let t = demos[i].outcome.as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
            assert_eq!(prices(t, "list_price_with_tax"), expected, "{}", demos[i].title);
        }

        // rounding after adding 1 + 0.08875 may differ by a cent at most
        let chained = demos[6].outcome.as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
        for (got, want) in prices(chained, "list_price_with_tax").iter().zip(&expected) {
            assert!((got - want).abs() <= 0.01 + 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_shapes() -> Result<()> {
        let g = games();
        let demos = run(&g);
        let shape = |i: usize| -> Result<Vec<String>> {
            let t = demos[i].outcome.as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok(t.column_names().into_iter().map(String::from).collect())
        };
        assert_eq!(shape(1)?.last().map(String::as_str), Some("tax_percent"));
        assert_eq!(shape(7)?.len(), g.num_columns() + 1);
        assert_eq!(shape(10)?[0], "game_id");
        assert_eq!(shape(11)?.last().map(String::as_str), Some("price"));
        let dropped = shape(12)?;
        assert_eq!(dropped.len(), g.num_columns() - 2);
        assert!(!dropped.iter().any(|c| c == "inventor" || c == "min_age"));
        Ok(())
    }
}
