// src/expr/functions.rs

use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute::cast,
    datatypes::{DataType, Float64Type, Int64Type},
    error::ArrowError,
};
use std::{collections::HashMap, fmt, sync::Arc};

use super::value::{ColumnarValue, ScalarValue};
use crate::error::{Result, TableError};

/// A function reachable from an expression as `@name(...)`.
/// Receives the evaluated arguments and the row count of the table.
pub type BoundFunction =
    Arc<dyn Fn(&[ColumnarValue], usize) -> Result<ColumnarValue> + Send + Sync>;

/// The names an expression may reach with `@`: scalar values and functions.
///
/// Nothing outside of the table's own columns is visible to an expression
/// unless it was bound here first.
#[derive(Clone, Default)]
pub struct Bindings {
    values: HashMap<String, ScalarValue>,
    functions: HashMap<String, BoundFunction>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// `round` and `abs`, bound under their own names.
    pub fn standard() -> Self {
        Self::new()
            .with_function("round", round)
            .with_function("abs", abs)
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.bind_value(name, value);
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[ColumnarValue], usize) -> Result<ColumnarValue> + Send + Sync + 'static,
    {
        self.bind_function(name, f);
        self
    }

    pub fn bind_value(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn bind_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[ColumnarValue], usize) -> Result<ColumnarValue> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn value(&self, name: &str) -> Result<&ScalarValue> {
        self.values
            .get(name)
            .ok_or_else(|| TableError::UnboundName(name.to_string()))
    }

    pub fn function(&self, name: &str) -> Result<&BoundFunction> {
        self.functions
            .get(name)
            .ok_or_else(|| TableError::UnboundName(name.to_string()))
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        functions.sort_unstable();
        f.debug_struct("Bindings")
            .field("values", &self.values)
            .field("functions", &functions)
            .finish()
    }
}

fn invalid(function: &str, message: impl Into<String>) -> TableError {
    TableError::InvalidArguments {
        function: function.to_string(),
        message: message.into(),
    }
}

fn is_integer(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// numpy-style rounding: scale, round half to even, scale back.
pub fn round_half_even(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (value * factor).round_ties_even() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        (value / factor).round_ties_even() * factor
    }
}

/// Round every value of `input` to `decimals` places.
/// Integer columns are left alone unless `decimals` is negative.
pub fn round_array(input: &ArrayRef, decimals: i32) -> Result<ArrayRef> {
    let dt = input.data_type();
    if is_integer(dt) && decimals >= 0 {
        return Ok(Arc::clone(input));
    }
    if !(dt.is_numeric() || dt == &DataType::Null) {
        return Err(TableError::UnsupportedType {
            context: "round".into(),
            data_type: dt.clone(),
        });
    }
    let floats = cast(input, &DataType::Float64)?;
    let rounded = floats
        .as_primitive::<Float64Type>()
        .unary::<_, Float64Type>(|v| round_half_even(v, decimals));
    let rounded: ArrayRef = Arc::new(rounded);
    if is_integer(dt) {
        // negative decimals on an integer column: stay integral
        Ok(cast(&rounded, &DataType::Int64)?)
    } else {
        Ok(rounded)
    }
}

pub(crate) fn round_value(value: ColumnarValue, decimals: i32) -> Result<ColumnarValue> {
    match value {
        ColumnarValue::Array(a) => Ok(ColumnarValue::Array(round_array(&a, decimals)?)),
        ColumnarValue::Scalar(s) => {
            let unit = round_array(&s.to_array(1), decimals)?;
            Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(unit.as_ref(), 0)?))
        }
    }
}

/// `@round(x)` or `@round(x, decimals)`; `decimals` must be an integer literal or binding.
pub fn round(args: &[ColumnarValue], _num_rows: usize) -> Result<ColumnarValue> {
    let (value, decimals) = match args {
        [value] => (value, 0),
        [value, ColumnarValue::Scalar(ScalarValue::Int64(d))] => {
            let d = i32::try_from(*d).map_err(|_| invalid("round", "decimals out of range"))?;
            (value, d)
        }
        [_, _] => return Err(invalid("round", "decimals must be an integer constant")),
        _ => {
            return Err(invalid(
                "round",
                format!("expected 1 or 2 arguments, got {}", args.len()),
            ))
        }
    };
    round_value(value.clone(), decimals)
}

/// `@abs(x)`
pub fn abs(args: &[ColumnarValue], _num_rows: usize) -> Result<ColumnarValue> {
    let [value] = args else {
        return Err(invalid(
            "abs",
            format!("expected 1 argument, got {}", args.len()),
        ));
    };
    let scalar = value.is_scalar();
    let input = value.clone().into_unit_array();
    let dt = input.data_type().clone();
    if !dt.is_numeric() {
        return Err(TableError::UnsupportedType {
            context: "abs".into(),
            data_type: dt,
        });
    }
    let out: ArrayRef = if is_integer(&dt) {
        let ints = cast(&input, &DataType::Int64)?;
        Arc::new(ints.as_primitive::<Int64Type>().try_unary::<_, Int64Type, _>(|v| {
            v.checked_abs()
                .ok_or_else(|| ArrowError::ComputeError(format!("abs overflows for {v}")))
        })?)
    } else {
        let floats = cast(&input, &DataType::Float64)?;
        Arc::new(
            floats
                .as_primitive::<Float64Type>()
                .unary::<_, Float64Type>(f64::abs),
        )
    };
    if scalar {
        Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(
            out.as_ref(),
            0,
        )?))
    } else {
        Ok(ColumnarValue::Array(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(10.8875, 2), 10.89);
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(1250.0, -2), 1200.0);
        assert!(round_half_even(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_round_keeps_integers() -> Result<()> {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![1, 25, 149]));
        let same = round_array(&ints, 2)?;
        assert!(Arc::ptr_eq(&same, &ints));

        let hundreds = round_array(&ints, -2)?;
        assert_eq!(
            hundreds.as_primitive::<arrow::datatypes::Int64Type>().values().to_vec(),
            vec![0, 0, 100]
        );
        Ok(())
    }

    #[test]
    fn test_round_function_arguments() -> Result<()> {
        let prices: ArrayRef = Arc::new(Float64Array::from(vec![Some(21.763), None]));
        let out = round(
            &[
                ColumnarValue::Array(prices),
                ColumnarValue::Scalar(ScalarValue::Int64(1)),
            ],
            2,
        )?
        .into_array(2);
        let out = out.as_primitive::<Float64Type>();
        assert_eq!(out.value(0), 21.8);
        assert!(out.is_null(1));

        let err = round(&[ColumnarValue::Scalar(1.5.into()), ColumnarValue::Scalar(1.5.into())], 1)
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArguments { .. }));
        Ok(())
    }

    #[test]
    fn test_abs_on_scalar_and_array() -> Result<()> {
        let s = abs(&[ColumnarValue::Scalar(ScalarValue::Int64(-3))], 4)?;
        assert!(matches!(s, ColumnarValue::Scalar(ScalarValue::Int64(3))));

        let a: ArrayRef = Arc::new(Float64Array::from(vec![-1.5, 2.0]));
        let out = abs(&[ColumnarValue::Array(a)], 2)?.into_array(2);
        assert_eq!(out.as_primitive::<Float64Type>().values().to_vec(), vec![1.5, 2.0]);
        Ok(())
    }

    #[test]
    fn test_abs_keeps_large_integers_exact() -> Result<()> {
        let big: ArrayRef = Arc::new(Int64Array::from(vec![-9_007_199_254_740_993, 5]));
        let out = abs(&[ColumnarValue::Array(big)], 2)?.into_array(2);
        assert_eq!(out.data_type(), &DataType::Int64);
        assert_eq!(
            out.as_primitive::<Int64Type>().values().to_vec(),
            vec![9_007_199_254_740_993, 5]
        );

        let err = abs(&[ColumnarValue::Scalar(ScalarValue::Int64(i64::MIN))], 1).unwrap_err();
        assert!(matches!(err, TableError::Arrow(ArrowError::ComputeError(_))));
        Ok(())
    }

    #[test]
    fn test_unbound_lookup() {
        let b = Bindings::standard().with_value("rate", 0.08875);
        assert!(b.function("round").is_ok());
        assert_eq!(b.value("rate").ok(), Some(&ScalarValue::Float64(0.08875)));
        assert!(matches!(b.value("nope"), Err(TableError::UnboundName(n)) if n == "nope"));
    }
}
