// src/expr/value.rs

use arrow::{
    array::{
        new_null_array, Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array,
        StringArray,
    },
    datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

use crate::error::{Result, TableError};

/// A single typed value that can be broadcast into a column of any length.
///
/// Deserializes untagged, so `0.08875`, `3`, `"x"`, `true` and `null` in a
/// recipe map straight onto the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Null,
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Null => DataType::Null,
        }
    }

    /// Repeat this value `len` times.
    pub fn to_array(&self, len: usize) -> ArrayRef {
        match self {
            ScalarValue::Boolean(b) => Arc::new(BooleanArray::from(vec![*b; len])),
            ScalarValue::Int64(v) => Arc::new(Int64Array::from_value(*v, len)),
            ScalarValue::Float64(v) => Arc::new(Float64Array::from_value(*v, len)),
            ScalarValue::Utf8(s) => Arc::new(StringArray::from(vec![s.as_str(); len])),
            ScalarValue::Null => new_null_array(&DataType::Null, len),
        }
    }

    /// Read the value at `idx` of `array` back into a scalar.
    pub fn try_from_array(array: &dyn Array, idx: usize) -> Result<Self> {
        if array.is_null(idx) {
            return Ok(ScalarValue::Null);
        }
        let value = match array.data_type() {
            DataType::Boolean => ScalarValue::Boolean(array.as_boolean().value(idx)),
            DataType::Int8 => ScalarValue::Int64(array.as_primitive::<Int8Type>().value(idx).into()),
            DataType::Int16 => {
                ScalarValue::Int64(array.as_primitive::<Int16Type>().value(idx).into())
            }
            DataType::Int32 => {
                ScalarValue::Int64(array.as_primitive::<Int32Type>().value(idx).into())
            }
            DataType::Int64 => ScalarValue::Int64(array.as_primitive::<Int64Type>().value(idx)),
            DataType::Float32 => {
                ScalarValue::Float64(array.as_primitive::<Float32Type>().value(idx).into())
            }
            DataType::Float64 => {
                ScalarValue::Float64(array.as_primitive::<Float64Type>().value(idx))
            }
            DataType::Utf8 => ScalarValue::Utf8(array.as_string::<i32>().value(idx).to_string()),
            DataType::Null => ScalarValue::Null,
            other => {
                return Err(TableError::UnsupportedType {
                    context: "scalar conversion".into(),
                    data_type: other.clone(),
                })
            }
        };
        Ok(value)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(true) => write!(f, "True"),
            ScalarValue::Boolean(false) => write!(f, "False"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            // keep a decimal point so the literal parses back as a float
            ScalarValue::Float64(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Utf8(s) => write!(f, "{s:?}"),
            ScalarValue::Null => write!(f, "null"),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int64(v.into())
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}

/// The result of evaluating an expression: either a full column or a single
/// value that has not been broadcast yet.
#[derive(Debug, Clone)]
pub enum ColumnarValue {
    Array(ArrayRef),
    Scalar(ScalarValue),
}

impl ColumnarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnarValue::Array(a) => a.data_type().clone(),
            ColumnarValue::Scalar(s) => s.data_type(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ColumnarValue::Scalar(_))
    }

    /// Materialize as an array of `num_rows` values. Arrays are returned as-is.
    pub fn into_array(self, num_rows: usize) -> ArrayRef {
        match self {
            ColumnarValue::Array(a) => a,
            ColumnarValue::Scalar(s) => s.to_array(num_rows),
        }
    }

    /// Arrays stay as they are, scalars become a one-element array.
    pub(crate) fn into_unit_array(self) -> ArrayRef {
        self.into_array(1)
    }
}

impl From<ArrayRef> for ColumnarValue {
    fn from(a: ArrayRef) -> Self {
        ColumnarValue::Array(a)
    }
}

impl From<ScalarValue> for ColumnarValue {
    fn from(s: ScalarValue) -> Self {
        ColumnarValue::Scalar(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_scalar_broadcast_and_readback() -> Result<()> {
        let arr = ScalarValue::from(0.08875).to_array(3);
        assert_eq!(arr.len(), 3);
        for i in 0..3 {
            assert_eq!(ScalarValue::try_from_array(arr.as_ref(), i)?, 0.08875.into());
        }

        let empty = ScalarValue::from("x").to_array(0);
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.data_type(), &DataType::Utf8);
        Ok(())
    }

    #[test]
    fn test_scalar_deserializes_untagged() -> Result<()> {
        let values: Vec<ScalarValue> = serde_yaml::from_str("[0.08875, 3, abc, true, null]")?;
        assert_eq!(
            values,
            vec![
                ScalarValue::Float64(0.08875),
                ScalarValue::Int64(3),
                ScalarValue::Utf8("abc".into()),
                ScalarValue::Boolean(true),
                ScalarValue::Null,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_display_keeps_float_literals_float() {
        assert_eq!(ScalarValue::Float64(2.0).to_string(), "2.0");
        assert_eq!(ScalarValue::Float64(1.08875).to_string(), "1.08875");
        assert_eq!(ScalarValue::Int64(2).to_string(), "2");
        assert_eq!(ScalarValue::Utf8("a b".into()).to_string(), "\"a b\"");
    }
}
