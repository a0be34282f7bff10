// src/expr/evaluate.rs

use arrow::{
    array::{ArrayRef, AsArray, Datum, Scalar},
    compute::{
        cast,
        kernels::{
            arity::{binary, try_binary},
            numeric,
        },
    },
    datatypes::{DataType, Float64Type, Int64Type},
    error::ArrowError,
};
use std::sync::Arc;
use tracing::trace;

use super::{
    functions::{round_value, Bindings},
    value::{ColumnarValue, ScalarValue},
    BinaryOp, Expr,
};
use crate::{
    error::{Result, TableError},
    table::Table,
};

type NumericKernel = fn(&dyn Datum, &dyn Datum) -> Result<ArrayRef, ArrowError>;

/// Evaluate `expr` row-wise against `table`.
///
/// Column references resolve against `table` only; `@` names resolve against
/// `bindings`. Expressions that touch no column stay scalar.
pub fn evaluate(expr: &Expr, table: &Table, bindings: &Bindings) -> Result<ColumnarValue> {
    match expr {
        Expr::Column(name) => Ok(ColumnarValue::Array(Arc::clone(table.column(name)?))),
        Expr::Literal(v) => Ok(ColumnarValue::Scalar(v.clone())),
        Expr::Bound(name) => Ok(ColumnarValue::Scalar(bindings.value(name)?.clone())),
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, table, bindings)?;
            let rhs = evaluate(right, table, bindings)?;
            apply_binary(*op, lhs, rhs, table.num_rows())
        }
        Expr::Negate(inner) => negate(evaluate(inner, table, bindings)?),
        Expr::Round { expr, decimals } => round_value(evaluate(expr, table, bindings)?, *decimals),
        Expr::Call { name, args } => {
            let f = bindings.function(name)?;
            let args = args
                .iter()
                .map(|a| evaluate(a, table, bindings))
                .collect::<Result<Vec<_>>>()?;
            trace!(function = %name, args = args.len(), "calling bound function");
            f(&args, table.num_rows())
        }
    }
}

impl Expr {
    /// Evaluate with no `@` bindings.
    pub fn evaluate(&self, table: &Table) -> Result<ColumnarValue> {
        evaluate(self, table, &Bindings::default())
    }

    /// Evaluate and broadcast to a full column of `table.num_rows()` values.
    pub fn to_array(&self, table: &Table, bindings: &Bindings) -> Result<ArrayRef> {
        Ok(evaluate(self, table, bindings)?.into_array(table.num_rows()))
    }
}

/// Decide the type both operands are cast to before `op` runs.
fn coerce_types(op: BinaryOp, left: &DataType, right: &DataType) -> Result<DataType> {
    let arithmetic = |dt: &DataType| dt.is_numeric() || dt == &DataType::Null;
    if !arithmetic(left) || !arithmetic(right) {
        return Err(TableError::TypeMismatch {
            op: op.symbol().to_string(),
            left: left.clone(),
            right: right.clone(),
        });
    }
    let target = match op {
        BinaryOp::Div | BinaryOp::Pow => DataType::Float64,
        BinaryOp::Mod if left.is_floating() || right.is_floating() => DataType::Float64,
        BinaryOp::Mod => DataType::Int64,
        _ if left == right && left != &DataType::Null => left.clone(),
        _ if left.is_floating() || right.is_floating() => DataType::Float64,
        _ => DataType::Int64,
    };
    Ok(target)
}

fn to_datum(value: ColumnarValue, target: &DataType) -> Result<Box<dyn Datum>> {
    match value {
        ColumnarValue::Array(a) => Ok(Box::new(cast(&a, target)?)),
        ColumnarValue::Scalar(s) => Ok(Box::new(Scalar::new(cast(&s.to_array(1), target)?))),
    }
}

pub(crate) fn apply_binary(
    op: BinaryOp,
    lhs: ColumnarValue,
    rhs: ColumnarValue,
    num_rows: usize,
) -> Result<ColumnarValue> {
    let target = coerce_types(op, &lhs.data_type(), &rhs.data_type())?;
    let both_scalar = lhs.is_scalar() && rhs.is_scalar();

    let out: ArrayRef = match op {
        BinaryOp::Pow | BinaryOp::Mod => {
            let len = if both_scalar { 1 } else { num_rows };
            let l = cast(&lhs.into_array(len), &target)?;
            let r = cast(&rhs.into_array(len), &target)?;
            if op == BinaryOp::Pow {
                Arc::new(binary::<Float64Type, Float64Type, _, Float64Type>(
                    l.as_primitive(),
                    r.as_primitive(),
                    f64::powf,
                )?)
            } else {
                floor_mod(&l, &r)?
            }
        }
        _ => {
            let kernel: NumericKernel = match op {
                BinaryOp::Add => numeric::add,
                BinaryOp::Sub => numeric::sub,
                BinaryOp::Mul => numeric::mul,
                _ => numeric::div,
            };
            let l = to_datum(lhs, &target)?;
            let r = to_datum(rhs, &target)?;
            kernel(l.as_ref(), r.as_ref())?
        }
    };

    if both_scalar {
        Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(
            out.as_ref(),
            0,
        )?))
    } else {
        Ok(ColumnarValue::Array(out))
    }
}

/// Floored modulo: a non-zero remainder takes the sign of the divisor,
/// so `-7 % 3 == 2` and `-7.5 % 2 == 0.5`. Operands are both Int64 or both Float64.
fn floor_mod(left: &ArrayRef, right: &ArrayRef) -> Result<ArrayRef> {
    if left.data_type() == &DataType::Float64 {
        let out = binary::<Float64Type, Float64Type, _, Float64Type>(
            left.as_primitive(),
            right.as_primitive(),
            |x, y| {
                let r = x % y;
                if r != 0.0 && (r < 0.0) != (y < 0.0) {
                    r + y
                } else {
                    r
                }
            },
        )?;
        return Ok(Arc::new(out));
    }
    let out = try_binary::<_, _, _, Int64Type>(
        left.as_primitive::<Int64Type>(),
        right.as_primitive::<Int64Type>(),
        |x: i64, y: i64| {
            if y == 0 {
                return Err(ArrowError::DivideByZero);
            }
            // i64::MIN % -1 overflows in checked arithmetic; the remainder is 0
            let r = x.wrapping_rem(y);
            Ok(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
        },
    )?;
    Ok(Arc::new(out))
}

fn negate(value: ColumnarValue) -> Result<ColumnarValue> {
    let dt = value.data_type();
    if dt == DataType::Null {
        return Ok(value);
    }
    if !dt.is_numeric() {
        return Err(TableError::UnsupportedType {
            context: "negation".into(),
            data_type: dt,
        });
    }
    match value {
        ColumnarValue::Array(a) => Ok(ColumnarValue::Array(numeric::neg(a.as_ref())?)),
        ColumnarValue::Scalar(s) => {
            let out = numeric::neg(s.to_array(1).as_ref())?;
            Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(
                out.as_ref(),
                0,
            )?))
        }
    }
}
