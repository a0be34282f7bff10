//! Typed, elementwise column expressions.
//!
//! An [`Expr`] is built either with the helpers in this module
//! (`col("list_price") * lit(1.08875)`) or parsed from text by
//! [`parser`]. Evaluation against a [`crate::table::Table`] lives in
//! [`evaluate`].

pub mod evaluate;
pub mod functions;
pub mod parser;
pub mod value;

pub use evaluate::evaluate;
pub use functions::{BoundFunction, Bindings};
pub use parser::{parse_expr, parse_program, Statement};
pub use value::{ColumnarValue, ScalarValue};

use std::{fmt, ops};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 2,
            BinaryOp::Pow => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a column of the table being evaluated.
    Column(String),
    Literal(ScalarValue),
    /// `@name`: a scalar looked up in [`Bindings`].
    Bound(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Round {
        expr: Box<Expr>,
        decimals: i32,
    },
    /// `@name(args)`: a function looked up in [`Bindings`].
    Call { name: String, args: Vec<Expr> },
}

pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

pub fn lit(value: impl Into<ScalarValue>) -> Expr {
    Expr::Literal(value.into())
}

pub fn bound(name: impl Into<String>) -> Expr {
    Expr::Bound(name.into())
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.into(),
        args,
    }
}

impl Expr {
    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    pub fn pow(self, exponent: Expr) -> Expr {
        self.binary(BinaryOp::Pow, exponent)
    }

    /// Round half to even at `decimals` places (negative values round to tens, hundreds, ...).
    pub fn round(self, decimals: i32) -> Expr {
        Expr::Round {
            expr: Box::new(self),
            decimals,
        }
    }

    /// Names of every column this expression reads, in first-seen order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) | Expr::Bound(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Negate(e) | Expr::Round { expr: e, .. } => e.collect_columns(out),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_columns(out)),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: BinaryOp, right: bool) -> fmt::Result {
        let needs_parens = match self {
            Expr::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (op.precedence() == parent.precedence() && (right ^ (parent == BinaryOp::Pow)))
            }
            Expr::Negate(_) => parent == BinaryOp::Pow && !right,
            Expr::Literal(v) => {
                parent == BinaryOp::Pow && !right && v.as_f64().is_some_and(|x| x < 0.0)
            }
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) struct ColumnName<'a>(pub &'a str);

impl fmt::Display for ColumnName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_plain_identifier(self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "`{}`", self.0)
        }
    }
}

/// Renders in the textual `eval` syntax. `Round` comes out as an `@round`
/// call, which parses back once `round` is bound.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", ColumnName(name)),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Bound(name) => write!(f, "@{name}"),
            Expr::Binary { op, left, right } => {
                left.fmt_operand(f, *op, false)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_operand(f, *op, true)
            }
            Expr::Negate(e) => match e.as_ref() {
                Expr::Binary { op, .. } if *op != BinaryOp::Pow => write!(f, "-({e})"),
                _ => write!(f, "-{e}"),
            },
            Expr::Round { expr, decimals } => write!(f, "@round({expr}, {decimals})"),
            Expr::Call { name, args } => {
                write!(f, "@{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                self.binary($op, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::Div);
impl_binary_operator!(Rem, rem, BinaryOp::Mod);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Negate(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes() {
        let e = col("list_price") * (lit(1) + col("tax_percent"));
        assert_eq!(e.referenced_columns(), vec!["list_price", "tax_percent"]);
        assert_eq!(e.to_string(), "list_price * (1 + tax_percent)");
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let e = (col("a") - col("b")) - (col("c") - col("d"));
        assert_eq!(e.to_string(), "a - b - (c - d)");

        let e = col("a").pow(col("b").pow(lit(2)));
        assert_eq!(e.to_string(), "a ** b ** 2");

        let e = (-col("a")).pow(lit(2));
        assert_eq!(e.to_string(), "(-a) ** 2");

        let e = col("list price").round(2);
        assert_eq!(e.to_string(), "@round(`list price`, 2)");

        let e = lit(-2).pow(lit(2));
        assert_eq!(e.to_string(), "(-2) ** 2");
    }

    #[test]
    fn test_display_of_calls_uses_binding_syntax() {
        let e = call("round", vec![col("x") * bound("rate"), lit(2)]);
        assert_eq!(e.to_string(), "@round(x * @rate, 2)");
    }
}
