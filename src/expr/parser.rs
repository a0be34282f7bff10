// src/expr/parser.rs

//! Parser for the textual form accepted by `Table::eval`.
//!
//! ```text
//! list_price_with_tax = list_price * 1.08875
//! list_price_with_tax = @round(list_price_with_tax, 2)
//! ```
//!
//! Statements are separated by newlines or `;`. Columns are bare identifiers
//! or backtick-quoted names. Functions can only be reached through `@name(...)`;
//! a bare `name(...)` is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{value::ScalarValue, BinaryOp, Expr};
use crate::error::{Result, TableError};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("number pattern")
});
static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("ident pattern"));

/// One `target = expr` line of an eval program.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub target: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Number(ScalarValue),
    Str(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    At,
    Assign,
    Separator,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier `{s}`"),
            Token::Quoted(s) => format!("column `{s}`"),
            Token::Number(v) => format!("number {v}"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Separator => "end of statement".into(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::At => "@",
            Token::Assign => "=",
            _ => "",
        }
    }
}

#[derive(Debug)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let c = rest.chars().next().unwrap_or_default();

        if c == '\n' || c == ';' {
            tokens.push(Spanned {
                token: Token::Separator,
                offset: pos,
            });
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        if let Some(m) = NUMBER.find(rest) {
            let text = m.as_str();
            let is_int = !text.contains(&['.', 'e', 'E'][..]);
            let value = match text.parse::<i64>() {
                Ok(v) if is_int => ScalarValue::Int64(v),
                _ => ScalarValue::Float64(
                    text.parse::<f64>()
                        .map_err(|e| TableError::parse(pos, format!("bad number {text:?}: {e}")))?,
                ),
            };
            tokens.push(Spanned {
                token: Token::Number(value),
                offset: pos,
            });
            pos += text.len();
            continue;
        }

        if let Some(m) = IDENT.find(rest) {
            tokens.push(Spanned {
                token: Token::Ident(m.as_str().to_string()),
                offset: pos,
            });
            pos += m.end();
            continue;
        }

        if c == '`' || c == '"' || c == '\'' {
            let (text, consumed) = read_quoted(rest, c)
                .ok_or_else(|| TableError::parse(pos, format!("unterminated {c} quote")))?;
            let token = if c == '`' {
                Token::Quoted(text)
            } else {
                Token::Str(text)
            };
            tokens.push(Spanned { token, offset: pos });
            pos += consumed;
            continue;
        }

        let (token, len) = match c {
            '*' if rest.starts_with("**") => (Token::StarStar, 2),
            '*' => (Token::Star, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '@' => (Token::At, 1),
            '=' if rest.starts_with("==") => {
                return Err(TableError::parse(pos, "comparisons are not supported"))
            }
            '=' => (Token::Assign, 1),
            other => return Err(TableError::parse(pos, format!("unexpected character {other:?}"))),
        };
        tokens.push(Spanned { token, offset: pos });
        pos += len;
    }

    Ok(tokens)
}

/// Read a quoted run starting at `src[0] == quote`. Backslash escapes the next char.
/// Returns the unescaped text and the number of bytes consumed.
fn read_quoted(src: &str, quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = src.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(escaped);
            }
            c if c == quote => return Some((out, i + c.len_utf8())),
            c => out.push(c),
        }
    }
    None
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(src)?,
            pos: 0,
            end: src.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|s| s.token.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, wanted: &str) -> TableError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), Token::describe);
        TableError::parse(self.offset(), format!("expected {wanted}, found {found}"))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", expected.symbol())))
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&Token::Separator) {}
    }

    fn program(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            statements.push(self.statement()?);
            match self.peek() {
                None => break,
                Some(Token::Separator) => self.skip_separators(),
                Some(_) => return Err(self.unexpected("end of statement")),
            }
        }
        if statements.is_empty() {
            return Err(TableError::parse(0, "expected at least one `name = expression`"));
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement> {
        let target = match self.advance() {
            Some(Token::Ident(name)) | Some(Token::Quoted(name)) => name,
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.unexpected("a column name to assign"));
            }
        };
        self.expect(Token::Assign)?;
        let expr = self.expr()?;
        Ok(Statement { target, expr })
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = left.binary(op, self.term()?);
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = left.binary(op, self.unary()?);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if self.eat(&Token::StarStar) {
            return Ok(base.pow(self.unary()?));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(v)) => Ok(Expr::Literal(v)),
            Some(Token::Str(s)) => Ok(Expr::Literal(ScalarValue::Utf8(s))),
            Some(Token::Ident(name)) if name == "True" => Ok(Expr::Literal(true.into())),
            Some(Token::Ident(name)) if name == "False" => Ok(Expr::Literal(false.into())),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    debug!(function = %name, offset, "rejecting unbound function call");
                    return Err(TableError::UnsupportedFunction(name));
                }
                Ok(Expr::Column(name))
            }
            Some(Token::Quoted(name)) => Ok(Expr::Column(name)),
            Some(Token::At) => {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a name after `@`"));
                    }
                };
                if self.eat(&Token::LParen) {
                    let args = self.args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Bound(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.unexpected("an operand"))
            }
            None => Err(self.unexpected("an operand")),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }
}

/// Parse one or more `target = expression` statements.
pub fn parse_program(src: &str) -> Result<Vec<Statement>> {
    Parser::new(src)?.program()
}

/// Parse a single expression with no assignment target.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut p = Parser::new(src)?;
    let expr = p.expr()?;
    if p.peek().is_some() {
        return Err(p.unexpected("end of expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bound, call, col, lit};

    #[test]
    fn test_parse_assignment() {
        let stmts = parse_program("tax_percent = 0.08875").unwrap();
        assert_eq!(
            stmts,
            vec![Statement {
                target: "tax_percent".into(),
                expr: lit(0.08875),
            }]
        );
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(
            parse_expr("list_price * (1 + tax_percent)").unwrap(),
            col("list_price") * (lit(1) + col("tax_percent"))
        );
        assert_eq!(
            parse_expr("a - b - c").unwrap(),
            (col("a") - col("b")) - col("c")
        );
        assert_eq!(
            parse_expr("2 ** 3 ** 2").unwrap(),
            lit(2).pow(lit(3).pow(lit(2)))
        );
        assert_eq!(parse_expr("-a ** 2").unwrap(), -(col("a").pow(lit(2))));
        assert_eq!(parse_expr("a * -b").unwrap(), col("a") * -col("b"));
    }

    #[test]
    fn test_bound_names_and_calls() {
        assert_eq!(
            parse_expr("@round(list_price_with_tax, 2)").unwrap(),
            call("round", vec![col("list_price_with_tax"), lit(2)])
        );
        assert_eq!(parse_expr("x * @rate").unwrap(), col("x") * bound("rate"));
        assert_eq!(parse_expr("@now()").unwrap(), call("now", vec![]));
    }

    #[test]
    fn test_bare_function_call_is_rejected() {
        let err = parse_program("list_price_with_tax = round(list_price * 1.08875, 2)").unwrap_err();
        assert!(matches!(err, TableError::UnsupportedFunction(ref f) if f == "round"));
    }

    #[test]
    fn test_multiple_statements() {
        let stmts = parse_program(
            "\n  a = 1;\n  b = a * 2\n\n  `c d` = 'x y'\n",
        )
        .unwrap();
        let targets: Vec<&str> = stmts.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["a", "b", "c d"]);
        assert_eq!(stmts[2].expr, lit("x y"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_expr("1e3").unwrap(), lit(1000.0));
        assert_eq!(parse_expr(".5").unwrap(), lit(0.5));
        assert_eq!(parse_expr("True").unwrap(), lit(true));
        assert_eq!(parse_expr("\"a\\\"b\"").unwrap(), lit("a\"b"));
    }

    #[test]
    fn test_syntax_errors_carry_offsets() {
        match parse_program("x = (a + 1").unwrap_err() {
            TableError::Parse { offset, .. } => assert_eq!(offset, 10),
            other => panic!("unexpected error {other:?}"),
        }
        match parse_program("x = a $ b").unwrap_err() {
            TableError::Parse { offset, .. } => assert_eq!(offset, 6),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(parse_program("   "), Err(TableError::Parse { .. })));
        assert!(matches!(parse_program("x == 1"), Err(TableError::Parse { .. })));
        assert!(matches!(parse_program("1 = x"), Err(TableError::Parse { offset: 0, .. })));
        assert!(matches!(parse_program("x = 1 2"), Err(TableError::Parse { .. })));
    }

    #[test]
    fn test_display_round_trips() {
        for src in [
            "list_price * (1 + tax_percent)",
            "a - b - (c - d)",
            "(-a) ** 2",
            "@round(`list price` * 1.08875, 2)",
            "-(a + b) % 3",
        ] {
            let e = parse_expr(src).unwrap();
            assert_eq!(parse_expr(&e.to_string()).unwrap(), e, "{src}");
        }
    }
}
