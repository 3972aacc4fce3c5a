//! Calculator tool — evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus and decimals.
//! `^` binds tighter than unary minus and is right-associative, so
//! `-2 ^ 2` is `-4` and `2 ^ 3 ^ 2` is `512`.

use async_trait::async_trait;
use tinyreact_core::error::ToolError;
use tinyreact_core::tool::{CallContext, ParamSpec, ParamType, Tool, ToolResult};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses and decimal numbers."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "expression",
            ParamType::String,
            "The expression to evaluate, e.g. '(2 + 3) * 4'",
        )]
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<ToolResult, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        let value = evaluate(expr).map_err(|e| ToolError::failed("calculator", e))?;
        Ok(ToolResult::ok(format_number(value)))
    }
}

/// Render integers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.expr()?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected {tok:?} at token {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let literal = &input[start..end];
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Num(n));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }

    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(c)) => Some(*c),
            _ => None,
        }
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                _ if rhs == 0.0 => return Err("Division by zero".into()),
                '/' => acc / rhs,
                _ => acc % rhs,
            };
        }
        Ok(acc)
    }

    // unary = '-' unary | power
    fn unary(&mut self) -> Result<f64, String> {
        if self.peek_op() == Some('-') {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.power()
    }

    // power = primary ('^' unary)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.peek_op() == Some('^') {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        match tok {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(other) => Err(format!("Unexpected {other:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}
