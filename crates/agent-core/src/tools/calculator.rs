//! Arithmetic calculator.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::error::Result;
use crate::invocation::Invocation;
use crate::schema::{Schema, SchemaBuilder};
use crate::tool::Capability;

/// Evaluates `+ - * / ^` expressions with parentheses
pub struct CalculatorTool;

#[async_trait]
impl Capability for CalculatorTool {
    fn description(&self) -> Option<&str> {
        Some("Evaluate a mathematical expression")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        SCHEMA.get_or_try_init(|| {
            SchemaBuilder::new()
                .string(
                    "expression",
                    "Mathematical expression to evaluate (e.g., '2 + 2', '(10 - 4) * 5')",
                )
                .build()
        })
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({ "expression": "(2 + 3) * 4" }))
    }

    async fn process_invocation(&self, invocation: &Invocation) -> Result<Value> {
        let expression = invocation
            .arguments
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        // Bad expressions are the model's problem; report them as output
        Ok(match evaluate_expression(expression) {
            Ok(result) => json!({ "expression": expression, "result": result }),
            Err(e) => json!({ "expression": expression, "error": e }),
        })
    }

    fn format_observation(&self, invocation: &Invocation) -> String {
        let Some(result) = &invocation.result else {
            return String::new();
        };
        let expression = result["expression"].as_str().unwrap_or_default();
        match (result.get("result"), result.get("error")) {
            (Some(value), _) => format!("{expression} = {value}"),
            (None, Some(Value::String(error))) => format!("Error evaluating '{expression}': {error}"),
            _ => result.to_string(),
        }
    }
}

fn evaluate_expression(expr: &str) -> std::result::Result<f64, String> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.sum()?;
    if let Some(c) = parser.peek() {
        return Err(format!("Unexpected '{c}' at position {}", parser.pos));
    }
    Ok(value)
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    /// Run a nested rule one level deeper, refusing past `MAX_DEPTH`
    fn nested<F>(&mut self, rule: F) -> std::result::Result<f64, String>
    where
        F: FnOnce(&mut Self) -> std::result::Result<f64, String>,
    {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let value = rule(self);
        self.depth -= 1;
        value
    }

    // sum := product (('+' | '-') product)*
    fn sum(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // product := power (('*' | '/') power)*
    fn product(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            if op == '/' {
                if rhs == 0.0 {
                    return Err("Division by zero".into());
                }
                value /= rhs;
            } else {
                value *= rhs;
            }
        }
        Ok(value)
    }

    // power := unary ('^' power)?   (right associative)
    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.nested(Self::sum)?;
                match self.bump() {
                    Some(')') => Ok(value),
                    _ => Err("Missing closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.tokens[start..self.pos].iter().collect();
                literal
                    .parse::<f64>()
                    .map_err(|e| format!("Parse error: {e}"))
            }
            Some(c) => Err(format!("Unexpected '{c}' at position {}", self.pos)),
            None => Err("Unexpected end of expression".into()),
        }
    }
}
