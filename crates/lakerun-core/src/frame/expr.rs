//! Row-wise SQL expression evaluation against a frame.
//!
//! Expressions are parsed once with sqlparser's generic dialect and
//! interpreted per row. Predicates follow SQL three-valued logic: comparisons
//! against null (or across incomparable types) yield unknown, and `AND`/`OR`
//! combine under Kleene semantics. Callers decide how unknown rows count —
//! the filter transform drops them, the quality engine does not treat them as
//! failures.

use arrow::array::BooleanArray;
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{PipelineError, Result};
use crate::frame::{DataFrame, ScalarValue};

/// A parsed scalar or predicate expression.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    expr: Expr,
}

impl CompiledExpr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Fails on unparseable SQL.
    pub fn parse(sql: &str) -> Result<Self> {
        let expr = Parser::new(&GenericDialect {})
            .try_with_sql(sql)
            .map_err(|e| PipelineError::Expression(format!("cannot parse '{sql}': {e}")))?
            .parse_expr()
            .map_err(|e| PipelineError::Expression(format!("cannot parse '{sql}': {e}")))?;
        Ok(Self {
            source: sql.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate as a predicate, one slot per row; unknown evaluates to null.
    ///
    /// # Errors
    ///
    /// Fails when the expression references unknown columns or is not
    /// boolean-valued.
    pub fn mask(&self, frame: &DataFrame) -> Result<BooleanArray> {
        let mut slots: Vec<Option<bool>> = Vec::with_capacity(frame.num_rows());
        for row in 0..frame.num_rows() {
            let value = evaluate(&self.expr, frame, row)?;
            slots.push(as_bool(&value, &self.source)?);
        }
        Ok(BooleanArray::from(slots))
    }

    /// Evaluate as a scalar expression, one value per row.
    ///
    /// # Errors
    ///
    /// Fails when the expression references unknown columns.
    pub fn values(&self, frame: &DataFrame) -> Result<Vec<ScalarValue>> {
        (0..frame.num_rows())
            .map(|row| evaluate(&self.expr, frame, row))
            .collect()
    }
}

fn as_bool(value: &ScalarValue, source: &str) -> Result<Option<bool>> {
    match value {
        ScalarValue::Null => Ok(None),
        ScalarValue::Boolean(b) => Ok(Some(*b)),
        other => Err(PipelineError::Expression(format!(
            "predicate '{source}' evaluated to non-boolean value: {other}"
        ))),
    }
}

fn literal_value(value: &Value) -> Result<ScalarValue> {
    match value {
        Value::Number(text, _) => {
            if let Ok(int) = text.parse::<i64>() {
                Ok(ScalarValue::Int(int))
            } else {
                text.parse::<f64>().map(ScalarValue::Float).map_err(|_| {
                    PipelineError::Expression(format!("invalid numeric literal: {text}"))
                })
            }
        }
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
            Ok(ScalarValue::Utf8(s.clone()))
        }
        Value::Boolean(b) => Ok(ScalarValue::Boolean(*b)),
        Value::Null => Ok(ScalarValue::Null),
        other => Err(PipelineError::Expression(format!(
            "unsupported literal: {other}"
        ))),
    }
}

fn evaluate(expr: &Expr, frame: &DataFrame, row: usize) -> Result<ScalarValue> {
    match expr {
        Expr::Identifier(ident) => frame.value(&ident.value, row),
        Expr::CompoundIdentifier(parts) => {
            let last = parts
                .last()
                .ok_or_else(|| PipelineError::Expression("empty identifier".to_string()))?;
            frame.value(&last.value, row)
        }
        Expr::Value(value) => literal_value(value),
        Expr::Nested(inner) => evaluate(inner, frame, row),
        Expr::IsNull(inner) => Ok(ScalarValue::Boolean(evaluate(inner, frame, row)?.is_null())),
        Expr::IsNotNull(inner) => Ok(ScalarValue::Boolean(
            !evaluate(inner, frame, row)?.is_null(),
        )),
        Expr::UnaryOp { op, expr: inner } => {
            let value = evaluate(inner, frame, row)?;
            match op {
                UnaryOperator::Not => match value {
                    ScalarValue::Null => Ok(ScalarValue::Null),
                    ScalarValue::Boolean(b) => Ok(ScalarValue::Boolean(!b)),
                    other => Err(PipelineError::Expression(format!(
                        "NOT applied to non-boolean value: {other}"
                    ))),
                },
                UnaryOperator::Minus => match value {
                    ScalarValue::Null => Ok(ScalarValue::Null),
                    ScalarValue::Int(v) => Ok(ScalarValue::Int(-v)),
                    ScalarValue::Float(v) => Ok(ScalarValue::Float(-v)),
                    other => Err(PipelineError::Expression(format!(
                        "cannot negate non-numeric value: {other}"
                    ))),
                },
                UnaryOperator::Plus => Ok(value),
                other => Err(PipelineError::Expression(format!(
                    "unsupported unary operator: {other}"
                ))),
            }
        }
        Expr::BinaryOp { left, op, right } => evaluate_binary(left, op, right, frame, row),
        Expr::InList {
            expr: needle,
            list,
            negated,
        } => {
            let value = evaluate(needle, frame, row)?;
            if value.is_null() {
                return Ok(ScalarValue::Null);
            }
            let mut found = false;
            for item in list {
                if value.loosely_eq(&evaluate(item, frame, row)?) {
                    found = true;
                    break;
                }
            }
            Ok(ScalarValue::Boolean(found != *negated))
        }
        Expr::Between {
            expr: needle,
            negated,
            low,
            high,
        } => {
            let value = evaluate(needle, frame, row)?;
            let low = evaluate(low, frame, row)?;
            let high = evaluate(high, frame, row)?;
            match (value.compare(&low), value.compare(&high)) {
                (Some(ge), Some(le)) => {
                    let inside =
                        ge != std::cmp::Ordering::Less && le != std::cmp::Ordering::Greater;
                    Ok(ScalarValue::Boolean(inside != *negated))
                }
                _ => Ok(ScalarValue::Null),
            }
        }
        other => Err(PipelineError::Expression(format!(
            "unsupported expression: {other}"
        ))),
    }
}

fn evaluate_binary(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
    frame: &DataFrame,
    row: usize,
) -> Result<ScalarValue> {
    // Kleene AND/OR short-circuit on a definite answer from either side.
    if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
        let source = "logical operand";
        let lhs = as_bool(&evaluate(left, frame, row)?, source)?;
        match (op, lhs) {
            (BinaryOperator::And, Some(false)) => return Ok(ScalarValue::Boolean(false)),
            (BinaryOperator::Or, Some(true)) => return Ok(ScalarValue::Boolean(true)),
            _ => {}
        }
        let rhs = as_bool(&evaluate(right, frame, row)?, source)?;
        return Ok(match (op, lhs, rhs) {
            (BinaryOperator::And, _, Some(false)) => ScalarValue::Boolean(false),
            (BinaryOperator::And, Some(true), Some(true)) => ScalarValue::Boolean(true),
            (BinaryOperator::Or, _, Some(true)) => ScalarValue::Boolean(true),
            (BinaryOperator::Or, Some(false), Some(false)) => ScalarValue::Boolean(false),
            _ => ScalarValue::Null,
        });
    }

    let lhs = evaluate(left, frame, row)?;
    let rhs = evaluate(right, frame, row)?;

    match op {
        BinaryOperator::Eq
        | BinaryOperator::NotEq
        | BinaryOperator::Lt
        | BinaryOperator::LtEq
        | BinaryOperator::Gt
        | BinaryOperator::GtEq => {
            let Some(ordering) = lhs.compare(&rhs) else {
                return Ok(ScalarValue::Null);
            };
            use std::cmp::Ordering;
            let result = match op {
                BinaryOperator::Eq => ordering == Ordering::Equal,
                BinaryOperator::NotEq => ordering != Ordering::Equal,
                BinaryOperator::Lt => ordering == Ordering::Less,
                BinaryOperator::LtEq => ordering != Ordering::Greater,
                BinaryOperator::Gt => ordering == Ordering::Greater,
                BinaryOperator::GtEq => ordering != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(ScalarValue::Boolean(result))
        }
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => arithmetic(op, &lhs, &rhs),
        other => Err(PipelineError::Expression(format!(
            "unsupported operator: {other}"
        ))),
    }
}

fn arithmetic(op: &BinaryOperator, lhs: &ScalarValue, rhs: &ScalarValue) -> Result<ScalarValue> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(ScalarValue::Null);
    }
    // Integer arithmetic stays integral except for division.
    if let (ScalarValue::Int(a), ScalarValue::Int(b)) = (lhs, rhs) {
        let result = match op {
            BinaryOperator::Plus => ScalarValue::Int(a + b),
            BinaryOperator::Minus => ScalarValue::Int(a - b),
            BinaryOperator::Multiply => ScalarValue::Int(a * b),
            BinaryOperator::Divide => {
                if *b == 0 {
                    ScalarValue::Null
                } else {
                    ScalarValue::Float(*a as f64 / *b as f64)
                }
            }
            BinaryOperator::Modulo => {
                if *b == 0 {
                    ScalarValue::Null
                } else {
                    ScalarValue::Int(a % b)
                }
            }
            _ => unreachable!(),
        };
        return Ok(result);
    }
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(PipelineError::Expression(format!(
            "arithmetic on non-numeric values: {lhs} {op} {rhs}"
        )));
    };
    let result = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => {
            if b == 0.0 {
                return Ok(ScalarValue::Null);
            }
            a / b
        }
        BinaryOperator::Modulo => a % b,
        _ => unreachable!(),
    };
    Ok(ScalarValue::Float(result))
}
