//! Declarative data-quality check interpreter.
//!
//! Each check is a tagged specification evaluated independently against the
//! frame; the total row count is computed once up front. An error while
//! evaluating one check marks that check failed and evaluation continues —
//! unless `fail_on_error` is set, in which case the first failing check
//! escalates immediately and the remaining checks never run.
//!
//! Range, regex, values, and custom checks follow SQL three-valued logic:
//! rows whose condition evaluates to null are not counted as failures. Only
//! `not_null` targets nulls directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{PipelineError, Result};
use crate::frame::expr::CompiledExpr;
use crate::frame::{display_value, scalar_value, DataFrame, ScalarValue};

/// One check specification from the quality config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    #[serde(rename = "type")]
    pub check_type: String,
    pub column: Option<String>,
    pub name: Option<String>,
    /// Maximum tolerated failure rate; 0 means any failure fails the check.
    #[serde(default)]
    pub threshold: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Vec<JsonValue>,
    pub expression: Option<String>,
}

impl CheckSpec {
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.column {
            Some(column) => format!("{}_{}", self.check_type, column),
            None => self.check_type.clone(),
        }
    }
}

/// Known check kinds; anything else routes through the lenient unknown path.
pub const KNOWN_CHECK_TYPES: [&str; 7] = [
    "not_null",
    "unique",
    "range",
    "regex",
    "values",
    "custom",
    "row_count",
];

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub check_type: String,
    pub column: Option<String>,
    pub passed: bool,
    pub failed_count: u64,
    pub message: String,
}

/// Aggregated outcome of a check batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub passed: u32,
    pub failed: u32,
    pub checks: Vec<CheckResult>,
}

struct Outcome {
    passed: bool,
    failed_count: u64,
    message: String,
}

/// Run every check against the frame.
///
/// # Errors
///
/// Returns a `Validation` error for the first failing check when
/// `fail_on_error` is set; per-check evaluation errors never abort the batch.
pub fn run_checks(
    frame: &DataFrame,
    checks: &[CheckSpec],
    fail_on_error: bool,
) -> Result<QualityReport> {
    let total_rows = frame.num_rows() as u64;
    let mut report = QualityReport::default();

    for spec in checks {
        let name = spec.display_name();
        let mut result = match evaluate_check(frame, spec, total_rows) {
            Ok(outcome) => CheckResult {
                name: name.clone(),
                check_type: spec.check_type.clone(),
                column: spec.column.clone(),
                passed: outcome.passed,
                failed_count: outcome.failed_count,
                message: outcome.message,
            },
            Err(error) => CheckResult {
                name: name.clone(),
                check_type: spec.check_type.clone(),
                column: spec.column.clone(),
                passed: false,
                failed_count: 0,
                message: format!("check error: {error}"),
            },
        };

        // Failure-rate tolerance replaces the strict zero-failures rule.
        if spec.threshold > 0.0 && result.failed_count > 0 {
            let failure_rate = if total_rows == 0 {
                f64::INFINITY
            } else {
                result.failed_count as f64 / total_rows as f64
            };
            result.passed = failure_rate <= spec.threshold;
        }

        tracing::info!(
            check = name,
            passed = result.passed,
            failed_count = result.failed_count,
            "Quality check evaluated"
        );

        if result.passed {
            report.passed += 1;
        } else {
            report.failed += 1;
            if fail_on_error {
                return Err(PipelineError::Validation {
                    name,
                    message: result.message,
                });
            }
        }
        report.checks.push(result);
    }

    Ok(report)
}

fn require_column<'a>(frame: &DataFrame, spec: &'a CheckSpec) -> Result<&'a str> {
    let column = spec.column.as_deref().ok_or_else(|| {
        PipelineError::Expression(format!("{} check requires a column", spec.check_type))
    })?;
    if !frame.has_column(column) {
        return Err(PipelineError::Expression(format!(
            "column not found: {column}"
        )));
    }
    Ok(column)
}

fn format_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "unbounded".to_string(), |v| v.to_string())
}

fn evaluate_check(frame: &DataFrame, spec: &CheckSpec, total_rows: u64) -> Result<Outcome> {
    match spec.check_type.as_str() {
        "not_null" => {
            let column = require_column(frame, spec)?;
            let failed = frame
                .column(column)
                .map(|array| array.null_count() as u64)
                .unwrap_or(0);
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!("{failed} null values found"),
            })
        }
        "unique" => {
            let column = require_column(frame, spec)?;
            let columns = [column.to_string()];
            let mut counts: HashMap<String, u64> = HashMap::new();
            for row in 0..frame.num_rows() {
                *counts.entry(frame.group_key(row, &columns)?).or_default() += 1;
            }
            // Group count, not row count.
            let failed = counts.values().filter(|&&count| count > 1).count() as u64;
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!("{failed} duplicate groups found"),
            })
        }
        "range" => {
            let column = require_column(frame, spec)?;
            let array = frame.column(column).expect("column checked above");
            let mut failed = 0u64;
            for row in 0..frame.num_rows() {
                let value = scalar_value(array.as_ref(), row);
                if value.is_null() {
                    continue;
                }
                match value.as_f64() {
                    Some(v) => {
                        if spec.min.is_some_and(|lower| v < lower)
                            || spec.max.is_some_and(|upper| v > upper)
                        {
                            failed += 1;
                        }
                    }
                    None => failed += 1,
                }
            }
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!(
                    "{failed} values out of range [{}, {}]",
                    format_bound(spec.min),
                    format_bound(spec.max)
                ),
            })
        }
        "regex" => {
            let column = require_column(frame, spec)?;
            let pattern = spec.pattern.as_deref().ok_or_else(|| {
                PipelineError::Expression("regex check requires a pattern".to_string())
            })?;
            let regex = regex::Regex::new(pattern)
                .map_err(|e| PipelineError::Expression(format!("invalid pattern: {e}")))?;
            let array = frame.column(column).expect("column checked above");
            let mut failed = 0u64;
            for row in 0..frame.num_rows() {
                if array.is_null(row) {
                    continue;
                }
                if !regex.is_match(&display_value(array.as_ref(), row)) {
                    failed += 1;
                }
            }
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!("{failed} values don't match pattern"),
            })
        }
        "values" => {
            let column = require_column(frame, spec)?;
            let allowed: Vec<ScalarValue> =
                spec.allowed.iter().map(ScalarValue::from_json).collect();
            let array = frame.column(column).expect("column checked above");
            let mut failed = 0u64;
            for row in 0..frame.num_rows() {
                let value = scalar_value(array.as_ref(), row);
                if value.is_null() {
                    continue;
                }
                if !allowed.iter().any(|candidate| value.loosely_eq(candidate)) {
                    failed += 1;
                }
            }
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!("{failed} values not in allowed list"),
            })
        }
        "custom" => {
            let expression = spec.expression.as_deref().ok_or_else(|| {
                PipelineError::Expression("custom check requires an expression".to_string())
            })?;
            let mask = CompiledExpr::parse(expression)?.mask(frame)?;
            let failed = mask.iter().filter(|slot| *slot == Some(false)).count() as u64;
            Ok(Outcome {
                passed: failed == 0,
                failed_count: failed,
                message: format!("{failed} rows failed custom check"),
            })
        }
        "row_count" => {
            let min = spec.min.unwrap_or(0.0);
            let max = spec.max.unwrap_or(f64::INFINITY);
            let total = total_rows as f64;
            let passed = total >= min && total <= max;
            Ok(Outcome {
                passed,
                failed_count: u64::from(!passed),
                message: format!(
                    "row count: {total_rows} (expected: {}-{})",
                    format_bound(Some(min)),
                    format_bound(spec.max)
                ),
            })
        }
        unknown => Ok(Outcome {
            // Compatibility: unknown check types report zero failures and
            // count as passed. `validate_pipeline` is the strict companion.
            passed: true,
            failed_count: 0,
            message: format!("unknown check type: {unknown}"),
        }),
    }
}
