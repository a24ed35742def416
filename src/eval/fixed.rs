//! An evaluator backed by a fixed table of results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::value::{Value, ValueType};

use super::{Evaluator, Expression};

#[derive(Debug, Clone)]
enum Outcome {
    Value(Value),
    Fail(String),
}

/// Maps expression text to a fixed value or a fixed failure.
///
/// Entries can be replaced between walks, which is how a plan-time unknown
/// becomes a concrete value at apply time. Every call is counted.
#[derive(Debug, Default)]
pub struct StaticEvaluator {
    outcomes: RwLock<HashMap<String, Outcome>>,
    calls: AtomicUsize,
}

impl StaticEvaluator {
    /// Creates an evaluator with no entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `text` evaluate to `value`.
    pub fn set(&self, text: impl Into<String>, value: Value) {
        self.outcomes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.into(), Outcome::Value(value));
    }

    /// Makes `text` fail with `message`.
    pub fn fail(&self, text: impl Into<String>, message: impl Into<String>) {
        self.outcomes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.into(), Outcome::Fail(message.into()));
    }

    /// Returns the number of evaluations performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Evaluator for StaticEvaluator {
    fn evaluate_expr(&self, expr: &Expression, want: &ValueType) -> (Value, Diagnostics) {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let outcome = self
            .outcomes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&expr.text)
            .cloned();

        let diag = match outcome {
            Some(Outcome::Value(value)) if value.conforms_to(want) => {
                return (value, Diagnostics::new());
            }
            Some(Outcome::Value(value)) => Diagnostic::error(
                "Incorrect value type",
                format!(
                    "Expression {:?} produced a value of type {}, but {want} is required.",
                    expr.text,
                    value.ty()
                ),
            ),
            Some(Outcome::Fail(message)) => Diagnostic::error("Evaluation failed", message),
            None => Diagnostic::error(
                "Reference to undeclared value",
                format!("No value is defined for expression {:?}.", expr.text),
            ),
        };

        (
            Value::unknown(want.clone()),
            diag.with_subject(expr.range.clone()).into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceRange;

    #[test]
    fn test_set_and_replace() {
        let eval = StaticEvaluator::new();
        let expr = Expression::new("var.name");
        eval.set("var.name", Value::unknown(ValueType::String));

        let (value, diags) = eval.evaluate_expr(&expr, &ValueType::Dynamic);
        assert!(diags.is_empty());
        assert!(!value.is_known());

        eval.set("var.name", Value::from("web"));
        let (value, _) = eval.evaluate_expr(&expr, &ValueType::String);
        assert_eq!(value, Value::from("web"));
        assert_eq!(eval.calls(), 2);
    }

    #[test]
    fn test_failure_carries_subject() {
        let eval = StaticEvaluator::new();
        eval.fail("broken", "division by zero");
        let expr = Expression::new("broken").with_range(SourceRange::single_line("main.tf", 3, 11, 17));

        let (_, diags) = eval.evaluate_expr(&expr, &ValueType::Dynamic);
        assert!(diags.has_errors());
        let diag = diags.iter().next().expect("one diagnostic");
        assert_eq!(diag.detail, "division by zero");
        assert_eq!(diag.subject, expr.range);
    }

    #[test]
    fn test_undeclared_and_wrong_type() {
        let eval = StaticEvaluator::new();
        let (_, diags) = eval.evaluate_expr(&Expression::new("missing"), &ValueType::Dynamic);
        assert!(diags.has_errors());

        eval.set("count", Value::from("three"));
        let (_, diags) = eval.evaluate_expr(&Expression::new("count"), &ValueType::Number);
        assert!(diags.has_errors());
    }
}
