//! Bound, executable expression objects.
//!
//! Everything here closes over immutable data only: a bound statement may
//! be executed concurrently from multiple threads, with one [`EvalContext`]
//! per call.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::ast::CompOp;
use crate::error::EvalError;
use crate::getters::Getter;
use crate::ops;
use crate::{EvalContext, Value};

/// Closure form of an executable function: the unit a [`crate::Factory`]
/// constructs.
pub type ExprFunc<K> = Arc<dyn Fn(&EvalContext, &mut K) -> Result<Value, EvalError> + Send + Sync>;

/// An executable expression produced by binding a function invocation.
#[derive(Clone)]
pub struct Expr<K> {
    expr_func: ExprFunc<K>,
}

impl<K> Expr<K> {
    /// Wraps a constructed function.
    pub fn new(expr_func: ExprFunc<K>) -> Self {
        Expr { expr_func }
    }

    /// Runs the expression. Checks cancellation before entering the
    /// function body.
    pub fn eval(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Value, EvalError> {
        ectx.ensure_active()?;
        (self.expr_func)(ectx, tctx)
    }
}

impl<K> std::fmt::Debug for Expr<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Expr")
    }
}

/// A bound where-clause tree.
#[derive(Clone, Debug)]
pub(crate) enum BoolExpr<K> {
    Comparison {
        left: Getter<K>,
        op: CompOp,
        right: Getter<K>,
    },
    /// A bare term that must evaluate to a bool.
    Term(Getter<K>),
    Not(Box<BoolExpr<K>>),
    And(Box<BoolExpr<K>>, Box<BoolExpr<K>>),
    Or(Box<BoolExpr<K>>, Box<BoolExpr<K>>),
}

impl<K> BoolExpr<K> {
    pub(crate) fn eval(&self, ectx: &EvalContext, tctx: &mut K) -> Result<bool, EvalError> {
        match self {
            BoolExpr::Comparison { left, op, right } => {
                let left = left.get(ectx, tctx)?;
                let right = right.get(ectx, tctx)?;
                ops::compare(&left, *op, &right)
            }
            BoolExpr::Term(getter) => match getter.get(ectx, tctx)? {
                Value::Bool(b) => Ok(b),
                other => Err(EvalError::TypeMismatch {
                    expected: "bool",
                    actual: other.type_name(),
                }),
            },
            BoolExpr::Not(inner) => Ok(!inner.eval(ectx, tctx)?),
            BoolExpr::And(left, right) => {
                if !left.eval(ectx, tctx)? {
                    return Ok(false);
                }
                right.eval(ectx, tctx)
            }
            BoolExpr::Or(left, right) => {
                if left.eval(ectx, tctx)? {
                    return Ok(true);
                }
                right.eval(ectx, tctx)
            }
        }
    }
}

/// A bound index applied to a converter result, e.g. `Split(...)[0]`.
#[derive(Clone, Debug)]
pub(crate) enum BoundKey<K> {
    Int(i64),
    String(String),
    /// Key computed per call; must yield an int or a string.
    Expression(Getter<K>),
}

/// Applies a chain of bound keys to a value.
pub(crate) fn apply_keys<K>(
    value: Value,
    keys: &[BoundKey<K>],
    ectx: &EvalContext,
    tctx: &mut K,
) -> Result<Value, EvalError> {
    let mut current = value;
    for key in keys {
        current = match key {
            BoundKey::Int(index) => index_list(current, *index)?,
            BoundKey::String(key) => index_map(current, key)?,
            BoundKey::Expression(getter) => match getter.get(ectx, tctx)? {
                Value::Int(index) => index_list(current, index)?,
                Value::String(key) => index_map(current, &key)?,
                other => {
                    return Err(EvalError::CannotIndex {
                        value_type: current.type_name(),
                        key_type: other.type_name(),
                    })
                }
            },
        };
    }
    Ok(current)
}

fn index_list(value: Value, index: i64) -> Result<Value, EvalError> {
    match value {
        Value::List(items) => usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or(EvalError::IndexOutOfBounds { index }),
        other => Err(EvalError::CannotIndex {
            value_type: other.type_name(),
            key_type: "int",
        }),
    }
}

fn index_map(value: Value, key: &str) -> Result<Value, EvalError> {
    match value {
        Value::Map(entries) => entries
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::KeyNotFound { key: key.to_string() }),
        other => Err(EvalError::CannotIndex {
            value_type: other.type_name(),
            key_type: "string",
        }),
    }
}

/// A fully bound statement: editor plus optional condition.
#[derive(Clone, Debug)]
pub struct Statement<K> {
    pub(crate) function: Expr<K>,
    pub(crate) condition: Option<BoolExpr<K>>,
    pub(crate) origin: String,
}

impl<K> Statement<K> {
    /// Runs the statement. Returns the editor's result and whether the
    /// condition held; when the condition is false the editor does not run
    /// and the result is nil.
    pub fn execute(&self, ectx: &EvalContext, tctx: &mut K) -> Result<(Value, bool), EvalError> {
        let matched = match &self.condition {
            Some(condition) => condition.eval(ectx, tctx)?,
            None => true,
        };
        if !matched {
            return Ok((Value::Nil, false));
        }
        let value = self.function.eval(ectx, tctx)?;
        Ok((value, true))
    }

    /// The statement's original source text.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// A bound standalone predicate.
#[derive(Clone, Debug)]
pub struct Condition<K> {
    pub(crate) condition: BoolExpr<K>,
    pub(crate) origin: String,
}

impl<K> Condition<K> {
    /// Evaluates the predicate.
    pub fn eval(&self, ectx: &EvalContext, tctx: &mut K) -> Result<bool, EvalError> {
        self.condition.eval(ectx, tctx)
    }

    /// The condition's original source text.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// A bound bare value expression.
#[derive(Clone, Debug)]
pub struct ValueExpression<K> {
    pub(crate) getter: Getter<K>,
    pub(crate) origin: String,
}

impl<K> ValueExpression<K> {
    /// Evaluates the expression.
    pub fn eval(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Value, EvalError> {
        self.getter.get(ectx, tctx)
    }

    /// The expression's original source text.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// How a consumer treats per-record evaluation failures.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Fail the batch on the first failing statement.
    #[default]
    Propagate,
    /// Log the failure and continue with the remaining statements.
    Ignore,
    /// Continue silently.
    Silent,
}

/// Logic joining the conditions of a [`ConditionSequence`].
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperation {
    #[default]
    And,
    Or,
}

/// A batch of bound statements executed in order under one error mode.
#[derive(Clone, Debug)]
pub struct StatementSequence<K> {
    statements: Vec<Statement<K>>,
    error_mode: ErrorMode,
}

impl<K> StatementSequence<K> {
    /// Wraps bound statements with the default (propagate) error mode.
    pub fn new(statements: Vec<Statement<K>>) -> Self {
        StatementSequence {
            statements,
            error_mode: ErrorMode::default(),
        }
    }

    /// Overrides the error mode.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// The statements in execution order.
    pub fn statements(&self) -> &[Statement<K>] {
        &self.statements
    }

    /// Executes every statement in order. Failures are propagated, logged,
    /// or swallowed per the error mode.
    pub fn execute(&self, ectx: &EvalContext, tctx: &mut K) -> Result<(), EvalError> {
        for statement in &self.statements {
            if let Err(error) = statement.execute(ectx, tctx) {
                match self.error_mode {
                    ErrorMode::Propagate => return Err(error),
                    ErrorMode::Ignore => {
                        warn!(statement = %statement.origin(), %error, "failed to execute statement");
                    }
                    ErrorMode::Silent => {}
                }
            }
        }
        Ok(())
    }
}

/// A batch of bound conditions evaluated under one logic operation and
/// error mode.
#[derive(Clone, Debug)]
pub struct ConditionSequence<K> {
    conditions: Vec<Condition<K>>,
    logic_op: LogicOperation,
    error_mode: ErrorMode,
}

impl<K> ConditionSequence<K> {
    /// Wraps bound conditions, ANDed by default.
    pub fn new(conditions: Vec<Condition<K>>) -> Self {
        ConditionSequence {
            conditions,
            logic_op: LogicOperation::default(),
            error_mode: ErrorMode::default(),
        }
    }

    /// Overrides the logic operation.
    pub fn with_logic_operation(mut self, logic_op: LogicOperation) -> Self {
        self.logic_op = logic_op;
        self
    }

    /// Overrides the error mode.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Evaluates the conditions under the configured logic operation.
    /// Errored conditions are skipped (or propagated) per the error mode.
    pub fn eval(&self, ectx: &EvalContext, tctx: &mut K) -> Result<bool, EvalError> {
        let mut at_least_one_match = false;
        for condition in &self.conditions {
            let matched = match condition.eval(ectx, tctx) {
                Ok(matched) => matched,
                Err(error) => {
                    match self.error_mode {
                        ErrorMode::Propagate => return Err(error),
                        ErrorMode::Ignore => {
                            warn!(condition = %condition.origin(), %error, "failed to eval condition");
                        }
                        ErrorMode::Silent => {}
                    }
                    continue;
                }
            };
            if matched {
                if self.logic_op == LogicOperation::Or {
                    return Ok(true);
                }
                at_least_one_match = true;
            }
            if self.logic_op == LogicOperation::And && !matched {
                return Ok(false);
            }
        }
        // ANDed conditions that reached this point were all true as long as
        // at least one was evaluated; ORed conditions returned earlier.
        Ok(self.logic_op == LogicOperation::And && at_least_one_match)
    }
}

/// Configuration-level batch of statements sharing a telemetry context.
/// Pipeline consumers deserialize these, bind one parser per context type,
/// and hand the parsed statements to downstream consumers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ContextStatements {
    /// Name of the target context, e.g. `span` or `log`.
    pub context: String,
    /// Optional preconditions, parsed with [`crate::Parser::parse_condition`].
    #[serde(default)]
    pub conditions: Vec<String>,
    /// The statements, parsed with [`crate::Parser::parse_statement`].
    #[serde(default)]
    pub statements: Vec<String>,
    /// Per-batch error-mode override.
    #[serde(default)]
    pub error_mode: Option<ErrorMode>,
}
