//! Statement front end for the OpenTelemetry Transformation Language.
//!
//! This crate parses statements of the form `editor(args…) where condition`,
//! binds them against caller-supplied registries (functions, enums, path
//! resolvers), and produces strongly typed, thread-safe expressions. The
//! telemetry record layout is entirely the caller's: paths are resolved
//! through a [`PathResolver`] into [`GetSetter`]s over an opaque context
//! type `K`, and functions are registered as [`Factory`] implementations
//! with descriptor-based argument records.
//!
//! # Example
//!
//! ```ignore
//! use ottl::{EvalContext, Parser, TelemetrySettings};
//! use ottl::funcs::default_functions;
//!
//! let parser = Parser::new(default_functions(), resolve_path, TelemetrySettings::default())
//!     .with_path_context_names(["span", "log"]);
//!
//! let statement = parser.parse_statement(r#"set(span.attributes["x"], 1)"#)?;
//! statement.execute(&EvalContext::new(), &mut span)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

pub mod ast;
mod binder;
pub mod error;
mod expression;
pub mod funcs;
mod functions;
mod getters;
mod grammar;
mod lexer;
mod ops;
mod parser;
mod path;
mod rewrite;

#[cfg(test)]
mod tests;

pub use error::{ArgumentError, BoxError, EvalError, ParseError};
pub use expression::{
    Condition, ConditionSequence, ContextStatements, ErrorMode, Expr, ExprFunc, LogicOperation, Statement,
    StatementSequence, ValueExpression,
};
pub use functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Enum, Factory, FromArgValue,
    FunctionContext, FunctionGetter, GetterKind, Optional, SliceElemKind, TelemetrySettings,
};
pub use getters::{
    BoolGetter, BoolLikeGetter, ByteSliceLikeGetter, DurationGetter, FloatGetter, FloatLikeGetter,
    FromValue, GetSetter, Getter, GetterFn, IntGetter, IntLikeGetter, ListGetter, LiteralGetter,
    MapGetSetter, MapGetter, Setter, SetterFn, SliceGetter, StringGetter, StringLikeGetter, TimeGetter,
    TypedGetter,
};
pub use lexer::Span;
pub use parser::{EnumResolver, FunctionRegistry, Parser, PathResolver};
pub use path::{Path, PathKey};

/// All values flowing through statement evaluation and function arguments.
/// Strings and byte blobs are reference counted so cloning stays cheap.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Nil/absent value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// String.
    String(Arc<str>),
    /// Raw bytes, from `0x…` literals or byte-typed record fields.
    Bytes(Arc<[u8]>),
    /// Homogeneous or heterogeneous sequence.
    List(Vec<Value>),
    /// String-keyed map.
    Map(HashMap<String, Value>),
    /// Elapsed time, produced by duration-typed functions and record fields.
    Duration(std::time::Duration),
    /// Wall-clock instant, produced by time-typed functions and record fields.
    Time(chrono::DateTime<chrono::Utc>),
}

impl Value {
    /// Creates a string value from any string-like type.
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Creates a bytes value from any bytes-like type.
    #[inline]
    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    /// The value's type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Duration(_) => "duration",
            Value::Time(_) => "time",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Per-call evaluation state handed to every getter, setter, and function
/// body: a cancellation token and the batch-wide cache.
///
/// Each call into a bound expression gets a shared reference to one of
/// these; the expression itself holds no mutable state, so a single
/// expression may be evaluated concurrently with one `EvalContext` per call.
#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    cancellation: CancellationToken,
    cache: Arc<Mutex<HashMap<String, Value>>>,
}

impl EvalContext {
    /// Creates an evaluation context with a fresh cancellation token and an
    /// empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluation context observing the given cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            cache: Arc::default(),
        }
    }

    /// Replaces the cache with one shared across the statements of a batch.
    /// The cache is keyed by a context-type discriminator chosen by the
    /// caller and is only ever accessed from the thread running the call.
    pub fn with_cache(mut self, cache: Arc<Mutex<HashMap<String, Value>>>) -> Self {
        self.cache = cache;
        self
    }

    /// Whether the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns an error if the call has been cancelled. Evaluation checks
    /// this before invoking user-supplied getters and function bodies.
    pub fn ensure_active(&self) -> Result<(), EvalError> {
        if self.cancellation.is_cancelled() {
            Err(EvalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reads a cache entry under the given discriminator key.
    pub fn cache_get(&self, key: &str) -> Option<Value> {
        self.cache.lock().ok().and_then(|cache| cache.get(key).cloned())
    }

    /// Writes a cache entry under the given discriminator key.
    pub fn cache_set(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.into(), value);
        }
    }

    /// The shared cache handle, for batch consumers that carry it across
    /// statements.
    pub fn cache(&self) -> Arc<Mutex<HashMap<String, Value>>> {
        Arc::clone(&self.cache)
    }
}
