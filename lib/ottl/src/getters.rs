//! Getters, setters, and the typed shells the binder wraps them in.
//!
//! A [`Getter`] is the universal bound form of any value expression. When
//! the source expression was a compile-time constant, the getter also
//! carries the constant so literal-aware argument slots can read it without
//! a context. Typed shells ([`StringGetter`], [`IntLikeGetter`], …) wrap a
//! getter and perform their declared runtime coercion; the `…Like` variants
//! accept heterogeneous values and coerce to the leaf type, yielding `None`
//! for nil input.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::EvalError;
use crate::{EvalContext, Value};

/// Closure form of a bound read.
pub type GetterFn<K> = Arc<dyn Fn(&EvalContext, &mut K) -> Result<Value, EvalError> + Send + Sync>;

/// Closure form of a bound write.
pub type SetterFn<K> = Arc<dyn Fn(&EvalContext, &mut K, Value) -> Result<(), EvalError> + Send + Sync>;

/// A bound, reusable read of a value from the evaluation context.
pub struct Getter<K> {
    get: GetterFn<K>,
    literal: Option<Value>,
}

impl<K> Clone for Getter<K> {
    fn clone(&self) -> Self {
        Getter {
            get: Arc::clone(&self.get),
            literal: self.literal.clone(),
        }
    }
}

impl<K> Getter<K> {
    /// Wraps a closure computing the value per call.
    pub fn new(get: impl Fn(&EvalContext, &mut K) -> Result<Value, EvalError> + Send + Sync + 'static) -> Self {
        Getter {
            get: Arc::new(get),
            literal: None,
        }
    }

    /// Wraps a compile-time constant. The getter returns a clone of the
    /// value on every call and exposes it through [`Getter::literal_value`].
    pub fn constant(value: Value) -> Self {
        let cloned = value.clone();
        Getter {
            get: Arc::new(move |_, _| Ok(cloned.clone())),
            literal: Some(value),
        }
    }

    /// Evaluates the getter. Checks for cancellation first so evaluation
    /// stays cooperative wherever user code may run.
    pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Value, EvalError> {
        ectx.ensure_active()?;
        (self.get)(ectx, tctx)
    }

    /// Whether the source of this getter was a compile-time constant:
    /// a scalar literal or a list consisting entirely of literal values.
    pub fn is_literal(&self) -> bool {
        self.literal.is_some()
    }

    /// The compile-time constant, when there is one.
    pub fn literal_value(&self) -> Option<&Value> {
        self.literal.as_ref()
    }
}

impl<K> std::fmt::Debug for Getter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getter").field("literal", &self.literal).finish()
    }
}

/// A bound, reusable write of a value into the evaluation context.
pub struct Setter<K> {
    set: SetterFn<K>,
}

impl<K> Clone for Setter<K> {
    fn clone(&self) -> Self {
        Setter {
            set: Arc::clone(&self.set),
        }
    }
}

impl<K> Setter<K> {
    /// Wraps a closure storing the value per call.
    pub fn new(
        set: impl Fn(&EvalContext, &mut K, Value) -> Result<(), EvalError> + Send + Sync + 'static,
    ) -> Self {
        Setter { set: Arc::new(set) }
    }

    /// Stores a value, checking for cancellation first.
    pub fn set(&self, ectx: &EvalContext, tctx: &mut K, value: Value) -> Result<(), EvalError> {
        ectx.ensure_active()?;
        (self.set)(ectx, tctx, value)
    }
}

impl<K> std::fmt::Debug for Setter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Setter")
    }
}

/// A read-write accessor bound to one path in one context. Path resolvers
/// return these; the binder re-wraps them into the shape the argument slot
/// declares.
#[derive(Debug)]
pub struct GetSetter<K> {
    getter: Getter<K>,
    setter: Setter<K>,
}

impl<K> Clone for GetSetter<K> {
    fn clone(&self) -> Self {
        GetSetter {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<K> GetSetter<K> {
    /// Pairs a getter with a setter.
    pub fn new(getter: Getter<K>, setter: Setter<K>) -> Self {
        GetSetter { getter, setter }
    }

    /// Evaluates the read side.
    pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Value, EvalError> {
        self.getter.get(ectx, tctx)
    }

    /// Evaluates the write side.
    pub fn set(&self, ectx: &EvalContext, tctx: &mut K, value: Value) -> Result<(), EvalError> {
        self.setter.set(ectx, tctx, value)
    }

    /// The read half.
    pub fn getter(&self) -> &Getter<K> {
        &self.getter
    }

    /// The write half.
    pub fn setter(&self) -> &Setter<K> {
        &self.setter
    }
}

/// A read-write accessor whose reads are coerced to a map. The map-shaped
/// rendering of the original's pdata map accessor.
#[derive(Debug)]
pub struct MapGetSetter<K> {
    inner: GetSetter<K>,
}

impl<K> Clone for MapGetSetter<K> {
    fn clone(&self) -> Self {
        MapGetSetter {
            inner: self.inner.clone(),
        }
    }
}

impl<K> MapGetSetter<K> {
    /// Wraps a plain accessor.
    pub fn new(inner: GetSetter<K>) -> Self {
        MapGetSetter { inner }
    }

    /// Reads the target and requires it to be a map.
    pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<HashMap<String, Value>, EvalError> {
        coerce_map(self.inner.get(ectx, tctx)?)
    }

    /// Stores a map back into the target.
    pub fn set(
        &self,
        ectx: &EvalContext,
        tctx: &mut K,
        value: HashMap<String, Value>,
    ) -> Result<(), EvalError> {
        self.inner.set(ectx, tctx, Value::Map(value))
    }
}

/// A typed view over a [`Getter`]: a pure coercion from [`Value`] to the
/// declared output type, applied after every read.
pub trait TypedGetter<K> {
    /// The coerced output type.
    type Output;

    /// The underlying untyped getter.
    fn raw(&self) -> &Getter<K>;

    /// Coerces one value to the output type.
    fn coerce(value: Value) -> Result<Self::Output, EvalError>;

    /// Reads and coerces.
    fn get_typed(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Self::Output, EvalError> {
        Self::coerce(self.raw().get(ectx, tctx)?)
    }
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $output:ty, $coerce:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name<K> {
            inner: Getter<K>,
        }

        impl<K> $name<K> {
            /// Wraps an untyped getter.
            pub fn new(inner: Getter<K>) -> Self {
                Self { inner }
            }

            /// Reads and coerces to the declared type.
            pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<$output, EvalError> {
                $coerce(self.inner.get(ectx, tctx)?)
            }
        }

        impl<K> From<Getter<K>> for $name<K> {
            fn from(inner: Getter<K>) -> Self {
                Self { inner }
            }
        }

        impl<K> TypedGetter<K> for $name<K> {
            type Output = $output;

            fn raw(&self) -> &Getter<K> {
                &self.inner
            }

            fn coerce(value: Value) -> Result<Self::Output, EvalError> {
                $coerce(value)
            }
        }
    };
}

typed_getter!(
    /// Requires the value to be a string.
    StringGetter,
    Arc<str>,
    coerce_string
);
typed_getter!(
    /// Requires the value to be an int.
    IntGetter,
    i64,
    coerce_int
);
typed_getter!(
    /// Requires the value to be a float.
    FloatGetter,
    f64,
    coerce_float
);
typed_getter!(
    /// Requires the value to be a bool.
    BoolGetter,
    bool,
    coerce_bool
);
typed_getter!(
    /// Requires the value to be a duration.
    DurationGetter,
    std::time::Duration,
    coerce_duration
);
typed_getter!(
    /// Requires the value to be a wall-clock time.
    TimeGetter,
    chrono::DateTime<chrono::Utc>,
    coerce_time
);
typed_getter!(
    /// Requires the value to be a map.
    MapGetter,
    HashMap<String, Value>,
    coerce_map
);
typed_getter!(
    /// Requires the value to be a list.
    ListGetter,
    Vec<Value>,
    coerce_list
);
typed_getter!(
    /// Renders any scalar or container value as a string; nil yields `None`.
    StringLikeGetter,
    Option<String>,
    coerce_string_like
);
typed_getter!(
    /// Coerces numeric, string, and bool values to an int; nil yields `None`.
    IntLikeGetter,
    Option<i64>,
    coerce_int_like
);
typed_getter!(
    /// Coerces numeric, string, and bool values to a float; nil yields `None`.
    FloatLikeGetter,
    Option<f64>,
    coerce_float_like
);
typed_getter!(
    /// Coerces numeric and string values to a bool; nil yields `None`.
    BoolLikeGetter,
    Option<bool>,
    coerce_bool_like
);
typed_getter!(
    /// Coerces scalar values to raw bytes; nil yields `None`.
    ByteSliceLikeGetter,
    Option<Vec<u8>>,
    coerce_byte_slice_like
);

fn coerce_string(value: Value) -> Result<Arc<str>, EvalError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(EvalError::TypeMismatch {
            expected: "string",
            actual: other.type_name(),
        }),
    }
}

fn coerce_int(value: Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(i) => Ok(i),
        other => Err(EvalError::TypeMismatch {
            expected: "int",
            actual: other.type_name(),
        }),
    }
}

fn coerce_float(value: Value) -> Result<f64, EvalError> {
    match value {
        Value::Float(f) => Ok(f),
        other => Err(EvalError::TypeMismatch {
            expected: "float",
            actual: other.type_name(),
        }),
    }
}

fn coerce_bool(value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            expected: "bool",
            actual: other.type_name(),
        }),
    }
}

fn coerce_duration(value: Value) -> Result<std::time::Duration, EvalError> {
    match value {
        Value::Duration(d) => Ok(d),
        other => Err(EvalError::TypeMismatch {
            expected: "duration",
            actual: other.type_name(),
        }),
    }
}

fn coerce_time(value: Value) -> Result<chrono::DateTime<chrono::Utc>, EvalError> {
    match value {
        Value::Time(t) => Ok(t),
        other => Err(EvalError::TypeMismatch {
            expected: "time",
            actual: other.type_name(),
        }),
    }
}

fn coerce_map(value: Value) -> Result<HashMap<String, Value>, EvalError> {
    match value {
        Value::Map(m) => Ok(m),
        other => Err(EvalError::TypeMismatch {
            expected: "map",
            actual: other.type_name(),
        }),
    }
}

fn coerce_list(value: Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(l) => Ok(l),
        other => Err(EvalError::TypeMismatch {
            expected: "list",
            actual: other.type_name(),
        }),
    }
}

fn coerce_string_like(value: Value) -> Result<Option<String>, EvalError> {
    Ok(Some(match value {
        Value::Nil => return Ok(None),
        Value::String(s) => s.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(f),
        Value::Bytes(b) => hex_string(&b),
        Value::Duration(d) => format!("{:?}", d),
        Value::Time(t) => t.to_rfc3339(),
        other @ (Value::List(_) | Value::Map(_)) => render_value(&other),
    }))
}

fn coerce_int_like(value: Value) -> Result<Option<i64>, EvalError> {
    Ok(Some(match value {
        Value::Nil => return Ok(None),
        Value::Int(i) => i,
        Value::Float(f) => f as i64,
        Value::Bool(b) => i64::from(b),
        Value::String(s) => s.parse::<i64>().map_err(|_| EvalError::ParseFailure {
            value: s.to_string(),
            target: "int",
        })?,
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "int-convertible value",
                actual: other.type_name(),
            })
        }
    }))
}

fn coerce_float_like(value: Value) -> Result<Option<f64>, EvalError> {
    Ok(Some(match value {
        Value::Nil => return Ok(None),
        Value::Float(f) => f,
        Value::Int(i) => i as f64,
        Value::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => s.parse::<f64>().map_err(|_| EvalError::ParseFailure {
            value: s.to_string(),
            target: "float",
        })?,
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "float-convertible value",
                actual: other.type_name(),
            })
        }
    }))
}

fn coerce_bool_like(value: Value) -> Result<Option<bool>, EvalError> {
    Ok(Some(match value {
        Value::Nil => return Ok(None),
        Value::Bool(b) => b,
        Value::Int(i) => i != 0,
        Value::Float(f) => f != 0.0,
        Value::String(s) => s.parse::<bool>().map_err(|_| EvalError::ParseFailure {
            value: s.to_string(),
            target: "bool",
        })?,
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "bool-convertible value",
                actual: other.type_name(),
            })
        }
    }))
}

fn coerce_byte_slice_like(value: Value) -> Result<Option<Vec<u8>>, EvalError> {
    Ok(Some(match value {
        Value::Nil => return Ok(None),
        Value::Bytes(b) => b.to_vec(),
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Int(i) => i.to_be_bytes().to_vec(),
        Value::Float(f) => f.to_be_bytes().to_vec(),
        Value::Bool(b) => vec![u8::from(b)],
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "byte-convertible value",
                actual: other.type_name(),
            })
        }
    }))
}

/// Formats a float the shortest way that round-trips.
fn format_float(f: f64) -> String {
    let mut rendered = f.to_string();
    if !rendered.contains('.') && !rendered.contains('e') && f.is_finite() {
        rendered.push_str(".0");
    }
    rendered
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Renders lists and maps in a compact JSON-like form, with map keys sorted
/// so the output is deterministic.
fn render_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::String(s) => format!("{:?}", s.as_ref()),
        Value::Bytes(b) => hex_string(b),
        Value::Duration(d) => format!("{:?}", d),
        Value::Time(t) => t.to_rfc3339(),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Map(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            let rendered: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, render_value(&entries[k])))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

/// A typed getter that also exposes its value at bind time when the source
/// was a compile-time constant.
#[derive(Clone, Debug)]
pub struct LiteralGetter<K, G: TypedGetter<K>> {
    getter: G,
    _context: PhantomData<fn() -> K>,
}

impl<K, G: TypedGetter<K>> LiteralGetter<K, G> {
    /// Wraps a typed getter. The binder only constructs these from getters
    /// that satisfy the literal contract, but the wrapper re-checks on read.
    pub fn new(getter: G) -> Self {
        LiteralGetter {
            getter,
            _context: PhantomData,
        }
    }

    /// Whether the underlying getter holds a compile-time constant.
    pub fn is_literal(&self) -> bool {
        self.getter.raw().is_literal()
    }

    /// The constant, coerced to the getter's output type. Fails when the
    /// underlying getter computes its value per call.
    pub fn get_literal(&self) -> Result<G::Output, EvalError> {
        match self.getter.raw().literal_value() {
            Some(value) => G::coerce(value.clone()),
            None => Err(EvalError::NotLiteral),
        }
    }

    /// Evaluates like the wrapped getter.
    pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<G::Output, EvalError> {
        self.getter.get_typed(ectx, tctx)
    }

    /// The wrapped typed getter.
    pub fn inner(&self) -> &G {
        &self.getter
    }
}

/// Conversion from a runtime [`Value`] into a slice element type.
pub trait FromValue: Sized + Send + Sync + 'static {
    /// Element type name used in error messages.
    const KIND_NAME: &'static str;

    /// Converts one value.
    fn from_value(value: Value) -> Result<Self, EvalError>;
}

impl FromValue for String {
    const KIND_NAME: &'static str = "string";

    fn from_value(value: Value) -> Result<Self, EvalError> {
        coerce_string(value).map(|s| s.to_string())
    }
}

impl FromValue for i64 {
    const KIND_NAME: &'static str = "int";

    fn from_value(value: Value) -> Result<Self, EvalError> {
        coerce_int(value)
    }
}

impl FromValue for f64 {
    const KIND_NAME: &'static str = "float";

    fn from_value(value: Value) -> Result<Self, EvalError> {
        coerce_float(value)
    }
}

impl FromValue for Value {
    const KIND_NAME: &'static str = "value";

    fn from_value(value: Value) -> Result<Self, EvalError> {
        Ok(value)
    }
}

pub(crate) enum SliceSource<K> {
    /// Built from a list literal; each element was rebuilt through the
    /// argument builder.
    Elements(Vec<Getter<K>>),
    /// An arbitrary value that must evaluate to a list at runtime.
    Whole(Getter<K>),
}

/// Yields a homogeneous sequence of `T` per call. Built from either a list
/// literal or any value that evaluates to a list; element type checking for
/// the latter is deferred to evaluation time.
pub struct SliceGetter<K, T: FromValue> {
    source: SliceSource<K>,
    literal: Option<Vec<Value>>,
    _element: PhantomData<fn() -> T>,
}

impl<K, T: FromValue> SliceGetter<K, T> {
    pub(crate) fn new(source: SliceSource<K>, literal: Option<Vec<Value>>) -> Self {
        SliceGetter {
            source,
            literal,
            _element: PhantomData,
        }
    }

    /// Evaluates to the element sequence, coercing every element to `T`.
    pub fn get(&self, ectx: &EvalContext, tctx: &mut K) -> Result<Vec<T>, EvalError> {
        match &self.source {
            SliceSource::Elements(elements) => elements
                .iter()
                .map(|getter| T::from_value(getter.get(ectx, tctx)?))
                .collect(),
            SliceSource::Whole(getter) => match getter.get(ectx, tctx)? {
                Value::List(items) => items.into_iter().map(T::from_value).collect(),
                other => Err(EvalError::TypeMismatch {
                    expected: "list",
                    actual: other.type_name(),
                }),
            },
        }
    }

    /// Whether every element is a compile-time constant.
    pub fn is_literal(&self) -> bool {
        self.literal.is_some()
    }

    /// The constant element sequence, when there is one.
    pub fn get_literal(&self) -> Result<Vec<T>, EvalError> {
        match &self.literal {
            Some(values) => values.iter().cloned().map(T::from_value).collect(),
            None => Err(EvalError::NotLiteral),
        }
    }
}

impl<K, T: FromValue> std::fmt::Debug for SliceGetter<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceGetter")
            .field("element", &T::KIND_NAME)
            .field("literal", &self.literal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = ();

    #[test]
    fn constant_getters_expose_their_literal() {
        let getter: Getter<Ctx> = Getter::constant(Value::Int(7));
        assert!(getter.is_literal());
        assert_eq!(getter.literal_value(), Some(&Value::Int(7)));
        let mut ctx = ();
        assert_eq!(getter.get(&EvalContext::new(), &mut ctx).unwrap(), Value::Int(7));
    }

    #[test]
    fn string_getter_rejects_other_types() {
        let getter = StringGetter::<Ctx>::new(Getter::constant(Value::Int(1)));
        let mut ctx = ();
        let err = getter.get(&EvalContext::new(), &mut ctx).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { expected: "string", actual: "int" }));
    }

    #[test]
    fn string_like_getter_renders_scalars() {
        let mut ctx = ();
        let ectx = EvalContext::new();
        let cases = [
            (Value::Int(42), Some("42".to_string())),
            (Value::Float(1.5), Some("1.5".to_string())),
            (Value::Float(2.0), Some("2.0".to_string())),
            (Value::Bool(true), Some("true".to_string())),
            (Value::bytes(vec![0xC0u8, 0xFF]), Some("c0ff".to_string())),
            (Value::Nil, None),
        ];
        for (input, expected) in cases {
            let getter = StringLikeGetter::<Ctx>::new(Getter::constant(input));
            assert_eq!(getter.get(&ectx, &mut ctx).unwrap(), expected);
        }
    }

    #[test]
    fn int_like_getter_parses_strings() {
        let mut ctx = ();
        let ectx = EvalContext::new();
        let getter = IntLikeGetter::<Ctx>::new(Getter::constant(Value::string("12")));
        assert_eq!(getter.get(&ectx, &mut ctx).unwrap(), Some(12));
        let getter = IntLikeGetter::<Ctx>::new(Getter::constant(Value::string("nope")));
        assert!(getter.get(&ectx, &mut ctx).is_err());
    }

    #[test]
    fn literal_getter_reports_constants() {
        let wrapped = StringGetter::<Ctx>::new(Getter::constant(Value::string("fixed")));
        let literal = LiteralGetter::new(wrapped);
        assert!(literal.is_literal());
        assert_eq!(literal.get_literal().unwrap().as_ref(), "fixed");

        let computed = StringGetter::<Ctx>::new(Getter::new(|_, _| Ok(Value::string("dynamic"))));
        let literal = LiteralGetter::new(computed);
        assert!(!literal.is_literal());
        assert!(matches!(literal.get_literal(), Err(EvalError::NotLiteral)));
    }

    #[test]
    fn slice_getter_coerces_whole_values_lazily() {
        let whole = Getter::<Ctx>::new(|_, _| {
            Ok(Value::List(vec![Value::string("a"), Value::string("b")]))
        });
        let slice: SliceGetter<Ctx, String> = SliceGetter::new(SliceSource::Whole(whole), None);
        let mut ctx = ();
        assert_eq!(
            slice.get(&EvalContext::new(), &mut ctx).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(!slice.is_literal());
    }

    #[test]
    fn cancellation_stops_getters() {
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ectx = EvalContext::with_cancellation(token);
        let getter: Getter<Ctx> = Getter::constant(Value::Int(1));
        let mut ctx = ();
        assert!(matches!(getter.get(&ectx, &mut ctx), Err(EvalError::Cancelled)));
    }
}
