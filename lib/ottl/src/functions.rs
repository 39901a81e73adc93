//! Function factories and descriptor-based argument records.
//!
//! Every registered function is described by a [`Factory`]: a name, a fresh
//! argument record, and a constructor that turns a filled record into an
//! executable expression. Argument records implement [`Arguments`], which
//! replaces runtime reflection with a static descriptor: an ordered list of
//! field names, kinds from the closed set in [`ArgKind`], and optionality,
//! plus a positional setter the binder feeds with [`ArgValue`]s.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ArgumentError, BoxError, EvalError};
use crate::expression::{Expr, ExprFunc};
use crate::getters::{
    BoolGetter, BoolLikeGetter, ByteSliceLikeGetter, DurationGetter, FloatGetter, FloatLikeGetter,
    GetSetter, Getter, IntGetter, IntLikeGetter, ListGetter, MapGetSetter, MapGetter, Setter, SliceGetter,
    StringGetter, StringLikeGetter, TimeGetter,
};
use crate::Value;

/// A resolved enum: the numeric value behind a bare uppercase symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enum(pub i64);

/// Telemetry-settings handle threaded through to function constructors.
#[derive(Clone, Debug, Default)]
pub struct TelemetrySettings {
    /// Identifier of the component owning the parser, used to scope
    /// diagnostics emitted by functions.
    pub component_id: String,
}

impl TelemetrySettings {
    /// Settings scoped to a named component.
    pub fn named(component_id: impl Into<String>) -> Self {
        TelemetrySettings {
            component_id: component_id.into(),
        }
    }
}

/// Context handed to [`Factory::create_function`].
#[derive(Clone, Debug, Default)]
pub struct FunctionContext {
    /// The parser's telemetry settings.
    pub settings: TelemetrySettings,
}

/// Leaf kinds for the getter family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetterKind {
    /// Untyped getter yielding any [`Value`].
    Value,
    String,
    StringLike,
    Int,
    IntLike,
    Float,
    FloatLike,
    Bool,
    BoolLike,
    Duration,
    Time,
    Map,
    List,
    ByteSliceLike,
}

impl GetterKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            GetterKind::Value => "Getter",
            GetterKind::String => "StringGetter",
            GetterKind::StringLike => "StringLikeGetter",
            GetterKind::Int => "IntGetter",
            GetterKind::IntLike => "IntLikeGetter",
            GetterKind::Float => "FloatGetter",
            GetterKind::FloatLike => "FloatLikeGetter",
            GetterKind::Bool => "BoolGetter",
            GetterKind::BoolLike => "BoolLikeGetter",
            GetterKind::Duration => "DurationGetter",
            GetterKind::Time => "TimeGetter",
            GetterKind::Map => "MapGetter",
            GetterKind::List => "ListGetter",
            GetterKind::ByteSliceLike => "ByteSliceLikeGetter",
        }
    }
}

/// Element kinds for [`SliceGetter`] fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceElemKind {
    String,
    Int,
    Float,
    /// Untyped elements; the element check is deferred to the consumer.
    Value,
}

/// The closed set of shapes an argument-record field may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Bare enum symbol resolved through the enum resolver.
    Enum,
    /// String literal.
    String,
    /// Integer literal.
    Int,
    /// Float literal.
    Float,
    /// Boolean literal.
    Bool,
    /// Byte-string literal.
    Bytes,
    /// Write-only accessor; requires a path.
    Setter,
    /// Read-write accessor; requires a path.
    GetSetter,
    /// Map-shaped read-write accessor; requires a path.
    MapGetSetter,
    /// A getter of the given leaf kind; accepts any value expression.
    Getter(GetterKind),
    /// A reference to a registered function, not an invocation.
    FunctionGetter,
    /// A getter of the given leaf kind that must be a compile-time
    /// constant.
    Literal(GetterKind),
    /// `Vec<String>` built from a list literal.
    StringSlice,
    /// `Vec<i64>` built from a list literal.
    IntSlice,
    /// `Vec<f64>` built from a list literal.
    FloatSlice,
    /// A list literal of getters of the given leaf kind.
    GetterSlice(GetterKind),
    /// A slice getter with the given element kind.
    SliceGetter(SliceElemKind),
}

/// One field of an argument record: canonical name, declared kind, and
/// whether the field is wrapped in [`Optional`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgDescriptor {
    /// Snake-case field name. Named arguments match against this after
    /// normalization (ASCII lowercase, underscores removed), so camelCase
    /// spellings address the same field.
    pub name: &'static str,
    /// Declared kind.
    pub kind: ArgKind,
    /// Whether the field may be omitted.
    pub optional: bool,
}

impl ArgDescriptor {
    /// A required field.
    pub const fn required(name: &'static str, kind: ArgKind) -> Self {
        ArgDescriptor {
            name,
            kind,
            optional: false,
        }
    }

    /// An optional field.
    pub const fn optional(name: &'static str, kind: ArgKind) -> Self {
        ArgDescriptor {
            name,
            kind,
            optional: true,
        }
    }
}

/// The value the binder produced for one field, shaped per the field's
/// declared [`ArgKind`].
pub enum ArgValue<K> {
    Enum(Enum),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Setter(Setter<K>),
    GetSetter(GetSetter<K>),
    MapGetSetter(MapGetSetter<K>),
    Getter(Getter<K>),
    StringGetter(StringGetter<K>),
    StringLikeGetter(StringLikeGetter<K>),
    IntGetter(IntGetter<K>),
    IntLikeGetter(IntLikeGetter<K>),
    FloatGetter(FloatGetter<K>),
    FloatLikeGetter(FloatLikeGetter<K>),
    BoolGetter(BoolGetter<K>),
    BoolLikeGetter(BoolLikeGetter<K>),
    DurationGetter(DurationGetter<K>),
    TimeGetter(TimeGetter<K>),
    MapGetter(MapGetter<K>),
    ListGetter(ListGetter<K>),
    ByteSliceLikeGetter(ByteSliceLikeGetter<K>),
    FunctionGetter(FunctionGetter<K>),
    StringSlice(Vec<String>),
    IntSlice(Vec<i64>),
    FloatSlice(Vec<f64>),
    /// Elements of a getter-slice field, one [`ArgValue`] per list element,
    /// all of the declared getter kind.
    List(Vec<ArgValue<K>>),
    SliceGetterString(SliceGetter<K, String>),
    SliceGetterInt(SliceGetter<K, i64>),
    SliceGetterFloat(SliceGetter<K, f64>),
    SliceGetterValue(SliceGetter<K, Value>),
}

impl<K> ArgValue<K> {
    /// Unpacks a getter-slice value into a typed vector, for use inside
    /// [`Arguments::set_field`] implementations.
    pub fn into_slice_of<T: FromArgValue<K>>(self) -> Result<Vec<T>, ArgumentError> {
        match self {
            ArgValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    T::from_arg_value(item).ok_or(ArgumentError::BadListElement {
                        index,
                        kind: T::KIND,
                    })
                })
                .collect(),
            _ => Err(ArgumentError::NotAList { kind: T::KIND }),
        }
    }
}

/// Extraction of one typed wrapper out of an [`ArgValue`] variant.
pub trait FromArgValue<K>: Sized {
    /// Kind name used in error messages.
    const KIND: &'static str;

    /// Returns the wrapper when the variant matches.
    fn from_arg_value(value: ArgValue<K>) -> Option<Self>;
}

macro_rules! from_arg_value {
    ($type:ident, $kind:expr) => {
        impl<K> FromArgValue<K> for $type<K> {
            const KIND: &'static str = $kind;

            fn from_arg_value(value: ArgValue<K>) -> Option<Self> {
                match value {
                    ArgValue::$type(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

from_arg_value!(Getter, "Getter");
from_arg_value!(StringGetter, "StringGetter");
from_arg_value!(StringLikeGetter, "StringLikeGetter");
from_arg_value!(IntGetter, "IntGetter");
from_arg_value!(IntLikeGetter, "IntLikeGetter");
from_arg_value!(FloatGetter, "FloatGetter");
from_arg_value!(FloatLikeGetter, "FloatLikeGetter");
from_arg_value!(BoolGetter, "BoolGetter");
from_arg_value!(BoolLikeGetter, "BoolLikeGetter");
from_arg_value!(DurationGetter, "DurationGetter");
from_arg_value!(TimeGetter, "TimeGetter");
from_arg_value!(MapGetter, "MapGetter");
from_arg_value!(ListGetter, "ListGetter");
from_arg_value!(ByteSliceLikeGetter, "ByteSliceLikeGetter");

/// An argument record: a fixed sequence of typed fields the binder fills
/// positionally.
///
/// Implementations pair a static [`ArgDescriptor`] list with a `set_field`
/// that accepts the produced value for the field at each index. The
/// descriptor and setter must agree: the binder always delivers the variant
/// matching the descriptor's kind at that index.
pub trait Arguments<K>: Send + 'static {
    /// Ordered field list.
    fn descriptor(&self) -> &'static [ArgDescriptor];

    /// Stores the produced value into the field at `index`. For optional
    /// fields this records presence in the field's [`Optional`] slot.
    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError>;

    /// Type-erased escape hatch used by [`downcast_arguments`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Recovers the concrete argument record inside [`Factory::create_function`].
pub fn downcast_arguments<K: 'static, A: Arguments<K>>(args: Box<dyn Arguments<K>>) -> Result<Box<A>, BoxError> {
    args.into_any()
        .downcast::<A>()
        .map_err(|_| BoxError::from("argument record had an unexpected type"))
}

/// An argument slot that may be absent. Omitted optional arguments leave
/// the slot empty; the binder fills it at most once.
#[derive(Clone, Debug)]
pub struct Optional<T> {
    value: Option<T>,
}

impl<T> Default for Optional<T> {
    fn default() -> Self {
        Optional { value: None }
    }
}

impl<T> Optional<T> {
    /// An empty slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A pre-filled slot, mainly useful when testing functions directly.
    pub fn some(value: T) -> Self {
        Optional { value: Some(value) }
    }

    /// Whether the argument was omitted.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// The value, when present.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The value, or the supplied default when absent.
    pub fn get_or(&self, default: T) -> T
    where
        T: Clone,
    {
        self.value.clone().unwrap_or(default)
    }

    /// Takes the value out of the slot.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Fills the slot. Called by `set_field` implementations at bind time.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }
}

/// Describes one registered function: a registry key, a fresh argument
/// record for the binder to introspect and fill, and a constructor.
pub trait Factory<K>: Send + Sync {
    /// Registry key. Editors use lowercase names, converters uppercase.
    fn name(&self) -> &'static str;

    /// A fresh, unfilled argument record. The same concrete type must be
    /// accepted back by [`Factory::create_function`].
    fn default_arguments(&self) -> Box<dyn Arguments<K>>;

    /// Builds the executable expression from the filled record.
    fn create_function(
        &self,
        fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError>;
}

/// A pre-bound reference to a registered function. The function is not
/// invoked at bind time; callers construct argument values and invoke
/// [`FunctionGetter::get`] on demand.
#[derive(Clone)]
pub struct FunctionGetter<K> {
    fctx: FunctionContext,
    factory: Arc<dyn Factory<K>>,
}

impl<K: 'static> FunctionGetter<K> {
    pub(crate) fn new(fctx: FunctionContext, factory: Arc<dyn Factory<K>>) -> Self {
        FunctionGetter { fctx, factory }
    }

    /// Name of the referenced function.
    pub fn name(&self) -> &'static str {
        self.factory.name()
    }

    /// Instantiates the referenced function with the given positional
    /// argument values. The values must match the function's declared
    /// fields in order.
    pub fn get(&self, values: Vec<ArgValue<K>>) -> Result<Expr<K>, EvalError> {
        let mut args = self.factory.default_arguments();
        let field_count = args.descriptor().len();
        if values.len() > field_count {
            return Err(EvalError::FunctionInvocation {
                message: format!(
                    "function {} takes at most {} arguments, got {}",
                    self.factory.name(),
                    field_count,
                    values.len()
                ),
            });
        }
        for (index, value) in values.into_iter().enumerate() {
            args.set_field(index, value).map_err(|e| EvalError::FunctionInvocation {
                message: format!("bad argument for {}: {}", self.factory.name(), e),
            })?;
        }
        let func = self
            .factory
            .create_function(self.fctx.clone(), args)
            .map_err(|e| EvalError::FunctionInvocation {
                message: format!("couldn't create {}: {}", self.factory.name(), e),
            })?;
        Ok(Expr::new(func))
    }
}

impl<K> std::fmt::Debug for FunctionGetter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGetter")
            .field("function", &self.factory.name())
            .finish()
    }
}
