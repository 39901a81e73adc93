//! Error types for parsing, binding, and evaluation.
//!
//! All failures are structured sum types; message rendering happens through
//! `Display` at the outermost boundary. The parser and binder return at the
//! first error and never produce partial results.

use snafu::Snafu;

/// Boxed error type used at the seams where collaborators (path resolvers,
/// function constructors) supply their own error values.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error produced while parsing and binding a statement, condition, or value
/// expression.
#[derive(Debug, Snafu)]
#[snafu(module, context(suffix(false)), visibility(pub(crate)))]
pub enum ParseError {
    /// The source text could not be parsed.
    #[snafu(display("statement has invalid syntax at offset {position}: {message}"))]
    Syntax {
        /// Byte offset of the offending token in the source.
        position: usize,
        /// Human-readable description of the failure.
        message: String,
    },

    /// A path used a context name the parser does not know.
    #[snafu(display(
        r#"context "{context}" from path "{path}" is not valid, it must be replaced by one of: {valid}"#
    ))]
    UnknownContext {
        /// Context segment found on the path.
        context: String,
        /// Original text of the offending path.
        path: String,
        /// Rendered list of valid context names.
        valid: String,
    },

    /// A context name handed to the rewriter is not registered on the parser.
    #[snafu(display(r#"unknown context "{context}" for parser, valid options are: {valid}"#))]
    UnknownContextName {
        /// The rejected context name.
        context: String,
        /// Rendered list of valid context names.
        valid: String,
    },

    /// The parser requires context-qualified paths but the path had none.
    #[snafu(display(
        r#"missing context name for path "{path}", possibly valid options are: {valid}"#
    ))]
    MissingContext {
        /// Original text of the offending path.
        path: String,
        /// Rendered list of valid context-qualified spellings.
        valid: String,
    },

    /// A path segment was never read by the context's path resolver.
    #[snafu(display(
        r#"the path section "{segment}" was not used by the context - this likely means you are using extra path sections"#
    ))]
    ExtraPathSection {
        /// Name of the unread segment.
        segment: String,
    },

    /// A segment's keys were never read by the context's path resolver.
    #[snafu(display(
        r#"the keys indexing "{segment}" were not used by the context - this likely means you are trying to index a path that does not support indexing"#
    ))]
    ExtraKeyIndexing {
        /// Name of the segment whose keys went unread.
        segment: String,
    },

    /// The statement referenced a function that is not registered.
    #[snafu(display(r#"undefined function "{name}""#))]
    UndefinedFunction {
        /// The unresolved function name.
        name: String,
    },

    /// A path could not be resolved by the registered path resolver.
    #[snafu(display(r#"failed to resolve path "{path}": {source}"#))]
    PathResolution {
        /// Original text of the path.
        path: String,
        /// Error returned by the resolver.
        source: BoxError,
    },

    /// Argument binding failed for a function call.
    #[snafu(display(r#"error while parsing arguments for call to "{function}": {source}"#))]
    FunctionArguments {
        /// Name of the function being bound.
        function: String,
        /// Underlying binding failure.
        source: ArgumentError,
    },

    /// The function factory rejected the bound arguments.
    #[snafu(display(r#"couldn't create function "{function}": {source}"#))]
    FunctionCreation {
        /// Name of the function being created.
        function: String,
        /// Error returned by the factory.
        source: BoxError,
    },

    /// An enum symbol could not be resolved.
    #[snafu(display(r#"enum symbol "{symbol}" not recognized"#))]
    UnknownEnum {
        /// The unresolved symbol.
        symbol: String,
    },
}

/// Error produced by the typed argument binder while coercing one function
/// call's arguments into its declared argument record.
#[derive(Debug, Snafu)]
#[snafu(module, context(suffix(false)), visibility(pub(crate)))]
pub enum ArgumentError {
    /// The call supplied too few or too many arguments.
    #[snafu(display("incorrect number of arguments. Expected: {expected} Received: {received}"))]
    BadArity {
        /// Number of fields in the argument record.
        expected: usize,
        /// Number of arguments in the call.
        received: usize,
    },

    /// A positional argument appeared after a named argument.
    #[snafu(display("unnamed argument used after named argument"))]
    NamedBeforePositional,

    /// A named argument did not match any field of the argument record.
    #[snafu(display("no such parameter: {name}"))]
    UnknownParameter {
        /// The unmatched parameter name.
        name: String,
    },

    /// An argument could not be coerced to its field's declared shape.
    #[snafu(display("invalid argument at position {position}: {source}"))]
    Invalid {
        /// Zero-based position of the argument in the call.
        position: usize,
        /// The coercion failure.
        #[snafu(source(from(ArgumentError, Box::new)))]
        source: Box<ArgumentError>,
    },

    /// The value was not the literal kind the field requires.
    #[snafu(display("must be a {kind}"))]
    NotA {
        /// Expected kind, e.g. `string` or `int`.
        kind: &'static str,
    },

    /// The value was not an enum symbol.
    #[snafu(display("must be an Enum"))]
    NotAnEnum,

    /// The field requires a path and the value was not one.
    #[snafu(display("must be a path"))]
    NotAPath,

    /// The field requires a list literal and the value was not one.
    #[snafu(display("must be a list of type {kind}"))]
    NotAList {
        /// Expected element kind.
        kind: &'static str,
    },

    /// A list element failed to build as the declared element type.
    #[snafu(display("error while parsing list argument at index {index}: {source}"))]
    ListElement {
        /// Index of the failing element.
        index: usize,
        /// The element's coercion failure.
        #[snafu(source(from(ArgumentError, Box::new)))]
        source: Box<ArgumentError>,
    },

    /// A list element built successfully but had the wrong type.
    #[snafu(display("invalid element type at list index {index}, must be of type {kind}"))]
    BadListElement {
        /// Index of the offending element.
        index: usize,
        /// Expected element kind.
        kind: &'static str,
    },

    /// A byte-slice field was fed something other than a byte literal.
    #[snafu(display("slice parameter must be a byte slice literal"))]
    NotByteSlice,

    /// A function-reference field was fed a name that is not registered.
    #[snafu(display("undefined function {name}"))]
    UndefinedFunction {
        /// The unresolved function name.
        name: String,
    },

    /// A function-reference field was fed a value that names no function.
    #[snafu(display("invalid function name given"))]
    InvalidFunctionName,

    /// A literal-getter field was fed a value that needs context evaluation.
    #[snafu(display("getter type {kind} does not support literal values"))]
    NotLiteral {
        /// Declared kind of the getter.
        kind: &'static str,
    },

    /// The argument record declared a kind the binder does not know.
    #[snafu(display("unsupported argument type: {kind}"))]
    UnsupportedArgType {
        /// Rendered kind name.
        kind: String,
    },

    /// An argument record rejected the value produced for one of its fields.
    /// Raised when a record's `set_field` sees a mismatched variant, which
    /// indicates a descriptor/setter disagreement in the function definition.
    #[snafu(display("argument record rejected field {index}: descriptor and setter disagree"))]
    FieldMismatch {
        /// Index of the rejected field.
        index: usize,
    },

    /// Binding a nested construct (path or converter) failed.
    #[snafu(display("{source}"))]
    Nested {
        /// The nested parse failure.
        #[snafu(source(from(ParseError, Box::new)))]
        source: Box<ParseError>,
    },
}

/// Error produced while evaluating a bound expression against a telemetry
/// context. User-visible failures from getters and function bodies are
/// propagated unchanged through [`External`](EvalError::External).
#[derive(Debug, Snafu)]
#[snafu(module, context(suffix(false)), visibility(pub))]
pub enum EvalError {
    /// Evaluation was cancelled through the cancellation token.
    #[snafu(display("evaluation cancelled"))]
    Cancelled,

    /// A value had the wrong runtime type for the operation.
    #[snafu(display("expected {expected}, got {actual}"))]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: &'static str,
    },

    /// A list index was out of bounds.
    #[snafu(display("index {index} out of bounds"))]
    IndexOutOfBounds {
        /// The offending index.
        index: i64,
    },

    /// A map key was not present.
    #[snafu(display(r#"key "{key}" not found"#))]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// A value cannot be indexed with the given key type.
    #[snafu(display("cannot index {value_type} with a {key_type} key"))]
    CannotIndex {
        /// Type name of the value being indexed.
        value_type: &'static str,
        /// Type name of the key.
        key_type: &'static str,
    },

    /// Integer or float division by zero.
    #[snafu(display("division by zero"))]
    DivisionByZero,

    /// The two operand types cannot be compared with an ordering operator.
    #[snafu(display("{type_name} comparison only supports == and !="))]
    UnorderedComparison {
        /// Type name of the operands.
        type_name: &'static str,
    },

    /// The two operand types cannot be compared at all.
    #[snafu(display("cannot compare {left} with {right}"))]
    IncomparableTypes {
        /// Type name of the left operand.
        left: &'static str,
        /// Type name of the right operand.
        right: &'static str,
    },

    /// The two operand types have no math operation defined.
    #[snafu(display("cannot perform math operation on {left} and {right}"))]
    InvalidMathOperands {
        /// Type name of the left operand.
        left: &'static str,
        /// Type name of the right operand.
        right: &'static str,
    },

    /// A string could not be parsed as the requested leaf type.
    #[snafu(display(r#"could not parse "{value}" as {target}"#))]
    ParseFailure {
        /// The unparseable text.
        value: String,
        /// Target type name.
        target: &'static str,
    },

    /// A literal value was requested from a getter that computes its value
    /// per call.
    #[snafu(display("getter does not hold a literal value"))]
    NotLiteral,

    /// A late-bound function reference could not be invoked.
    #[snafu(display("function invocation failed: {message}"))]
    FunctionInvocation {
        /// Description of the failure.
        message: String,
    },

    /// An error raised by a user-supplied getter, setter, or function body.
    #[snafu(display("{source}"))]
    External {
        /// The propagated error.
        source: BoxError,
    },
}

impl EvalError {
    /// Wraps an arbitrary collaborator error for propagation through
    /// evaluation. Intended for path accessor and function implementations.
    pub fn external(source: impl Into<BoxError>) -> Self {
        EvalError::External { source: source.into() }
    }
}
