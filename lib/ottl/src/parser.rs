//! The parser: registries plus the parse-and-bind entry points.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{BoxError, ParseError};
use crate::expression::{Condition, Statement, ValueExpression};
use crate::functions::{Enum, Factory, TelemetrySettings};
use crate::getters::GetSetter;
use crate::grammar;
use crate::path::Path;

/// Per-parser catalog of registered functions, keyed by call name.
pub type FunctionRegistry<K> = HashMap<String, Arc<dyn Factory<K>>>;

/// Resolves a bare enum symbol to its numeric value. Supplied by the
/// caller as a pure function; `None` means the symbol is unknown.
pub type EnumResolver = Arc<dyn Fn(&str) -> Option<Enum> + Send + Sync>;

/// Resolves a bound path chain against the context's schema, returning the
/// accessor for that path. The resolver must read every segment (via
/// [`Path::next`]) and every non-empty key list (via [`Path::keys`]);
/// binding fails otherwise.
pub type PathResolver<K> = Arc<dyn Fn(&Path<K>) -> Result<GetSetter<K>, BoxError> + Send + Sync>;

/// A configured parser for one context type `K`.
///
/// All registries are fixed at construction; the parser is immutable
/// afterwards and may be shared across threads. Each parse-and-bind call
/// produces an independent expression object and mutates no parser state.
pub struct Parser<K> {
    pub(crate) functions: FunctionRegistry<K>,
    pub(crate) enum_resolver: Option<EnumResolver>,
    pub(crate) path_resolver: PathResolver<K>,
    pub(crate) context_names: BTreeSet<String>,
    pub(crate) settings: TelemetrySettings,
}

impl<K: 'static> Parser<K> {
    /// Creates a parser from a function registry and a path resolver.
    pub fn new(
        functions: FunctionRegistry<K>,
        path_resolver: PathResolver<K>,
        settings: TelemetrySettings,
    ) -> Self {
        Parser {
            functions,
            enum_resolver: None,
            path_resolver,
            context_names: BTreeSet::new(),
            settings,
        }
    }

    /// Registers the enum resolver.
    pub fn with_enum_resolver(mut self, enum_resolver: EnumResolver) -> Self {
        self.enum_resolver = Some(enum_resolver);
        self
    }

    /// Registers the set of valid path-context names. Once non-empty, every
    /// path must carry one of these as its leading segment; when empty the
    /// parser runs in legacy mode and the leading segment is ordinary.
    pub fn with_path_context_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.context_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Parses and binds one statement.
    pub fn parse_statement(&self, source: &str) -> Result<Statement<K>, ParseError> {
        let parsed = grammar::parse_statement(source)?;
        self.bind_statement(&parsed, source)
    }

    /// Parses and binds a batch of statements, failing on the first error.
    pub fn parse_statements<S: AsRef<str>>(&self, sources: &[S]) -> Result<Vec<Statement<K>>, ParseError> {
        sources
            .iter()
            .map(|source| self.parse_statement(source.as_ref()))
            .collect()
    }

    /// Parses and binds one standalone predicate.
    pub fn parse_condition(&self, source: &str) -> Result<Condition<K>, ParseError> {
        let parsed = grammar::parse_condition(source)?;
        let condition = self.bind_boolean(&parsed)?;
        Ok(Condition {
            condition,
            origin: source.to_string(),
        })
    }

    /// Parses and binds a batch of predicates, failing on the first error.
    pub fn parse_conditions<S: AsRef<str>>(&self, sources: &[S]) -> Result<Vec<Condition<K>>, ParseError> {
        sources
            .iter()
            .map(|source| self.parse_condition(source.as_ref()))
            .collect()
    }

    /// Parses and binds one bare value expression.
    pub fn parse_value_expression(&self, source: &str) -> Result<ValueExpression<K>, ParseError> {
        let parsed = grammar::parse_value_expression(source)?;
        let getter = self.build_getter(&parsed)?;
        Ok(ValueExpression {
            getter,
            origin: source.to_string(),
        })
    }

    /// Renders the context-name set for error messages, optionally
    /// suffixing each name with a path, e.g. `"span.name", "log.name"`.
    pub(crate) fn context_names_text(&self, path: &str) -> String {
        let suffix = if path.is_empty() {
            String::new()
        } else {
            format!(".{}", path)
        };
        self.context_names
            .iter()
            .map(|ctx| format!(r#""{}{}""#, ctx, suffix))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
