//! Binding: from parsed trees to executable expressions.
//!
//! The binder resolves identifier references (paths, enums, function calls)
//! against the parser's registries and coerces every function-call argument
//! into the shape its argument-record field declares. Binding either
//! produces a fully bound expression or fails; partial results are never
//! returned.

use std::sync::Arc;

use tracing::debug;

use crate::ast;
use crate::error::{ArgumentError, ParseError};
use crate::expression::{apply_keys, BoolExpr, BoundKey, Expr, Statement};
use crate::functions::{
    ArgKind, ArgValue, Arguments, FunctionContext, FunctionGetter, GetterKind, SliceElemKind,
};
use crate::getters::{
    GetSetter, Getter, MapGetSetter, SliceGetter, SliceSource,
};
use crate::parser::Parser;
use crate::path::{Path, PathKey};
use crate::Value;

impl<K: 'static> Parser<K> {
    pub(crate) fn bind_statement(
        &self,
        parsed: &ast::ParsedStatement,
        source: &str,
    ) -> Result<Statement<K>, ParseError> {
        let function = self.new_function_call(&parsed.editor)?;
        let condition = match &parsed.where_clause {
            Some(where_clause) => Some(self.bind_boolean(where_clause)?),
            None => None,
        };
        Ok(Statement {
            function,
            condition,
            origin: source.to_string(),
        })
    }

    /// Looks up the invoked function, binds its arguments, and constructs
    /// the executable expression.
    pub(crate) fn new_function_call(&self, editor: &ast::Editor) -> Result<Expr<K>, ParseError> {
        let factory = self
            .functions
            .get(&editor.name)
            .ok_or_else(|| ParseError::UndefinedFunction {
                name: editor.name.clone(),
            })?;

        debug!(function = %editor.name, args = editor.args.len(), "binding function call");

        let mut args = factory.default_arguments();
        self.bind_arguments(args.as_mut(), &editor.args)
            .map_err(|source| ParseError::FunctionArguments {
                function: editor.name.clone(),
                source,
            })?;

        let fctx = FunctionContext {
            settings: self.settings.clone(),
        };
        let func = factory
            .create_function(fctx, args)
            .map_err(|source| ParseError::FunctionCreation {
                function: editor.name.clone(),
                source,
            })?;
        Ok(Expr::new(func))
    }

    /// Fills the argument record from the call's actuals, enforcing
    /// ordering, arity, named-parameter matching, and per-field coercion.
    fn bind_arguments(
        &self,
        args: &mut dyn Arguments<K>,
        actuals: &[ast::Argument],
    ) -> Result<(), ArgumentError> {
        let mut seen_named = false;
        for actual in actuals {
            if actual.name.is_some() {
                seen_named = true;
            } else if seen_named {
                return Err(ArgumentError::NamedBeforePositional);
            }
        }

        let descriptor = args.descriptor();
        let required = descriptor.iter().filter(|field| !field.optional).count();
        if actuals.len() < required || actuals.len() > descriptor.len() {
            return Err(ArgumentError::BadArity {
                expected: descriptor.len(),
                received: actuals.len(),
            });
        }

        for (position, actual) in actuals.iter().enumerate() {
            let field_index = match &actual.name {
                Some(name) => {
                    let normalized = normalize_parameter(name);
                    descriptor
                        .iter()
                        .position(|field| normalize_parameter(field.name) == normalized)
                        .ok_or_else(|| ArgumentError::UnknownParameter { name: name.clone() })?
                }
                None => position,
            };

            let value = self
                .build_arg_value(&actual.value, descriptor[field_index].kind)
                .map_err(|source| ArgumentError::Invalid {
                    position,
                    source: Box::new(source),
                })?;

            args.set_field(field_index, value)?;
        }

        Ok(())
    }

    /// Coerces one actual argument into the declared field shape.
    fn build_arg_value(&self, value: &ast::Value, kind: ArgKind) -> Result<ArgValue<K>, ArgumentError> {
        match kind {
            ArgKind::Enum => match value {
                ast::Value::Enum(symbol) => self
                    .resolve_enum(symbol)
                    .map(ArgValue::Enum)
                    .map_err(|_| ArgumentError::NotAnEnum),
                _ => Err(ArgumentError::NotAnEnum),
            },
            ArgKind::String => match value {
                ast::Value::String(s) => Ok(ArgValue::String(s.clone())),
                _ => Err(ArgumentError::NotA { kind: "string" }),
            },
            ArgKind::Int => match value {
                ast::Value::Int(i) => Ok(ArgValue::Int(*i)),
                _ => Err(ArgumentError::NotA { kind: "int" }),
            },
            ArgKind::Float => match value {
                ast::Value::Float(f) => Ok(ArgValue::Float(*f)),
                _ => Err(ArgumentError::NotA { kind: "float" }),
            },
            ArgKind::Bool => match value {
                ast::Value::Bool(b) => Ok(ArgValue::Bool(*b)),
                _ => Err(ArgumentError::NotA { kind: "bool" }),
            },
            ArgKind::Bytes => match value {
                ast::Value::Bytes(b) => Ok(ArgValue::Bytes(b.clone())),
                _ => Err(ArgumentError::NotByteSlice),
            },
            ArgKind::Setter | ArgKind::GetSetter | ArgKind::MapGetSetter => {
                let path = match value {
                    ast::Value::Path(path) => path,
                    _ => return Err(ArgumentError::NotAPath),
                };
                let getsetter = self
                    .build_getsetter_from_path(path)
                    .map_err(|source| ArgumentError::Nested {
                        source: Box::new(source),
                    })?;
                Ok(match kind {
                    ArgKind::Setter => ArgValue::Setter(getsetter.setter().clone()),
                    ArgKind::MapGetSetter => ArgValue::MapGetSetter(MapGetSetter::new(getsetter)),
                    _ => ArgValue::GetSetter(getsetter),
                })
            }
            ArgKind::Getter(getter_kind) => {
                let getter = self.getter_for_argument(value)?;
                Ok(wrap_getter(getter, getter_kind))
            }
            ArgKind::Literal(getter_kind) => {
                let getter = self.getter_for_argument(value)?;
                if !getter.is_literal() {
                    return Err(ArgumentError::NotLiteral {
                        kind: getter_kind.name(),
                    });
                }
                Ok(wrap_getter(getter, getter_kind))
            }
            ArgKind::FunctionGetter => {
                let name = match value {
                    ast::Value::Enum(symbol) => symbol.clone(),
                    _ => return Err(ArgumentError::InvalidFunctionName),
                };
                let factory = self
                    .functions
                    .get(&name)
                    .ok_or(ArgumentError::UndefinedFunction { name: name.clone() })?;
                let fctx = FunctionContext {
                    settings: self.settings.clone(),
                };
                Ok(ArgValue::FunctionGetter(FunctionGetter::new(fctx, Arc::clone(factory))))
            }
            ArgKind::StringSlice => self.build_scalar_slice(value, ArgKind::String, "string", |items| {
                ArgValue::StringSlice(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            ArgValue::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            }),
            ArgKind::IntSlice => self.build_scalar_slice(value, ArgKind::Int, "int", |items| {
                ArgValue::IntSlice(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            ArgValue::Int(i) => Some(i),
                            _ => None,
                        })
                        .collect(),
                )
            }),
            ArgKind::FloatSlice => self.build_scalar_slice(value, ArgKind::Float, "float", |items| {
                ArgValue::FloatSlice(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            ArgValue::Float(f) => Some(f),
                            _ => None,
                        })
                        .collect(),
                )
            }),
            ArgKind::GetterSlice(getter_kind) => {
                let items = match value {
                    ast::Value::List(items) => items,
                    _ => {
                        return Err(ArgumentError::NotAList {
                            kind: getter_kind.name(),
                        })
                    }
                };
                let mut built = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let element = self
                        .build_arg_value(item, ArgKind::Getter(getter_kind))
                        .map_err(|source| ArgumentError::ListElement {
                            index,
                            source: Box::new(source),
                        })?;
                    built.push(element);
                }
                Ok(ArgValue::List(built))
            }
            ArgKind::SliceGetter(elem_kind) => self.build_slice_getter(value, elem_kind),
        }
    }

    /// Builds a `Vec<scalar>` field from a list literal of matching scalar
    /// literals.
    fn build_scalar_slice(
        &self,
        value: &ast::Value,
        elem_kind: ArgKind,
        kind_name: &'static str,
        assemble: impl FnOnce(Vec<ArgValue<K>>) -> ArgValue<K>,
    ) -> Result<ArgValue<K>, ArgumentError> {
        let items = match value {
            ast::Value::List(items) => items,
            _ => return Err(ArgumentError::NotAList { kind: kind_name }),
        };
        let mut built = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let element = self
                .build_arg_value(item, elem_kind)
                .map_err(|source| ArgumentError::ListElement {
                    index,
                    source: Box::new(source),
                })?;
            built.push(element);
        }
        Ok(assemble(built))
    }

    /// Builds a slice getter per the element kind: a list literal rebuilds
    /// every element through the binder; any other value defers both the
    /// list shape and the element types to evaluation time.
    fn build_slice_getter(
        &self,
        value: &ast::Value,
        elem_kind: SliceElemKind,
    ) -> Result<ArgValue<K>, ArgumentError> {
        let (source, literal) = match value {
            ast::Value::List(items) => {
                let mut elements = Vec::with_capacity(items.len());
                // Scalar elements must be literals of the leaf type.
                let scalar_kind = match elem_kind {
                    SliceElemKind::String => Some(ArgKind::String),
                    SliceElemKind::Int => Some(ArgKind::Int),
                    SliceElemKind::Float => Some(ArgKind::Float),
                    SliceElemKind::Value => None,
                };
                for (index, item) in items.iter().enumerate() {
                    if let Some(scalar_kind) = scalar_kind {
                        self.build_arg_value(item, scalar_kind)
                            .map_err(|source| ArgumentError::ListElement {
                                index,
                                source: Box::new(source),
                            })?;
                    }
                    let getter = self
                        .getter_for_argument(item)
                        .map_err(|source| ArgumentError::ListElement {
                            index,
                            source: Box::new(source),
                        })?;
                    elements.push(getter);
                }
                let literal = if elements.iter().all(Getter::is_literal) {
                    Some(
                        elements
                            .iter()
                            .filter_map(|g| g.literal_value().cloned())
                            .collect::<Vec<Value>>(),
                    )
                } else {
                    None
                };
                (SliceSource::Elements(elements), literal)
            }
            other => {
                let getter = self.getter_for_argument(other)?;
                let literal = match getter.literal_value() {
                    Some(Value::List(items)) => Some(items.clone()),
                    _ => None,
                };
                (SliceSource::Whole(getter), literal)
            }
        };

        Ok(match elem_kind {
            SliceElemKind::String => ArgValue::SliceGetterString(SliceGetter::new(source, literal)),
            SliceElemKind::Int => ArgValue::SliceGetterInt(SliceGetter::new(source, literal)),
            SliceElemKind::Float => ArgValue::SliceGetterFloat(SliceGetter::new(source, literal)),
            SliceElemKind::Value => ArgValue::SliceGetterValue(SliceGetter::new(source, literal)),
        })
    }

    fn getter_for_argument(&self, value: &ast::Value) -> Result<Getter<K>, ArgumentError> {
        self.build_getter(value).map_err(|source| ArgumentError::Nested {
            source: Box::new(source),
        })
    }

    /// Builds the generic getter for any value expression. Literals and
    /// lists of literals produce constant getters; everything else is
    /// computed per call.
    pub(crate) fn build_getter(&self, value: &ast::Value) -> Result<Getter<K>, ParseError> {
        match value {
            ast::Value::Nil => Ok(Getter::constant(Value::Nil)),
            ast::Value::String(s) => Ok(Getter::constant(Value::string(s.clone()))),
            ast::Value::Bytes(b) => Ok(Getter::constant(Value::bytes(b.clone()))),
            ast::Value::Bool(b) => Ok(Getter::constant(Value::Bool(*b))),
            ast::Value::Int(i) => Ok(Getter::constant(Value::Int(*i))),
            ast::Value::Float(f) => Ok(Getter::constant(Value::Float(*f))),
            ast::Value::Enum(symbol) => {
                let resolved = self.resolve_enum(symbol)?;
                Ok(Getter::constant(Value::Int(resolved.0)))
            }
            ast::Value::Path(path) => {
                let getsetter = self.build_getsetter_from_path(path)?;
                Ok(getsetter.getter().clone())
            }
            ast::Value::Converter(converter) => self.build_converter_getter(converter),
            ast::Value::List(items) => {
                let getters: Vec<Getter<K>> = items
                    .iter()
                    .map(|item| self.build_getter(item))
                    .collect::<Result<_, _>>()?;
                if getters.iter().all(Getter::is_literal) {
                    let values = getters
                        .iter()
                        .filter_map(|g| g.literal_value().cloned())
                        .collect::<Vec<Value>>();
                    Ok(Getter::constant(Value::List(values)))
                } else {
                    Ok(Getter::new(move |ectx, tctx| {
                        getters
                            .iter()
                            .map(|getter| getter.get(ectx, tctx))
                            .collect::<Result<Vec<Value>, _>>()
                            .map(Value::List)
                    }))
                }
            }
            ast::Value::Map(entries) => {
                let getters: Vec<(String, Getter<K>)> = entries
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.build_getter(item)?)))
                    .collect::<Result<_, ParseError>>()?;
                Ok(Getter::new(move |ectx, tctx| {
                    let mut map = std::collections::HashMap::with_capacity(getters.len());
                    for (key, getter) in &getters {
                        map.insert(key.clone(), getter.get(ectx, tctx)?);
                    }
                    Ok(Value::Map(map))
                }))
            }
            ast::Value::Math(math) => self.build_math_getter(math),
        }
    }

    /// Binds a converter invocation into a getter, applying any result
    /// indexes per call.
    fn build_converter_getter(&self, converter: &ast::Converter) -> Result<Getter<K>, ParseError> {
        let expr = self.new_function_call(&ast::Editor {
            name: converter.name.clone(),
            args: converter.args.clone(),
        })?;
        let keys = self.bind_keys_for_result(&converter.keys)?;
        Ok(Getter::new(move |ectx, tctx| {
            let value = expr.eval(ectx, tctx)?;
            apply_keys(value, &keys, ectx, tctx)
        }))
    }

    fn bind_keys_for_result(&self, keys: &[ast::Key]) -> Result<Vec<BoundKey<K>>, ParseError> {
        keys.iter()
            .map(|key| {
                Ok(match key {
                    ast::Key::Int(i) => BoundKey::Int(*i),
                    ast::Key::String(s) => BoundKey::String(s.clone()),
                    ast::Key::Expression(value) => BoundKey::Expression(self.build_getter(value)?),
                })
            })
            .collect()
    }

    fn build_math_getter(&self, math: &ast::MathExpression) -> Result<Getter<K>, ParseError> {
        match math {
            ast::MathExpression::Value(value) => self.build_getter(value),
            ast::MathExpression::Negate(inner) => {
                let inner = self.build_math_getter(inner)?;
                Ok(Getter::new(move |ectx, tctx| {
                    crate::ops::negate(inner.get(ectx, tctx)?)
                }))
            }
            ast::MathExpression::Binary { left, op, right } => {
                let left = self.build_math_getter(left)?;
                let right = self.build_math_getter(right)?;
                let op = *op;
                Ok(Getter::new(move |ectx, tctx| {
                    let left = left.get(ectx, tctx)?;
                    let right = right.get(ectx, tctx)?;
                    crate::ops::math_op(&left, op, &right)
                }))
            }
        }
    }

    /// Binds a where clause into its evaluable tree.
    pub(crate) fn bind_boolean(&self, expr: &ast::BooleanExpression) -> Result<BoolExpr<K>, ParseError> {
        Ok(match expr {
            ast::BooleanExpression::Comparison { left, op, right } => BoolExpr::Comparison {
                left: self.build_getter(left)?,
                op: *op,
                right: self.build_getter(right)?,
            },
            ast::BooleanExpression::Term(value) => BoolExpr::Term(self.build_getter(value)?),
            ast::BooleanExpression::Not(inner) => BoolExpr::Not(Box::new(self.bind_boolean(inner)?)),
            ast::BooleanExpression::And(left, right) => BoolExpr::And(
                Box::new(self.bind_boolean(left)?),
                Box::new(self.bind_boolean(right)?),
            ),
            ast::BooleanExpression::Or(left, right) => BoolExpr::Or(
                Box::new(self.bind_boolean(left)?),
                Box::new(self.bind_boolean(right)?),
            ),
        })
    }

    /// Materializes a parsed path into the linked chain, resolves it, and
    /// verifies the resolver consumed the whole path.
    pub(crate) fn build_getsetter_from_path(&self, path: &ast::Path) -> Result<GetSetter<K>, ParseError> {
        let chain = self.materialize_path(path)?;
        let getsetter = (self.path_resolver)(&chain).map_err(|source| ParseError::PathResolution {
            path: path.text.clone(),
            source,
        })?;
        chain.ensure_complete()?;
        Ok(getsetter)
    }

    fn materialize_path(&self, path: &ast::Path) -> Result<Path<K>, ParseError> {
        let has_context_names = !self.context_names.is_empty();

        let mut context = String::new();
        let mut segments: Vec<(String, Vec<PathKey<K>>)> = Vec::with_capacity(path.fields.len() + 1);

        if !path.context.is_empty() {
            if !has_context_names {
                // Legacy mode: the leading identifier is an ordinary segment.
                segments.push((path.context.clone(), Vec::new()));
            } else if !self.context_names.contains(&path.context) {
                return Err(ParseError::UnknownContext {
                    context: path.context.clone(),
                    path: path.text.clone(),
                    valid: self.context_names_text(""),
                });
            } else {
                context = path.context.clone();
            }
        } else if has_context_names {
            return Err(ParseError::MissingContext {
                path: path.text.clone(),
                valid: self.context_names_text(&path.text),
            });
        }

        for field in &path.fields {
            let keys = field
                .keys
                .iter()
                .map(|key| {
                    Ok(match key {
                        ast::Key::Int(i) => PathKey::from_int(*i),
                        ast::Key::String(s) => PathKey::from_string(s.clone()),
                        ast::Key::Expression(value) => PathKey::from_expression(self.build_getter(value)?),
                    })
                })
                .collect::<Result<Vec<_>, ParseError>>()?;
            segments.push((field.name.clone(), keys));
        }

        Path::new(context, segments, path.text.clone()).ok_or_else(|| ParseError::Syntax {
            position: path.offset,
            message: "cannot make a path from zero fields".to_string(),
        })
    }

    fn resolve_enum(&self, symbol: &str) -> Result<crate::functions::Enum, ParseError> {
        let resolver = self.enum_resolver.as_ref().ok_or_else(|| ParseError::UnknownEnum {
            symbol: symbol.to_string(),
        })?;
        resolver(symbol).ok_or_else(|| ParseError::UnknownEnum {
            symbol: symbol.to_string(),
        })
    }
}

/// Canonical form for named-argument matching: ASCII lowercase with
/// underscores removed, so `replacement_pattern`, `replacementPattern`, and
/// `ReplacementPattern` all address the same field.
fn normalize_parameter(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Wraps the generic getter in the typed shell the field declares.
fn wrap_getter<K>(getter: Getter<K>, kind: GetterKind) -> ArgValue<K> {
    match kind {
        GetterKind::Value => ArgValue::Getter(getter),
        GetterKind::String => ArgValue::StringGetter(getter.into()),
        GetterKind::StringLike => ArgValue::StringLikeGetter(getter.into()),
        GetterKind::Int => ArgValue::IntGetter(getter.into()),
        GetterKind::IntLike => ArgValue::IntLikeGetter(getter.into()),
        GetterKind::Float => ArgValue::FloatGetter(getter.into()),
        GetterKind::FloatLike => ArgValue::FloatLikeGetter(getter.into()),
        GetterKind::Bool => ArgValue::BoolGetter(getter.into()),
        GetterKind::BoolLike => ArgValue::BoolLikeGetter(getter.into()),
        GetterKind::Duration => ArgValue::DurationGetter(getter.into()),
        GetterKind::Time => ArgValue::TimeGetter(getter.into()),
        GetterKind::Map => ArgValue::MapGetter(getter.into()),
        GetterKind::List => ArgValue::ListGetter(getter.into()),
        GetterKind::ByteSliceLike => ArgValue::ByteSliceLikeGetter(getter.into()),
    }
}
