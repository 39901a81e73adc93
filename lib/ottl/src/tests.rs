//! Integration tests: parse-and-bind against a realistic test context.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use sha2::{Digest, Sha256};

use crate::error::{ArgumentError, BoxError, EvalError, ParseError};
use crate::expression::{ConditionSequence, ContextStatements, ErrorMode, LogicOperation, StatementSequence};
use crate::funcs::default_functions;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Enum, Factory, FunctionContext,
    GetterKind, Optional, SliceElemKind,
};
use crate::getters::{GetSetter, Getter, LiteralGetter, Setter, SliceGetter, StringGetter};
use crate::parser::{FunctionRegistry, Parser, PathResolver};
use crate::path::Path;
use crate::{grammar, EvalContext, TelemetrySettings, Value};

// ============================================================================
// Test context
// ============================================================================

/// A span-shaped record with the fields the tests exercise.
#[derive(Clone, Debug, Default, PartialEq)]
struct Span {
    name: String,
    body: String,
    status: i64,
    attributes: HashMap<String, Value>,
}

impl Span {
    fn sample() -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("a".to_string(), Value::Int(1));
        attributes.insert("b".to_string(), Value::Int(2));
        attributes.insert("c".to_string(), Value::Int(3));
        Span {
            name: "flink".to_string(),
            body: "operation a failed".to_string(),
            status: 200,
            attributes,
        }
    }
}

/// Path resolver over [`Span`]. Reads the key list for `attributes` and
/// deliberately never walks extra segments, so completeness checking has
/// something to catch.
fn resolve_span_path(path: &Path<Span>) -> Result<GetSetter<Span>, BoxError> {
    match path.name() {
        "name" => Ok(GetSetter::new(
            Getter::new(|_, span: &mut Span| Ok(Value::string(span.name.clone()))),
            Setter::new(|_, span: &mut Span, value| {
                span.name = expect_string(value)?;
                Ok(())
            }),
        )),
        "body" => Ok(GetSetter::new(
            Getter::new(|_, span: &mut Span| Ok(Value::string(span.body.clone()))),
            Setter::new(|_, span: &mut Span, value| {
                span.body = expect_string(value)?;
                Ok(())
            }),
        )),
        "status" => Ok(GetSetter::new(
            Getter::new(|_, span: &mut Span| Ok(Value::Int(span.status))),
            Setter::new(|_, span: &mut Span, value| match value {
                Value::Int(status) => {
                    span.status = status;
                    Ok(())
                }
                other => Err(EvalError::TypeMismatch {
                    expected: "int",
                    actual: other.type_name(),
                }),
            }),
        )),
        "attributes" => resolve_attributes(path),
        other => Err(format!("span context has no field {:?}", other).into()),
    }
}

fn resolve_attributes(path: &Path<Span>) -> Result<GetSetter<Span>, BoxError> {
    let keys = path.keys();
    if keys.is_empty() {
        return Ok(GetSetter::new(
            Getter::new(|_, span: &mut Span| Ok(Value::Map(span.attributes.clone()))),
            Setter::new(|_, span: &mut Span, value| match value {
                Value::Map(map) => {
                    span.attributes = map;
                    Ok(())
                }
                other => Err(EvalError::TypeMismatch {
                    expected: "map",
                    actual: other.type_name(),
                }),
            }),
        ));
    }
    if keys.len() > 1 {
        return Err("attributes supports at most one key".into());
    }

    if let Some(key) = keys[0].string() {
        let get_key = key.to_string();
        let set_key = key.to_string();
        return Ok(GetSetter::new(
            Getter::new(move |_, span: &mut Span| {
                Ok(span.attributes.get(&get_key).cloned().unwrap_or(Value::Nil))
            }),
            Setter::new(move |_, span: &mut Span, value| {
                span.attributes.insert(set_key.clone(), value);
                Ok(())
            }),
        ));
    }

    if let Some(expression) = keys[0].expression() {
        let get_expr = expression.clone();
        let set_expr = expression.clone();
        return Ok(GetSetter::new(
            Getter::new(move |ectx, span: &mut Span| {
                let key = expect_string(get_expr.get(ectx, span)?)?;
                Ok(span.attributes.get(&key).cloned().unwrap_or(Value::Nil))
            }),
            Setter::new(move |ectx, span: &mut Span, value| {
                let key = expect_string(set_expr.get(ectx, span)?)?;
                span.attributes.insert(key, value);
                Ok(())
            }),
        ));
    }

    Err("attributes only supports string keys".into())
}

fn expect_string(value: Value) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        other => Err(EvalError::TypeMismatch {
            expected: "string",
            actual: other.type_name(),
        }),
    }
}

fn span_resolver() -> PathResolver<Span> {
    Arc::new(resolve_span_path)
}

fn enum_resolver() -> crate::parser::EnumResolver {
    Arc::new(|symbol| match symbol {
        "STATUS_OK" => Some(Enum(200)),
        "STATUS_ERROR" => Some(Enum(500)),
        _ => None,
    })
}

fn span_parser() -> Parser<Span> {
    Parser::new(default_functions(), span_resolver(), TelemetrySettings::default())
        .with_enum_resolver(enum_resolver())
}

fn span_parser_with_contexts() -> Parser<Span> {
    span_parser().with_path_context_names(["span", "log"])
}

fn execute(parser: &Parser<Span>, source: &str, span: &mut Span) -> (Value, bool) {
    let statement = parser.parse_statement(source).expect("parse failed");
    statement.execute(&EvalContext::new(), span).expect("execute failed")
}

// ============================================================================
// End-to-end statements
// ============================================================================

#[test]
fn set_attribute_to_int_literal() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"set(attributes["x"], 1)"#, &mut span);
    assert_eq!(span.attributes.get("x"), Some(&Value::Int(1)));
}

#[test]
fn set_attribute_from_concat_converter() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"set(attributes["x"], Concat([name, "!"], " "))"#, &mut span);
    assert_eq!(span.attributes.get("x"), Some(&Value::string("flink !")));
}

#[test]
fn keep_keys_drops_unlisted_entries() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"keep_keys(attributes, ["a", "b"])"#, &mut span);
    let mut expected = HashMap::new();
    expected.insert("a".to_string(), Value::Int(1));
    expected.insert("b".to_string(), Value::Int(2));
    assert_eq!(span.attributes, expected);
}

#[test]
fn replace_pattern_with_hash_function_reference() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"replace_pattern(body, "a", "b", SHA256)"#, &mut span);

    let digest = Sha256::digest(b"b");
    let mut hashed = String::new();
    for byte in digest {
        hashed.push_str(&format!("{:02x}", byte));
    }
    assert_eq!(span.body, "operation a failed".replace('a', &hashed));
}

#[test]
fn replace_pattern_without_optional_function() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"replace_pattern(body, "failed", "ok")"#, &mut span);
    assert_eq!(span.body, "operation a ok");
}

#[test]
fn replace_pattern_accepts_named_optional_argument() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"replace_pattern(body, "a", "b", function = SHA256)"#, &mut span);
    assert_ne!(span.body, "operation a failed");
}

#[test]
fn delete_key_removes_entry() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"delete_key(attributes, "c")"#, &mut span);
    assert!(!span.attributes.contains_key("c"));
    assert!(span.attributes.contains_key("a"));
}

#[test]
fn where_clause_gates_execution() {
    let parser = span_parser();

    let mut span = Span::sample();
    let (_, ran) = execute(&parser, r#"set(name, "served") where status == 200"#, &mut span);
    assert!(ran);
    assert_eq!(span.name, "served");

    let mut span = Span::sample();
    let (value, ran) = execute(&parser, r#"set(name, "served") where status == 500"#, &mut span);
    assert!(!ran);
    assert_eq!(value, Value::Nil);
    assert_eq!(span.name, "flink");
}

#[test]
fn where_clause_resolves_enum_symbols() {
    let parser = span_parser();
    let mut span = Span::sample();
    let (_, ran) = execute(&parser, r#"set(name, "ok") where status == STATUS_OK"#, &mut span);
    assert!(ran);
}

#[test]
fn where_clause_combines_logic_operators() {
    let parser = span_parser();
    let mut span = Span::sample();
    let (_, ran) = execute(
        &parser,
        r#"set(name, "x") where not (status == 500) and (name == "flink" or status > 1000)"#,
        &mut span,
    );
    assert!(ran);
}

#[test]
fn math_expressions_evaluate_against_paths() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, "set(status, status + 100 * 2)", &mut span);
    assert_eq!(span.status, 400);
}

#[test]
fn converter_result_indexing() {
    let parser = span_parser();
    let mut span = Span::sample();
    span.name = "a,b,c".to_string();
    execute(&parser, r#"set(name, Split(name, ",")[1])"#, &mut span);
    assert_eq!(span.name, "b");
}

#[test]
fn expression_keys_index_through_other_paths() {
    let parser = span_parser();
    let mut span = Span::sample();
    span.attributes.insert("flink".to_string(), Value::Int(99));
    execute(&parser, r#"set(attributes["copy"], attributes[name])"#, &mut span);
    assert_eq!(span.attributes.get("copy"), Some(&Value::Int(99)));
}

#[test]
fn set_skips_nil_values() {
    let parser = span_parser();
    let mut span = Span::sample();
    execute(&parser, r#"set(attributes["a"], attributes["missing"])"#, &mut span);
    assert_eq!(span.attributes.get("a"), Some(&Value::Int(1)));
}

// ============================================================================
// Context handling
// ============================================================================

#[test]
fn context_qualified_paths_bind_when_registered() {
    let parser = span_parser_with_contexts();
    let mut span = Span::sample();
    execute(&parser, r#"set(span.attributes["x"], 1)"#, &mut span);
    assert_eq!(span.attributes.get("x"), Some(&Value::Int(1)));
}

/// Path errors are wrapped per argument; unwraps the chain down to the
/// underlying parse failure.
fn unwrap_path_error(err: ParseError) -> ParseError {
    match err {
        ParseError::FunctionArguments {
            source: ArgumentError::Invalid { source, .. },
            ..
        } => match *source {
            ArgumentError::Nested { source } => *source,
            other => panic!("expected a nested path error, got {:?}", other),
        },
        other => panic!("expected an argument error, got {:?}", other),
    }
}

#[test]
fn unknown_context_is_rejected() {
    let parser = span_parser_with_contexts();
    let err = parser.parse_statement(r#"set(foo.attributes["k"], 1)"#).unwrap_err();
    assert!(err.to_string().contains(r#"context "foo" from path"#));
    match unwrap_path_error(err) {
        ParseError::UnknownContext { context, valid, .. } => {
            assert_eq!(context, "foo");
            assert_eq!(valid, r#""log", "span""#);
        }
        other => panic!("expected UnknownContext, got {:?}", other),
    }
}

#[test]
fn missing_context_is_rejected() {
    let parser = span_parser_with_contexts();
    let err = parser.parse_statement(r#"set(attributes["k"], 1)"#).unwrap_err();
    match unwrap_path_error(err) {
        ParseError::MissingContext { path, valid } => {
            assert_eq!(path, r#"attributes["k"]"#);
            assert!(valid.contains(r#""span.attributes["k"]""#));
        }
        other => panic!("expected MissingContext, got {:?}", other),
    }
}

#[test]
fn legacy_mode_demotes_context_to_first_segment() {
    // Without registered context names, `name.extra` addresses a field
    // called `name` with successor `extra`; the resolver ignores the
    // successor, so completeness flags it.
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(name.extra, 1)"#).unwrap_err();
    assert!(matches!(
        unwrap_path_error(err),
        ParseError::ExtraPathSection { ref segment } if segment == "extra"
    ));
}

#[test]
fn extra_path_sections_are_detected() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(name.string.more, 1)"#).unwrap_err();
    assert!(err
        .to_string()
        .contains("was not used by the context - this likely means you are using extra path sections"));
}

#[test]
fn unread_keys_are_detected() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(name[0], 1)"#).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("were not used by the context - this likely means you are trying to index"));
    assert!(matches!(
        unwrap_path_error(err),
        ParseError::ExtraKeyIndexing { ref segment } if segment == "name"
    ));
}

// ============================================================================
// Context rewriting
// ============================================================================

#[test]
fn append_context_qualifies_bare_paths() {
    let parser = span_parser_with_contexts();
    let rewritten = parser
        .append_statement_paths_context("span", r#"set(attributes["k"], value)"#)
        .expect("rewrite failed");
    assert_eq!(rewritten, r#"set(span.attributes["k"], span.value)"#);
}

#[test]
fn append_context_leaves_qualified_paths_alone() {
    let parser = span_parser_with_contexts();
    let statement = r#"set(span.attributes["k"], log.body) where span.status == 200"#;
    let rewritten = parser
        .append_statement_paths_context("span", statement)
        .expect("rewrite failed");
    assert_eq!(rewritten, statement);
}

#[test]
fn append_context_reaches_paths_in_keys_and_where_clauses() {
    let parser = span_parser_with_contexts();
    let rewritten = parser
        .append_statement_paths_context("span", r#"set(attributes[name], 1) where status == 200"#)
        .expect("rewrite failed");
    assert_eq!(
        rewritten,
        r#"set(span.attributes[span.name], 1) where span.status == 200"#
    );
}

#[test]
fn append_context_rejects_unregistered_target() {
    let parser = span_parser_with_contexts();
    let err = parser
        .append_statement_paths_context("metric", "set(name, 1)")
        .unwrap_err();
    assert!(matches!(err, ParseError::UnknownContextName { ref context, .. } if context == "metric"));
}

// ============================================================================
// Binder errors
// ============================================================================

#[test]
fn undefined_function_is_rejected() {
    let parser = span_parser();
    let err = parser.parse_statement("nonexistent(name)").unwrap_err();
    assert!(matches!(err, ParseError::UndefinedFunction { ref name } if name == "nonexistent"));
}

#[test]
fn arity_is_checked() {
    let parser = span_parser();
    let err = parser.parse_statement("set(name)").unwrap_err();
    assert!(err
        .to_string()
        .contains("incorrect number of arguments. Expected: 2 Received: 1"));

    let err = parser.parse_statement(r#"set(name, 1, 2)"#).unwrap_err();
    assert!(err
        .to_string()
        .contains("incorrect number of arguments. Expected: 2 Received: 3"));
}

#[test]
fn unknown_named_parameter_is_rejected() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(goal = name, value = 1)"#).unwrap_err();
    assert!(err.to_string().contains("no such parameter: goal"));
}

#[test]
fn positional_after_named_is_rejected() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(target = name, 1)"#).unwrap_err();
    assert!(err.to_string().contains("unnamed argument used after named argument"));
}

#[test]
fn named_arguments_match_after_camel_normalization() {
    let parser = probe_parser();
    let mut span = Span::sample();
    let statement = parser
        .parse_statement(r#"literal_probe("x", fallbackCount = 7)"#)
        .expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::string("x:7"));
}

#[test]
fn setter_fields_require_paths() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set("literal", 1)"#).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("invalid argument at position 0"));
    assert!(rendered.contains("must be a path"));
}

#[test]
fn scalar_fields_require_matching_literals() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"delete_key(attributes, 5)"#).unwrap_err();
    assert!(err.to_string().contains("must be a string"));
}

#[test]
fn scalar_slices_reject_mixed_literals() {
    let parser = span_parser();
    let err = parser
        .parse_statement(r#"keep_keys(attributes, ["a", 2])"#)
        .unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("error while parsing list argument at index 1"));
    assert!(rendered.contains("must be a string"));
}

#[test]
fn unresolvable_enum_symbol_is_rejected() {
    let parser = span_parser();
    let err = parser.parse_statement(r#"set(name, NOT_A_SYMBOL)"#).unwrap_err();
    assert!(err.to_string().contains(r#"enum symbol "NOT_A_SYMBOL" not recognized"#));
}

#[test]
fn function_reference_must_be_registered() {
    let parser = span_parser();
    let err = parser
        .parse_statement(r#"replace_pattern(body, "a", "b", MD5)"#)
        .unwrap_err();
    assert!(err.to_string().contains("undefined function MD5"));
}

#[test]
fn invalid_regex_fails_function_creation() {
    let parser = span_parser();
    let err = parser
        .parse_statement(r#"replace_pattern(body, "[", "b")"#)
        .unwrap_err();
    assert!(matches!(err, ParseError::FunctionCreation { ref function, .. } if function == "replace_pattern"));
}

// ============================================================================
// Conditions and value expressions
// ============================================================================

#[test]
fn standalone_conditions_evaluate() {
    let parser = span_parser();
    let condition = parser.parse_condition(r#"status == 200 and name == "flink""#).expect("parse failed");
    let mut span = Span::sample();
    assert!(condition.eval(&EvalContext::new(), &mut span).unwrap());

    span.status = 404;
    assert!(!condition.eval(&EvalContext::new(), &mut span).unwrap());
}

#[test]
fn value_expressions_evaluate() {
    let parser = span_parser();
    let mut span = Span::sample();

    let expr = parser.parse_value_expression("1 + 2 * 3").expect("parse failed");
    assert_eq!(expr.eval(&EvalContext::new(), &mut span).unwrap(), Value::Int(7));

    let expr = parser.parse_value_expression("name").expect("parse failed");
    assert_eq!(expr.eval(&EvalContext::new(), &mut span).unwrap(), Value::string("flink"));
}

#[test]
fn parse_and_bind_are_deterministic() {
    let parser = span_parser();
    let source = r#"set(attributes["x"], Concat([name, "!"], "-")) where status == 200"#;
    let first = parser.parse_statement(source).expect("parse failed");
    let second = parser.parse_statement(source).expect("parse failed");

    let mut span_a = Span::sample();
    let mut span_b = Span::sample();
    first.execute(&EvalContext::new(), &mut span_a).expect("execute failed");
    second.execute(&EvalContext::new(), &mut span_b).expect("execute failed");
    assert_eq!(span_a, span_b);
    assert_eq!(first.origin(), second.origin());
}

// ============================================================================
// Literal detection
// ============================================================================

#[test]
fn lists_of_literals_are_literal() {
    let parser = span_parser();
    let expr = parser.parse_value_expression(r#"[1, "two", true]"#).expect("parse failed");
    assert!(expr.getter.is_literal());
}

#[test]
fn lists_containing_paths_are_not_literal() {
    let parser = span_parser();
    let expr = parser.parse_value_expression(r#"[1, name]"#).expect("parse failed");
    assert!(!expr.getter.is_literal());
}

#[test]
fn math_expressions_are_not_literal() {
    let parser = span_parser();
    let expr = parser.parse_value_expression("1 + 2").expect("parse failed");
    assert!(!expr.getter.is_literal());
}

// ============================================================================
// Custom factories: literal getters, optionals, slice getters
// ============================================================================

struct LiteralProbeArguments<K> {
    value: Option<LiteralGetter<K, StringGetter<K>>>,
    fallback: Optional<i64>,
}

impl<K: 'static> Arguments<K> for LiteralProbeArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("value", ArgKind::Literal(GetterKind::String)),
            ArgDescriptor::optional("fallback_count", ArgKind::Int),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::StringGetter(getter)) => {
                self.value = Some(LiteralGetter::new(getter));
                Ok(())
            }
            (1, ArgValue::Int(fallback)) => {
                self.fallback.set(fallback);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

struct LiteralProbeFactory;

impl<K: 'static> Factory<K> for LiteralProbeFactory {
    fn name(&self) -> &'static str {
        "literal_probe"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(LiteralProbeArguments {
            value: None,
            fallback: Optional::empty(),
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<crate::ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, LiteralProbeArguments<K>>(args)?;
        let value = args.value.ok_or("literal_probe: missing value")?;
        let fallback = args.fallback;
        assert!(value.is_literal());
        let literal = value.get_literal().map_err(|e| e.to_string())?;
        let rendered = format!("{}:{}", literal, fallback.get_or(0));
        Ok(Arc::new(move |_, _| Ok(Value::string(rendered.clone()))))
    }
}

struct SliceSumArguments<K> {
    values: Option<SliceGetter<K, i64>>,
}

impl<K: 'static> Arguments<K> for SliceSumArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] =
            &[ArgDescriptor::required("values", ArgKind::SliceGetter(SliceElemKind::Int))];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::SliceGetterInt(values)) => {
                self.values = Some(values);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

struct SliceSumFactory;

impl<K: 'static> Factory<K> for SliceSumFactory {
    fn name(&self) -> &'static str {
        "slice_sum"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(SliceSumArguments { values: None })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<crate::ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, SliceSumArguments<K>>(args)?;
        let values = args.values.ok_or("slice_sum: missing values")?;
        Ok(Arc::new(move |ectx, tctx| {
            let sum: i64 = values.get(ectx, tctx)?.into_iter().sum();
            Ok(Value::Int(sum))
        }))
    }
}

fn probe_parser() -> Parser<Span> {
    let mut functions: FunctionRegistry<Span> = default_functions();
    functions.insert("literal_probe".to_string(), Arc::new(LiteralProbeFactory));
    functions.insert("slice_sum".to_string(), Arc::new(SliceSumFactory));
    Parser::new(functions, span_resolver(), TelemetrySettings::default())
}

#[test]
fn literal_getter_fields_accept_constants() {
    let parser = probe_parser();
    let mut span = Span::sample();

    let statement = parser.parse_statement(r#"literal_probe("x")"#).expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::string("x:0"));

    let statement = parser.parse_statement(r#"literal_probe("x", 7)"#).expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::string("x:7"));
}

#[test]
fn literal_getter_fields_reject_paths() {
    let parser = probe_parser();
    let err = parser.parse_statement("literal_probe(name)").unwrap_err();
    assert!(err
        .to_string()
        .contains("getter type StringGetter does not support literal values"));
}

#[test]
fn optional_arguments_default_when_omitted() {
    let parser = probe_parser();
    let mut span = Span::sample();
    let statement = parser.parse_statement(r#"literal_probe("v")"#).expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::string("v:0"));
}

#[test]
fn slice_getter_accepts_list_literals() {
    let parser = probe_parser();
    let mut span = Span::sample();
    let statement = parser.parse_statement("slice_sum([1, 2, 3])").expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::Int(6));
}

#[test]
fn slice_getter_defers_type_checks_for_paths() {
    let parser = probe_parser();
    let mut span = Span::sample();
    span.attributes
        .insert("nums".to_string(), Value::List(vec![Value::Int(4), Value::Int(5)]));

    let statement = parser
        .parse_statement(r#"slice_sum(attributes["nums"])"#)
        .expect("parse failed");
    let (value, _) = statement.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(value, Value::Int(9));

    // A non-list value binds fine and fails at evaluation time.
    let statement = parser.parse_statement("slice_sum(name)").expect("parse failed");
    assert!(statement.execute(&EvalContext::new(), &mut span).is_err());
}

#[test]
fn slice_getter_rejects_non_literal_scalar_elements() {
    let parser = probe_parser();
    let err = parser.parse_statement("slice_sum([1, name])").unwrap_err();
    assert!(err.to_string().contains("error while parsing list argument at index 1"));
}

// ============================================================================
// Sequences and error modes
// ============================================================================

#[test]
fn statement_sequence_propagates_by_default() {
    let parser = span_parser();
    let statements = parser
        .parse_statements(&[r#"set(name, "first")"#, r#"set(status, Int("nope"))"#])
        .expect("parse failed");
    let sequence = StatementSequence::new(statements);

    let mut span = Span::sample();
    assert!(sequence.execute(&EvalContext::new(), &mut span).is_err());
    assert_eq!(span.name, "first");
}

#[test]
fn statement_sequence_ignores_failures_when_asked() {
    let parser = span_parser();
    let statements = parser
        .parse_statements(&[
            r#"set(status, Int("nope"))"#,
            r#"set(name, "second")"#,
        ])
        .expect("parse failed");
    let sequence = StatementSequence::new(statements).with_error_mode(ErrorMode::Ignore);

    let mut span = Span::sample();
    sequence.execute(&EvalContext::new(), &mut span).expect("execute failed");
    assert_eq!(span.name, "second");
}

#[test]
fn condition_sequence_honors_logic_operations() {
    let parser = span_parser();
    let conditions = parser
        .parse_conditions(&["status == 200", "status == 500"])
        .expect("parse failed");

    let mut span = Span::sample();
    let anded = ConditionSequence::new(conditions.clone());
    assert!(!anded.eval(&EvalContext::new(), &mut span).unwrap());

    let ored = ConditionSequence::new(conditions).with_logic_operation(LogicOperation::Or);
    assert!(ored.eval(&EvalContext::new(), &mut span).unwrap());
}

#[test]
fn condition_sequence_skips_errors_in_ignore_mode() {
    let parser = span_parser();
    let conditions = parser
        .parse_conditions(&[r#"Int("nope") == 1"#, "status == 200"])
        .expect("parse failed");
    let sequence = ConditionSequence::new(conditions).with_error_mode(ErrorMode::Ignore);

    let mut span = Span::sample();
    assert!(sequence.eval(&EvalContext::new(), &mut span).unwrap());
}

#[test]
fn context_statements_deserialize_from_config() {
    let config: ContextStatements = serde_json::from_str(
        r#"{
            "context": "span",
            "conditions": ["status == 200"],
            "statements": ["set(name, \"x\")"],
            "error_mode": "ignore"
        }"#,
    )
    .expect("deserialize failed");
    assert_eq!(config.context, "span");
    assert_eq!(config.conditions.len(), 1);
    assert_eq!(config.statements.len(), 1);
    assert_eq!(config.error_mode, Some(ErrorMode::Ignore));
}

// ============================================================================
// Evaluation context
// ============================================================================

#[test]
fn cancellation_aborts_execution() {
    let parser = span_parser();
    let statement = parser.parse_statement(r#"set(name, "x")"#).expect("parse failed");

    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let ectx = EvalContext::with_cancellation(token);

    let mut span = Span::sample();
    assert!(matches!(
        statement.execute(&ectx, &mut span),
        Err(EvalError::Cancelled)
    ));
    assert_eq!(span.name, "flink");
}

#[test]
fn cache_persists_across_statements_in_a_batch() {
    let ectx = EvalContext::new();
    ectx.cache_set("span", Value::Map(HashMap::new()));

    let shared = EvalContext::new().with_cache(ectx.cache());
    assert_eq!(shared.cache_get("span"), Some(Value::Map(HashMap::new())));
    assert_eq!(shared.cache_get("log"), None);
}

// ============================================================================
// Time-typed values
// ============================================================================

#[test]
fn duration_and_time_values_compare_chronologically() {
    use crate::ast::CompOp;
    use crate::ops;

    let short = Value::Duration(std::time::Duration::from_millis(100));
    let long = Value::Duration(std::time::Duration::from_secs(1));
    assert!(ops::compare(&short, CompOp::Less, &long).unwrap());

    let earlier = Value::Time(chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp"));
    let later = Value::Time(chrono::DateTime::from_timestamp(1_700_000_100, 0).expect("valid timestamp"));
    assert!(ops::compare(&earlier, CompOp::Less, &later).unwrap());
    assert!(ops::compare(&earlier, CompOp::NotEq, &later).unwrap());
}

#[test]
fn duration_and_time_getters_require_their_kinds() {
    use crate::getters::{DurationGetter, TimeGetter};

    let mut span = Span::sample();
    let ectx = EvalContext::new();

    let duration = std::time::Duration::from_secs(3);
    let getter = DurationGetter::<Span>::new(Getter::constant(Value::Duration(duration)));
    assert_eq!(getter.get(&ectx, &mut span).unwrap(), duration);

    let getter = TimeGetter::<Span>::new(Getter::constant(Value::Int(5)));
    assert!(matches!(
        getter.get(&ectx, &mut span),
        Err(EvalError::TypeMismatch { expected: "time", .. })
    ));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn path_original_text_matches_source(
        first in "q[a-z]{0,6}",
        second in "q[a-z]{0,6}",
        key in "[a-z]{1,6}",
    ) {
        let path_text = format!(r#"{}.{}["{}"]"#, first, second, key);
        let source = format!("set({}, 1)", path_text);
        let parsed = grammar::parse_statement(&source).expect("parse failed");
        let paths = parsed.paths();
        prop_assert_eq!(paths.len(), 1);
        prop_assert_eq!(paths[0].text.as_str(), path_text.as_str());
        prop_assert_eq!(paths[0].offset, 4);
        let covered = &source[paths[0].offset..paths[0].offset + paths[0].text.len()];
        prop_assert_eq!(covered, path_text.as_str());
    }

    #[test]
    fn context_injection_is_idempotent_and_byte_preserving(
        key in "[a-z]{1,6}",
        value_field in "q[a-z]{0,6}",
    ) {
        let parser = span_parser_with_contexts();
        let source = format!(r#"set(attributes["{}"], {})"#, key, value_field);

        let once = parser.append_statement_paths_context("span", &source).expect("rewrite failed");
        let twice = parser.append_statement_paths_context("span", &once).expect("rewrite failed");
        prop_assert_eq!(&once, &twice);

        // Two injected prefixes, all other bytes preserved.
        prop_assert_eq!(once.len(), source.len() + 2 * "span.".len());
        prop_assert_eq!(once.replace("span.", ""), source);
    }

    #[test]
    fn parse_bind_execute_is_deterministic(value in 0i64..1000) {
        let parser = span_parser();
        let source = format!(r#"set(attributes["p"], {})"#, value);

        let mut span_a = Span::sample();
        let mut span_b = Span::sample();
        let statement_a = parser.parse_statement(&source).expect("parse failed");
        let statement_b = parser.parse_statement(&source).expect("parse failed");
        statement_a.execute(&EvalContext::new(), &mut span_a).expect("execute failed");
        statement_b.execute(&EvalContext::new(), &mut span_b).expect("execute failed");
        prop_assert_eq!(span_a, span_b);
    }
}
