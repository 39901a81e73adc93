//! Parsed statement tree.
//!
//! These types are the direct output of the grammar, before any binding
//! happens. Paths carry their byte span in the source so the original text
//! can be recovered exactly and so the context rewriter can splice prefixes
//! at the right offsets.

/// A full statement: an editor invocation plus an optional where clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub editor: Editor,
    pub where_clause: Option<BooleanExpression>,
}

/// A function invocation used as the top-level mutating operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Editor {
    pub name: String,
    pub args: Vec<Argument>,
}

/// A converter invocation: a function call at value position, optionally
/// indexed, e.g. `Split(name, ",")[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    pub name: String,
    pub args: Vec<Argument>,
    pub keys: Vec<Key>,
}

/// One argument of a call, positional (`name` is `None`) or named.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Value,
}

/// A value at argument or operand position. Exactly one variant applies;
/// integers and floats are distinguished and never silently promoted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Bare uppercase identifier. Depending on the argument slot it binds
    /// into, this is an enum symbol or a function reference.
    Enum(String),
    Path(Path),
    Converter(Converter),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Math(Box<MathExpression>),
}

/// A dotted reference into a telemetry record.
///
/// `context` holds the leading identifier when the path had at least two
/// segments; whether it really is a context name or just the first ordinary
/// segment is decided at binding time.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub context: String,
    pub fields: Vec<Field>,
    /// Absolute byte offset of the path's first character in the source.
    pub offset: usize,
    /// Original text of the path, exactly as spelled in the source.
    pub text: String,
}

/// One segment of a path with its indexing keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub keys: Vec<Key>,
}

/// One `[...]` index.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Int(i64),
    String(String),
    /// An expression yielding the key at evaluation time: a path, a
    /// converter call, or a math expression.
    Expression(Value),
}

/// A math expression with conventional precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum MathExpression {
    Value(Value),
    Negate(Box<MathExpression>),
    Binary {
        left: Box<MathExpression>,
        op: MathOp,
        right: Box<MathExpression>,
    },
}

/// Math operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

/// A where-clause expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BooleanExpression {
    Comparison {
        left: Value,
        op: CompOp,
        right: Value,
    },
    /// A bare value (path or converter call) that must evaluate to a bool.
    Term(Value),
    Not(Box<BooleanExpression>),
    And(Box<BooleanExpression>, Box<BooleanExpression>),
    Or(Box<BooleanExpression>, Box<BooleanExpression>),
}

impl Value {
    /// Walks every path in this value, including paths nested in lists,
    /// maps, math expressions, converter arguments, and indexing keys.
    pub(crate) fn visit_paths<'a>(&'a self, visit: &mut impl FnMut(&'a Path)) {
        match self {
            Value::Path(path) => {
                visit(path);
                for field in &path.fields {
                    for key in &field.keys {
                        if let Key::Expression(value) = key {
                            value.visit_paths(visit);
                        }
                    }
                }
            }
            Value::Converter(converter) => converter.visit_paths(visit),
            Value::List(values) => {
                for value in values {
                    value.visit_paths(visit);
                }
            }
            Value::Map(entries) => {
                for (_, value) in entries {
                    value.visit_paths(visit);
                }
            }
            Value::Math(math) => math.visit_paths(visit),
            _ => {}
        }
    }
}

impl Converter {
    fn visit_paths<'a>(&'a self, visit: &mut impl FnMut(&'a Path)) {
        for arg in &self.args {
            arg.value.visit_paths(visit);
        }
        for key in &self.keys {
            if let Key::Expression(value) = key {
                value.visit_paths(visit);
            }
        }
    }
}

impl MathExpression {
    fn visit_paths<'a>(&'a self, visit: &mut impl FnMut(&'a Path)) {
        match self {
            MathExpression::Value(value) => value.visit_paths(visit),
            MathExpression::Negate(inner) => inner.visit_paths(visit),
            MathExpression::Binary { left, right, .. } => {
                left.visit_paths(visit);
                right.visit_paths(visit);
            }
        }
    }
}

impl BooleanExpression {
    pub(crate) fn visit_paths<'a>(&'a self, visit: &mut impl FnMut(&'a Path)) {
        match self {
            BooleanExpression::Comparison { left, right, .. } => {
                left.visit_paths(visit);
                right.visit_paths(visit);
            }
            BooleanExpression::Term(value) => value.visit_paths(visit),
            BooleanExpression::Not(inner) => inner.visit_paths(visit),
            BooleanExpression::And(left, right) | BooleanExpression::Or(left, right) => {
                left.visit_paths(visit);
                right.visit_paths(visit);
            }
        }
    }
}

impl ParsedStatement {
    /// Collects every path in the statement in source order.
    pub(crate) fn paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        for arg in &self.editor.args {
            arg.value.visit_paths(&mut |p| paths.push(p));
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.visit_paths(&mut |p| paths.push(p));
        }
        paths.sort_by_key(|p| p.offset);
        paths
    }
}
