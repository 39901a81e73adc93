//! Chumsky grammar for statements, conditions, and value expressions.
//!
//! The grammar is pure: it produces the parsed tree of [`crate::ast`] types
//! and never consults the function or path registries. Binding happens in a
//! separate pass so that the same parse can feed both the binder and the
//! offset-based context rewriter.

use chumsky::input::{Input, Stream, ValueInput};
use chumsky::prelude::*;

use crate::ast;
use crate::error::ParseError;
use crate::lexer::{tokenize, Span, Token};

type Extra<'t, 's> = extra::Err<Rich<'t, Token<'s>, Span>>;

/// Which grammar production to run against the source.
enum EntryPoint {
    Statement,
    Condition,
    ValueExpression,
}

/// Result of running one grammar production.
enum Parsed {
    Statement(ast::ParsedStatement),
    Condition(ast::BooleanExpression),
    ValueExpression(ast::Value),
}

/// Parses a full statement: `editor [where condition]`.
pub(crate) fn parse_statement(source: &str) -> Result<ast::ParsedStatement, ParseError> {
    match parse_source(source, EntryPoint::Statement)? {
        Parsed::Statement(statement) => Ok(statement),
        _ => Err(internal_entry_error()),
    }
}

/// Parses a standalone where-style predicate.
pub(crate) fn parse_condition(source: &str) -> Result<ast::BooleanExpression, ParseError> {
    match parse_source(source, EntryPoint::Condition)? {
        Parsed::Condition(condition) => Ok(condition),
        _ => Err(internal_entry_error()),
    }
}

/// Parses a bare value expression.
pub(crate) fn parse_value_expression(source: &str) -> Result<ast::Value, ParseError> {
    match parse_source(source, EntryPoint::ValueExpression)? {
        Parsed::ValueExpression(value) => Ok(value),
        _ => Err(internal_entry_error()),
    }
}

fn internal_entry_error() -> ParseError {
    ParseError::Syntax {
        position: 0,
        message: "grammar returned a different production than requested".to_string(),
    }
}

fn parse_source(source: &str, entry: EntryPoint) -> Result<Parsed, ParseError> {
    let tokens = tokenize(source)?;
    let eoi = Span::from(source.len()..source.len());
    let stream = Stream::from_iter(tokens.into_iter()).map(eoi, |(t, s): (_, _)| (t, s));

    let ident_lower = select! { Token::LowerIdent(s) => s.to_string() };
    let ident_upper = select! { Token::UpperIdent(s) => s.to_string() };
    let ident_any = select! {
        Token::LowerIdent(s) => s.to_string(),
        Token::UpperIdent(s) => s.to_string(),
    };

    let string_lit = select! { Token::StringLiteral(s) => s }.try_map(unescape_string);

    let bytes_lit = select! { Token::BytesLiteral(s) => s }.map(decode_bytes);

    let sign = choice((just(Token::Minus).to(true), just(Token::Plus).to(false))).or_not();

    let int_lit = sign
        .clone()
        .then(select! { Token::IntLiteral(s) => s })
        .try_map(|(neg, digits), span| {
            digits
                .parse::<i64>()
                .map(|v| if neg == Some(true) { -v } else { v })
                .map_err(|_| Rich::custom(span, format!("integer literal {} out of range", digits)))
        });

    let float_lit = sign
        .then(select! { Token::FloatLiteral(s) => s })
        .try_map(|(neg, digits), span| {
            digits
                .parse::<f64>()
                .map(|v| if neg == Some(true) { -v } else { v })
                .map_err(|_| Rich::custom(span, format!("invalid float literal {}", digits)))
        });

    let literal = choice((
        float_lit.map(ast::Value::Float),
        int_lit.clone().map(ast::Value::Int),
        string_lit.clone().map(ast::Value::String),
        bytes_lit.map(ast::Value::Bytes),
        select! { Token::True => ast::Value::Bool(true), Token::False => ast::Value::Bool(false) },
        just(Token::Nil).to(ast::Value::Nil),
    ));

    let mut value = Recursive::declare();
    let mut path = Recursive::declare();
    let mut converter = Recursive::declare();

    // Keys: "[" (int | string | path | converter | math) "]", repeated.
    let key_expr = choice((
        converter.clone().map(ast::Value::Converter),
        path.clone().map(ast::Value::Path),
        make_math_expr(value.clone()).map(math_into_value),
    ));

    let key = choice((
        int_lit.map(ast::Key::Int),
        string_lit.clone().map(ast::Key::String),
        key_expr.map(ast::Key::Expression),
    ))
    .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let keys = key.repeated().collect::<Vec<_>>();

    // Paths. The leading identifier is captured as the context only when it
    // is bare and followed by a dot, matching the original grammar's
    // lookahead; otherwise it is the first field.
    let field = ident_any
        .then(keys.clone())
        .map(|(name, keys)| ast::Field { name, keys });

    let context_form = ident_lower
        .clone()
        .then_ignore(just(Token::Dot))
        .then(
            field
                .clone()
                .separated_by(just(Token::Dot))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|(context, fields)| (context, fields));

    let fields_form = ident_lower
        .clone()
        .then(keys.clone())
        .map(|(name, keys)| ast::Field { name, keys })
        .then(
            just(Token::Dot)
                .ignore_then(field.clone())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|(first, rest)| {
            let mut fields = vec![first];
            fields.extend(rest);
            (String::new(), fields)
        });

    path.define(choice((context_form, fields_form)).map_with(|(context, fields), e| {
        let span: Span = e.span();
        ast::Path {
            context,
            fields,
            offset: span.start,
            text: source[span.start..span.end].to_string(),
        }
    }));

    // Arguments admit full math expressions; trivial wrappers collapse back
    // to plain values so the binder sees literals as literals.
    let arg_value = make_math_expr(value.clone()).map(math_into_value);

    let named_arg = ident_lower
        .clone()
        .then_ignore(just(Token::Assign))
        .then(arg_value.clone())
        .map(|(name, value)| ast::Argument { name: Some(name), value });

    let positional_arg = arg_value.clone().map(|value| ast::Argument { name: None, value });

    let arg_list = named_arg
        .or(positional_arg)
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>();

    converter.define(
        ident_upper
            .clone()
            .then(arg_list.clone().delimited_by(just(Token::LParen), just(Token::RParen)))
            .then(keys.clone())
            .map(|((name, args), keys)| ast::Converter { name, args, keys }),
    );

    let list = value
        .clone()
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .map(ast::Value::List);

    let map_entry = string_lit
        .clone()
        .then_ignore(just(Token::Colon))
        .then(value.clone());

    let map = map_entry
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map(ast::Value::Map);

    value.define(choice((
        converter.clone().map(ast::Value::Converter),
        list,
        map,
        ident_upper.map(ast::Value::Enum),
        path.clone().map(ast::Value::Path),
        literal,
    )));

    let editor = ident_lower
        .then(arg_list.clone().delimited_by(just(Token::LParen), just(Token::RParen)))
        .map(|(name, args)| ast::Editor { name, args });

    let comp_op = choice((
        just(Token::Eq).to(ast::CompOp::Eq),
        just(Token::NotEq).to(ast::CompOp::NotEq),
        just(Token::LessEq).to(ast::CompOp::LessEq),
        just(Token::GreaterEq).to(ast::CompOp::GreaterEq),
        just(Token::Less).to(ast::CompOp::Less),
        just(Token::Greater).to(ast::CompOp::Greater),
    ));

    let bool_expr = recursive(|bool_expr| {
        let comparison = arg_value
            .clone()
            .then(comp_op)
            .then(arg_value.clone())
            .map(|((left, op), right)| ast::BooleanExpression::Comparison { left, op, right });

        // A bare term must be something that can produce a boolean.
        let term = arg_value.clone().try_map(|v, span| match v {
            ast::Value::Path(_) | ast::Value::Converter(_) | ast::Value::Bool(_) => {
                Ok(ast::BooleanExpression::Term(v))
            }
            _ => Err(Rich::custom(span, "expected a boolean-valued expression")),
        });

        let primary = choice((
            bool_expr
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
            comparison,
            term,
        ));

        let factor = just(Token::Not).or_not().then(primary).map(|(not, expr)| {
            if not.is_some() {
                ast::BooleanExpression::Not(Box::new(expr))
            } else {
                expr
            }
        });

        let and_term = factor.clone().foldl(
            just(Token::And).ignore_then(factor).repeated(),
            |left, right| ast::BooleanExpression::And(Box::new(left), Box::new(right)),
        );

        and_term.clone().foldl(
            just(Token::Or).ignore_then(and_term).repeated(),
            |left, right| ast::BooleanExpression::Or(Box::new(left), Box::new(right)),
        )
    });

    let where_clause = just(Token::Where).ignore_then(bool_expr.clone());

    let statement = editor
        .then(where_clause.or_not())
        .map(|(editor, where_clause)| ast::ParsedStatement { editor, where_clause })
        .then_ignore(end());

    let condition = bool_expr.then_ignore(end());

    let value_expression = arg_value.then_ignore(end());

    let result = match entry {
        EntryPoint::Statement => statement
            .parse(stream)
            .into_result()
            .map(Parsed::Statement),
        EntryPoint::Condition => condition
            .parse(stream)
            .into_result()
            .map(Parsed::Condition),
        EntryPoint::ValueExpression => value_expression
            .parse(stream)
            .into_result()
            .map(Parsed::ValueExpression),
    };

    result.map_err(into_syntax_error)
}

/// Converts the first chumsky error into the crate's syntax error.
fn into_syntax_error(errors: Vec<Rich<'_, Token<'_>, Span>>) -> ParseError {
    match errors.into_iter().next() {
        Some(error) => ParseError::Syntax {
            position: error.span().start,
            message: error.to_string(),
        },
        None => ParseError::Syntax {
            position: 0,
            message: "unknown parse error".to_string(),
        },
    }
}

/// Builds a math expression parser over the given value parser, with
/// conventional precedence: unary minus, then `*`/`/`, then `+`/`-`.
fn make_math_expr<'t, 's: 't, I>(
    value_expr: impl Parser<'t, I, ast::Value, Extra<'t, 's>> + Clone + 't,
) -> impl Parser<'t, I, ast::MathExpression, Extra<'t, 's>> + Clone
where
    I: ValueInput<'t, Token = Token<'s>, Span = Span>,
{
    recursive(move |math_expr| {
        let paren = math_expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let primary = choice((paren, value_expr.map(ast::MathExpression::Value)));

        let unary_op = choice((just(Token::Minus).to(true), just(Token::Plus).to(false)));

        let factor = unary_op.or_not().then(primary).map(|(op, expr)| match op {
            Some(true) => negate(expr),
            _ => expr,
        });

        let mul_op = choice((
            just(Token::Multiply).to(ast::MathOp::Mul),
            just(Token::Divide).to(ast::MathOp::Div),
        ));

        let term = factor.clone().foldl(mul_op.then(factor).repeated(), |left, (op, right)| {
            ast::MathExpression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }
        });

        let add_op = choice((
            just(Token::Plus).to(ast::MathOp::Add),
            just(Token::Minus).to(ast::MathOp::Sub),
        ));

        term.clone().foldl(add_op.then(term).repeated(), |left, (op, right)| {
            ast::MathExpression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }
        })
    })
}

/// Unwraps a trivial math expression back into its value. Negated numeric
/// literals collapse to signed literals so the binder can treat them as
/// compile-time constants.
fn math_into_value(math: ast::MathExpression) -> ast::Value {
    match math {
        ast::MathExpression::Value(v) => v,
        other => ast::Value::Math(Box::new(other)),
    }
}

/// Applies unary minus, folding numeric literals in place.
fn negate(expr: ast::MathExpression) -> ast::MathExpression {
    match expr {
        ast::MathExpression::Value(ast::Value::Int(i)) => ast::MathExpression::Value(ast::Value::Int(-i)),
        ast::MathExpression::Value(ast::Value::Float(f)) => {
            ast::MathExpression::Value(ast::Value::Float(-f))
        }
        other => ast::MathExpression::Negate(Box::new(other)),
    }
}

/// Decodes the escape sequences of a quoted string literal.
fn unescape_string<'t, 's>(raw: &'s str, span: Span) -> Result<String, Rich<'t, Token<'s>, Span>> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('x') => match (chars.next(), chars.next()) {
                (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                    let byte = (hex_digit(hi) << 4) | hex_digit(lo);
                    out.push(byte as char);
                }
                _ => {
                    return Err(Rich::custom(span, "invalid \\x escape in string literal"));
                }
            },
            other => {
                let shown = other.map(String::from).unwrap_or_default();
                return Err(Rich::custom(
                    span,
                    format!("unsupported escape sequence \\{} in string literal", shown),
                ));
            }
        }
    }
    Ok(out)
}

/// Decodes a `0x…` literal into raw bytes. The lexer guarantees an even
/// number of hex digits.
fn decode_bytes(raw: &str) -> Vec<u8> {
    raw[2..]
        .as_bytes()
        .chunks(2)
        .map(|pair| (hex_digit(pair[0] as char) << 4) | hex_digit(pair[1] as char))
        .collect()
}

fn hex_digit(c: char) -> u8 {
    match c {
        '0'..='9' => c as u8 - b'0',
        'a'..='f' => c as u8 - b'a' + 10,
        'A'..='F' => c as u8 - b'A' + 10,
        _ => 0,
    }
}
