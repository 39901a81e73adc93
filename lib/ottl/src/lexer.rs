//! Statement tokens.

use logos::Logos;

use crate::error::ParseError;

/// Byte range of a token in the source text.
pub type Span = chumsky::span::SimpleSpan;

/// Statement language tokens.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t]+")]
pub enum Token<'a> {
    // ===== Keywords =====
    #[token("where")]
    Where,

    #[token("or")]
    Or,

    #[token("and")]
    And,

    #[token("not")]
    Not,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("nil")]
    Nil,

    // ===== Comparison operators =====
    #[token("==")]
    Eq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LessEq,

    #[token(">=")]
    GreaterEq,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    // ===== Arithmetic operators =====
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Multiply,

    #[token("/")]
    Divide,

    // ===== Delimiters =====
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token(":")]
    Colon,

    #[token("=")]
    Assign,

    // ===== Literals =====
    /// String literal: `"..."`, escapes left for the parser to decode.
    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| lex.slice())]
    StringLiteral(&'a str),

    /// Bytes literal: `0xC0FFEE`, always a whole number of hex pairs.
    #[regex(r"0x([0-9a-fA-F][0-9a-fA-F])+", |lex| lex.slice())]
    BytesLiteral(&'a str),

    /// Float literal: `3.14`, `.5`
    #[regex(r"[0-9]+\.[0-9]*|\.[0-9]+", |lex| lex.slice())]
    FloatLiteral(&'a str),

    /// Integer literal: `42` (signs are separate tokens)
    #[regex(r"[0-9]+", priority = 3, callback = |lex| lex.slice())]
    IntLiteral(&'a str),

    // ===== Identifiers =====
    /// Uppercase identifier (converter, enum symbol, or function name)
    #[regex(r"[A-Z][a-zA-Z0-9_]*", |lex| lex.slice())]
    UpperIdent(&'a str),

    /// Lowercase identifier (editor, path segment, named argument)
    #[regex(r"[a-z][a-zA-Z0-9_]*", priority = 1, callback = |lex| lex.slice())]
    LowerIdent(&'a str),
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Where => write!(f, "where"),
            Token::Or => write!(f, "or"),
            Token::And => write!(f, "and"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Nil => write!(f, "nil"),
            Token::Eq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LessEq => write!(f, "<="),
            Token::GreaterEq => write!(f, ">="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Multiply => write!(f, "*"),
            Token::Divide => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Assign => write!(f, "="),
            Token::StringLiteral(s)
            | Token::BytesLiteral(s)
            | Token::FloatLiteral(s)
            | Token::IntLiteral(s)
            | Token::UpperIdent(s)
            | Token::LowerIdent(s) => write!(f, "{}", s),
        }
    }
}

/// Tokenizes the input, pairing every token with its byte span.
///
/// The spans are what downstream consumers use to recover original text and
/// to rewrite statements in place, so the lexer never drops or merges
/// characters silently; any unlexable input is a syntax error at the exact
/// offset where it starts.
pub fn tokenize(input: &str) -> Result<Vec<(Token<'_>, Span)>, ParseError> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, Span::from(span))),
            Err(()) => {
                let message = if lexer.slice().starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    format!("unrecognized input {:?}", lexer.slice())
                };
                return Err(ParseError::Syntax { position: span.start, message });
            }
        }
    }
    Ok(tokens)
}
