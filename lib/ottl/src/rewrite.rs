//! Textual rewriting of statements to qualify bare paths with a context.

use crate::error::ParseError;
use crate::grammar;
use crate::parser::Parser;

impl<K: 'static> Parser<K> {
    /// Rewrites `statement` so every path whose context is not one of the
    /// parser's registered context names gains the `context` prefix. The
    /// mutation is purely textual: every byte outside the injection points
    /// is preserved, and a statement with no such paths is returned
    /// unchanged.
    pub fn append_statement_paths_context(
        &self,
        context: &str,
        statement: &str,
    ) -> Result<String, ParseError> {
        if !self.context_names.contains(context) {
            return Err(ParseError::UnknownContextName {
                context: context.to_string(),
                valid: self.context_names_text(""),
            });
        }

        let parsed = grammar::parse_statement(statement)?;
        let offsets: Vec<usize> = parsed
            .paths()
            .into_iter()
            .filter(|path| !self.context_names.contains(&path.context))
            .map(|path| path.offset)
            .collect();

        Ok(write_with_context_prefix(context, statement, &offsets))
    }
}

/// Splices `context + "."` in front of each offset, in ascending order.
fn write_with_context_prefix(context: &str, statement: &str, offsets: &[usize]) -> String {
    if offsets.is_empty() {
        return statement.to_string();
    }

    let prefix = format!("{}.", context);
    let mut out = String::with_capacity(statement.len() + prefix.len() * offsets.len());

    let mut left = 0;
    for &offset in offsets {
        out.push_str(&statement[left..offset]);
        out.push_str(&prefix);
        left = offset;
    }
    out.push_str(&statement[left..]);

    out
}
