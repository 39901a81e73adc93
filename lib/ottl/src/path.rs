//! Bound path chains.
//!
//! The binder turns a parsed path into a forward-linked chain of segments
//! and hands the head to the caller-registered path resolver. Every segment
//! tracks whether the resolver actually read it; after resolution the binder
//! walks the chain and rejects paths with unread segments or unread keys.
//! This is the only mechanism that enforces that user-specified paths are
//! meaningful in the target schema.

use std::cell::Cell;

use crate::error::ParseError;
use crate::getters::Getter;

/// One segment of a bound path chain. The head of the chain represents the
/// first segment after the context; successors hang off [`Path::next`].
///
/// Reads are tracked with interior mutability so resolvers work with plain
/// shared references: [`Path::next`] marks the successor as read, and
/// [`Path::keys`] marks this segment's keys as read.
pub struct Path<K> {
    context: String,
    name: String,
    keys: Vec<PathKey<K>>,
    next: Option<Box<Path<K>>>,
    fetched: Cell<bool>,
    fetched_keys: Cell<bool>,
    original_text: String,
}

impl<K> Path<K> {
    /// Builds a chain from per-segment names and keys. The head segment is
    /// pre-marked as read; everything else must be visited by the resolver.
    pub(crate) fn new(
        context: String,
        segments: Vec<(String, Vec<PathKey<K>>)>,
        original_text: String,
    ) -> Option<Self> {
        let mut current: Option<Box<Path<K>>> = None;
        for (name, keys) in segments.into_iter().rev() {
            current = Some(Box::new(Path {
                context: context.clone(),
                name,
                keys,
                next: current,
                fetched: Cell::new(false),
                fetched_keys: Cell::new(false),
                original_text: original_text.clone(),
            }));
        }
        let head = *current?;
        head.fetched.set(true);
        Some(head)
    }

    /// The context name this path addresses, or the empty string when the
    /// parser runs without registered context names.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Name of this segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys indexing this segment. Reading a non-empty key list marks the
    /// keys as used.
    pub fn keys(&self) -> &[PathKey<K>] {
        if !self.keys.is_empty() {
            self.fetched_keys.set(true);
        }
        &self.keys
    }

    /// The next segment, marked as read by the act of fetching it.
    pub fn next(&self) -> Option<&Path<K>> {
        match &self.next {
            Some(next) => {
                next.fetched.set(true);
                Some(next)
            }
            None => None,
        }
    }

    /// The path's original text, exactly as spelled in the statement.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// Verifies that the resolver read every segment and every non-empty
    /// key list.
    pub(crate) fn ensure_complete(&self) -> Result<(), ParseError> {
        if !self.fetched.get() {
            return Err(ParseError::ExtraPathSection {
                segment: self.name.clone(),
            });
        }
        if !self.keys.is_empty() && !self.fetched_keys.get() {
            return Err(ParseError::ExtraKeyIndexing {
                segment: self.name.clone(),
            });
        }
        match &self.next {
            Some(next) => next.ensure_complete(),
            None => Ok(()),
        }
    }
}

impl<K> std::fmt::Debug for Path<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Path")
            .field("context", &self.context)
            .field("name", &self.name)
            .field("keys", &self.keys.len())
            .field("next", &self.next)
            .finish()
    }
}

/// One `[...]` index on a path segment: an integer, a string, or an
/// expression evaluated per call.
pub struct PathKey<K> {
    int: Option<i64>,
    string: Option<String>,
    expression: Option<Getter<K>>,
}

impl<K> PathKey<K> {
    pub(crate) fn from_int(value: i64) -> Self {
        PathKey {
            int: Some(value),
            string: None,
            expression: None,
        }
    }

    pub(crate) fn from_string(value: String) -> Self {
        PathKey {
            int: None,
            string: Some(value),
            expression: None,
        }
    }

    pub(crate) fn from_expression(getter: Getter<K>) -> Self {
        PathKey {
            int: None,
            string: None,
            expression: Some(getter),
        }
    }

    /// The key's integer value, if it was an integer literal.
    pub fn int(&self) -> Option<i64> {
        self.int
    }

    /// The key's string value, if it was a string literal.
    pub fn string(&self) -> Option<&str> {
        self.string.as_deref()
    }

    /// The key's expression getter, if the key must be computed per call.
    pub fn expression(&self) -> Option<&Getter<K>> {
        self.expression.as_ref()
    }
}

impl<K> std::fmt::Debug for PathKey<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathKey")
            .field("int", &self.int)
            .field("string", &self.string)
            .field("expression", &self.expression.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = ();

    fn chain(segments: &[(&str, usize)]) -> Path<Ctx> {
        let parts = segments
            .iter()
            .map(|(name, key_count)| {
                let keys = (0..*key_count).map(|i| PathKey::from_int(i as i64)).collect();
                (name.to_string(), keys)
            })
            .collect();
        Path::new(String::new(), parts, "test.path".to_string()).expect("non-empty chain")
    }

    #[test]
    fn head_is_pre_fetched() {
        let path = chain(&[("attributes", 0)]);
        assert!(path.ensure_complete().is_ok());
    }

    #[test]
    fn unread_successor_fails_completeness() {
        let path = chain(&[("body", 0), ("string", 0)]);
        let err = path.ensure_complete().unwrap_err();
        assert!(matches!(err, ParseError::ExtraPathSection { ref segment } if segment == "string"));
    }

    #[test]
    fn reading_successor_marks_it() {
        let path = chain(&[("body", 0), ("string", 0)]);
        let next = path.next().expect("has successor");
        assert_eq!(next.name(), "string");
        assert!(path.ensure_complete().is_ok());
    }

    #[test]
    fn unread_keys_fail_completeness() {
        let path = chain(&[("attributes", 1)]);
        let err = path.ensure_complete().unwrap_err();
        assert!(matches!(err, ParseError::ExtraKeyIndexing { ref segment } if segment == "attributes"));
    }

    #[test]
    fn reading_keys_marks_them() {
        let path = chain(&[("attributes", 1)]);
        assert_eq!(path.keys().len(), 1);
        assert!(path.ensure_complete().is_ok());
    }

    #[test]
    fn empty_key_list_needs_no_read() {
        let path = chain(&[("name", 0)]);
        assert!(path.keys().is_empty());
        assert!(path.ensure_complete().is_ok());
    }
}
