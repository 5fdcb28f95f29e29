//! Scalar text storage.
//!
//! Nodes never own their text. A [`ScalarRef`] is a tagged byte range that
//! points either into the tree's own [`Arena`] or into the caller's buffer
//! that an in-place parse borrowed. The range is resolved against the owning
//! tree at access time.

/// Byte range `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarRef {
    #[default]
    Empty,
    /// Range inside the tree's arena.
    Arena(Span),
    /// Range inside the buffer handed to an in-place parse.
    Source(Span),
}

impl ScalarRef {
    pub fn len(&self) -> usize {
        match self {
            ScalarRef::Empty => 0,
            ScalarRef::Arena(span) | ScalarRef::Source(span) => span.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bump-style text store owned by a tree.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    text: String,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
        }
    }

    /// Append `s` and return a reference to the copy.
    pub fn copy(&mut self, s: &str) -> ScalarRef {
        if s.is_empty() {
            return ScalarRef::Empty;
        }
        ScalarRef::Arena(Span::new(self.append(s), s.len()))
    }

    /// Append `s` and return the offset it starts at.
    pub(crate) fn append(&mut self, s: &str) -> usize {
        let start = self.text.len();
        self.text.push_str(s);
        start
    }

    pub fn get(&self, span: Span) -> Option<&str> {
        self.text.get(span.start..span.end())
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.text.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_appends_and_resolves() {
        let mut arena = Arena::new();
        let a = arena.copy("hello");
        let b = arena.copy("world");
        assert_eq!(a, ScalarRef::Arena(Span::new(0, 5)));
        assert_eq!(b, ScalarRef::Arena(Span::new(5, 5)));
        assert_eq!(arena.get(Span::new(5, 5)), Some("world"));
        assert_eq!(arena.len(), 10);
    }

    #[test]
    fn copy_of_empty_text_needs_no_storage() {
        let mut arena = Arena::new();
        assert_eq!(arena.copy(""), ScalarRef::Empty);
        assert!(arena.is_empty());
    }
}
