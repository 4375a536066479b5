//! Interned names: dialects, operations, attribute keys, function names.

use std::fmt;
use std::sync::LazyLock;

use lasso::{Rodeo, Spur};
use parking_lot::RwLock;

static NAMES: LazyLock<RwLock<Rodeo>> = LazyLock::new(|| RwLock::new(Rodeo::default()));

/// A 4-byte key into the process-wide name table. Compares in O(1).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    pub fn new(text: &'static str) -> Self {
        Self::lookup(text).unwrap_or_else(|| Symbol(NAMES.write().get_or_intern_static(text)))
    }

    /// Intern text built at runtime.
    pub fn from_dynamic(text: &str) -> Self {
        Self::lookup(text).unwrap_or_else(|| Symbol(NAMES.write().get_or_intern(text)))
    }

    /// The symbol for `text` if it was ever interned. Never grows the table.
    pub fn lookup(text: &str) -> Option<Self> {
        NAMES.read().get(text).map(Symbol)
    }

    /// Borrow the text. `f` may itself create or print symbols.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        // read_recursive: a nested read must not wait behind a queued writer.
        let names = NAMES.read_recursive();
        f(names.resolve(&self.0))
    }
}

impl From<&'static str> for Symbol {
    fn from(text: &'static str) -> Self {
        Symbol::new(text)
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|s| s == other)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| write!(f, "@{s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_runtime_text_share_a_symbol() {
        let a = Symbol::new("extract_slice");
        let b = Symbol::from_dynamic(&["extract", "slice"].join("_"));
        assert_eq!(a, b);
        assert!(a == *"extract_slice");
        assert_eq!(a.to_string(), "extract_slice");
        assert_eq!(format!("{a:?}"), "@extract_slice");
    }

    #[test]
    fn lookup_does_not_intern() {
        assert_eq!(Symbol::lookup("never_interned_anywhere_xyz"), None);
        let s = Symbol::new("insert_slice");
        assert_eq!(Symbol::lookup("insert_slice"), Some(s));
    }

    #[test]
    fn distinct_text_distinct_symbol() {
        assert_ne!(Symbol::new("scf"), Symbol::new("tile"));
    }
}
