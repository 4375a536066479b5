//! Source positions carried by operations, blocks and regions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::refs::PathRef;
use crate::types::PathInterner;

/// Half-open byte range `start..end` in a source file.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A [`Span`] in an interned file path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: PathRef,
    pub span: Span,
}

impl Location {
    pub const fn new(path: PathRef, span: Span) -> Self {
        Self { path, span }
    }

    /// Render as `path:start..end`, resolving the path through `paths`.
    pub fn display(self, paths: &PathInterner) -> impl fmt::Display + '_ {
        DisplayLocation {
            paths,
            path: self.path,
            span: self.span,
        }
    }
}

struct DisplayLocation<'a> {
    paths: &'a PathInterner,
    path: PathRef,
    span: Span,
}

impl fmt::Display for DisplayLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Span { start, end } = self.span;
        write!(f, "{}:{start}..{end}", self.paths.get(self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_path_and_range() {
        let mut paths = PathInterner::new();
        let path = paths.intern("kernels/fill.tsr".to_owned());
        let loc = Location::new(path, Span::new(12, 40));
        assert_eq!(loc.display(&paths).to_string(), "kernels/fill.tsr:12..40");
    }
}
