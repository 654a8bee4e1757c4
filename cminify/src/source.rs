// cminify - a source-to-source minifier for C.
// Copyright (C) 2025 Eliot Hall
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Source revisions and byte-range replacements.
//!
//! Each pass reads one revision of the file being minified and emits a
//! [Replacements] set against it.  Applying the set yields a fresh buffer
//! that is pushed as a new revision onto the [Overlay]; no revision is ever
//! mutated in place, so rolling back is popping the overlay.

use std::{ops::Range, sync::Arc};

use thiserror::Error as ThisError;

use crate::message::{Location, Point};

/// One revision of the file being minified.
#[derive(Clone, Debug)]
pub struct SourceFile {
    file_name: Option<Arc<String>>,
    contents: String,
}

impl SourceFile {
    pub fn new(contents: String, file_name: Option<String>) -> Self {
        Self {
            file_name: file_name.map(Arc::new),
            contents,
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn file_name(&self) -> Option<&Arc<String>> {
        self.file_name.as_ref()
    }

    /// Converts a byte range into a line/column [Location] for diagnostics.
    pub fn location(&self, range: Range<usize>) -> Location {
        let start = Point::start().advance(&self.contents[..range.start]);
        let end = start.advance(&self.contents[range.start..range.end]);
        Location {
            file_name: self.file_name.clone(),
            span: Some(start..end),
        }
    }
}

#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ReplacementError {
    /// Two replacements from the same pass overlap.  This is a defect in the
    /// pass that emitted them.
    #[error("Replacement of bytes {}..{} overlaps an existing replacement of bytes {}..{}.",
            added.start, added.end, existing.start, existing.end)]
    Overlap {
        added: Range<usize>,
        existing: Range<usize>,
    },

    /// A replacement lies outside the file.
    #[error("Replacement of bytes {}..{} is outside the file ({len} bytes).",
            range.start, range.end)]
    OutOfBounds { range: Range<usize>, len: usize },
}

/// A single byte-range edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub range: Range<usize>,
    pub text: String,
}

impl Replacement {
    pub fn new(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

/// A conflict-free set of replacements, kept sorted by start offset.
#[derive(Debug, Default)]
pub struct Replacements(Vec<Replacement>);

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
        self.0.iter()
    }

    /// Adds `replacement`, rejecting any overlap with one already present.
    /// Replacements may touch but not intersect; two insertions at the same
    /// point conflict.
    pub fn add(&mut self, replacement: Replacement) -> Result<(), ReplacementError> {
        let index = self
            .0
            .partition_point(|existing| existing.range.start < replacement.range.start);
        if let Some(next) = self.0.get(index) {
            let disjoint = replacement.range.end <= next.range.start
                && !(replacement.range.start == next.range.start
                    && replacement.range.is_empty()
                    && next.range.is_empty());
            if !disjoint {
                return Err(ReplacementError::Overlap {
                    added: replacement.range,
                    existing: next.range.clone(),
                });
            }
        }
        if index > 0 {
            let prev = &self.0[index - 1];
            if prev.range.end > replacement.range.start {
                return Err(ReplacementError::Overlap {
                    added: replacement.range,
                    existing: prev.range.clone(),
                });
            }
        }
        self.0.insert(index, replacement);
        Ok(())
    }

    /// Applies the set to `source`, returning a freshly owned buffer.
    pub fn apply(&self, source: &str) -> Result<String, ReplacementError> {
        let mut result = String::with_capacity(source.len());
        let mut pos = 0;
        for replacement in &self.0 {
            if replacement.range.end > source.len() {
                return Err(ReplacementError::OutOfBounds {
                    range: replacement.range.clone(),
                    len: source.len(),
                });
            }
            result.push_str(&source[pos..replacement.range.start]);
            result.push_str(&replacement.text);
            pos = replacement.range.end;
        }
        result.push_str(&source[pos..]);
        Ok(result)
    }
}

/// The stack of revisions of the file being minified.  The top is what the
/// next pass sees.
pub struct Overlay {
    file_name: Option<Arc<String>>,
    revisions: Vec<String>,
}

impl Overlay {
    pub fn new(file: SourceFile) -> Self {
        Self {
            file_name: file.file_name,
            revisions: vec![file.contents],
        }
    }

    /// The current revision as a [SourceFile].
    pub fn current(&self) -> SourceFile {
        SourceFile {
            file_name: self.file_name.clone(),
            contents: self.revisions.last().unwrap().clone(),
        }
    }

    pub fn current_contents(&self) -> &str {
        self.revisions.last().unwrap()
    }

    /// Shadows the file with new contents.
    pub fn push(&mut self, contents: String) {
        self.revisions.push(contents);
    }

    /// Rolls back to the previous revision.  The initial revision cannot be
    /// popped.
    pub fn pop(&mut self) -> Option<String> {
        if self.revisions.len() > 1 {
            self.revisions.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.revisions.len()
    }
}

#[cfg(test)]
mod test {
    use super::{Overlay, Replacement, ReplacementError, Replacements, SourceFile};

    #[test]
    fn test_apply_in_order() {
        let mut replacements = Replacements::new();
        replacements.add(Replacement::new(8..11, "b")).unwrap();
        replacements.add(Replacement::new(4..7, "a")).unwrap();
        assert_eq!(replacements.apply("int foo=bar;").unwrap(), "int a=b;");
    }

    #[test]
    fn test_overlap_rejected() {
        let mut replacements = Replacements::new();
        replacements.add(Replacement::new(0..4, "x")).unwrap();
        assert!(matches!(
            replacements.add(Replacement::new(2..6, "y")),
            Err(ReplacementError::Overlap { .. })
        ));
        // Touching ranges are fine.
        replacements.add(Replacement::new(4..6, "z")).unwrap();
    }

    #[test]
    fn test_out_of_bounds() {
        let mut replacements = Replacements::new();
        replacements.add(Replacement::new(10..20, "x")).unwrap();
        assert!(matches!(
            replacements.apply("short"),
            Err(ReplacementError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_overlay() {
        let mut overlay = Overlay::new(SourceFile::new("v0".into(), None));
        overlay.push("v1".into());
        assert_eq!(overlay.current_contents(), "v1");
        assert_eq!(overlay.pop().as_deref(), Some("v1"));
        assert_eq!(overlay.current_contents(), "v0");
        assert_eq!(overlay.pop(), None);
    }

    #[test]
    fn test_location() {
        let file = SourceFile::new("int a;\nint foo;\n".into(), Some("t.c".into()));
        let location = file.location(11..14);
        assert_eq!(location.to_string(), "t.c:2.5-7");
    }
}
