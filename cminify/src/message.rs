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

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::Range,
    sync::Arc,
};

use unicode_width::UnicodeWidthStr;

/// A line number and optional column number within a source file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Point {
    /// 1-based line number.
    pub line: i32,

    /// 1-based column number, measured by rendered width as given by the
    /// `unicode_width` crate.
    pub column: Option<i32>,
}

impl Point {
    /// The first byte of a file.
    pub fn start() -> Self {
        Self {
            line: 1,
            column: Some(1),
        }
    }

    /// Takes `point`, adds to it the text in `text`, incrementing the line
    /// number for each new-line and the column number for each column, and
    /// returns the result.
    pub fn advance(&self, text: &str) -> Self {
        let mut result = *self;
        for line in text.split_inclusive('\n') {
            if line.ends_with('\n') {
                result.line += 1;
                result.column = Some(1);
            } else {
                result.column = result.column.map(|column| column + line.width() as i32);
            }
        }
        result
    }
}

/// Location relevant to a diagnostic message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// File name, if any.
    pub file_name: Option<Arc<String>>,

    /// Starting and ending point, if any.
    pub span: Option<Range<Point>>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && self.span.is_none()
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(file_name) = &self.file_name {
            write!(f, "{}", file_name)?;
        }

        if let Some(span) = &self.span {
            if self.file_name.is_some() {
                write!(f, ":")?;
            }
            let l1 = span.start.line;
            let l2 = span.end.line;
            match (span.start.column.zip(span.end.column), l2 > l1) {
                (Some((c1, c2)), true) => write!(f, "{l1}.{c1}-{l2}.{}", c2 - 1)?,
                (Some((c1, c2)), false) if c2 > c1 + 1 => write!(f, "{l1}.{c1}-{}", c2 - 1)?,
                (Some((c1, _)), false) => write!(f, "{l1}.{c1}")?,
                (None, true) => write!(f, "{l1}-{l2}")?,
                (None, false) => write!(f, "{l1}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{Location, Point};

    #[test]
    fn test_advance() {
        let p = Point::start().advance("int main()");
        assert_eq!(
            p,
            Point {
                line: 1,
                column: Some(11)
            }
        );
        let p = p.advance("{\n  return 0;");
        assert_eq!(
            p,
            Point {
                line: 2,
                column: Some(13)
            }
        );
    }

    #[test]
    fn test_display() {
        let location = Location {
            file_name: Some(Arc::new(String::from("hello.c"))),
            span: Some(
                Point {
                    line: 3,
                    column: Some(5),
                }..Point {
                    line: 3,
                    column: Some(6),
                },
            ),
        };
        assert_eq!(location.to_string(), "hello.c:3.5");
    }
}
