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

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Range;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier.
    Identifier,

    /// C keyword.
    Keyword,

    /// Operator or punctuator.
    Punct,

    /// Number, character constant, or string literal.
    Literal,

    /// A whole `#`-introduced directive line, collapsed into one token by the
    /// classifier.  The spelling carries a leading and a trailing newline.
    PpLine,

    /// `<...>` after `include`, only produced when re-scanning the interior
    /// of a directive line.
    HeaderName,

    /// End of input.  Never stored in token streams; used as a parser
    /// sentinel.
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,

    /// Exact source bytes, except for preprocessor-line tokens, whose
    /// spelling is the aggregate described in [TokenKind::PpLine].
    pub spelling: String,

    /// Whether this token is the first non-whitespace on its line.
    pub at_line_start: bool,

    /// Half-open byte range in the source the token was lexed from.
    pub range: Range<usize>,
}

impl Token {
    pub fn is_punct(&self) -> bool {
        self.kind == TokenKind::Punct
    }

    pub fn is_pp_line(&self) -> bool {
        self.kind == TokenKind::PpLine
    }

    /// True for the tokens that need a separating byte from an adjacent token
    /// of the same sort: identifiers, keywords, and literals.
    pub fn is_id_like(&self) -> bool {
        !matches!(self.kind, TokenKind::Punct | TokenKind::PpLine)
    }

    pub fn is_id(&self, spelling: &str) -> bool {
        self.kind == TokenKind::Identifier && self.spelling == spelling
    }

    pub fn is_punct_spelled(&self, spelling: &str) -> bool {
        self.kind == TokenKind::Punct && self.spelling == spelling
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.spelling)
    }
}
