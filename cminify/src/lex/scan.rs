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

//! The raw scanner.
//!
//! Turns C source text into [Token]s with exact spellings and byte ranges.
//! Comments and whitespace are skipped; each token records whether it was the
//! first non-whitespace on its line, which is what the classifier and the
//! whitespace pass key on.  Numbers are lexed as preprocessing numbers, so
//! `1.5e-3` is a single literal.

use thiserror::Error as ThisError;

use crate::identifier::{is_keyword, IdentifierChar};

use super::{Token, TokenKind};

#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ScanError {
    /// Unterminated block comment.
    #[error("Unterminated /* comment.")]
    UnterminatedComment { offset: usize },

    /// Unterminated string or character literal.
    #[error("Unterminated {quote}...{quote} literal.")]
    UnterminatedLiteral { quote: char, offset: usize },

    /// A byte that cannot begin any C token.
    #[error("Unexpected character {c:?} in input.")]
    UnexpectedChar { c: char, offset: usize },
}

impl ScanError {
    /// Byte offset the error was detected at.
    pub fn offset(&self) -> usize {
        match self {
            Self::UnterminatedComment { offset }
            | Self::UnterminatedLiteral { offset, .. }
            | Self::UnexpectedChar { offset, .. } => *offset,
        }
    }
}

/// Multi-character punctuators, longest first so that a prefix match is a
/// maximal munch.
const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=",
    "-=", "*=", "/=", "%=", "&=", "^=", "|=", "##", "[", "]", "(", ")", "{", "}", ".", "&", "*",
    "+", "-", "~", "!", "/", "%", "<", ">", "^", "|", "?", ":", ";", "=", ",", "#",
];

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    at_line_start: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            at_line_start: true,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace and comments, maintaining the line-start flag.  A
    /// comment that spans a newline leaves the next token at line start.
    fn skip_trivia(&mut self) -> Result<(), ScanError> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.at_line_start = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                // A backslash-newline splice continues the logical line, so
                // it must not set the line-start flag.
                Some('\\') if self.rest()[1..].starts_with('\n') => {
                    self.pos += 2;
                }
                Some('\\') if self.rest()[1..].starts_with("\r\n") => {
                    self.pos += 3;
                }
                Some('/') if self.rest().starts_with("//") => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.rest().starts_with("/*") => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.rest().find("*/") {
                        Some(end) => {
                            if self.rest()[..end].contains('\n') {
                                self.at_line_start = true;
                            }
                            self.pos += end + 2;
                        }
                        None => {
                            return Err(ScanError::UnterminatedComment { offset: start });
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Lexes the body of a string or character literal whose opening quote is
    /// at the current position.
    fn scan_literal_body(&mut self, quote: char) -> Result<(), ScanError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => return Ok(()),
                Some('\n') | None => {
                    return Err(ScanError::UnterminatedLiteral {
                        quote,
                        offset: start,
                    });
                }
                Some(_) => (),
            }
        }
    }

    fn scan_number(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, 'e' | 'E' | 'p' | 'P') {
                self.bump();
                if let Some('+' | '-') = self.peek() {
                    self.bump();
                }
            } else if c.may_continue_id() || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<Option<Token>, ScanError> {
        self.skip_trivia()?;
        let start = self.pos;
        let at_line_start = self.at_line_start;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = if c.may_start_id() {
            while self.peek().is_some_and(|c| c.may_continue_id()) {
                self.bump();
            }
            // Wide and Unicode string/char prefixes glue onto the literal.
            let id = &self.src[start..self.pos];
            if matches!(id, "L" | "u" | "U" | "u8")
                && let Some(quote @ ('"' | '\'')) = self.peek()
            {
                self.scan_literal_body(quote)?;
                TokenKind::Literal
            } else if is_keyword(id) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        } else if c.is_ascii_digit()
            || (c == '.' && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            self.bump();
            self.scan_number();
            TokenKind::Literal
        } else if c == '"' || c == '\'' {
            self.scan_literal_body(c)?;
            TokenKind::Literal
        } else if let Some(punct) = PUNCTUATORS.iter().find(|p| self.rest().starts_with(**p)) {
            self.pos += punct.len();
            TokenKind::Punct
        } else {
            return Err(ScanError::UnexpectedChar {
                c,
                offset: self.pos,
            });
        };

        self.at_line_start = false;
        Ok(Some(Token {
            kind,
            spelling: self.src[start..self.pos].into(),
            at_line_start,
            range: start..self.pos,
        }))
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.token().transpose()
    }
}

/// Scans all of `src` into a token vector.
pub fn scan(src: &str) -> Result<Vec<Token>, ScanError> {
    Scanner::new(src).collect()
}

#[cfg(test)]
mod test {
    use crate::lex::TokenKind;

    use super::{scan, ScanError};

    #[track_caller]
    fn check_spellings(input: &str, expected: &[&str]) {
        let tokens = scan(input).unwrap();
        let spellings = tokens.iter().map(|t| t.spelling.as_str()).collect::<Vec<_>>();
        if spellings != expected {
            for result in diff::slice(expected, &spellings) {
                match result {
                    diff::Result::Left(left) => eprintln!("-{left:?}"),
                    diff::Result::Both(left, _) => eprintln!(" {left:?}"),
                    diff::Result::Right(right) => eprintln!("+{right:?}"),
                }
            }
            panic!("token spellings differ from expected");
        }
    }

    #[test]
    fn test_identifiers_and_keywords() {
        let tokens = scan("int x_1 = frob2u;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].spelling, "x_1");
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
        assert_eq!(tokens[4].kind, TokenKind::Punct);
    }

    #[test]
    fn test_maximal_munch() {
        check_spellings("a+++b", &["a", "++", "+", "b"]);
        check_spellings("x<<=2", &["x", "<<=", "2"]);
        check_spellings("f(a,...)", &["f", "(", "a", ",", "...", ")"]);
        check_spellings("p->q--", &["p", "->", "q", "--"]);
    }

    #[test]
    fn test_numbers() {
        check_spellings("1.5e-3+.25f-0x1p+2", &["1.5e-3", "+", ".25f", "-", "0x1p+2"]);
    }

    #[test]
    fn test_literals() {
        check_spellings(
            r#"printf("a\"b%d\n",'\'')"#,
            &["printf", "(", r#""a\"b%d\n""#, ",", r#"'\''"#, ")"],
        );
        check_spellings(r#"L"wide" u8"narrow""#, &[r#"L"wide""#, r#"u8"narrow""#]);
    }

    #[test]
    fn test_comments_and_line_starts() {
        let tokens = scan("int a; // trailing\n/* multi\nline */ int b;").unwrap();
        let spellings = tokens.iter().map(|t| t.spelling.as_str()).collect::<Vec<_>>();
        assert_eq!(spellings, ["int", "a", ";", "int", "b", ";"]);
        assert!(tokens[0].at_line_start);
        assert!(!tokens[1].at_line_start);
        // The block comment spans a newline, so `int b;` is at line start.
        assert!(tokens[3].at_line_start);
    }

    #[test]
    fn test_ranges() {
        let src = "ab  cd";
        let tokens = scan(src).unwrap();
        assert_eq!(&src[tokens[0].range.clone()], "ab");
        assert_eq!(&src[tokens[1].range.clone()], "cd");
    }

    #[test]
    fn test_line_splice() {
        // Backslash-newline continues the logical line, so the continuation
        // is not at line start and a spliced directive stays one line.
        let tokens = scan("#define TWO \\\n 2\nint x;").unwrap();
        let two = tokens.iter().find(|t| t.spelling == "2").unwrap();
        assert!(!two.at_line_start);
        let int = tokens.iter().find(|t| t.spelling == "int").unwrap();
        assert!(int.at_line_start);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            scan("a /* b"),
            Err(ScanError::UnterminatedComment { offset: 2 })
        );
        assert_eq!(
            scan("\"oops\nmore\""),
            Err(ScanError::UnterminatedLiteral {
                quote: '"',
                offset: 0
            })
        );
        assert!(matches!(
            scan("a @ b"),
            Err(ScanError::UnexpectedChar { c: '@', .. })
        ));
    }
}
