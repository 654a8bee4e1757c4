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

//! The token classifier.
//!
//! Collapses every `#`-introduced directive line into one synthetic
//! preprocessor-line token whose spelling is `\n` + the directive's tokens +
//! `\n`, with a single space wherever the original line had any whitespace
//! between two tokens.  Downstream passes treat that token as opaque: it can
//! never be split, renamed, or pulled into a `#define` body.

use super::{
    scan::{ScanError, Scanner},
    Token, TokenKind,
};

/// Collapses directive lines in `tokens` into preprocessor-line tokens.
pub fn classify(tokens: Vec<Token>) -> Vec<Token> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token.at_line_start && token.is_punct_spelled("#") {
            let start = token.range.start;
            let mut end = token.range.end;
            let mut spelling = String::from("\n#");
            let mut prev_end = token.range.end;
            while let Some(inner) = iter.peek() {
                if inner.at_line_start {
                    break;
                }
                if inner.range.start != prev_end {
                    spelling.push(' ');
                }
                spelling.push_str(&inner.spelling);
                prev_end = inner.range.end;
                end = inner.range.end;
                iter.next();
            }
            spelling.push('\n');
            result.push(Token {
                kind: TokenKind::PpLine,
                spelling,
                at_line_start: true,
                range: start..end,
            });
        } else {
            result.push(token);
        }
    }
    result
}

/// Scans and classifies `src` in one step.
pub fn scan_classified(src: &str) -> Result<Vec<Token>, ScanError> {
    Ok(classify(super::scan::scan(src)?))
}

/// Re-scans the interior text of a directive line (without its newlines),
/// lexing `<...>` after `include` as a single header-name token.
pub fn scan_directive(line: &str) -> Result<Vec<Token>, ScanError> {
    let mut tokens = Vec::new();
    let mut scanner = Scanner::new(line);
    let mut after_include = false;
    while let Some(token) = scanner.next() {
        let token = token?;
        if after_include && token.is_punct_spelled("<") {
            let start = token.range.start;
            let mut end = token.range.end;
            let mut spelling = String::from("<");
            for inner in scanner.by_ref() {
                let inner = inner?;
                spelling.push_str(&inner.spelling);
                end = inner.range.end;
                if inner.is_punct_spelled(">") {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::HeaderName,
                spelling,
                at_line_start: false,
                range: start..end,
            });
            after_include = false;
            continue;
        }
        after_include = token.is_id("include");
        tokens.push(token);
    }
    Ok(tokens)
}
