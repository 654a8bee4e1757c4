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

//! The whitespace-minimization pass.
//!
//! Re-lexes the file raw (directives are ordinary tokens here) and rewrites
//! every inter-token gap to the minimum: nothing next to a punctuator, one
//! space between identifier-like neighbors, newlines only where a directive
//! line begins or ends.  Two guards keep the token stream identical: the ISO
//! C99 rule that an object-like macro's name be followed by whitespace, and
//! a re-lex check that deleting a gap would not glue two tokens into one
//! (`x - -y` must not become `x--y`, nor `x / *p` a comment).

use std::collections::VecDeque;

use crate::{
    lex::{
        scan::{scan, Scanner},
        Token, TokenKind,
    },
    pass::{Pass, PassError},
    source::{Replacement, Replacements, SourceFile},
};

/// True when deleting the gap between `prev` and `cur` leaves them two
/// separate tokens.
fn glues_cleanly(prev: &Token, cur: &Token) -> bool {
    let joined = format!("{}{}", prev.spelling, cur.spelling);
    let mut scanner = Scanner::new(&joined);
    let Some(Ok(first)) = scanner.next() else {
        return false;
    };
    let Some(Ok(second)) = scanner.next() else {
        return false;
    };
    first.spelling == prev.spelling && second.spelling == cur.spelling && scanner.next().is_none()
}

/// Is the window `#`, `define`, identifier — the prefix of an object-like
/// macro definition whose name must keep a following space?
fn at_define_name(window: &VecDeque<Token>, in_pp: bool) -> bool {
    in_pp
        && window.len() == 3
        && window[0].at_line_start
        && window[0].is_punct_spelled("#")
        && window[1].is_id("define")
        && window[2].kind == TokenKind::Identifier
}

pub fn run(file: &SourceFile) -> Result<Replacements, PassError> {
    let text = file.contents();
    let tokens = scan(text).map_err(|e| PassError::scan(Pass::FormatWhitespace, file, e))?;

    let mut replacements = Replacements::new();
    let mut edit = |range: std::ops::Range<usize>, new: &str| -> Result<(), PassError> {
        if &text[range.clone()] != new {
            replacements
                .add(Replacement::new(range, new))
                .map_err(|e| PassError::replacement(Pass::FormatWhitespace, e))?;
        }
        Ok(())
    };

    let mut window: VecDeque<Token> = VecDeque::with_capacity(4);
    let mut prev: Option<Token> = None;
    let mut prev_end = 0;
    let mut in_pp = false;

    for token in &tokens {
        let gap = prev_end..token.range.start;
        let starts_pp = token.at_line_start && token.is_punct_spelled("#");

        match &prev {
            None => edit(gap, "")?,
            Some(prev) => {
                if starts_pp || (in_pp && token.at_line_start) {
                    if in_pp && token.at_line_start {
                        in_pp = false;
                    }
                    edit(gap, "\n")?;
                } else if prev.is_punct() || token.is_punct() {
                    if in_pp && token.is_punct() && !gap.is_empty() && at_define_name(&window, in_pp)
                    {
                        // `#define X (…)` must not collapse into a
                        // function-like `#define X(…)`.
                        edit(gap, " ")?;
                    } else if glues_cleanly(prev, token) {
                        edit(gap, "")?;
                    } else {
                        edit(gap, " ")?;
                    }
                } else {
                    edit(gap, " ")?;
                }
            }
        }

        window.push_back(token.clone());
        while window.len() > 3 {
            window.pop_front();
        }
        prev_end = token.range.end;
        in_pp = in_pp || starts_pp;
        prev = Some(token.clone());
    }

    // Trailing whitespace goes too.
    edit(prev_end..text.len(), "")?;
    Ok(replacements)
}

#[cfg(test)]
mod test {
    use crate::lex::scan::scan;
    use crate::source::SourceFile;

    use super::run;

    #[track_caller]
    fn check_format(input: &str, expected: &str) {
        let file = SourceFile::new(input.into(), None);
        let replacements = run(&file).unwrap();
        let result = replacements.apply(input).unwrap();
        assert_eq!(result, expected);

        // Whatever the rewrite did, the token stream is unchanged.
        let before: Vec<String> = scan(input).unwrap().into_iter().map(|t| t.spelling).collect();
        let after: Vec<String> = scan(&result)
            .unwrap()
            .into_iter()
            .map(|t| t.spelling)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_basic_collapse() {
        check_format(
            "int  main ( void )\n{\n    return 0 ;\n}\n",
            "int main(void){return 0;}",
        );
    }

    #[test]
    fn test_define_keeps_name_space() {
        check_format(
            "#define FOO (x+1)\nint a = FOO ;",
            "#define FOO (x+1)\nint a=FOO;",
        );
    }

    #[test]
    fn test_function_like_define_stays_glued() {
        // Only the name of an *object-like* macro needs its space; after a
        // parameter list the replacement list may touch the `)`.
        check_format(
            "#define SQ(x) ( (x) * (x) )\nint b = SQ( 2 ) ;",
            "#define SQ(x)((x)*(x))\nint b=SQ(2);",
        );
    }

    #[test]
    fn test_newlines_only_around_directives() {
        check_format(
            "int a ;\n#include <stdio.h>\nint  b ;",
            "int a;\n#include<stdio.h>\nint b;",
        );
    }

    #[test]
    fn test_adjacent_punctuators_that_would_merge() {
        check_format("int c = a - -b ;", "int c=a- -b;");
        check_format("int d = a / *p ;", "int d=a/ *p;");
        check_format("int e = a + + b ;", "int e=a+ +b;");
    }

    #[test]
    fn test_comments_removed() {
        check_format(
            "int a ; /* gone */ int b ; // also gone\n",
            "int a;int b;",
        );
    }

    #[test]
    fn test_no_adjacent_whitespace_outside_directives() {
        let input = "int   x ;\n\n#define  N  10\nint  y  =  N ;\n";
        let file = SourceFile::new(input.into(), None);
        let result = run(&file).unwrap().apply(input).unwrap();
        let mut in_pp_line = false;
        let mut prev_ws = false;
        for c in result.chars() {
            if c == '#' {
                in_pp_line = true;
            }
            if c == '\n' {
                in_pp_line = false;
            }
            let ws = c == ' ' || c == '\t';
            assert!(!(ws && prev_ws) || in_pp_line, "{result:?}");
            prev_ws = ws;
        }
    }

    #[test]
    fn test_output_never_longer() {
        for input in [
            "int  main ( )  { return  1 ; }",
            "#define A 1\n#define B 2\nint x = A + B ;",
            "x - -y; a+ +b;",
        ] {
            let file = SourceFile::new(input.to_string(), None);
            let result = run(&file).unwrap().apply(input).unwrap();
            assert!(result.len() <= input.len(), "{result:?}");
        }
    }
}
