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

//! The macro-expansion pass.
//!
//! Rewrites the main file with every macro invocation fully expanded,
//! keeping only the `#include` directives the user actually wrote there.
//! Directives apply positionally: a macro expands with the definitions in
//! effect at its use site, an `#include` merges the header's definitions at
//! the point of inclusion, and conditional blocks are taken or dropped by
//! evaluating their conditions.  Spent `#define`s and the conditionals
//! themselves disappear from the output.

use std::path::Path;

use crate::{
    engine::Options,
    lex::{classify::scan_classified, Token},
    macros::{eval_condition, parse_directive, Directive, Expander, IncludeResolver, MacroCollector},
    pass::{Pass, PassError},
    source::SourceFile,
};

/// One level of `#if`/`#else` nesting.
struct Cond {
    parent_active: bool,
    taken: bool,
    active: bool,
}

pub fn run(file: &SourceFile, options: &Options) -> Result<String, PassError> {
    let text = file.contents();
    let tokens = scan_classified(text).map_err(|e| PassError::scan(Pass::ExpandMacros, file, e))?;

    let resolver = IncludeResolver::new(options.include_dirs.clone());
    let mut collector = MacroCollector::new(&resolver);
    for define in &options.defines {
        collector.predefine(define);
    }
    let dir = file
        .file_name()
        .and_then(|name| Path::new(name.as_str()).parent().map(Path::to_path_buf));

    let mut out = String::with_capacity(text.len());
    let mut pending: Vec<Token> = Vec::new();
    let mut conds: Vec<Cond> = Vec::new();

    let flush = |pending: &mut Vec<Token>, out: &mut String, collector: &MacroCollector| {
        if pending.is_empty() {
            return;
        }
        let expander = Expander::new(&collector.set);
        for token in expander.expand(pending) {
            out.push_str(&token.spelling);
            out.push(' ');
        }
        pending.clear();
    };

    for token in &tokens {
        let active = conds.iter().all(|cond| cond.active);
        if !token.is_pp_line() {
            if active {
                pending.push(token.clone());
            }
            continue;
        }

        flush(&mut pending, &mut out, &collector);
        let directive =
            parse_directive(&token.spelling).map_err(|e| PassError::scan(Pass::ExpandMacros, file, e))?;
        match directive {
            Directive::Define(macro_) => {
                if active {
                    collector.set.define(macro_);
                }
            }
            Directive::Undef(name) => {
                if active {
                    collector.set.undef(&name);
                }
            }
            Directive::Include { path, angled } => {
                if active {
                    // Re-emitted already glued, the form the whitespace pass
                    // would reduce the directive to anyway.
                    if angled {
                        out.push_str(&format!("\n#include<{path}>\n"));
                    } else {
                        out.push_str(&format!("\n#include\"{path}\"\n"));
                    }
                    match resolver.resolve(&path, angled, dir.as_deref()) {
                        Some(header) => collector.collect_file(&header),
                        None => log::debug!("expanding without unresolvable include {path:?}"),
                    }
                }
            }
            Directive::If(condition) => {
                let value = active && eval_condition(&condition, &collector.set);
                conds.push(Cond {
                    parent_active: active,
                    taken: value,
                    active: value,
                });
            }
            Directive::Ifdef(name) => {
                let value = active && collector.set.contains(&name);
                conds.push(Cond {
                    parent_active: active,
                    taken: value,
                    active: value,
                });
            }
            Directive::Ifndef(name) => {
                let value = active && !collector.set.contains(&name);
                conds.push(Cond {
                    parent_active: active,
                    taken: value,
                    active: value,
                });
            }
            Directive::Elif(condition) => {
                if let Some(cond) = conds.last_mut() {
                    cond.active =
                        cond.parent_active && !cond.taken && eval_condition(&condition, &collector.set);
                    cond.taken = cond.taken || cond.active;
                }
            }
            Directive::Else => {
                if let Some(cond) = conds.last_mut() {
                    cond.active = cond.parent_active && !cond.taken;
                    cond.taken = true;
                }
            }
            Directive::Endif => {
                conds.pop();
            }
            Directive::Other => (),
        }
    }
    flush(&mut pending, &mut out, &collector);

    Ok(out)
}

#[cfg(test)]
mod test {
    use std::fs;

    use crate::{engine::Options, source::SourceFile};

    use super::run;

    fn expand(src: &str, options: &Options) -> String {
        let file = SourceFile::new(src.into(), Some("t.c".into()));
        run(&file, options).unwrap()
    }

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_expands_and_drops_define() {
        let out = expand("#define N 10\nint main(){return N;}", &Options::default());
        assert!(!out.contains("#define"));
        assert_eq!(
            words(&out),
            ["int", "main", "(", ")", "{", "return", "10", ";", "}"]
        );
    }

    #[test]
    fn test_keeps_user_includes() {
        let out = expand(
            "#include <stdio.h>\nint main(){return 0;}",
            &Options::default(),
        );
        assert!(out.contains("#include<stdio.h>"));
    }

    #[test]
    fn test_function_like_expansion() {
        let out = expand(
            "#define SQ(x) ((x)*(x))\nint main(){return SQ(3);}",
            &Options::default(),
        );
        assert!(out.contains("( ( 3 ) * ( 3 ) )"));
    }

    #[test]
    fn test_conditionals_selected() {
        let out = expand(
            "#define A 1\n#if A\nint yes;\n#else\nint no;\n#endif\n",
            &Options::default(),
        );
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));

        let out = expand(
            "#ifdef MISSING\nint yes;\n#else\nint no;\n#endif\n",
            &Options::default(),
        );
        assert!(!out.contains("yes"));
        assert!(out.contains("no"));
    }

    #[test]
    fn test_define_applies_from_its_point_on() {
        let out = expand("int before = X;\n#define X 1\nint after = X;", &Options::default());
        let words = words(&out);
        // The first X is untouched, the second expands.
        assert_eq!(words[3], "X");
        assert!(words.iter().skip(4).any(|w| *w == "1"));
    }

    #[test]
    fn test_header_macros_expand_in_main() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("val.h"), "#define VALUE 42\n").unwrap();
        let mut options = Options::default();
        options.include_dirs.push(dir.path().to_path_buf());
        let out = expand(
            "#include <val.h>\nint main(){return VALUE;}",
            &options,
        );
        assert!(out.contains("#include<val.h>"));
        assert!(out.contains("42"));
    }
}
