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

//! The identifier-minification pass.
//!
//! Walks the parser's event stream in source order, driving the minting
//! scope stack: declarations the main file owns get the shortest name free
//! in their scope, and every resolved reference is rewritten to match.
//! `main` keeps its name, external names are reserved and left verbatim, and
//! tags without a main-file definition (they belong to headers) keep theirs.

use std::collections::HashSet;
use std::ops::Range;

use crate::{
    lex::classify::scan_classified,
    parse::{parse, Event},
    pass::{Pass, PassError},
    scope::ScopeStack,
    source::{Replacement, Replacements, SourceFile},
};

pub struct MinifyOutcome {
    pub replacements: Replacements,

    /// First name index the define-introduction pass may mint from: one past
    /// the largest index used in any scope.
    pub next_symbol: u64,
}

pub fn run(file: &SourceFile, macro_names: &HashSet<String>) -> Result<MinifyOutcome, PassError> {
    let text = file.contents();
    let tokens =
        scan_classified(text).map_err(|e| PassError::scan(Pass::MinifyIdentifiers, file, e))?;
    let out = parse(&tokens).map_err(|e| PassError::parse(Pass::MinifyIdentifiers, file, e))?;

    // The ledger: names the generator must never produce.  The entry point's
    // name is always in it, and the parser's external and poisoned-member
    // names join before anything is minted.
    let mut reserved: HashSet<String> = HashSet::new();
    reserved.insert("main".into());
    reserved.extend(out.external_decls.iter().cloned());
    reserved.extend(out.external_types.iter().cloned());
    reserved.extend(out.unresolved_members.iter().cloned());

    let mut stack = ScopeStack::new(text.len(), &reserved, macro_names);
    for name in &out.external_decls {
        stack.register_external_decl(name);
    }
    for name in &out.external_types {
        stack.register_external_type(name);
    }

    let mut replacements = Replacements::new();
    let rename = |replacements: &mut Replacements,
                      range: &Range<usize>,
                      name: &str|
     -> Result<(), PassError> {
        if &text[range.clone()] != name {
            replacements
                .add(Replacement::new(range.clone(), name))
                .map_err(|e| PassError::replacement(Pass::MinifyIdentifiers, e))?;
        }
        Ok(())
    };

    for event in &out.events {
        match event {
            Event::EnumDecl { tag, name, range } | Event::RecordDecl { tag, name, range } => {
                if out.tags_defined[tag.0 as usize] {
                    let minted = stack.add_type(*tag, range.start);
                    rename(&mut replacements, range, &minted)?;
                } else {
                    stack.register_external_type(name);
                }
            }
            Event::RecordBody { end } => stack.push_fresh(*end),
            Event::Field { decl, name, range } => {
                if out.unresolved_members.contains(name.as_str()) {
                    // An access to this name went unbound somewhere; renaming
                    // the field could split it from that use.
                    continue;
                }
                let minted = stack.add_decl(*decl, range.start);
                rename(&mut replacements, range, &minted)?;
            }
            Event::EnumConstant { decl, range, .. }
            | Event::Typedef { decl, range, .. }
            | Event::Var { decl, range, .. } => {
                let minted = stack.add_decl(*decl, range.start);
                rename(&mut replacements, range, &minted)?;
            }
            Event::Function {
                decl,
                name,
                range,
                end,
            } => {
                if name != "main" {
                    let minted = stack.add_decl(*decl, range.start);
                    rename(&mut replacements, range, &minted)?;
                }
                stack.push_inheriting(*end);
            }
            Event::Compound { end } => stack.push_inheriting(*end),
            Event::DeclRef { decl, range } | Event::MemberRef { decl, range } => {
                if let Some(name) = stack.lookup_decl(*decl) {
                    let name = name.clone();
                    rename(&mut replacements, range, &name)?;
                }
            }
            Event::TypeRef { tag, range } => {
                if let Some(name) = stack.lookup_type(*tag) {
                    let name = name.clone();
                    rename(&mut replacements, range, &name)?;
                }
            }
            Event::TypedefRef { decl, range } => {
                if let Some(name) = stack.lookup_decl(*decl) {
                    let name = name.clone();
                    rename(&mut replacements, range, &name)?;
                }
            }
        }
    }

    Ok(MinifyOutcome {
        replacements,
        next_symbol: stack.high_water(),
    })
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::source::SourceFile;

    use super::run;

    #[track_caller]
    fn check_minify(input: &str, expected: &str) {
        let file = SourceFile::new(input.into(), Some("t.c".into()));
        let outcome = run(&file, &HashSet::new()).unwrap();
        let result = outcome.replacements.apply(input).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_rename_with_shadowing() {
        // The function takes index 0; its parameter inherits the counter, so
        // nothing visible ever collides.
        check_minify(
            "int foo(int bar){int baz=bar;return baz;}int main(){return foo(3);}",
            "int a(int b){int c=b;return c;}int main(){return a(3);}",
        );
    }

    #[test]
    fn test_enum_and_tag() {
        // Tags share one counter; the struct body is a fresh namespace; the
        // function body continues the file-scope declaration counter.
        check_minify(
            "enum E{X,Y}; struct S{int v;}; int main(){enum E e=X; struct S s={.v=1}; return s.v+e;}",
            "enum a{a,b}; struct b{int a;}; int main(){enum a c=a; struct b d={.a=1}; return d.a+c;}",
        );
    }

    #[test]
    fn test_scope_reuse_across_functions() {
        check_minify(
            "int f(void){int x=1;return x;}int g(void){int y=2;return y;}",
            "int a(void){int b=1;return b;}int b(void){int c=2;return c;}",
        );
    }

    #[test]
    fn test_main_is_kept_exactly() {
        // Only the exact, case-sensitive spelling `main` is protected.
        check_minify(
            "int Main(int x){return x;}int main(){return Main(1);}",
            "int a(int b){return b;}int main(){return a(1);}",
        );
    }

    #[test]
    fn test_externals_left_verbatim() {
        let input = "int main(){printf(\"hi\");return 0;}";
        check_minify(input, input);
    }

    #[test]
    fn test_external_name_not_minted() {
        // `a` is referenced but not declared, so it is external and the
        // local must skip it.
        check_minify(
            "int main(){int x=a;return x;}",
            "int main(){int b=a;return b;}",
        );
    }

    #[test]
    fn test_forward_declaration_collapses() {
        check_minify(
            "int twice(int);int twice(int n){return n+n;}int main(){return twice(2);}",
            "int a(int);int a(int b){return b+b;}int main(){return a(2);}",
        );
    }

    #[test]
    fn test_typedef_renamed() {
        check_minify(
            "typedef unsigned long ulong_t; ulong_t n=4; int main(){return (int)n;}",
            "typedef unsigned long a; a b=4; int main(){return (int)b;}",
        );
    }

    #[test]
    fn test_undefined_tag_kept() {
        // `struct tm` has no definition here, so it belongs to a header and
        // keeps its tag.
        check_minify(
            "int main(){struct tm *t; t = 0; return 0;}",
            "int main(){struct tm *a; a = 0; return 0;}",
        );
    }

    #[test]
    fn test_macro_names_reserved() {
        let macros: HashSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        let file = SourceFile::new("int xyz=1;int main(){return xyz;}".into(), None);
        let outcome = run(&file, &macros).unwrap();
        let result = outcome
            .replacements
            .apply("int xyz=1;int main(){return xyz;}")
            .unwrap();
        assert_eq!(result, "int c=1;int main(){return c;}");
    }

    #[test]
    fn test_next_symbol_covers_all_scopes() {
        let file = SourceFile::new(
            "int f(int p){int q=p;return q;}int main(){return f(1);}".into(),
            None,
        );
        let outcome = run(&file, &HashSet::new()).unwrap();
        // f=0, p=1, q=2; the high-water mark is one past the largest.
        assert_eq!(outcome.next_symbol, 3);
    }
}
