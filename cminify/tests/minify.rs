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

//! Whole-pipeline tests over realistic programs.

use cminify::{
    engine::{Engine, Options},
    lex::scan::scan,
    source::SourceFile,
};

const HELLO: &str = "\
#include <stdio.h>

int main(void)
{
    printf(\"hello world\\n\");
    return 0;
}
";

const FIB: &str = "\
#include <stdio.h>

int fibonacci(int position)
{
    if (position < 2)
        return position;
    return fibonacci(position - 1) + fibonacci(position - 2);
}

int main(void)
{
    for (int index = 0; index < 10; index++)
        printf(\"%d\\n\", fibonacci(index));
    return 0;
}
";

const STRUCTS: &str = "\
#include <stdio.h>

enum color { RED, GREEN, BLUE };

struct point {
    int x;
    int y;
    enum color shade;
};

struct point make_point(int x, int y)
{
    struct point result = {.x = x, .y = y, .shade = GREEN};
    return result;
}

int main(void)
{
    struct point origin = make_point(0, 0);
    struct point other = {.x = 3, .y = 4, .shade = BLUE};
    printf(\"%d %d %d\\n\", origin.x, other.y, other.shade);
    return 0;
}
";

const XXD: &str = "\
#include <stdio.h>
#include <stdlib.h>
#include <unistd.h>
#include <fcntl.h>
#include <ctype.h>

int main(int argc, char *argv[])
{
    int file = 0;
    if (argc == 2)
        file = open(argv[1], O_RDONLY);

    int good = 1;
    char buf[16];
    char *cur = buf;
    int remaining = 16;
    int r;
    int execution_num = 0;

    while (good)
    {
        r = read(file, cur, remaining);
        if (r == -1)
            exit(2);
        cur += r;
        remaining -= r;
        if (remaining == 0 || (r == 0 && remaining != 16))
        {
            printf(\"%08x    \", execution_num);
            execution_num += 16;
            for (int j = 0; j < 16; ++j)
            {
                if (j < 16 - remaining)
                    printf(\"%02hhx\", buf[j]);
                else
                    printf(\"  \");
                if (j % 2 != 0)
                    printf(\" \");
            }
            printf(\"    \");
            for (int j = 0; j < 16; ++j)
            {
                if (j < 16 - remaining)
                {
                    if (isprint(buf[j]))
                        printf(\"%c\", buf[j]);
                    else
                        printf(\".\");
                }
                else
                    printf(\" \");
            }
            cur = buf;
            remaining = 16;
            printf(\"\\n\");
        }
        good = r != 0;
    }
}
";

fn minify(src: &str) -> String {
    Engine::new(Options::default())
        .run(SourceFile::new(src.into(), Some("input.c".into())))
        .unwrap()
}

/// External (header-declared) names that must survive minification exactly.
#[track_caller]
fn check_survivors(output: &str, names: &[&str]) {
    let spellings: Vec<String> = scan(output)
        .unwrap()
        .into_iter()
        .map(|t| t.spelling)
        .collect();
    for name in names {
        assert!(
            spellings.iter().any(|s| s == name),
            "{name} missing from {output:?}"
        );
    }
}

#[test]
fn test_hello_world() {
    let out = minify(HELLO);
    assert!(out.len() < HELLO.len());
    check_survivors(&out, &["printf", "main"]);
    assert!(out.contains("#include<stdio.h>"));
    assert!(out.contains("\"hello world\\n\""));
}

#[test]
fn test_fibonacci() {
    let out = minify(FIB);
    assert!(out.len() < FIB.len());
    check_survivors(&out, &["printf", "main"]);
    // The recursive function was renamed away.
    assert!(!out.contains("fibonacci"));
    assert!(!out.contains("position"));
    assert!(!out.contains("index"));
}

#[test]
fn test_structs_and_enums() {
    let out = minify(STRUCTS);
    assert!(out.len() < STRUCTS.len());
    check_survivors(&out, &["printf", "main"]);
    for owned in ["color", "shade", "point", "make_point", "origin", "RED"] {
        assert!(!out.contains(owned), "{owned} survived: {out:?}");
    }
}

#[test]
fn test_xxd() {
    let out = minify(XXD);
    assert!(out.len() < XXD.len());
    check_survivors(
        &out,
        &["printf", "main", "read", "open", "exit", "isprint", "O_RDONLY"],
    );
    for owned in ["good", "remaining", "execution_num"] {
        assert!(!out.contains(owned), "{owned} survived: {out:?}");
    }
    // All five includes are preserved in order.
    let stdio = out.find("#include<stdio.h>").unwrap();
    let ctype = out.find("#include<ctype.h>").unwrap();
    assert!(stdio < ctype);
}

#[test]
fn test_idempotent_whitespace() {
    // Minifying a minified file changes nothing further.
    let once = minify(HELLO);
    let twice = minify(&once);
    assert_eq!(once, twice);
}

#[test]
fn test_no_add_macros_toggle() {
    let options = Options {
        add_macros: false,
        ..Options::default()
    };
    let out = Engine::new(options)
        .run(SourceFile::new(STRUCTS.into(), Some("input.c".into())))
        .unwrap();
    assert!(!out.contains("#define"));
}

#[test]
fn test_expand_all() {
    let src = "#define ANSWER 42\nint main(void){return ANSWER;}\n";
    let options = Options {
        expand_all: true,
        ..Options::default()
    };
    let out = Engine::new(options)
        .run(SourceFile::new(src.into(), Some("input.c".into())))
        .unwrap();
    assert!(!out.contains("ANSWER"));
    assert!(out.contains("42"));
}
