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

//! C preprocessor macros.
//!
//! This module owns the macro table and everything that feeds or consumes it:
//! parsing `#define`/`#undef`/`#include` directive lines, walking include
//! files to collect the macro names a header makes visible, expanding macro
//! invocations for the expansion pass, and evaluating `#if` conditions.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;

use crate::lex::{
    classify::{scan_classified, scan_directive},
    scan::{scan, ScanError},
    Token, TokenKind,
};

/// A macro as defined with `#define`.
#[derive(Clone, Debug)]
pub struct Macro {
    /// The macro's name.
    pub name: String,

    /// Parameter names for a function-like macro; `None` for an object-like
    /// macro.
    pub params: Option<Vec<String>>,

    /// Whether the parameter list ends with `...`.  The trailing arguments
    /// are available as `__VA_ARGS__`.
    pub variadic: bool,

    /// Replacement-list tokens.
    pub body: Vec<Token>,
}

impl Macro {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

/// The set of macros in effect at some point, in definition order.
#[derive(Default)]
pub struct MacroSet(IndexMap<String, Macro>);

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, macro_: Macro) {
        self.0.insert(macro_.name.clone(), macro_);
    }

    pub fn undef(&mut self, name: &str) {
        self.0.shift_remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One parsed directive line.
#[derive(Clone, Debug)]
pub enum Directive {
    Define(Macro),
    Undef(String),
    Include { path: String, angled: bool },
    If(Vec<Token>),
    Ifdef(String),
    Ifndef(String),
    Elif(Vec<Token>),
    Else,
    Endif,

    /// `#pragma`, `#error`, an empty `#`, or anything unrecognized.
    Other,
}

/// Parses the spelling of a preprocessor-line token (as produced by the
/// classifier, `\n#...\n`) into a [Directive].
pub fn parse_directive(pp_spelling: &str) -> Result<Directive, ScanError> {
    let interior = pp_spelling
        .trim_matches('\n')
        .strip_prefix('#')
        .unwrap_or(pp_spelling)
        .trim();
    let tokens = scan_directive(interior)?;
    let Some(head) = tokens.first() else {
        return Ok(Directive::Other);
    };
    let rest = &tokens[1..];
    Ok(match head.spelling.as_str() {
        "define" => match parse_define(rest) {
            Some(macro_) => Directive::Define(macro_),
            None => Directive::Other,
        },
        "undef" => match rest.first() {
            Some(name) if name.kind == TokenKind::Identifier => {
                Directive::Undef(name.spelling.clone())
            }
            _ => Directive::Other,
        },
        "include" => match rest.first() {
            Some(token) if token.kind == TokenKind::HeaderName => Directive::Include {
                path: token.spelling[1..token.spelling.len() - 1].into(),
                angled: true,
            },
            Some(token)
                if token.kind == TokenKind::Literal && token.spelling.starts_with('"') =>
            {
                Directive::Include {
                    path: token.spelling[1..token.spelling.len() - 1].into(),
                    angled: false,
                }
            }
            _ => Directive::Other,
        },
        "if" => Directive::If(rest.to_vec()),
        "elif" => Directive::Elif(rest.to_vec()),
        "ifdef" => match rest.first() {
            Some(name) => Directive::Ifdef(name.spelling.clone()),
            None => Directive::Other,
        },
        "ifndef" => match rest.first() {
            Some(name) => Directive::Ifndef(name.spelling.clone()),
            None => Directive::Other,
        },
        "else" => Directive::Else,
        "endif" => Directive::Endif,
        _ => Directive::Other,
    })
}

fn parse_define(tokens: &[Token]) -> Option<Macro> {
    let name = tokens.first()?;
    if name.kind != TokenKind::Identifier {
        return None;
    }
    // Function-like only when `(` is glued to the name.
    let function_like = tokens
        .get(1)
        .is_some_and(|t| t.is_punct_spelled("(") && t.range.start == name.range.end);
    if !function_like {
        return Some(Macro {
            name: name.spelling.clone(),
            params: None,
            variadic: false,
            body: tokens[1..].to_vec(),
        });
    }

    let mut params = Vec::new();
    let mut variadic = false;
    let mut i = 2;
    loop {
        match tokens.get(i) {
            Some(t) if t.is_punct_spelled(")") => {
                i += 1;
                break;
            }
            Some(t) if t.is_punct_spelled(",") => i += 1,
            Some(t) if t.is_punct_spelled("...") => {
                variadic = true;
                i += 1;
            }
            Some(t) if t.kind == TokenKind::Identifier => {
                params.push(t.spelling.clone());
                i += 1;
            }
            _ => return None,
        }
    }
    Some(Macro {
        name: name.spelling.clone(),
        params: Some(params),
        variadic,
        body: tokens[i..].to_vec(),
    })
}

/// Maps `#include` paths onto files, using the compilation database's `-I`
/// directories.
pub struct IncludeResolver {
    pub include_dirs: Vec<PathBuf>,
}

impl IncludeResolver {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }

    /// Resolves an include.  The quote form searches the including file's
    /// directory first; the angle form searches only the include paths.
    pub fn resolve(
        &self,
        path: &str,
        angled: bool,
        including_dir: Option<&Path>,
    ) -> Option<PathBuf> {
        if !angled
            && let Some(dir) = including_dir
        {
            let candidate = dir.join(path);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        self.include_dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }
}

/// Gathers macro definitions from predefinitions, a source file, and
/// everything it includes, transitively.
///
/// `set` reflects definitions currently in effect (an `#undef` removes its
/// entry); `names` is monotone and remembers every name that was ever
/// defined, which is what the reserved ledger wants.  Conditional branches
/// are not evaluated here: a name defined under any branch is collected.
pub struct MacroCollector<'a> {
    resolver: &'a IncludeResolver,
    pub set: MacroSet,
    pub names: HashSet<String>,
    visited: HashSet<PathBuf>,
}

impl<'a> MacroCollector<'a> {
    pub fn new(resolver: &'a IncludeResolver) -> Self {
        Self {
            resolver,
            set: MacroSet::new(),
            names: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Records a `-D NAME[=VALUE]` predefinition; a bare name defines it as
    /// `1`.
    pub fn predefine(&mut self, arg: &str) {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, value),
            None => (arg, "1"),
        };
        let body = match scan(value) {
            Ok(body) => body,
            Err(error) => {
                debug!("ignoring predefinition {arg:?}: {error}");
                return;
            }
        };
        self.define(Macro {
            name: name.into(),
            params: None,
            variadic: false,
            body,
        });
    }

    fn define(&mut self, macro_: Macro) {
        self.names.insert(macro_.name.clone());
        self.set.define(macro_);
    }

    /// Collects from an include file, once per file.
    pub fn collect_file(&mut self, path: &Path) {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.visited.insert(canonical) {
            return;
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                debug!("skipping unreadable include {}: {error}", path.display());
                return;
            }
        };
        self.collect_source(&text, path.parent());
    }

    /// Collects from source text; `dir` is the directory quote-form includes
    /// are resolved against.
    pub fn collect_source(&mut self, src: &str, dir: Option<&Path>) {
        let tokens = match scan_classified(src) {
            Ok(tokens) => tokens,
            Err(error) => {
                debug!("skipping unscannable include: {error}");
                return;
            }
        };
        for token in tokens.iter().filter(|t| t.is_pp_line()) {
            match parse_directive(&token.spelling) {
                Ok(Directive::Define(macro_)) => self.define(macro_),
                Ok(Directive::Undef(name)) => self.set.undef(&name),
                Ok(Directive::Include { path, angled }) => {
                    match self.resolver.resolve(&path, angled, dir) {
                        Some(file) => self.collect_file(&file),
                        None => debug!("skipping unresolvable include {path:?}"),
                    }
                }
                Ok(_) => (),
                Err(error) => debug!("skipping malformed directive: {error}"),
            }
        }
    }
}

/// Macro expansion over token lists.
pub struct Expander<'a> {
    macros: &'a MacroSet,
}

impl<'a> Expander<'a> {
    pub fn new(macros: &'a MacroSet) -> Self {
        Self { macros }
    }

    /// Fully expands `tokens`.
    pub fn expand(&self, tokens: &[Token]) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut hide = Vec::new();
        self.expand_into(tokens, &mut hide, &mut out);
        out
    }

    fn expand_into(&self, tokens: &[Token], hide: &mut Vec<String>, out: &mut Vec<Token>) {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            if token.kind != TokenKind::Identifier || hide.contains(&token.spelling) {
                out.push(token.clone());
                continue;
            }
            let Some(macro_) = self.macros.get(&token.spelling) else {
                out.push(token.clone());
                continue;
            };
            let substituted = if macro_.is_function_like() {
                // A function-like macro name not followed by `(` is not an
                // invocation.
                if !tokens.get(i).is_some_and(|t| t.is_punct_spelled("(")) {
                    out.push(token.clone());
                    continue;
                }
                let Some((args, next)) = gather_args(tokens, i + 1) else {
                    out.push(token.clone());
                    continue;
                };
                i = next;
                self.substitute(macro_, &args, hide)
            } else {
                paste_body(&macro_.body)
            };
            hide.push(macro_.name.clone());
            self.expand_into(&substituted, hide, out);
            hide.pop();
        }
    }

    /// Substitutes arguments into a function-like macro body, applying `#`
    /// and `##`.
    fn substitute(&self, macro_: &Macro, args: &[Vec<Token>], hide: &mut Vec<String>) -> Vec<Token> {
        let params = macro_.params.as_ref().unwrap();
        let arg_of = |name: &str| -> Option<&[Token]> {
            if let Some(index) = params.iter().position(|p| p == name) {
                Some(args.get(index).map(Vec::as_slice).unwrap_or(&[]))
            } else if macro_.variadic && name == "__VA_ARGS__" {
                Some(args.get(params.len()).map(Vec::as_slice).unwrap_or(&[]))
            } else {
                None
            }
        };

        // First substitution, leaving `##` in place: parameters become their
        // (expanded) arguments, `#param` becomes a string literal of the raw
        // argument.  Operands of `##` use the raw argument as well.
        let body = &macro_.body;
        let mut slots: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let token = &body[i];
            if token.is_punct_spelled("#")
                && let Some(next) = body.get(i + 1)
                && let Some(arg) = arg_of(&next.spelling)
            {
                slots.push(synthesize(TokenKind::Literal, stringize(arg)));
                i += 2;
            } else if let Some(arg) = arg_of(&token.spelling) {
                let pasted = body.get(i + 1).is_some_and(|t| t.is_punct_spelled("##"))
                    || slots.last().is_some_and(|t| t.is_punct_spelled("##"));
                if pasted {
                    slots.extend(arg.iter().cloned());
                } else {
                    self.expand_into(arg, hide, &mut slots);
                }
                i += 1;
            } else {
                slots.push(token.clone());
                i += 1;
            }
        }
        paste_body(&slots)
    }
}

/// Applies `##` pasting to a substituted body.
fn paste_body(body: &[Token]) -> Vec<Token> {
    if !body.iter().any(|t| t.is_punct_spelled("##")) {
        return body.to_vec();
    }
    let mut result: Vec<Token> = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let token = &body[i];
        if token.is_punct_spelled("##") && !result.is_empty() && i + 1 < body.len() {
            let left = result.pop().unwrap();
            let right = &body[i + 1];
            let glued = format!("{}{}", left.spelling, right.spelling);
            match scan(&glued) {
                Ok(tokens) if !tokens.is_empty() => {
                    result.extend(tokens.into_iter().map(|t| synthesize(t.kind, t.spelling)))
                }
                _ => result.push(synthesize(TokenKind::Identifier, glued)),
            }
            i += 2;
        } else {
            result.push(token.clone());
            i += 1;
        }
    }
    result
}

/// Collects the arguments of a function-like invocation whose opening paren
/// has already been consumed; `i` indexes the first token after `(`.  Returns
/// the arguments and the index one past the closing paren.
fn gather_args(tokens: &[Token], mut i: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        i += 1;
        if token.is_punct_spelled("(") {
            depth += 1;
        } else if token.is_punct_spelled(")") {
            if depth == 0 {
                if args.len() == 1 && args[0].is_empty() {
                    args.clear();
                }
                return Some((args, i));
            }
            depth -= 1;
        } else if token.is_punct_spelled(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }
        args.last_mut().unwrap().push(token.clone());
    }
    None
}

/// Joins argument tokens into the spelling of a stringized literal, with a
/// space wherever the source had whitespace between two tokens.
fn stringize(tokens: &[Token]) -> String {
    let mut text = String::new();
    let mut prev_end = None;
    for token in tokens {
        if prev_end.is_some_and(|end| end != token.range.start) {
            text.push(' ');
        }
        text.push_str(&token.spelling);
        prev_end = Some(token.range.end);
    }
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn synthesize(kind: TokenKind, spelling: String) -> Token {
    Token {
        kind,
        spelling,
        at_line_start: false,
        range: 0..0,
    }
}

/// Evaluates a `#if`/`#elif` condition.  Unknown identifiers evaluate to
/// zero, as the standard requires; malformed expressions evaluate to false.
pub fn eval_condition(tokens: &[Token], macros: &MacroSet) -> bool {
    // `defined` must be resolved before macro expansion.
    let mut resolved = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_id("defined") {
            let (name, next) = if tokens.get(i + 1).is_some_and(|t| t.is_punct_spelled("(")) {
                (tokens.get(i + 2), i + 4)
            } else {
                (tokens.get(i + 1), i + 2)
            };
            let value = name.is_some_and(|name| macros.contains(&name.spelling));
            resolved.push(synthesize(
                TokenKind::Literal,
                if value { "1" } else { "0" }.into(),
            ));
            i = next;
        } else {
            resolved.push(token.clone());
            i += 1;
        }
    }
    let expanded = Expander::new(macros).expand(&resolved);
    let mut parser = CondParser {
        tokens: &expanded,
        pos: 0,
    };
    let value = parser.ternary();
    value != 0
}

/// Precedence-climbing parser for preprocessor integer expressions.
struct CondParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl CondParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|t| t.spelling.as_str())
    }

    fn eat(&mut self, spelling: &str) -> bool {
        if self.peek() == Some(spelling) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ternary(&mut self) -> i64 {
        let cond = self.binary(0);
        if self.eat("?") {
            let then = self.ternary();
            self.eat(":");
            let otherwise = self.ternary();
            if cond != 0 { then } else { otherwise }
        } else {
            cond
        }
    }

    fn binary(&mut self, min_level: usize) -> i64 {
        const LEVELS: &[&[&str]] = &[
            &["||"],
            &["&&"],
            &["|"],
            &["^"],
            &["&"],
            &["==", "!="],
            &["<", "<=", ">", ">="],
            &["<<", ">>"],
            &["+", "-"],
            &["*", "/", "%"],
        ];
        if min_level == LEVELS.len() {
            return self.unary();
        }
        let mut value = self.binary(min_level + 1);
        while let Some(op) = self.peek() {
            if !LEVELS[min_level].contains(&op) {
                break;
            }
            let op = op.to_string();
            self.pos += 1;
            let rhs = self.binary(min_level + 1);
            value = match op.as_str() {
                "||" => ((value != 0) || (rhs != 0)) as i64,
                "&&" => ((value != 0) && (rhs != 0)) as i64,
                "|" => value | rhs,
                "^" => value ^ rhs,
                "&" => value & rhs,
                "==" => (value == rhs) as i64,
                "!=" => (value != rhs) as i64,
                "<" => (value < rhs) as i64,
                "<=" => (value <= rhs) as i64,
                ">" => (value > rhs) as i64,
                ">=" => (value >= rhs) as i64,
                "<<" => value.wrapping_shl(rhs as u32),
                ">>" => value.wrapping_shr(rhs as u32),
                "+" => value.wrapping_add(rhs),
                "-" => value.wrapping_sub(rhs),
                "*" => value.wrapping_mul(rhs),
                "/" => value.checked_div(rhs).unwrap_or(0),
                "%" => value.checked_rem(rhs).unwrap_or(0),
                _ => unreachable!(),
            };
        }
        value
    }

    fn unary(&mut self) -> i64 {
        if self.eat("!") {
            (self.unary() == 0) as i64
        } else if self.eat("~") {
            !self.unary()
        } else if self.eat("-") {
            self.unary().wrapping_neg()
        } else if self.eat("+") {
            self.unary()
        } else if self.eat("(") {
            let value = self.ternary();
            self.eat(")");
            value
        } else if let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token.kind {
                TokenKind::Literal => parse_int(&token.spelling),
                // Surviving identifiers are not macros; the standard says
                // they evaluate to zero.
                _ => 0,
            }
        } else {
            0
        }
    }
}

fn parse_int(spelling: &str) -> i64 {
    if let Some(inner) = spelling.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'').unwrap_or(inner);
        return match inner.strip_prefix('\\') {
            Some("n") => b'\n' as i64,
            Some("t") => b'\t' as i64,
            Some("r") => b'\r' as i64,
            Some("0") => 0,
            Some(other) => other.chars().next().map_or(0, |c| c as i64),
            None => inner.chars().next().map_or(0, |c| c as i64),
        };
    }
    let digits = spelling.trim_end_matches(['u', 'U', 'l', 'L']);
    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x").or(digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits != "0" && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    i64::from_str_radix(digits, radix).unwrap_or(0)
}
