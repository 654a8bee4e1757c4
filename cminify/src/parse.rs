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

//! Declaration-level parsing and name resolution for the main file.
//!
//! The parser walks the classified token stream once, in source order,
//! binding every reference to the declaration it names as it goes (C's
//! declare-before-use rule makes a single pass sufficient).  Its output is a
//! flat stream of [Event]s in source order: one per declaration, reference,
//! and scope-opening construct, each carrying the byte range the identifier
//! minification pass will rewrite, plus the byte offset where each scope
//! ends.
//!
//! Names that cannot be bound are names the main file does not own: they are
//! reported in [ParseOutput] so the caller can reserve them and leave their
//! uses untouched.

use std::{collections::HashMap, ops::Range};

use indexmap::IndexSet;
use smallvec::SmallVec;
use thiserror::Error as ThisError;

use crate::lex::{Token, TokenKind};

mod expr;
pub mod ty;

pub use ty::Type;

/// Canonical identity of an ordinary declaration (variable, function,
/// typedef, enum constant, or struct/union field).  Forward declarations and
/// redeclarations of one entity share one id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Canonical identity of a struct/union/enum tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u32);

/// One step of the in-order walk that identifier minification consumes.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A named enum declaration or definition.
    EnumDecl {
        tag: TagId,
        name: String,
        range: Range<usize>,
    },

    /// An enumeration constant.  Declared in the scope enclosing the enum.
    EnumConstant {
        decl: DeclId,
        name: String,
        range: Range<usize>,
    },

    /// A named struct or union declaration or definition.
    RecordDecl {
        tag: TagId,
        name: String,
        range: Range<usize>,
    },

    /// A struct/union body opens; members live in a fresh namespace until
    /// `end`.
    RecordBody { end: usize },

    /// A struct/union member.
    Field {
        decl: DeclId,
        name: String,
        range: Range<usize>,
    },

    Typedef {
        decl: DeclId,
        name: String,
        range: Range<usize>,
    },

    /// A function declaration or definition.  `end` is where its scope (the
    /// parameter list, plus the body for a definition) closes.
    Function {
        decl: DeclId,
        name: String,
        range: Range<usize>,
        end: usize,
    },

    /// A variable or parameter declaration.
    Var {
        decl: DeclId,
        name: String,
        range: Range<usize>,
    },

    /// A compound statement (or a `for` statement with a declaration).
    Compound { end: usize },

    /// A resolved use of an ordinary declaration.
    DeclRef { decl: DeclId, range: Range<usize> },

    /// A resolved use of a member, through `.`, `->`, or a designated
    /// initializer.
    MemberRef { decl: DeclId, range: Range<usize> },

    /// A resolved use of a tag in a type position.
    TypeRef { tag: TagId, range: Range<usize> },

    /// A resolved use of a typedef name in a type position.
    TypedefRef { decl: DeclId, range: Range<usize> },
}

#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unexpected end of file.")]
    UnexpectedEof,

    #[error("Expected {expected} but found {found:?}.")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },
}

impl ParseError {
    /// Byte offset the error was detected at, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::UnexpectedEof => None,
            Self::UnexpectedToken { offset, .. } => Some(*offset),
        }
    }
}

/// Everything the parser learned about the main file.
#[derive(Debug, Default)]
pub struct ParseOutput {
    /// Declarations, references, and scopes, in source order.
    pub events: Vec<Event>,

    /// Ordinary names referenced but never declared in the main file.  These
    /// belong to other translation units and must be left verbatim and never
    /// minted.
    pub external_decls: IndexSet<String>,

    /// Tag and typedef names used but not defined in the main file.
    pub external_types: IndexSet<String>,

    /// Member names that occur in an access the resolver could not bind.
    /// Fields with these names must not be renamed.
    pub unresolved_members: IndexSet<String>,

    /// Whether each tag, by [TagId] index, has a definition in the main
    /// file.  Undefined tags belong to headers and keep their names.
    pub tags_defined: Vec<bool>,
}

struct Binding {
    decl: DeclId,
    ty: Type,
    is_typedef: bool,
}

#[derive(Default)]
struct PScope {
    ordinary: HashMap<String, Binding>,
    tags: HashMap<String, TagId>,
}

struct FieldInfo {
    name: String,
    decl: DeclId,
    ty: Type,
}

struct TagInfo {
    defined: bool,
    fields: Vec<FieldInfo>,
}

/// Result of resolving one declarator against its specifier type.
struct DeclaratorInfo {
    name: Option<(String, Range<usize>)>,
    ty: Type,

    /// Parameters, when this declarator declares a function (as opposed to,
    /// say, a pointer to one).
    fn_params: Option<Vec<ParamInfo>>,
}

struct ParamInfo {
    name: Option<(String, Range<usize>)>,
    ty: Type,
}

struct DeclTree {
    ptrs: usize,
    core: Core,
    suffixes: Vec<Suffix>,
}

enum Core {
    Name(String, Range<usize>),
    Paren(Box<DeclTree>),
    Abstract,
}

enum Suffix {
    Array,
    Function(Vec<ParamInfo>),
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
    scopes: SmallVec<[PScope; 8]>,
    tags: Vec<TagInfo>,
    next_decl: u32,
    pub(crate) out: ParseOutput,
}

/// Parses the classified tokens of the main file.  Preprocessor-line tokens
/// are trivia to the parser and are dropped up front.
pub fn parse(tokens: &[Token]) -> Result<ParseOutput, ParseError> {
    let end = tokens.last().map(|t| t.range.end).unwrap_or(0);
    let mut parser = Parser {
        tokens: tokens.iter().filter(|t| !t.is_pp_line()).cloned().collect(),
        pos: 0,
        eof: Token {
            kind: TokenKind::Eof,
            spelling: String::new(),
            at_line_start: false,
            range: end..end,
        },
        scopes: SmallVec::new(),
        tags: Vec::new(),
        next_decl: 0,
        out: ParseOutput::default(),
    };
    parser.scopes.push(PScope::default());
    while !parser.at_eof() {
        parser.external_declaration()?;
    }
    parser.out.tags_defined = parser.tags.iter().map(|tag| tag.defined).collect();
    Ok(parser.out)
}

impl Parser {
    // ---- cursor ----

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_at(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    /// End offset of the most recently consumed token.
    fn prev_end(&self) -> usize {
        self.tokens
            .get(self.pos.wrapping_sub(1))
            .map(|t| t.range.end)
            .unwrap_or(0)
    }

    fn check_punct(&self, spelling: &str) -> bool {
        self.peek().is_punct_spelled(spelling)
    }

    fn check_keyword(&self, spelling: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Keyword && token.spelling == spelling
    }

    fn eat_punct(&mut self, spelling: &str) -> bool {
        if self.check_punct(spelling) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, spelling: &str) -> bool {
        if self.check_keyword(spelling) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, spelling: &str) -> Result<Token, ParseError> {
        if self.check_punct(spelling) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{spelling}`")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = self.peek();
        if found.kind == TokenKind::Eof {
            ParseError::UnexpectedEof
        } else {
            ParseError::UnexpectedToken {
                expected: expected.into(),
                found: found.spelling.clone(),
                offset: found.range.start,
            }
        }
    }

    // ---- scopes and symbol tables ----

    fn push_scope(&mut self) {
        self.scopes.push(PScope::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn fresh_decl(&mut self) -> DeclId {
        let id = DeclId(self.next_decl);
        self.next_decl += 1;
        id
    }

    /// Declares an ordinary name in the current scope, collapsing onto an
    /// existing declaration of the same name in the same scope (forward
    /// declarations, `extern` redeclarations).
    fn declare_ordinary(&mut self, name: &str, ty: Type, is_typedef: bool) -> DeclId {
        if let Some(binding) = self.scopes.last().unwrap().ordinary.get(name) {
            return binding.decl;
        }
        let decl = self.fresh_decl();
        self.scopes.last_mut().unwrap().ordinary.insert(
            name.into(),
            Binding {
                decl,
                ty,
                is_typedef,
            },
        );
        decl
    }

    fn lookup_ordinary(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.ordinary.get(name))
    }

    fn is_typedef_name(&self, name: &str) -> bool {
        self.lookup_ordinary(name).is_some_and(|b| b.is_typedef)
    }

    fn fresh_tag(&mut self) -> TagId {
        let tag = TagId(self.tags.len() as u32);
        self.tags.push(TagInfo {
            defined: false,
            fields: Vec::new(),
        });
        tag
    }

    fn lookup_tag(&self, name: &str) -> Option<TagId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.tags.get(name).copied())
    }

    fn declare_tag(&mut self, name: &str) -> TagId {
        if let Some(tag) = self.lookup_tag(name) {
            return tag;
        }
        let tag = self.fresh_tag();
        self.scopes
            .last_mut()
            .unwrap()
            .tags
            .insert(name.into(), tag);
        tag
    }

    fn emit(&mut self, event: Event) {
        self.out.events.push(event);
    }

    /// Resolves a member access on a value of type `object`, emitting the
    /// reference event on success.  Unresolvable accesses poison the member
    /// name instead.
    pub(crate) fn resolve_member(
        &mut self,
        object: &Type,
        name: &str,
        range: Range<usize>,
    ) -> Type {
        if let Some(tag) = object.as_record()
            && let Some(field) = self.tags[tag.0 as usize]
                .fields
                .iter()
                .find(|f| f.name == name)
        {
            let (decl, ty) = (field.decl, field.ty.clone());
            self.emit(Event::MemberRef { decl, range });
            return ty;
        }
        self.out.unresolved_members.insert(name.into());
        Type::Unknown
    }

    // ---- declarations ----

    fn external_declaration(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") {
            return Ok(());
        }
        self.declaration()
    }

    /// True when the current token begins a declaration.
    fn starts_declaration(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Keyword => matches!(
                token.spelling.as_str(),
                "void"
                    | "char"
                    | "short"
                    | "int"
                    | "long"
                    | "float"
                    | "double"
                    | "signed"
                    | "unsigned"
                    | "_Bool"
                    | "_Complex"
                    | "_Imaginary"
                    | "struct"
                    | "union"
                    | "enum"
                    | "typedef"
                    | "extern"
                    | "static"
                    | "auto"
                    | "register"
                    | "const"
                    | "volatile"
                    | "restrict"
                    | "inline"
            ),
            TokenKind::Identifier => {
                self.is_typedef_name(&token.spelling) || self.unknown_type_decl_ahead()
            }
            _ => false,
        }
    }

    /// Lookahead for declarations whose base type is an identifier the main
    /// file never declared, like `FILE *fp;` or `size_t n;`.  An expression
    /// statement of the shape `a * b;` computes nothing, so the declaration
    /// reading wins the ambiguity.
    fn unknown_type_decl_ahead(&self) -> bool {
        if self.peek().kind != TokenKind::Identifier
            || self.lookup_ordinary(&self.peek().spelling).is_some()
        {
            return false;
        }
        let mut n = 1;
        while self.peek_at(n).is_punct_spelled("*")
            || matches!(
                self.peek_at(n).spelling.as_str(),
                "const" | "volatile" | "restrict"
            )
        {
            n += 1;
        }
        if self.peek_at(n).kind != TokenKind::Identifier {
            return false;
        }
        matches!(
            self.peek_at(n + 1).spelling.as_str(),
            ";" | "," | "=" | "[" | "(" | ")"
        )
    }

    fn declaration(&mut self) -> Result<(), ParseError> {
        // This is only reached once `starts_declaration` has approved the
        // position, so an unknown head identifier is a type from a header.
        let (base, is_typedef) = self.specifiers(true)?;

        // A bare specifier list, like a struct definition, ends here.
        if self.eat_punct(";") {
            return Ok(());
        }

        loop {
            let tree = self.decl_tree()?;
            let info = self.resolve_decl_tree(tree, base.clone());
            if let Some(params) = info.fn_params {
                let done = self.function_declarator(&info.name, info.ty, params)?;
                if done {
                    return Ok(());
                }
            } else if let Some((name, range)) = info.name {
                if is_typedef {
                    let decl = self.declare_ordinary(&name, info.ty, true);
                    self.emit(Event::Typedef { decl, name, range });
                } else {
                    let decl = self.declare_ordinary(&name, info.ty.clone(), false);
                    self.emit(Event::Var { decl, name, range });
                    if self.eat_punct("=") {
                        self.initializer(&info.ty)?;
                    }
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(";")?;
        Ok(())
    }

    /// Handles a function declarator: declares the function, scopes and
    /// declares its parameters, and parses the body if this is a definition.
    /// Returns true when a body was consumed, which ends the declaration.
    fn function_declarator(
        &mut self,
        name: &Option<(String, Range<usize>)>,
        ty: Type,
        params: Vec<ParamInfo>,
    ) -> Result<bool, ParseError> {
        let Some((name, range)) = name.clone() else {
            return Ok(false);
        };
        let decl = self.declare_ordinary(&name, ty, false);
        let event = self.out.events.len();
        self.emit(Event::Function {
            decl,
            name,
            range,
            end: 0,
        });

        self.push_scope();
        for param in params {
            if let Some((name, range)) = param.name {
                let decl = self.declare_ordinary(&name, param.ty, false);
                self.emit(Event::Var { decl, name, range });
            }
        }

        let has_body = self.check_punct("{");
        if has_body {
            self.statement()?;
        }
        self.pop_scope();

        let end = self.prev_end();
        if let Event::Function { end: slot, .. } = &mut self.out.events[event] {
            *slot = end;
        }
        Ok(has_body)
    }

    /// Parses declaration specifiers, returning the base type and whether
    /// `typedef` appeared.
    fn specifiers(&mut self, allow_unknown: bool) -> Result<(Type, bool), ParseError> {
        let mut base: Option<Type> = None;
        let mut is_typedef = false;
        let mut any = false;
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Keyword => match token.spelling.as_str() {
                    "typedef" => {
                        is_typedef = true;
                        any = true;
                        self.pos += 1;
                    }
                    "extern" | "static" | "auto" | "register" | "inline" | "const" | "volatile"
                    | "restrict" => {
                        any = true;
                        self.pos += 1;
                    }
                    "void" => {
                        base = Some(Type::Void);
                        any = true;
                        self.pos += 1;
                    }
                    "char" | "short" | "int" | "long" | "float" | "double" | "signed"
                    | "unsigned" | "_Bool" | "_Complex" | "_Imaginary" => {
                        base = Some(Type::Arith);
                        any = true;
                        self.pos += 1;
                    }
                    "struct" | "union" => {
                        base = Some(self.record_specifier()?);
                        any = true;
                    }
                    "enum" => {
                        base = Some(self.enum_specifier()?);
                        any = true;
                    }
                    _ => break,
                },
                TokenKind::Identifier if base.is_none() => {
                    if let Some(binding) = self.lookup_ordinary(&token.spelling) {
                        if !binding.is_typedef {
                            break;
                        }
                        let (decl, ty) = (binding.decl, binding.ty.clone());
                        self.emit(Event::TypedefRef {
                            decl,
                            range: token.range.clone(),
                        });
                        base = Some(ty);
                        any = true;
                        self.pos += 1;
                    } else if allow_unknown {
                        // A type from a header we never parsed.  Its name is
                        // untouchable.
                        self.out.external_types.insert(token.spelling.clone());
                        base = Some(Type::Unknown);
                        any = true;
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        if !any {
            return Err(self.unexpected("declaration specifiers"));
        }
        Ok((base.unwrap_or(Type::Arith), is_typedef))
    }

    fn record_specifier(&mut self) -> Result<Type, ParseError> {
        self.advance(); // `struct` or `union`
        let name = if self.peek().kind == TokenKind::Identifier {
            Some(self.advance())
        } else {
            None
        };

        let tag = match &name {
            Some(token) => {
                let known = self.lookup_tag(&token.spelling);
                let defining = self.check_punct("{");
                match known {
                    Some(tag) if !defining => {
                        self.emit(Event::TypeRef {
                            tag,
                            range: token.range.clone(),
                        });
                        tag
                    }
                    _ => {
                        let tag = self.declare_tag(&token.spelling);
                        self.emit(Event::RecordDecl {
                            tag,
                            name: token.spelling.clone(),
                            range: token.range.clone(),
                        });
                        tag
                    }
                }
            }
            None => self.fresh_tag(),
        };

        if self.check_punct("{") {
            self.record_body(tag)?;
        }
        Ok(Type::Record(tag))
    }

    fn record_body(&mut self, tag: TagId) -> Result<(), ParseError> {
        self.expect_punct("{")?;
        let event = self.out.events.len();
        self.emit(Event::RecordBody { end: 0 });

        let mut fields = Vec::new();
        while !self.check_punct("}") && !self.at_eof() {
            let (base, _) = self.specifiers(true)?;
            if self.eat_punct(";") {
                // Unnamed member, e.g. an anonymous inner struct.
                continue;
            }
            loop {
                let tree = self.decl_tree()?;
                let info = self.resolve_decl_tree(tree, base.clone());
                if self.eat_punct(":") {
                    self.conditional()?; // bit-field width
                }
                if let Some((name, range)) = info.name {
                    let decl = self.fresh_decl();
                    self.emit(Event::Field {
                        decl,
                        name: name.clone(),
                        range,
                    });
                    fields.push(FieldInfo {
                        name,
                        decl,
                        ty: info.ty,
                    });
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct(";")?;
        }
        let close = self.expect_punct("}")?;

        if let Event::RecordBody { end } = &mut self.out.events[event] {
            *end = close.range.end;
        }
        let info = &mut self.tags[tag.0 as usize];
        info.defined = true;
        info.fields = fields;
        Ok(())
    }

    fn enum_specifier(&mut self) -> Result<Type, ParseError> {
        self.advance(); // `enum`
        let name = if self.peek().kind == TokenKind::Identifier {
            Some(self.advance())
        } else {
            None
        };

        let tag = match &name {
            Some(token) => {
                let known = self.lookup_tag(&token.spelling);
                let defining = self.check_punct("{");
                match known {
                    Some(tag) if !defining => {
                        self.emit(Event::TypeRef {
                            tag,
                            range: token.range.clone(),
                        });
                        tag
                    }
                    _ => {
                        let tag = self.declare_tag(&token.spelling);
                        self.emit(Event::EnumDecl {
                            tag,
                            name: token.spelling.clone(),
                            range: token.range.clone(),
                        });
                        tag
                    }
                }
            }
            None => self.fresh_tag(),
        };

        if self.eat_punct("{") {
            // Constants land in the scope enclosing the enum.
            while !self.check_punct("}") && !self.at_eof() {
                let token = self.peek().clone();
                if token.kind != TokenKind::Identifier {
                    return Err(self.unexpected("enumeration constant"));
                }
                self.pos += 1;
                let decl = self.declare_ordinary(&token.spelling, Type::Arith, false);
                self.emit(Event::EnumConstant {
                    decl,
                    name: token.spelling.clone(),
                    range: token.range.clone(),
                });
                if self.eat_punct("=") {
                    self.conditional()?;
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("}")?;
            self.tags[tag.0 as usize].defined = true;
        }
        Ok(Type::Enum(tag))
    }

    // ---- declarators ----

    fn decl_tree(&mut self) -> Result<DeclTree, ParseError> {
        let mut ptrs = 0;
        while self.eat_punct("*") {
            while matches!(
                self.peek().spelling.as_str(),
                "const" | "volatile" | "restrict"
            ) {
                self.pos += 1;
            }
            ptrs += 1;
        }

        let core = if self.peek().kind == TokenKind::Identifier {
            let token = self.advance();
            Core::Name(token.spelling, token.range)
        } else if self.check_punct("(") && !self.paren_is_function_suffix() {
            self.advance();
            let inner = self.decl_tree()?;
            self.expect_punct(")")?;
            Core::Paren(Box::new(inner))
        } else {
            Core::Abstract
        };

        let mut suffixes = Vec::new();
        loop {
            if self.eat_punct("[") {
                if !self.check_punct("]") {
                    self.conditional()?;
                }
                self.expect_punct("]")?;
                suffixes.push(Suffix::Array);
            } else if self.check_punct("(") {
                self.advance();
                let params = self.param_list()?;
                suffixes.push(Suffix::Function(params));
            } else {
                break;
            }
        }

        Ok(DeclTree {
            ptrs,
            core,
            suffixes,
        })
    }

    /// Disambiguates `(` after an empty declarator core: it opens a
    /// parameter list (an abstract function declarator) when what follows is
    /// a type or nothing, and a parenthesized declarator otherwise.
    fn paren_is_function_suffix(&self) -> bool {
        let next = self.peek_at(1);
        match next.kind {
            TokenKind::Punct => next.spelling == ")",
            TokenKind::Keyword => true,
            TokenKind::Identifier => self.is_typedef_name(&next.spelling),
            _ => false,
        }
    }

    fn param_list(&mut self) -> Result<Vec<ParamInfo>, ParseError> {
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        loop {
            if self.eat_punct("...") {
                if self.eat_punct(")") {
                    return Ok(params);
                }
                continue;
            }
            if self.peek().kind == TokenKind::Identifier
                && !self.is_typedef_name(&self.peek().spelling)
                && self.lookup_ordinary(&self.peek().spelling).is_none()
                && matches!(self.peek_at(1).spelling.as_str(), "," | ")")
            {
                // An identifier-list (K&R) parameter or an unknown-type
                // abstract parameter; neither declares anything we own.
                self.pos += 1;
                params.push(ParamInfo {
                    name: None,
                    ty: Type::Unknown,
                });
            } else {
                let (base, _) = self.specifiers(true)?;
                let tree = self.decl_tree()?;
                let info = self.resolve_decl_tree(tree, base);
                params.push(ParamInfo {
                    name: info.name,
                    ty: info.ty,
                });
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;

        // `f(void)` declares no parameters.
        if params.len() == 1 && params[0].name.is_none() && params[0].ty == Type::Void {
            params.clear();
        }
        Ok(params)
    }

    fn resolve_decl_tree(&mut self, tree: DeclTree, base: Type) -> DeclaratorInfo {
        let mut ty = base;
        for _ in 0..tree.ptrs {
            ty = ty.pointer();
        }
        let is_function = matches!(tree.core, Core::Name(..))
            && matches!(tree.suffixes.first(), Some(Suffix::Function(_)));
        let mut fn_params = None;
        for suffix in tree.suffixes.into_iter().rev() {
            match suffix {
                Suffix::Array => ty = ty.array(),
                Suffix::Function(params) => {
                    ty = ty.function();
                    if is_function {
                        fn_params = Some(params);
                    }
                }
            }
        }
        match tree.core {
            Core::Name(name, range) => DeclaratorInfo {
                name: Some((name, range)),
                ty,
                fn_params,
            },
            Core::Abstract => DeclaratorInfo {
                name: None,
                ty,
                fn_params: None,
            },
            Core::Paren(inner) => {
                let mut info = self.resolve_decl_tree(*inner, ty);
                info.fn_params = None;
                info
            }
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<(), ParseError> {
        if self.check_punct("{") {
            return self.compound();
        }
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.eat_keyword("if") {
            self.expect_punct("(")?;
            self.expression()?;
            self.expect_punct(")")?;
            self.statement()?;
            if self.eat_keyword("else") {
                self.statement()?;
            }
            return Ok(());
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            self.expression()?;
            self.expect_punct(")")?;
            return self.statement();
        }
        if self.eat_keyword("do") {
            self.statement()?;
            if !self.eat_keyword("while") {
                return Err(self.unexpected("`while`"));
            }
            self.expect_punct("(")?;
            self.expression()?;
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(());
        }
        if self.eat_keyword("for") {
            return self.for_statement();
        }
        if self.eat_keyword("switch") {
            self.expect_punct("(")?;
            self.expression()?;
            self.expect_punct(")")?;
            return self.statement();
        }
        if self.eat_keyword("case") {
            self.conditional()?;
            self.expect_punct(":")?;
            return self.statement();
        }
        if self.eat_keyword("default") {
            self.expect_punct(":")?;
            return self.statement();
        }
        if self.eat_keyword("return") {
            if !self.check_punct(";") {
                self.expression()?;
            }
            self.expect_punct(";")?;
            return Ok(());
        }
        if self.eat_keyword("break") || self.eat_keyword("continue") {
            self.expect_punct(";")?;
            return Ok(());
        }
        if self.eat_keyword("goto") {
            // Labels live in their own namespace; leave them alone.
            self.advance();
            self.expect_punct(";")?;
            return Ok(());
        }
        if self.peek().kind == TokenKind::Identifier && self.peek_at(1).is_punct_spelled(":") {
            self.advance();
            self.advance();
            return self.statement();
        }
        if self.starts_declaration() {
            return self.declaration();
        }
        self.expression()?;
        self.expect_punct(";")?;
        Ok(())
    }

    fn compound(&mut self) -> Result<(), ParseError> {
        self.expect_punct("{")?;
        let event = self.out.events.len();
        self.emit(Event::Compound { end: 0 });
        self.push_scope();
        while !self.check_punct("}") && !self.at_eof() {
            if self.starts_declaration() {
                self.declaration()?;
            } else {
                self.statement()?;
            }
        }
        let close = self.expect_punct("}")?;
        self.pop_scope();
        if let Event::Compound { end } = &mut self.out.events[event] {
            *end = close.range.end;
        }
        Ok(())
    }

    /// A `for` statement whose init clause declares something gets a scope
    /// of its own spanning the whole statement.
    fn for_statement(&mut self) -> Result<(), ParseError> {
        self.expect_punct("(")?;
        let declares = self.starts_declaration();
        let event = self.out.events.len();
        if declares {
            self.emit(Event::Compound { end: 0 });
            self.push_scope();
            self.declaration()?; // consumes the first `;`
        } else {
            if !self.check_punct(";") {
                self.expression()?;
            }
            self.expect_punct(";")?;
        }
        if !self.check_punct(";") {
            self.expression()?;
        }
        self.expect_punct(";")?;
        if !self.check_punct(")") {
            self.expression()?;
        }
        self.expect_punct(")")?;
        self.statement()?;
        if declares {
            self.pop_scope();
            let end = self.prev_end();
            if let Event::Compound { end: slot } = &mut self.out.events[event] {
                *slot = end;
            }
        }
        Ok(())
    }

    // ---- initializers ----

    fn initializer(&mut self, target: &Type) -> Result<(), ParseError> {
        if !self.eat_punct("{") {
            self.assignment()?;
            return Ok(());
        }

        let mut position = 0usize;
        while !self.check_punct("}") && !self.at_eof() {
            let mut element = Type::Unknown;
            let mut designated = false;
            loop {
                if self.check_punct(".") && self.peek_at(1).kind == TokenKind::Identifier {
                    self.advance();
                    let token = self.advance();
                    let object = if designated {
                        element.clone()
                    } else {
                        target.clone()
                    };
                    element = self.resolve_member(&object, &token.spelling, token.range);
                    designated = true;
                } else if self.check_punct("[") {
                    self.advance();
                    self.conditional()?;
                    self.expect_punct("]")?;
                    element = if designated {
                        element.pointee()
                    } else {
                        target.pointee()
                    };
                    designated = true;
                } else {
                    break;
                }
            }
            if designated {
                self.expect_punct("=")?;
            } else {
                element = match target {
                    Type::Array(inner) => (**inner).clone(),
                    Type::Record(tag) => self.tags[tag.0 as usize]
                        .fields
                        .get(position)
                        .map(|f| f.ty.clone())
                        .unwrap_or(Type::Unknown),
                    _ => Type::Unknown,
                };
                position += 1;
            }
            self.initializer(&element)?;
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{parse, Event, ParseOutput};
    use crate::lex::classify::scan_classified;

    fn run(src: &str) -> ParseOutput {
        parse(&scan_classified(src).unwrap()).unwrap()
    }

    /// The declaration and reference names, in event order, as compact
    /// strings like `var:x` or `ref:3`.
    fn summarize(out: &ParseOutput) -> Vec<String> {
        out.events
            .iter()
            .map(|event| match event {
                Event::EnumDecl { name, .. } => format!("enum:{name}"),
                Event::EnumConstant { name, .. } => format!("econst:{name}"),
                Event::RecordDecl { name, .. } => format!("record:{name}"),
                Event::RecordBody { .. } => "recbody".into(),
                Event::Field { name, .. } => format!("field:{name}"),
                Event::Typedef { name, .. } => format!("typedef:{name}"),
                Event::Function { name, .. } => format!("fn:{name}"),
                Event::Var { name, .. } => format!("var:{name}"),
                Event::Compound { .. } => "block".into(),
                Event::DeclRef { decl, .. } => format!("ref:{}", decl.0),
                Event::MemberRef { decl, .. } => format!("mref:{}", decl.0),
                Event::TypeRef { tag, .. } => format!("tref:{}", tag.0),
                Event::TypedefRef { decl, .. } => format!("tdref:{}", decl.0),
            })
            .collect()
    }

    #[track_caller]
    fn check_events(src: &str, expected: &[&str]) {
        let out = run(src);
        let summary = summarize(&out);
        let summary: Vec<&str> = summary.iter().map(String::as_str).collect();
        if summary != expected {
            for result in diff::slice(expected, &summary) {
                match result {
                    diff::Result::Left(left) => eprintln!("-{left}"),
                    diff::Result::Both(left, _) => eprintln!(" {left}"),
                    diff::Result::Right(right) => eprintln!("+{right}"),
                }
            }
            panic!("event stream differs from expected");
        }
    }

    #[test]
    fn test_function_and_locals() {
        check_events(
            "int foo(int bar){int baz=bar;return baz;}int main(){return foo(3);}",
            &[
                "fn:foo", "var:bar", "block", "var:baz", "ref:1", "ref:2", "fn:main", "block",
                "ref:0",
            ],
        );
    }

    #[test]
    fn test_shadowing_binds_innermost() {
        let out = run("int x;int main(){int x=1;return x;}");
        // The reference binds the inner x (decl 2), not the global (decl 0).
        assert!(summarize(&out).contains(&"ref:2".to_string()));
    }

    #[test]
    fn test_struct_members_and_designators() {
        check_events(
            "struct S{int v;}; int main(){struct S s={.v=1}; return s.v;}",
            &[
                "record:S", "recbody", "field:v", "fn:main", "block", "tref:0", "var:s", "mref:0",
                "ref:2", "mref:0",
            ],
        );
    }

    #[test]
    fn test_enum() {
        check_events(
            "enum E{X,Y=2}; int f(void){enum E e=X; return e+Y;}",
            &[
                "enum:E", "econst:X", "econst:Y", "fn:f", "block", "tref:0", "var:e", "ref:0",
                "ref:3", "ref:1",
            ],
        );
    }

    #[test]
    fn test_typedef() {
        check_events(
            "typedef struct P{int x;} P; P g; int main(){g.x=2;return 0;}",
            &[
                "record:P", "recbody", "field:x", "typedef:P", "tdref:1", "var:g", "fn:main",
                "block", "ref:2", "mref:0",
            ],
        );
    }

    #[test]
    fn test_externals_reported() {
        let out = run("int main(){printf(\"hi\");return EOF;}");
        assert!(out.external_decls.contains("printf"));
        assert!(out.external_decls.contains("EOF"));
    }

    #[test]
    fn test_unknown_type_declaration() {
        let out = run("int main(){FILE *fp; fp = 0; return 0;}");
        assert!(out.external_types.contains("FILE"));
        // fp itself is ours and resolvable.
        let summary = summarize(&out);
        assert!(summary.contains(&"var:fp".to_string()));
        assert!(summary.iter().filter(|s| s.starts_with("ref:")).count() >= 1);
    }

    #[test]
    fn test_unresolved_member_poisons_name() {
        let out = run("int main(){thing->count = 1; return 0;}");
        assert!(out.external_decls.contains("thing"));
        assert!(out.unresolved_members.contains("count"));
    }

    #[test]
    fn test_tags_defined() {
        let out = run("struct A; struct B{int x;}; struct A *p;");
        assert_eq!(out.tags_defined, vec![false, true]);
    }

    #[test]
    fn test_function_pointer_declarator() {
        let out = run("int apply(int (*op)(int), int x){return op(x);}");
        let summary = summarize(&out);
        assert_eq!(
            summary,
            vec!["fn:apply", "var:op", "var:x", "block", "ref:1", "ref:2"]
        );
    }

    #[test]
    fn test_for_scope() {
        let out = run("int main(){for(int i=0;i<3;i++){} for(int i=0;i<4;i++){} return 0;}");
        // Both loops declare their own i without conflict.
        let vars = summarize(&out)
            .iter()
            .filter(|s| *s == "var:i")
            .count();
        assert_eq!(vars, 2);
    }

    #[test]
    fn test_scope_ends_cover_bodies() {
        let src = "int f(void){int x;{int y;}return 0;}";
        let out = run(src);
        let close = src.rfind('}').unwrap() + 1;
        for event in &out.events {
            if let Event::Function { end, .. } = event {
                assert_eq!(*end, close);
            }
        }
    }
}
