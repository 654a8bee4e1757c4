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

//! Expression parsing.
//!
//! Expressions are parsed for their references, not their values: every
//! resolved identifier and member access becomes an event, and each
//! subexpression synthesizes the coarse [Type] the member binder needs.

use crate::lex::TokenKind;

use super::{Event, ParseError, Parser, Type};

/// Binary operators by precedence level, loosest first.  `&&`/`||` and
/// friends all yield arithmetic; only additive operators can carry a pointer
/// through.
const BINARY_LEVELS: &[&[&str]] = &[
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

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "|=", "^=",
];

impl Parser {
    /// A full expression, including the comma operator.
    pub(crate) fn expression(&mut self) -> Result<Type, ParseError> {
        let mut ty = self.assignment()?;
        while self.eat_punct(",") {
            ty = self.assignment()?;
        }
        Ok(ty)
    }

    pub(crate) fn assignment(&mut self) -> Result<Type, ParseError> {
        let ty = self.conditional()?;
        if ASSIGN_OPS.contains(&self.peek().spelling.as_str()) && self.peek().is_punct() {
            self.advance();
            self.assignment()?;
        }
        Ok(ty)
    }

    pub(crate) fn conditional(&mut self) -> Result<Type, ParseError> {
        let cond = self.binary(0)?;
        if self.eat_punct("?") {
            let then = self.expression()?;
            self.expect_punct(":")?;
            self.conditional()?;
            return Ok(then);
        }
        Ok(cond)
    }

    fn binary(&mut self, level: usize) -> Result<Type, ParseError> {
        if level == BINARY_LEVELS.len() {
            return self.cast_expression();
        }
        let mut ty = self.binary(level + 1)?;
        loop {
            let token = self.peek();
            if !token.is_punct() || !BINARY_LEVELS[level].contains(&token.spelling.as_str()) {
                return Ok(ty);
            }
            let additive = matches!(token.spelling.as_str(), "+" | "-");
            self.advance();
            let rhs = self.binary(level + 1)?;
            ty = if additive {
                // Pointer arithmetic keeps the pointer.
                match (&ty, &rhs) {
                    (Type::Pointer(_) | Type::Array(_), _) => ty,
                    (_, Type::Pointer(_) | Type::Array(_)) => rhs,
                    _ => Type::Arith,
                }
            } else {
                Type::Arith
            };
        }
    }

    fn cast_expression(&mut self) -> Result<Type, ParseError> {
        if self.check_punct("(") && self.starts_type_at(1) {
            self.advance();
            let ty = self.type_name()?;
            self.expect_punct(")")?;
            if self.check_punct("{") {
                // Compound literal.
                self.initializer(&ty)?;
                return Ok(ty);
            }
            self.cast_expression()?;
            return Ok(ty);
        }
        self.unary()
    }

    fn unary(&mut self) -> Result<Type, ParseError> {
        if self.eat_punct("++") || self.eat_punct("--") {
            return self.unary();
        }
        if self.eat_punct("+") {
            return self.cast_expression();
        }
        if self.eat_punct("-") {
            self.cast_expression()?;
            return Ok(Type::Arith);
        }
        if self.eat_punct("!") || self.eat_punct("~") {
            self.cast_expression()?;
            return Ok(Type::Arith);
        }
        if self.eat_punct("*") {
            let ty = self.cast_expression()?;
            return Ok(ty.pointee());
        }
        if self.eat_punct("&") {
            let ty = self.cast_expression()?;
            return Ok(ty.pointer());
        }
        if self.eat_keyword("sizeof") {
            if self.check_punct("(") && self.starts_type_at(1) {
                self.advance();
                self.type_name()?;
                self.expect_punct(")")?;
            } else {
                self.unary()?;
            }
            return Ok(Type::Arith);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Type, ParseError> {
        let mut ty = self.primary()?;
        loop {
            if self.eat_punct("(") {
                if !self.check_punct(")") {
                    loop {
                        self.assignment()?;
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct(")")?;
                ty = ty.call_result();
            } else if self.eat_punct("[") {
                self.expression()?;
                self.expect_punct("]")?;
                ty = ty.pointee();
            } else if self.check_punct(".") && self.peek_at(1).kind == TokenKind::Identifier {
                self.advance();
                let token = self.advance();
                ty = self.resolve_member(&ty, &token.spelling, token.range);
            } else if self.check_punct("->") && self.peek_at(1).kind == TokenKind::Identifier {
                self.advance();
                let token = self.advance();
                let object = ty.pointee();
                ty = self.resolve_member(&object, &token.spelling, token.range);
            } else if self.eat_punct("++") || self.eat_punct("--") {
                // Type unchanged.
            } else {
                return Ok(ty);
            }
        }
    }

    fn primary(&mut self) -> Result<Type, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.pos += 1;
                match self.lookup_ordinary(&token.spelling) {
                    Some(binding) if !binding.is_typedef => {
                        let (decl, ty) = (binding.decl, binding.ty.clone());
                        self.emit(Event::DeclRef {
                            decl,
                            range: token.range,
                        });
                        Ok(ty)
                    }
                    Some(_) => Ok(Type::Unknown),
                    None => {
                        // Declared in a header; leave it alone everywhere.
                        self.out.external_decls.insert(token.spelling);
                        Ok(Type::Unknown)
                    }
                }
            }
            TokenKind::Literal => {
                self.pos += 1;
                if token.spelling.contains('"') {
                    Ok(Type::Arith.pointer())
                } else {
                    Ok(Type::Arith)
                }
            }
            TokenKind::Punct if token.spelling == "(" => {
                self.pos += 1;
                let ty = self.expression()?;
                self.expect_punct(")")?;
                Ok(ty)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// True when the token `n` ahead can begin a type name: a type keyword, a
    /// qualifier, or a known typedef name.  Unknown identifiers are not
    /// types here, so `(x)*y` stays an expression.
    fn starts_type_at(&self, n: usize) -> bool {
        let token = self.peek_at(n);
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
                    | "const"
                    | "volatile"
                    | "restrict"
            ),
            TokenKind::Identifier => self.is_typedef_name(&token.spelling),
            _ => false,
        }
    }

    /// `type-name`: specifiers plus an abstract declarator, as used by casts
    /// and `sizeof`.
    pub(crate) fn type_name(&mut self) -> Result<Type, ParseError> {
        let (base, _) = self.specifiers(false)?;
        let tree = self.decl_tree()?;
        Ok(self.resolve_decl_tree(tree, base).ty)
    }
}

#[cfg(test)]
mod test {
    use crate::lex::classify::scan_classified;
    use crate::parse::{parse, Event};

    fn refs(src: &str) -> Vec<u32> {
        parse(&scan_classified(src).unwrap())
            .unwrap()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::DeclRef { decl, .. } => Some(decl.0),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_precedence_and_refs() {
        // a=0, b=1, c=2 after main=... main is decl 0, a=1, b=2, c=3.
        let r = refs("int main(){int a=1,b=2,c;c=a+b*a;return c;}");
        assert_eq!(r, vec![3, 1, 2, 1, 3]);
    }

    #[test]
    fn test_cast_vs_parenthesized() {
        // `(x)*y` is a multiplication, so both x and y are references.
        let r = refs("int main(){int x=2,y=3;return (x)*y;}");
        assert_eq!(r.len(), 2);

        // `(T)*p` with T a typedef is a cast and a dereference.
        let out = parse(
            &scan_classified("typedef int T;int main(){int v=1;int *p=&v;return (T)*p;}").unwrap(),
        )
        .unwrap();
        let deref_count = out
            .events
            .iter()
            .filter(|e| matches!(e, Event::DeclRef { .. }))
            .count();
        assert_eq!(deref_count, 2); // v (through &) and p
    }

    #[test]
    fn test_member_chain_through_pointer() {
        let src = "struct B{int n;};struct A{struct B *b;};\
                   int main(){struct A a;struct B b;a.b=&b;return a.b->n;}";
        let out = parse(&scan_classified(src).unwrap()).unwrap();
        let members: Vec<u32> = out
            .events
            .iter()
            .filter_map(|event| match event {
                Event::MemberRef { decl, .. } => Some(decl.0),
                _ => None,
            })
            .collect();
        // `a.b` twice (decl of field b is 1), then `->n` (field n is 0).
        assert_eq!(members, vec![1, 1, 0]);
        assert!(out.unresolved_members.is_empty());
    }

    #[test]
    fn test_sizeof_forms() {
        let r = refs("int main(){int x=1;return sizeof(int)+sizeof x;}");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_calls_bind_functions() {
        let r = refs("int sq(int v){return v*v;}int main(){return sq(sq(2));}");
        // v*v inside sq, then sq twice from main.
        assert_eq!(r, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_string_and_array_indexing() {
        let src = "int main(){char buf[4];buf[0]='a';return buf[0];}";
        let r = refs(src);
        assert_eq!(r.len(), 2);
    }
}
