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

//! The scope stack that allocates minted names during identifier
//! minification.
//!
//! Scopes live in one growable buffer; the top is the current scope.  Each
//! scope carries two counters, one for ordinary declarations and one for
//! struct/union/enum tags, giving the next unused name *index* in that scope.
//! A function body or compound statement starts from its parent's counters
//! (names already visible must not be reused); a struct/union body starts
//! from zero (members are their own namespace).  Scopes pop as the traversal
//! position passes their end offset.

use std::collections::HashSet;

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};

use crate::{
    identifier::{is_keyword, nth_name, Name},
    parse::{DeclId, TagId},
};

#[derive(Debug)]
struct Scope {
    /// Byte offset in the main file where this scope ends.
    end: usize,

    /// Next unused name index for ordinary declarations.
    decl_next: u64,

    /// Next unused name index for tags.
    type_next: u64,

    /// Names of external declarations that must not be minted.  Populated
    /// only on the outermost scope.
    external_decls: HashSet<String>,
    external_types: HashSet<String>,
}

impl Scope {
    fn new(end: usize, decl_next: u64, type_next: u64) -> Self {
        Self {
            end,
            decl_next,
            type_next,
            external_decls: HashSet::new(),
            external_types: HashSet::new(),
        }
    }
}

pub struct ScopeStack<'a> {
    scopes: SmallVec<[Scope; 8]>,
    decl_map: IndexMap<DeclId, Name>,
    type_map: IndexMap<TagId, Name>,

    /// Names that may never be minted: C keywords are always excluded; these
    /// add external symbols and anything else the caller wants untouchable.
    reserved: &'a HashSet<String>,

    /// Macro names collected by the macro-name pass.
    macros: &'a HashSet<String>,

    /// One past the largest index ever accepted in any scope.  Seeds the
    /// define-introduction pass so its names cannot collide with minted ones.
    high_water: u64,
}

impl<'a> ScopeStack<'a> {
    /// Creates a stack holding the outermost scope, which ends at
    /// `file_end` and is never popped.
    pub fn new(file_end: usize, reserved: &'a HashSet<String>, macros: &'a HashSet<String>) -> Self {
        Self {
            scopes: smallvec![Scope::new(file_end, 0, 0)],
            decl_map: IndexMap::new(),
            type_map: IndexMap::new(),
            reserved,
            macros,
            high_water: 0,
        }
    }

    /// Pops every scope whose end lies strictly before `loc`.  Called before
    /// every add or push.
    pub fn on_location(&mut self, loc: usize) {
        while self.scopes.len() > 1 && self.scopes.last().unwrap().end < loc {
            self.scopes.pop();
        }
    }

    /// Pushes a scope with counters reset to zero, for struct/union bodies.
    pub fn push_fresh(&mut self, end: usize) {
        self.on_location(end);
        self.scopes.push(Scope::new(end, 0, 0));
    }

    /// Pushes a scope that continues the parent's counters, for function
    /// bodies and compound statements.
    pub fn push_inheriting(&mut self, end: usize) {
        self.on_location(end);
        let parent = self.scopes.last().unwrap();
        let scope = Scope::new(end, parent.decl_next, parent.type_next);
        self.scopes.push(scope);
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn blocked(&self, name: &str, externals: &HashSet<String>) -> bool {
        is_keyword(name)
            || self.reserved.contains(name)
            || self.macros.contains(name)
            || externals.contains(name)
    }

    fn mint(&mut self, types: bool) -> Name {
        let top = self.scopes.len() - 1;
        let mut index = if types {
            self.scopes[top].type_next
        } else {
            self.scopes[top].decl_next
        };
        loop {
            let name = nth_name(index);
            index += 1;
            let externals = if types {
                &self.scopes[0].external_types
            } else {
                &self.scopes[0].external_decls
            };
            if self.blocked(&name, externals) {
                continue;
            }
            if types {
                self.scopes[top].type_next = index;
            } else {
                self.scopes[top].decl_next = index;
            }
            self.high_water = self.high_water.max(index);
            return name;
        }
    }

    /// Allocates the next declaration name in the current scope for `key`,
    /// or returns the name already minted for it (forward declarations and
    /// redeclarations collapse onto one entry).
    pub fn add_decl(&mut self, key: DeclId, loc: usize) -> Name {
        self.on_location(loc);
        if let Some(name) = self.decl_map.get(&key) {
            return name.clone();
        }
        let name = self.mint(false);
        self.decl_map.insert(key, name.clone());
        name
    }

    /// Allocates the next tag name in the current scope for `key`.
    pub fn add_type(&mut self, key: TagId, loc: usize) -> Name {
        self.on_location(loc);
        if let Some(name) = self.type_map.get(&key) {
            return name.clone();
        }
        let name = self.mint(true);
        self.type_map.insert(key, name.clone());
        name
    }

    /// Records a declaration name owned by another translation unit, so it is
    /// never minted.
    pub fn register_external_decl(&mut self, name: &str) {
        self.scopes[0].external_decls.insert(name.into());
    }

    /// Records a tag or typedef name owned by another translation unit.
    pub fn register_external_type(&mut self, name: &str) {
        self.scopes[0].external_types.insert(name.into());
    }

    /// The name minted for `key`, if any.
    pub fn lookup_decl(&self, key: DeclId) -> Option<&Name> {
        self.decl_map.get(&key)
    }

    pub fn lookup_type(&self, key: TagId) -> Option<&Name> {
        self.type_map.get(&key)
    }

    /// One past the largest index accepted in any scope so far.
    pub fn high_water(&self) -> u64 {
        self.high_water
    }
}
