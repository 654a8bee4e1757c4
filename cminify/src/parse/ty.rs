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

use super::TagId;

/// The coarse type lattice the resolver works with.  It only distinguishes
/// what member binding needs: which record a value belongs to, and how many
/// pointer/array/function layers sit on top.  Typedefs are resolved away at
/// binding time, so they never appear here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,

    /// Any arithmetic type, including enums used as values.
    Arith,

    /// A struct or union.
    Record(TagId),

    /// An enum, when named as a type.
    Enum(TagId),

    Pointer(Box<Type>),
    Array(Box<Type>),

    /// A function; only the return type matters here.
    Function(Box<Type>),

    /// A type the resolver could not determine.  Member accesses through it
    /// go unresolved rather than wrong.
    Unknown,
}

impl Type {
    pub fn pointer(self) -> Self {
        Self::Pointer(Box::new(self))
    }

    pub fn array(self) -> Self {
        Self::Array(Box::new(self))
    }

    pub fn function(self) -> Self {
        Self::Function(Box::new(self))
    }

    /// The type a `*` or `[]` or `->` steps into.
    pub fn pointee(&self) -> Self {
        match self {
            Self::Pointer(inner) | Self::Array(inner) => (**inner).clone(),
            _ => Self::Unknown,
        }
    }

    /// The result type of calling a value of this type.
    pub fn call_result(&self) -> Self {
        match self {
            Self::Function(ret) => (**ret).clone(),
            Self::Pointer(inner) => match &**inner {
                Self::Function(ret) => (**ret).clone(),
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }

    /// The record this value belongs to for a `.` access, if known.
    pub fn as_record(&self) -> Option<TagId> {
        match self {
            Self::Record(tag) => Some(*tag),
            _ => None,
        }
    }
}
