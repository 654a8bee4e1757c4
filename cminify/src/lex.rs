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

//! Lexical analysis for C.
//!
//! Lexing happens in two phases:
//!
//! 1. A low level called "scanning", implemented in the [scan] module.  This
//!    turns raw source bytes into [Token]s with exact spellings and byte
//!    ranges, skipping comments and whitespace.
//!
//! 2. A "classification" phase, implemented in the [classify] module.  This
//!    collapses each `#`-introduced directive line into a single synthetic
//!    preprocessor-line token, which is how the downstream passes want to see
//!    directives.
//!
//! The whitespace pass works on the raw scanned stream; everything else works
//! on classified streams.

pub mod classify;
pub mod scan;
mod token;
pub use token::{Token, TokenKind};
