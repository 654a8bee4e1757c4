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

//! The minification passes and their failure modes.
//!
//! Each pass reads one revision of the file and either produces the edits
//! for the next revision or fails; a failure aborts the pipeline and names
//! the pass.  A replacement conflict is a defect in the pass that emitted
//! it and is reported distinctly.

use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error as ThisError;

use crate::{
    lex::scan::ScanError,
    message::Location,
    parse::ParseError,
    source::{ReplacementError, SourceFile},
};

pub mod collect;
pub mod defines;
pub mod expand;
pub mod format;
pub mod minify;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pass {
    CollectMacroNames,
    ExpandMacros,
    MinifyIdentifiers,
    AddDefines,
    FormatWhitespace,
}

impl Pass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CollectMacroNames => "CollectMacroNames",
            Self::ExpandMacros => "ExpandMacros",
            Self::MinifyIdentifiers => "MinifyIdentifiers",
            Self::AddDefines => "AddDefines",
            Self::FormatWhitespace => "FormatWhitespace",
        }
    }
}

impl Display for Pass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(ThisError, Debug)]
pub enum PassError {
    #[error("{pass} failed: {location}: {error}")]
    Scan {
        pass: Pass,
        error: ScanError,
        location: Location,
    },

    #[error("{pass} failed: {location}: {error}")]
    Parse {
        pass: Pass,
        error: ParseError,
        location: Location,
    },

    /// A defect in the pass itself, not in the input.
    #[error("{pass} failed: {error}")]
    Replacement { pass: Pass, error: ReplacementError },
}

impl PassError {
    pub fn scan(pass: Pass, file: &SourceFile, error: ScanError) -> Self {
        let offset = error.offset();
        Self::Scan {
            pass,
            error,
            location: file.location(offset..offset),
        }
    }

    pub fn parse(pass: Pass, file: &SourceFile, error: ParseError) -> Self {
        let offset = error.offset().unwrap_or(file.contents().len());
        Self::Parse {
            pass,
            error,
            location: file.location(offset..offset),
        }
    }

    pub fn replacement(pass: Pass, error: ReplacementError) -> Self {
        Self::Replacement { pass, error }
    }

    /// True for failures that indicate a bug in a pass rather than
    /// unsupported input.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Replacement { .. })
    }
}
