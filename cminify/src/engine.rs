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

//! The pass pipeline.
//!
//! Runs the enabled passes in order over an overlay of file revisions:
//! macro-name collection, optional macro expansion, identifier
//! minification, define introduction, and whitespace minimization.  Each
//! pass reads the top revision and pushes the next one; nothing is written
//! back anywhere until every enabled pass has finished.

use std::path::PathBuf;

use log::debug;

use crate::{
    pass::{self, Pass, PassError},
    source::{Overlay, SourceFile},
};

/// Pipeline configuration: the pass toggles and the compilation database.
#[derive(Clone, Debug)]
pub struct Options {
    /// Run the macro-expansion pass first.
    pub expand_all: bool,

    /// Run the define-introduction pass.
    pub add_macros: bool,

    /// Require introduced macro bodies to balance their brackets.
    pub nice_macros: bool,

    /// `-I` include directories, in search order.
    pub include_dirs: Vec<PathBuf>,

    /// `-D NAME[=VALUE]` predefinitions.
    pub defines: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            expand_all: false,
            add_macros: true,
            nice_macros: true,
            include_dirs: Vec::new(),
            defines: Vec::new(),
        }
    }
}

impl Options {
    /// Absorbs compiler flags from the compilation database: `-I` and `-D`,
    /// in both glued and separated spellings.  Anything else is irrelevant
    /// to minification and is skipped.
    pub fn parse_compiler_args<S: AsRef<str>>(&mut self, args: &[S]) {
        let mut iter = args.iter().map(AsRef::as_ref).peekable();
        while let Some(arg) = iter.next() {
            if let Some(dir) = arg.strip_prefix("-I") {
                if dir.is_empty() {
                    if let Some(dir) = iter.next() {
                        self.include_dirs.push(PathBuf::from(dir));
                    }
                } else {
                    self.include_dirs.push(PathBuf::from(dir));
                }
            } else if let Some(define) = arg.strip_prefix("-D") {
                if define.is_empty() {
                    if let Some(define) = iter.next() {
                        self.defines.push(define.to_string());
                    }
                } else {
                    self.defines.push(define.to_string());
                }
            } else {
                debug!("ignoring compiler flag {arg:?}");
            }
        }
    }
}

pub struct Engine {
    options: Options,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Minifies `file`, returning the final contents.
    pub fn run(&self, file: SourceFile) -> Result<String, PassError> {
        let mut overlay = Overlay::new(file);

        debug!("running {}", Pass::CollectMacroNames);
        let macros = pass::collect::run(&overlay.current(), &self.options)?;
        debug!("{} macro names reserved", macros.names.len());

        if self.options.expand_all {
            debug!("running {}", Pass::ExpandMacros);
            let expanded = pass::expand::run(&overlay.current(), &self.options)?;
            overlay.push(expanded);
        }

        debug!("running {}", Pass::MinifyIdentifiers);
        let current = overlay.current();
        let outcome = pass::minify::run(&current, &macros.names)?;
        let next = outcome
            .replacements
            .apply(current.contents())
            .map_err(|e| PassError::replacement(Pass::MinifyIdentifiers, e))?;
        overlay.push(next);

        if self.options.add_macros {
            debug!("running {}", Pass::AddDefines);
            if let Some(next) = pass::defines::run(
                &overlay.current(),
                &macros.names,
                outcome.next_symbol,
                self.options.nice_macros,
            )? {
                overlay.push(next);
            }
        }

        debug!("running {}", Pass::FormatWhitespace);
        let current = overlay.current();
        let replacements = pass::format::run(&current)?;
        let next = replacements
            .apply(current.contents())
            .map_err(|e| PassError::replacement(Pass::FormatWhitespace, e))?;
        overlay.push(next);

        debug!("{} revisions", overlay.depth());
        Ok(overlay.current_contents().to_string())
    }
}
