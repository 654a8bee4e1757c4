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

//! The macro-name collection pass.
//!
//! Records every identifier `#define`d for the translation unit: the
//! compilation database's `-D` definitions, the main file's own defines, and
//! whatever its includes define, found by walking the include paths.  The
//! names feed the reserved set, so minted identifiers can never shadow a
//! macro.  Unresolvable includes are skipped: a name a header would have
//! contributed can only make minting more conservative, never wrong.

use std::collections::HashSet;
use std::path::Path;

use crate::{
    engine::Options,
    macros::{IncludeResolver, MacroCollector, MacroSet},
    pass::PassError,
    source::SourceFile,
};

pub struct MacroNames {
    /// Macro definitions in effect after the main file, for expansion.
    pub set: MacroSet,

    /// Every name that was ever defined, even under `#undef` or an untaken
    /// conditional branch.
    pub names: HashSet<String>,
}

pub fn run(file: &SourceFile, options: &Options) -> Result<MacroNames, PassError> {
    let resolver = IncludeResolver::new(options.include_dirs.clone());
    let mut collector = MacroCollector::new(&resolver);
    for define in &options.defines {
        collector.predefine(define);
    }
    let dir = file
        .file_name()
        .and_then(|name| Path::new(name.as_str()).parent().map(Path::to_path_buf));
    collector.collect_source(file.contents(), dir.as_deref());
    Ok(MacroNames {
        set: collector.set,
        names: collector.names,
    })
}

#[cfg(test)]
mod test {
    use std::fs;

    use crate::{engine::Options, source::SourceFile};

    use super::run;

    #[test]
    fn test_collects_main_file_defines() {
        let file = SourceFile::new(
            "#define N 10\n#define MAX(a,b) ((a)>(b)?(a):(b))\nint main(){return N;}".into(),
            Some("t.c".into()),
        );
        let names = run(&file, &Options::default()).unwrap();
        assert!(names.names.contains("N"));
        assert!(names.names.contains("MAX"));
    }

    #[test]
    fn test_collects_predefines_and_includes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.h"), "#define WIDTH 80\n").unwrap();
        let mut options = Options::default();
        options.include_dirs.push(dir.path().to_path_buf());
        options.defines.push("DEBUG=1".into());

        let file = SourceFile::new(
            "#include <config.h>\nint main(){return WIDTH;}".into(),
            Some("t.c".into()),
        );
        let names = run(&file, &options).unwrap();
        assert!(names.names.contains("WIDTH"));
        assert!(names.names.contains("DEBUG"));
    }

    #[test]
    fn test_quote_include_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("local.h"), "#define LOCAL 1\n").unwrap();
        let main_path = dir.path().join("main.c");
        let file = SourceFile::new(
            "#include \"local.h\"\nint main(){return LOCAL;}".into(),
            Some(main_path.to_string_lossy().into_owned()),
        );
        let names = run(&file, &Options::default()).unwrap();
        assert!(names.names.contains("LOCAL"));
    }

    #[test]
    fn test_missing_include_skipped() {
        let file = SourceFile::new(
            "#include <no_such_header.h>\n#define OK 1\nint main(){return 0;}".into(),
            Some("t.c".into()),
        );
        let names = run(&file, &Options::default()).unwrap();
        assert!(names.names.contains("OK"));
    }
}
