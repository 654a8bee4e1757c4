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

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use thiserror::Error as ThisError;

use cminify::{
    engine::{Engine, Options},
    pass::PassError,
    source::SourceFile,
};

/// Minify a C source file.
///
/// Reads the file (or standard input), renames everything the file owns to
/// the shortest possible identifiers, lifts repeated token runs into
/// `#define`s when that saves bytes, strips every removable byte of
/// whitespace, and writes the result to standard output (or back to the
/// file with `-i`).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// C source file to minify; standard input when omitted.
    file: Option<PathBuf>,

    /// Edit the file in place (requires FILE).
    #[arg(short = 'i')]
    in_place: bool,

    /// Expand all macro invocations before minifying, keeping only the
    /// #include directives written in the file.
    #[arg(long)]
    expand_all: bool,

    /// Do not introduce new #define macros.
    #[arg(long)]
    no_add_macros: bool,

    /// Allow introduced macro bodies to contain unbalanced brackets.
    #[arg(long)]
    no_nice_macros: bool,

    /// Extra compiler flag for the compilation database (repeatable).
    #[arg(long = "extra-arg", value_name = "FLAG")]
    extra_args: Vec<String>,

    /// Compiler flags after `--`: -I include paths and -D definitions.
    #[arg(last = true, value_name = "FLAGS")]
    compiler_args: Vec<String>,
}

#[derive(ThisError, Debug)]
enum MainError {
    #[error("cannot read standard input: {0}")]
    Stdin(io::Error),

    #[error("cannot read {path}: {error}")]
    Input { path: PathBuf, error: io::Error },

    #[error("cannot write {path}: {error}")]
    Output { path: PathBuf, error: io::Error },

    #[error("-i requires an input file")]
    InPlaceWithoutFile,

    #[error(transparent)]
    Pass(#[from] PassError),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Stdin(_) | Self::Input { .. } | Self::Output { .. } => 1,
            Self::InPlaceWithoutFile => 2,
            Self::Pass(error) if error.is_defect() => 4,
            Self::Pass(_) => 3,
        }
    }
}

fn run(cli: Cli) -> Result<(), MainError> {
    if cli.in_place && cli.file.is_none() {
        return Err(MainError::InPlaceWithoutFile);
    }

    let file = match &cli.file {
        Some(path) => {
            let contents = fs::read_to_string(path).map_err(|error| MainError::Input {
                path: path.clone(),
                error,
            })?;
            SourceFile::new(contents, Some(path.to_string_lossy().into_owned()))
        }
        None => {
            let mut contents = String::new();
            io::stdin()
                .read_to_string(&mut contents)
                .map_err(MainError::Stdin)?;
            SourceFile::new(contents, None)
        }
    };

    let mut options = Options {
        expand_all: cli.expand_all,
        add_macros: !cli.no_add_macros,
        nice_macros: !cli.no_nice_macros,
        ..Options::default()
    };
    options.parse_compiler_args(&cli.compiler_args);
    options.parse_compiler_args(&cli.extra_args);

    let output = Engine::new(options).run(file)?;

    match (&cli.file, cli.in_place) {
        (Some(path), true) => fs::write(path, output).map_err(|error| MainError::Output {
            path: path.clone(),
            error,
        })?,
        _ => print!("{output}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("cminify: error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
