use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;

use crate::parse::ParseOptions;

/// Locate libclang and parse C++ translation units for code generation.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Verbosity:
    /// -v -> Debug
    /// -vv -> Trace
    /// -q -> Warn
    /// -qq -> Error
    /// -qqq -> Off.
    /// Default (/ no argument given): 'info'
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    /// Directory containing the libclang shared library. Takes precedence
    /// over LIBCLANG_PATH, LLVM_LIB_DIR and anything found on PATH.
    #[arg(long, global = true)]
    pub libclang_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find libclang and print where it was found.
    Locate {
        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Parse a single file and report its diagnostics.
    Parse(ParseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// The C++ source or header to parse.
    pub file: PathBuf,

    /// Tolerate unresolved includes.
    #[arg(long, default_value_t = false)]
    pub incomplete: bool,

    /// Parse function bodies instead of skipping them.
    #[arg(long, default_value_t = false)]
    pub keep_function_bodies: bool,

    /// Drop macro expansion and inclusion records.
    #[arg(long, default_value_t = false)]
    pub no_detailed_records: bool,

    /// Arguments passed verbatim to clang, after `--`.
    #[arg(last = true)]
    pub clang_args: Vec<String>,
}

impl ParseArgs {
    pub fn options(&self) -> ParseOptions {
        let mut options = ParseOptions::default();
        options.set(ParseOptions::INCOMPLETE, self.incomplete);
        options.set(ParseOptions::SKIP_FUNCTION_BODIES, !self.keep_function_bodies);
        options.set(
            ParseOptions::DETAILED_PREPROCESSING_RECORD,
            !self.no_detailed_records,
        );
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("expected valid arguments")
    }

    #[test]
    fn parse_defaults_match_library_defaults() {
        let cli = parse(&["cxxast", "parse", "widget.hpp"]);

        match cli.command {
            Command::Parse(args) => {
                assert_eq!(args.file, PathBuf::from("widget.hpp"));
                assert_eq!(args.options(), ParseOptions::default());
                assert!(args.clang_args.is_empty());
            }
            other => panic!("expected parse command, got {other:?}"),
        }
    }

    #[test]
    fn clang_arguments_follow_double_dash() {
        let cli = parse(&[
            "cxxast",
            "parse",
            "--incomplete",
            "--keep-function-bodies",
            "widget.hpp",
            "--",
            "-std=c++17",
            "-DWIDGET=1",
        ]);

        match cli.command {
            Command::Parse(args) => {
                assert_eq!(args.clang_args, vec!["-std=c++17", "-DWIDGET=1"]);
                let options = args.options();
                assert!(options.contains(ParseOptions::INCOMPLETE));
                assert!(!options.contains(ParseOptions::SKIP_FUNCTION_BODIES));
                assert!(options.contains(ParseOptions::DETAILED_PREPROCESSING_RECORD));
            }
            other => panic!("expected parse command, got {other:?}"),
        }
    }

    #[test]
    fn libclang_dir_is_global() {
        let cli = parse(&["cxxast", "locate", "--json", "--libclang-dir", "/opt/llvm/lib"]);

        assert_eq!(cli.libclang_dir, Some(PathBuf::from("/opt/llvm/lib")));
        assert!(matches!(cli.command, Command::Locate { json: true }));
    }
}
