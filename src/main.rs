use anyhow::Result;
use clap::Parser;
use console::{Term, style};
use std::io::Write;

use cxxast::{backend, cli, diagnostics, parse::Session, toolchain::Locator};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}:\n{}", record.level(), record.args()))
        .filter_level(cli.verbose.log_level_filter())
        .target(env_logger::fmt::Target::Stderr)
        .init();

    let locator = Locator::system().with_explicit_dir(cli.libclang_dir.clone());

    match cli.command {
        cli::Command::Locate { json } => {
            let toolchain = locator.locate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&toolchain)?);
            } else {
                println!("source:       {}", toolchain.source);
                if let Some(executable) = &toolchain.executable {
                    println!("executable:   {}", executable.display());
                }
                if let Some(version) = &toolchain.version {
                    println!("version:      {version}");
                }
                println!("library dir:  {}", toolchain.library_dir.display());
                println!("library file: {}", toolchain.library_file.display());
            }
            Ok(())
        }
        cli::Command::Parse(args) => {
            let toolchain = locator.locate()?;
            let session = Session::new(backend::configure_toolchain(&toolchain)?);
            let unit = session.parse(&args.file, &args.clang_args, args.options())?;

            if !unit.diagnostics().is_empty() {
                let report = diagnostics::render(unit.diagnostics());
                if Term::stderr().is_term() {
                    let styled = if unit.has_errors() {
                        style(report).red()
                    } else {
                        style(report).yellow()
                    };
                    eprint!("{styled}");
                } else {
                    eprint!("{report}");
                }
            }

            for entity in unit.root().children().iter().filter(|e| e.is_in_main_file()) {
                let line = entity.location().map(|l| l.line).unwrap_or_default();
                println!(
                    "{}:{}: {} {}",
                    args.file.display(),
                    line,
                    entity.kind_name(),
                    entity.spelling()
                );
            }

            if unit.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
