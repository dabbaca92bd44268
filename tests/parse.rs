//! Exercises the real libclang. Every test returns early when the host has no
//! libclang the locator can find.

use cxxast::backend::{self, Backend};
use cxxast::diagnostics::Severity;
use cxxast::parse::{ParseOptions, Session};
use cxxast::toolchain::Locator;
use std::fs;
use std::path::Path;

fn backend() -> Option<Backend> {
    let toolchain = match Locator::system().locate() {
        Ok(toolchain) => toolchain,
        Err(err) => {
            eprintln!("skipping: {err}");
            return None;
        }
    };
    match backend::configure_toolchain(&toolchain) {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

fn cxx_args() -> Vec<String> {
    vec![String::from("-x"), String::from("c++"), String::from("-std=c++17")]
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn minimal_unit_has_no_errors() {
    let Some(backend) = backend() else { return };
    if let Err(err) = backend.load() {
        eprintln!("skipping: {err}");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "empty.cpp", "struct Empty {};\n");

    let unit = Session::new(backend)
        .parse(&source, &cxx_args(), ParseOptions::default())
        .unwrap();

    assert!(!unit.has_errors(), "{:?}", unit.diagnostics());
    let children = unit.root().children();
    let empty = children
        .iter()
        .find(|e| e.spelling() == "Empty")
        .expect("struct Empty in the AST");
    assert!(empty.is_in_main_file());
    assert_eq!(empty.location().map(|l| l.line), Some(1));
}

#[test]
fn syntax_error_still_yields_a_unit() {
    let Some(backend) = backend() else { return };
    if let Err(err) = backend.load() {
        eprintln!("skipping: {err}");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "broken.cpp", "// widget\nint x = ;\nstruct Ok {};\n");

    let unit = Session::new(backend)
        .parse(&source, &cxx_args(), ParseOptions::default())
        .unwrap();

    let error = unit
        .diagnostics()
        .iter()
        .find(|d| d.severity == Severity::Error)
        .expect("an error diagnostic");
    let location = error.location.as_ref().expect("error has a location");
    assert!(location.file.ends_with("broken.cpp"), "{}", location.file);
    assert_eq!(location.line, 2);

    // Declarations outside the broken region survive.
    assert!(unit.root().children().iter().any(|e| e.spelling() == "Ok"));
}

#[test]
fn configuring_again_returns_the_same_backend() {
    let Some(first) = backend() else { return };
    let Some(second) = backend() else { return };

    assert!(first.same_as(&second));
    assert!(backend::current().unwrap().same_as(&first));
}
