//! Finds a libclang on the host, binds to it and parses C++ translation units
//! for code generation.
//!
//! ```no_run
//! use cxxast::{backend, parse::{ParseOptions, Session}, toolchain::Locator};
//! use std::path::Path;
//!
//! let toolchain = Locator::system().locate()?;
//! let session = Session::new(backend::configure_toolchain(&toolchain)?);
//! let args = vec![String::from("-std=c++17")];
//! let unit = session.parse(Path::new("widget.hpp"), &args, ParseOptions::default())?;
//! for entity in unit.root().children() {
//!     println!("{} {}", entity.kind_name(), entity.spelling());
//! }
//! # Ok::<(), cxxast::error::ClangError>(())
//! ```

pub mod backend;
pub mod cli;
pub mod diagnostics;
pub mod error;
pub mod parse;
pub mod toolchain;
