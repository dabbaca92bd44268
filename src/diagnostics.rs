//! Compiler diagnostics attached to a parsed unit and their plain-text rendering.

use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// `file:line`, the provenance tag used throughout the report.
    pub fn file_line(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// A suggested edit: replace `range` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixIt {
    pub range: Option<(SourceLocation, SourceLocation)>,
    pub replacement: String,
}

impl fmt::Display for FixIt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let verb = if self.replacement.is_empty() { "remove" } else { "replace" };
        match &self.range {
            Some((start, end)) => write!(
                f,
                "{verb} {}:{}-{}:{}",
                start.line, start.column, end.line, end.column
            )?,
            None => write!(f, "{verb}")?,
        }
        if !self.replacement.is_empty() {
            write!(f, " with \"{}\"", self.replacement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub fixits: Vec<FixIt>,
}

impl Diagnostic {
    fn file_line(&self) -> String {
        self.location
            .as_ref()
            .map(SourceLocation::file_line)
            .unwrap_or_default()
    }
}

/// Render diagnostics as `<file>:<line>: <severity>: <message>` lines, each
/// followed by one indented line per fix-it. A non-empty report ends with a
/// blank line.
pub fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let file_line = diagnostic.file_line();
        let _ = writeln!(
            out,
            "{}: {}: {}",
            file_line, diagnostic.severity, diagnostic.message
        );
        for fixit in &diagnostic.fixits {
            let _ = writeln!(out, "{file_line}:     {fixit}");
        }
    }
    if !diagnostics.is_empty() {
        out.push('\n');
    }
    out
}
