//! Ordered diagnostics collected while loading records, parsing scripts and
//! running them. The log never aborts anything by itself; callers inspect it
//! and decide.

use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Malformed record text, duplicate keys, dangling references.
    Structural,
    /// A rejected edit.
    Validation,
    /// Script syntax errors and unresolved calls.
    Syntax,
    /// Errors raised while a script runs.
    Runtime,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Structural => "structural",
            DiagnosticKind::Validation => "validation",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Runtime => "runtime",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: ", file, line)?,
            (Some(file), None) => write!(f, "{}: ", file)?,
            (None, Some(line)) => write!(f, "line {}: ", line)?,
            (None, None) => {}
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<Diagnostic>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add(&mut self, diagnostic: Diagnostic) {
        debug!(kind = %diagnostic.kind, message = %diagnostic.message, "diagnostic");
        self.entries.push(diagnostic);
    }
    /// Convenience for the common case of a located message.
    pub fn report(&mut self, kind: DiagnosticKind, file: Option<&str>, line: Option<usize>, message: impl Into<String>) {
        self.add(Diagnostic {
            kind,
            file: file.map(str::to_string),
            line,
            message: message.into(),
        });
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
