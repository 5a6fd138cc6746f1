use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn point(line: usize, column: usize) -> Span {
        let pos = Position { line, column };
        Span {
            start: pos,
            end: pos,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Span,
}

pub fn diagnostics_have_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|diag| diag.severity == DiagnosticSeverity::Error)
}

/// Accumulating sink for backend diagnostics.
///
/// Internal-consistency failures are reported here rather than returned as
/// `Err` so that one bad term does not abort the rest of a unit's build.
/// Each unit build brackets itself with [`DiagnosticSink::push_checkpoint`] /
/// [`DiagnosticSink::pop_checkpoint`]; the build is judged successful iff the
/// checkpoint-local error count is zero, regardless of how many warnings were
/// emitted along the way.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    checkpoints: Vec<usize>,
}

impl DiagnosticSink {
    pub fn new() -> DiagnosticSink {
        DiagnosticSink::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == DiagnosticSeverity::Error {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Reports a compiler-internal inconsistency at `span`.
    ///
    /// These always indicate a defect in an earlier stage (the type checker
    /// admitted something the backend cannot lower), never a user error.
    pub fn internal_error(&mut self, span: Span, message: impl Into<String>) {
        self.report(Diagnostic {
            code: "V0001".to_string(),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            span,
        });
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.report(Diagnostic {
            code: "V0002".to_string(),
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            span,
        });
    }

    pub fn push_checkpoint(&mut self) {
        self.checkpoints.push(self.error_count);
    }

    /// Ends the innermost checkpoint, returning the number of errors reported
    /// since the matching [`DiagnosticSink::push_checkpoint`].
    pub fn pop_checkpoint(&mut self) -> usize {
        let base = self.checkpoints.pop().unwrap_or(0);
        self.error_count - base
    }

    pub fn errors_since_checkpoint(&self) -> usize {
        let base = self.checkpoints.last().copied().unwrap_or(0);
        self.error_count - base
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        self.checkpoints.clear();
        std::mem::take(&mut self.diagnostics)
    }
}

pub fn render_diagnostics(module: &str, diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for (index, diagnostic) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let severity_label = match diagnostic.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        let start = &diagnostic.span.start;
        output.push_str(&format!(
            "{severity_label}[{}] {}:{}:{}\n  {}",
            diagnostic.code, module, start.line, start.column, diagnostic.message
        ));
    }
    output
}
