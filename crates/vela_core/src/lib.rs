pub mod diagnostics;
pub mod term;
pub mod types;

pub use diagnostics::{
    diagnostics_have_errors, render_diagnostics, Diagnostic, DiagnosticSeverity, DiagnosticSink,
    Position, Span,
};
pub use term::{
    ApplyKind, BindingId, BindingInfo, BindingKind, LambdaId, Lit, Module, ModuleBuilder, Program,
    ScopeId, Statement, Term,
};
pub use types::Type;
