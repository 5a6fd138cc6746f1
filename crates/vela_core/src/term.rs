use serde::{Deserialize, Serialize};

use crate::diagnostics::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LambdaId(pub u32);

/// Owning scope of a binding: the module top level or one function literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeId {
    Module,
    Lambda(LambdaId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    /// Named value bound by a `let`. `intrinsic` marks bindings whose value
    /// comes from a native implementation rather than a term body;
    /// `alias_coercion` marks the transparent constructor/destructor
    /// functions of a "new"-type, which lowering elides entirely.
    Let {
        intrinsic: bool,
        alias_coercion: bool,
    },
    Param,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingInfo {
    pub name: String,
    pub ty: Type,
    pub scope: ScopeId,
    pub kind: BindingKind,
}

impl BindingInfo {
    pub fn is_intrinsic(&self) -> bool {
        matches!(self.kind, BindingKind::Let { intrinsic: true, .. })
    }

    pub fn is_alias_coercion(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::Let {
                alias_coercion: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    Sym(String),
}

/// The four application flavors carried as an explicit tag on the term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyKind {
    /// Ordinary function call.
    Call,
    /// Dynamic index into a list (by position) or map (by key).
    Index,
    /// Structural address into a tuple; the argument must be a constant int.
    TupleAt,
    /// Structural address into a record; the argument must be a constant key.
    RecordAt,
}

/// One node of the typed program graph. Every term carries a fully resolved
/// type; the backend never infers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Term {
    Lit {
        value: Lit,
        ty: Type,
        span: Span,
    },
    ListLit {
        items: Vec<Term>,
        ty: Type,
        span: Span,
    },
    MapLit {
        entries: Vec<(Term, Term)>,
        ty: Type,
        span: Span,
    },
    TupleLit {
        items: Vec<Term>,
        ty: Type,
        span: Span,
    },
    RecordLit {
        fields: Vec<(String, Term)>,
        ty: Type,
        span: Span,
    },
    VariantLit {
        case: String,
        value: Box<Term>,
        ty: Type,
        span: Span,
    },
    /// Reference to a binding of the current module (top-level, param, or
    /// enclosing-lambda local).
    Ref {
        binding: BindingId,
        ty: Type,
        span: Span,
    },
    /// Reference to a top-level binding of an imported module.
    ImportedRef {
        module: String,
        name: String,
        ty: Type,
        span: Span,
    },
    Apply {
        kind: ApplyKind,
        callee: Box<Term>,
        args: Vec<Term>,
        ty: Type,
        span: Span,
    },
    /// Function literal. `parent` is the lexically enclosing scope; the body
    /// is an ordered statement list followed by a result term.
    Lambda {
        id: LambdaId,
        params: Vec<BindingId>,
        body: Vec<Statement>,
        result: Box<Term>,
        parent: ScopeId,
        ty: Type,
        span: Span,
    },
    /// Explicit representation-change marker inserted upstream.
    Coerce {
        term: Box<Term>,
        ty: Type,
        span: Span,
    },
}

impl Term {
    pub fn ty(&self) -> &Type {
        match self {
            Term::Lit { ty, .. }
            | Term::ListLit { ty, .. }
            | Term::MapLit { ty, .. }
            | Term::TupleLit { ty, .. }
            | Term::RecordLit { ty, .. }
            | Term::VariantLit { ty, .. }
            | Term::Ref { ty, .. }
            | Term::ImportedRef { ty, .. }
            | Term::Apply { ty, .. }
            | Term::Lambda { ty, .. }
            | Term::Coerce { ty, .. } => ty,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Term::Lit { span, .. }
            | Term::ListLit { span, .. }
            | Term::MapLit { span, .. }
            | Term::TupleLit { span, .. }
            | Term::RecordLit { span, .. }
            | Term::VariantLit { span, .. }
            | Term::Ref { span, .. }
            | Term::ImportedRef { span, .. }
            | Term::Apply { span, .. }
            | Term::Lambda { span, .. }
            | Term::Coerce { span, .. } => *span,
        }
    }

    /// The constant integer behind a tuple structural address, if the term
    /// is one.
    pub fn const_int(&self) -> Option<i64> {
        match self {
            Term::Lit {
                value: Lit::Int(n), ..
            } => Some(i64::from(*n)),
            Term::Lit {
                value: Lit::Long(n),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    /// The constant key behind a record structural address, if the term is
    /// one.
    pub fn const_key(&self) -> Option<&str> {
        match self {
            Term::Lit {
                value: Lit::Str(s), ..
            }
            | Term::Lit {
                value: Lit::Sym(s), ..
            } => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// `let name = value`. `value` is `None` for intrinsic bindings, whose
    /// implementation is native.
    Let {
        binding: BindingId,
        value: Option<Term>,
        span: Span,
    },
    Expr(Term),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub imports: Vec<String>,
    pub statements: Vec<Statement>,
    bindings: Vec<BindingInfo>,
}

impl Module {
    pub fn binding(&self, id: BindingId) -> &BindingInfo {
        &self.bindings[id.0 as usize]
    }

    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &BindingInfo)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(index, info)| (BindingId(index as u32), info))
    }

    /// Looks up a top-level `let` by source name.
    pub fn top_level_let(&self, name: &str) -> Option<BindingId> {
        self.bindings().find_map(|(id, info)| {
            let is_let = matches!(info.kind, BindingKind::Let { .. });
            (is_let && info.scope == ScopeId::Module && info.name == name).then_some(id)
        })
    }

    /// Ordered top-level `let` bindings, used to pre-declare module fields.
    pub fn top_level_lets(&self) -> Vec<BindingId> {
        self.statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Let { binding, .. } => Some(*binding),
                Statement::Expr(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.name == name)
    }
}

/// Construction API used by the front end (and tests) to assemble a module's
/// term graph with consistent binding and lambda identities.
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    imports: Vec<String>,
    statements: Vec<Statement>,
    bindings: Vec<BindingInfo>,
    next_lambda: u32,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> ModuleBuilder {
        ModuleBuilder {
            name: name.to_string(),
            imports: Vec::new(),
            statements: Vec::new(),
            bindings: Vec::new(),
            next_lambda: 0,
        }
    }

    pub fn import(&mut self, module: &str) -> &mut Self {
        self.imports.push(module.to_string());
        self
    }

    pub fn fresh_lambda(&mut self) -> LambdaId {
        let id = LambdaId(self.next_lambda);
        self.next_lambda += 1;
        id
    }

    pub fn bind(&mut self, name: &str, ty: Type, scope: ScopeId, kind: BindingKind) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(BindingInfo {
            name: name.to_string(),
            ty,
            scope,
            kind,
        });
        id
    }

    pub fn param(&mut self, name: &str, ty: Type, lambda: LambdaId) -> BindingId {
        self.bind(name, ty, ScopeId::Lambda(lambda), BindingKind::Param)
    }

    pub fn local_let(&mut self, name: &str, ty: Type, lambda: LambdaId) -> BindingId {
        self.bind(
            name,
            ty,
            ScopeId::Lambda(lambda),
            BindingKind::Let {
                intrinsic: false,
                alias_coercion: false,
            },
        )
    }

    /// Declares and appends a top-level `let name = value` statement.
    pub fn top_level_let(&mut self, name: &str, ty: Type, value: Term) -> BindingId {
        let span = value.span();
        let binding = self.bind(
            name,
            ty,
            ScopeId::Module,
            BindingKind::Let {
                intrinsic: false,
                alias_coercion: false,
            },
        );
        self.statements.push(Statement::Let {
            binding,
            value: Some(value),
            span,
        });
        binding
    }

    /// Declares a top-level intrinsic binding (no term body).
    pub fn top_level_intrinsic(&mut self, name: &str, ty: Type) -> BindingId {
        let binding = self.bind(
            name,
            ty,
            ScopeId::Module,
            BindingKind::Let {
                intrinsic: true,
                alias_coercion: false,
            },
        );
        self.statements.push(Statement::Let {
            binding,
            value: None,
            span: Span::default(),
        });
        binding
    }

    pub fn top_level_expr(&mut self, term: Term) -> &mut Self {
        self.statements.push(Statement::Expr(term));
        self
    }

    pub fn finish(self) -> Module {
        Module {
            name: self.name,
            imports: self.imports,
            statements: self.statements,
            bindings: self.bindings,
        }
    }
}
