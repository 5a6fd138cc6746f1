use rustc_hash::FxHashSet;

use vela_core::diagnostics::Span;
use vela_core::term::{BindingId, LambdaId, Module, ScopeId, Statement, Term};
use vela_core::types::Type;

use crate::intrinsics::INSTANCE_FIELD;
use crate::names;
use crate::repr::OBJECT;
use crate::session::Session;
use crate::skeleton::{ClassSkeleton, FieldDecl, MethodDecl, Param, QualifiedName};

/// How a converted function literal is represented at run time.
///
/// Computed once per lambda and carried through naming, invocation-strategy,
/// and self-reference decisions, instead of re-deriving "is the capture map
/// empty" at every use site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureKind {
    /// Capture-free: one eagerly constructed shared instance, invocation
    /// method emitted static for direct dispatch without a receiver.
    Singleton,
    /// Capturing: one instance per capture environment, constructed with one
    /// argument per captured binding in declaration order.
    PerInstance { captures: Vec<BindingId> },
}

impl ClosureKind {
    pub fn captures(&self) -> &[BindingId] {
        match self {
            ClosureKind::Singleton => &[],
            ClosureKind::PerInstance { captures } => captures,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, ClosureKind::Singleton)
    }
}

/// Borrowed view of a `Term::Lambda`'s pieces.
#[derive(Debug, Clone, Copy)]
pub struct LambdaParts<'a> {
    pub id: LambdaId,
    pub params: &'a [BindingId],
    pub body: &'a [Statement],
    pub result: &'a Term,
    pub ty: &'a Type,
    pub span: Span,
}

pub fn lambda_parts(term: &Term) -> Option<LambdaParts<'_>> {
    match term {
        Term::Lambda {
            id,
            params,
            body,
            result,
            ty,
            span,
            ..
        } => Some(LambdaParts {
            id: *id,
            params,
            body,
            result,
            ty,
            span: *span,
        }),
        _ => None,
    }
}

/// Computes the captured-binding set of a function literal: every binding
/// referenced (at any nesting depth) whose owning scope is a lambda strictly
/// enclosing this one. Module-level globals are reachable through the module
/// singleton and are never captured; a reference to the lambda's own binding
/// is self-reference, resolved separately.
///
/// The result is in binding-declaration order, which is also the generated
/// constructor's parameter order.
pub fn captured_bindings(
    module: &Module,
    parts: LambdaParts<'_>,
    self_binding: Option<BindingId>,
) -> Vec<BindingId> {
    let mut inner: FxHashSet<LambdaId> = FxHashSet::default();
    inner.insert(parts.id);
    let mut captured: Vec<BindingId> = Vec::new();
    for statement in parts.body {
        collect_statement(module, statement, &mut inner, &mut captured, self_binding);
    }
    collect_term(module, parts.result, &mut inner, &mut captured, self_binding);
    captured.sort_by_key(|binding| binding.0);
    captured
}

fn collect_statement(
    module: &Module,
    statement: &Statement,
    inner: &mut FxHashSet<LambdaId>,
    captured: &mut Vec<BindingId>,
    self_binding: Option<BindingId>,
) {
    match statement {
        Statement::Let { value, .. } => {
            if let Some(value) = value {
                collect_term(module, value, inner, captured, self_binding);
            }
        }
        Statement::Expr(term) => collect_term(module, term, inner, captured, self_binding),
    }
}

fn collect_term(
    module: &Module,
    term: &Term,
    inner: &mut FxHashSet<LambdaId>,
    captured: &mut Vec<BindingId>,
    self_binding: Option<BindingId>,
) {
    match term {
        Term::Ref { binding, .. } => {
            if Some(*binding) == self_binding {
                return;
            }
            if let ScopeId::Lambda(owner) = module.binding(*binding).scope {
                if !inner.contains(&owner) && !captured.contains(binding) {
                    captured.push(*binding);
                }
            }
        }
        Term::Lambda {
            id, body, result, ..
        } => {
            inner.insert(*id);
            for statement in body {
                collect_statement(module, statement, inner, captured, self_binding);
            }
            collect_term(module, result, inner, captured, self_binding);
        }
        Term::Lit { .. } | Term::ImportedRef { .. } => {}
        Term::ListLit { items, .. } | Term::TupleLit { items, .. } => {
            for item in items {
                collect_term(module, item, inner, captured, self_binding);
            }
        }
        Term::MapLit { entries, .. } => {
            for (key, value) in entries {
                collect_term(module, key, inner, captured, self_binding);
                collect_term(module, value, inner, captured, self_binding);
            }
        }
        Term::RecordLit { fields, .. } => {
            for (_, value) in fields {
                collect_term(module, value, inner, captured, self_binding);
            }
        }
        Term::VariantLit { value, .. } => {
            collect_term(module, value, inner, captured, self_binding)
        }
        Term::Apply { callee, args, .. } => {
            collect_term(module, callee, inner, captured, self_binding);
            for arg in args {
                collect_term(module, arg, inner, captured, self_binding);
            }
        }
        Term::Coerce { term, .. } => collect_term(module, term, inner, captured, self_binding),
    }
}

/// A closure's generated declaration skeleton plus its representation tag.
#[derive(Debug)]
pub struct ConvertedClosure {
    pub kind: ClosureKind,
    pub skeleton: ClassSkeleton,
}

/// Produces the declaration skeleton for one function literal under its
/// assigned class name: capture fields and constructor (per-instance form)
/// or the shared `INSTANCE` field (singleton form), plus the apply/invoke
/// method pair. Bodies are left for the assembly engine's fill phase.
pub fn convert(
    session: &Session,
    module: &Module,
    name: QualifiedName,
    parts: LambdaParts<'_>,
    self_binding: Option<BindingId>,
) -> ConvertedClosure {
    let captures = captured_bindings(module, parts, self_binding);
    let kind = if captures.is_empty() {
        ClosureKind::Singleton
    } else {
        ClosureKind::PerInstance { captures }
    };

    let mut skeleton = ClassSkeleton::new(name.clone());
    skeleton.implement("Fn");

    match &kind {
        ClosureKind::Singleton => {
            skeleton.add_static_field(FieldDecl::staticf(INSTANCE_FIELD, &name.class));
        }
        ClosureKind::PerInstance { captures } => {
            let mut ctor_params = Vec::new();
            for binding in captures {
                let info = module.binding(*binding);
                let repr = session.repr_of(&info.ty, parts.span);
                let field_name = names::mangle(&info.name);
                skeleton.add_field(FieldDecl::instance(
                    &field_name,
                    repr.target_name(),
                    true,
                ));
                ctor_params.push(Param {
                    type_name: repr.target_name().to_string(),
                    name: field_name,
                });
            }
            skeleton.set_ctor(ctor_params);
        }
    }

    let result_repr = match parts.ty {
        Type::Func(_, result) => session.repr_of(result, parts.span),
        other => {
            session.internal_error(
                parts.span,
                format!("function literal typed {} instead of a function type", other.render()),
            );
            OBJECT
        }
    };

    let invoke_params = parts
        .params
        .iter()
        .map(|binding| {
            let info = module.binding(*binding);
            Param {
                type_name: session.repr_of(&info.ty, parts.span).target_name().to_string(),
                name: names::mangle(&info.name),
            }
        })
        .collect();
    skeleton.add_method(MethodDecl::new(
        "invoke",
        kind.is_singleton(),
        invoke_params,
        result_repr.target_name(),
    ));
    skeleton.add_method(MethodDecl::new(
        "apply",
        false,
        vec![Param {
            type_name: "Object".to_string(),
            name: "arg".to_string(),
        }],
        "Object",
    ));

    ConvertedClosure { kind, skeleton }
}
