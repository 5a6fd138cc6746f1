//! Shared fixtures for backend integration tests: a small intrinsic
//! registry, term constructors, and artifact lookup helpers.
#![allow(dead_code)]

use vela_backend::{IntrinsicImpl, IntrinsicRegistry, PrimKind, RefKind, ReprClass, Session, Unit};
use vela_core::diagnostics::Span;
use vela_core::term::{ApplyKind, BindingId, Lit, Term};
use vela_core::types::Type;

/// Registry mirroring the runtime namespaces a real compile configures:
/// core first, math second.
pub fn registry() -> IntrinsicRegistry {
    let mut registry = IntrinsicRegistry::new();
    registry.add_namespace("vela.rt.core");
    registry.add_namespace("vela.rt.math");
    registry.register(
        "vela.rt.core",
        "print",
        IntrinsicImpl {
            class: "Print".into(),
            params: vec![ReprClass::Ref(RefKind::Str)],
            ret: ReprClass::Ref(RefKind::Object),
        },
    );
    registry.register(
        "vela.rt.math",
        "add",
        IntrinsicImpl {
            class: "Add".into(),
            params: vec![
                ReprClass::Prim(PrimKind::Int),
                ReprClass::Prim(PrimKind::Int),
            ],
            ret: ReprClass::Prim(PrimKind::Int),
        },
    );
    registry
}

pub fn session() -> Session {
    Session::new(registry())
}

pub fn int_lit(n: i32) -> Term {
    Term::Lit {
        value: Lit::Int(n),
        ty: Type::int(),
        span: Span::default(),
    }
}

pub fn str_lit(text: &str) -> Term {
    Term::Lit {
        value: Lit::Str(text.to_string()),
        ty: Type::string(),
        span: Span::default(),
    }
}

pub fn sym_lit(text: &str) -> Term {
    Term::Lit {
        value: Lit::Sym(text.to_string()),
        ty: Type::symbol(),
        span: Span::default(),
    }
}

pub fn reference(binding: BindingId, ty: Type) -> Term {
    Term::Ref {
        binding,
        ty,
        span: Span::default(),
    }
}

pub fn call(callee: Term, args: Vec<Term>, ty: Type) -> Term {
    Term::Apply {
        kind: ApplyKind::Call,
        callee: Box::new(callee),
        args,
        ty,
        span: Span::default(),
    }
}

pub fn add_type() -> Type {
    Type::func(Type::Tuple(vec![Type::int(), Type::int()]), Type::int())
}

/// The rendered source of one class in the unit, by simple class name.
pub fn source_of(unit: &Unit, class: &str) -> String {
    unit.artifacts()
        .iter()
        .find(|artifact| artifact.name.class == class)
        .unwrap_or_else(|| {
            let known: Vec<_> = unit
                .artifacts()
                .iter()
                .map(|artifact| artifact.name.class.clone())
                .collect();
            panic!("no artifact named {class}; unit has {known:?}")
        })
        .source
        .clone()
}

pub fn class_names(unit: &Unit) -> Vec<String> {
    unit.artifacts()
        .iter()
        .map(|artifact| artifact.name.class.clone())
        .collect()
}
