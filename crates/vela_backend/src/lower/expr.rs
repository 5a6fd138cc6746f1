use vela_core::diagnostics::Span;
use vela_core::term::{ApplyKind, Lit, Term};
use vela_core::types::Type;

use crate::names;
use crate::repr::{PrimKind, RefKind, ReprClass, FUNCTION, OBJECT};
use crate::VelaError;

use super::Lowerer;

impl Lowerer<'_> {
    /// Emits `term` as a target expression, returning the text together with
    /// the representation it carries. Callers coerce into their expected
    /// representation as the final step.
    pub(crate) fn emit(&mut self, term: &Term) -> Result<(String, ReprClass), VelaError> {
        match term {
            Term::Lit { value, .. } => Ok(self.emit_lit(value)),
            Term::ListLit { items, .. } => {
                let mut expr = "ListVal.EMPTY".to_string();
                for item in items {
                    let lowered = self.lower_expr(item, OBJECT)?;
                    expr.push_str(&format!(".append({lowered})"));
                }
                Ok((expr, ReprClass::Ref(RefKind::List)))
            }
            Term::MapLit { entries, .. } => {
                let mut expr = "MapVal.EMPTY".to_string();
                for (key, value) in entries {
                    let key = self.lower_expr(key, OBJECT)?;
                    let value = self.lower_expr(value, OBJECT)?;
                    expr.push_str(&format!(".assoc({key}, {value})"));
                }
                Ok((expr, ReprClass::Ref(RefKind::Map)))
            }
            Term::TupleLit { items, .. } => {
                if items.is_empty() {
                    return Ok(("TupleVal.EMPTY".to_string(), ReprClass::Ref(RefKind::Tuple)));
                }
                let mut lowered = Vec::new();
                for item in items {
                    lowered.push(self.lower_expr(item, OBJECT)?);
                }
                Ok((
                    format!("TupleVal.of(new Object[]{{{}}})", lowered.join(", ")),
                    ReprClass::Ref(RefKind::Tuple),
                ))
            }
            Term::RecordLit { fields, .. } => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for (key, value) in fields {
                    keys.push(format!("{key:?}"));
                    values.push(self.lower_expr(value, OBJECT)?);
                }
                Ok((
                    format!(
                        "RecordVal.of(new String[]{{{}}}, new Object[]{{{}}})",
                        keys.join(", "),
                        values.join(", ")
                    ),
                    ReprClass::Ref(RefKind::Record),
                ))
            }
            Term::VariantLit { case, value, .. } => {
                let lowered = self.lower_expr(value, OBJECT)?;
                Ok((
                    format!("VariantVal.of(Keyword.of({case:?}), {lowered})"),
                    ReprClass::Ref(RefKind::Variant),
                ))
            }
            Term::Ref { binding, span, .. } => self.lower_ref(*binding, *span),
            Term::ImportedRef {
                module: module_name,
                name,
                ty,
                span,
            } => match self.imports.get(module_name) {
                Some(target) => Ok((
                    format!(
                        "{}.INSTANCE.{}",
                        target.class_name.qualified(),
                        names::mangle(name)
                    ),
                    self.session.repr_of(ty, *span),
                )),
                None => {
                    self.session.internal_error(
                        *span,
                        format!("imported module {module_name} has no built unit"),
                    );
                    Ok(("null".to_string(), OBJECT))
                }
            },
            Term::Apply {
                kind,
                callee,
                args,
                span,
                ..
            } => match kind {
                ApplyKind::Call => self.emit_call(callee, args, *span),
                ApplyKind::Index => self.emit_index(callee, args, *span),
                ApplyKind::TupleAt => self.emit_tuple_at(callee, args, *span),
                ApplyKind::RecordAt => self.emit_record_at(callee, args, *span),
            },
            Term::Lambda { .. } => self.lower_lambda(term, None, None),
            Term::Coerce {
                term: inner,
                ty,
                span,
            } => {
                let target = self.session.repr_of(ty, *span);
                let lowered = self.lower_expr(inner, target)?;
                Ok((lowered, target))
            }
        }
    }

    fn emit_lit(&self, value: &Lit) -> (String, ReprClass) {
        match value {
            Lit::Bool(b) => (b.to_string(), ReprClass::Prim(PrimKind::Bool)),
            Lit::Int(n) => (n.to_string(), ReprClass::Prim(PrimKind::Int)),
            Lit::Long(n) => (format!("{n}L"), ReprClass::Prim(PrimKind::Long)),
            Lit::Double(x) => (format!("{x:?}"), ReprClass::Prim(PrimKind::Double)),
            Lit::Str(text) => (format!("{text:?}"), ReprClass::Ref(RefKind::Str)),
            // Symbol literals prefer the module's deduplicated constant pool
            // over inline re-construction.
            Lit::Sym(text) => match self.unit.symbol_field(text) {
                Some(field) => (
                    format!("{}.{field}", self.unit.class_name.class),
                    ReprClass::Ref(RefKind::Keyword),
                ),
                None => (
                    format!("Keyword.of({text:?})"),
                    ReprClass::Ref(RefKind::Keyword),
                ),
            },
        }
    }

    /// Function-call lowering ladder, first match wins:
    /// new-type coercion elision, direct scattered `invoke` on a statically
    /// known callee, then the generic single-argument `apply` dispatch.
    fn emit_call(
        &mut self,
        callee: &Term,
        args: &[Term],
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        let module = self.module;
        if let Term::Ref { binding, .. } = callee {
            let info = module.binding(*binding);
            if info.is_alias_coercion() {
                if args.len() == 1 {
                    return self.emit(&args[0]);
                }
                self.session.internal_error(
                    span,
                    "new-type coercion applied to more than one argument",
                );
                return Ok(("null".to_string(), OBJECT));
            }
            if info.is_intrinsic() {
                let resolved = self.session.resolver().resolve(
                    &module.name,
                    *binding,
                    &info.name,
                    &info.ty,
                )?;
                if let Some(scattered) = scatter_args(args, resolved.params.len()) {
                    let mut lowered = Vec::new();
                    for (arg, repr) in scattered.iter().zip(resolved.params.iter()) {
                        lowered.push(self.lower_expr(arg, *repr)?);
                    }
                    return Ok((
                        format!(
                            "{}.invoke({})",
                            resolved.instance_path(),
                            lowered.join(", ")
                        ),
                        resolved.ret,
                    ));
                }
            } else if let Some(lambda) = self.unit.binding_lambdas.get(binding).copied() {
                let known = (
                    self.unit.class_for_lambda(lambda).cloned(),
                    self.unit.kind_for_lambda(lambda).cloned(),
                );
                if let (Some(class), Some(kind)) = known {
                    if let Type::Func(param, result) = &info.ty {
                        let param_tys = param.scattered_params();
                        if let Some(scattered) = scatter_args(args, param_tys.len()) {
                            let reprs: Vec<ReprClass> = param_tys
                                .iter()
                                .map(|ty| self.session.repr_of(ty, span))
                                .collect();
                            let mut lowered = Vec::new();
                            for (arg, repr) in scattered.iter().zip(reprs.iter()) {
                                lowered.push(self.lower_expr(arg, *repr)?);
                            }
                            let result_repr = self.session.repr_of(result, span);
                            let call = if kind.is_singleton() {
                                format!("{}.invoke({})", class.class, lowered.join(", "))
                            } else {
                                let (instance, _) = self.lower_ref(*binding, span)?;
                                format!(
                                    "(({}) ({instance})).invoke({})",
                                    class.class,
                                    lowered.join(", ")
                                )
                            };
                            return Ok((call, result_repr));
                        }
                    }
                }
            }
        }

        let (callee_expr, callee_repr) = self.emit(callee)?;
        let callee_fn = self.coerced(callee_expr, callee_repr, FUNCTION, span);
        let arg = if args.len() == 1 {
            self.lower_expr(&args[0], OBJECT)?
        } else {
            let mut lowered = Vec::new();
            for arg in args {
                lowered.push(self.lower_expr(arg, OBJECT)?);
            }
            format!("TupleVal.of(new Object[]{{{}}})", lowered.join(", "))
        };
        Ok((format!("({callee_fn}).apply({arg})"), OBJECT))
    }

    fn emit_index(
        &mut self,
        base: &Term,
        args: &[Term],
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        if args.len() != 1 {
            self.session
                .internal_error(span, "collection index takes exactly one argument");
            return Ok(("null".to_string(), OBJECT));
        }
        let base_repr = self.session.repr_of(base.ty(), span);
        match base_repr {
            ReprClass::Ref(RefKind::List) => {
                let base_expr = self.lower_expr(base, base_repr)?;
                let index = self.lower_expr(&args[0], ReprClass::Prim(PrimKind::Int))?;
                Ok((format!("({base_expr}).nth({index})"), OBJECT))
            }
            ReprClass::Ref(RefKind::Map) => {
                let base_expr = self.lower_expr(base, base_repr)?;
                let key = self.lower_expr(&args[0], OBJECT)?;
                Ok((format!("({base_expr}).get({key})"), OBJECT))
            }
            other => {
                self.session.internal_error(
                    span,
                    format!(
                        "collection index on non-collection representation {}",
                        other.target_name()
                    ),
                );
                Ok(("null".to_string(), OBJECT))
            }
        }
    }

    fn emit_tuple_at(
        &mut self,
        base: &Term,
        args: &[Term],
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        // Structural addresses are resolved at compile time; a dynamic index
        // here means an earlier stage mistagged the application.
        let position = args.first().and_then(Term::const_int);
        let Some(position) = position else {
            self.session.internal_error(
                span,
                "tuple structural address requires a compile-time constant index",
            );
            return Ok(("null".to_string(), OBJECT));
        };
        let base_expr = self.lower_expr(base, ReprClass::Ref(RefKind::Tuple))?;
        Ok((format!("({base_expr}).at({position})"), OBJECT))
    }

    fn emit_record_at(
        &mut self,
        base: &Term,
        args: &[Term],
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        let key = args.first().and_then(Term::const_key).map(str::to_string);
        let Some(key) = key else {
            self.session.internal_error(
                span,
                "record structural address requires a compile-time constant key",
            );
            return Ok(("null".to_string(), OBJECT));
        };
        let base_expr = self.lower_expr(base, ReprClass::Ref(RefKind::Record))?;
        Ok((format!("({base_expr}).get({key:?})"), OBJECT))
    }
}

/// Scatters call-site arguments to a known callee arity: either the
/// arguments already match, or a single literal tuple argument spreads to
/// its members. Anything else falls back to generic `apply` dispatch.
fn scatter_args(args: &[Term], arity: usize) -> Option<Vec<&Term>> {
    if args.len() == arity {
        return Some(args.iter().collect());
    }
    if arity > 1 && args.len() == 1 {
        if let Term::TupleLit { items, .. } = &args[0] {
            if items.len() == arity {
                return Some(items.iter().collect());
            }
        }
    }
    None
}
