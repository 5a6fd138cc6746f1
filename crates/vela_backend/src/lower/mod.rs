mod expr;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use vela_core::diagnostics::Span;
use vela_core::term::{BindingId, Module, ScopeId, Statement, Term};
use vela_core::types::Type;

use crate::closure::{self, ClosureKind, LambdaParts};
use crate::coerce;
use crate::names;
use crate::repr::{ReprClass, FUNCTION, OBJECT};
use crate::session::Session;
use crate::units::Unit;
use crate::VelaError;

/// Lexical context of the lambda whose body is currently being lowered.
#[derive(Debug)]
pub(crate) struct Frame {
    /// Simple class name of the closure being generated.
    pub class: String,
    pub singleton: bool,
    /// Binding naming this lambda, for self-reference resolution.
    pub self_binding: Option<BindingId>,
    pub captures: Vec<BindingId>,
    /// Parameters plus locals declared so far in the body.
    pub locals: FxHashSet<BindingId>,
}

impl Frame {
    pub(crate) fn for_closure(
        class: &str,
        kind: &ClosureKind,
        parts: LambdaParts<'_>,
        self_binding: Option<BindingId>,
    ) -> Frame {
        Frame {
            class: class.to_string(),
            singleton: kind.is_singleton(),
            self_binding,
            captures: kind.captures().to_vec(),
            locals: parts.params.iter().copied().collect(),
        }
    }
}

/// The recursive-descent statement/expression formatter.
///
/// One lowerer exists per body-fill job: either the module's top-level
/// statement sequence (`frame == None`) or one closure body. Every lowered
/// expression is pushed through the coercion engine against the expected
/// representation its context supplies.
pub(crate) struct Lowerer<'a> {
    pub(crate) session: &'a Session,
    pub(crate) module: &'a Module,
    pub(crate) unit: &'a mut Unit,
    pub(crate) imports: &'a IndexMap<String, Unit>,
    pub(crate) frame: Option<Frame>,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn top_level(
        session: &'a Session,
        module: &'a Module,
        unit: &'a mut Unit,
        imports: &'a IndexMap<String, Unit>,
    ) -> Lowerer<'a> {
        Lowerer {
            session,
            module,
            unit,
            imports,
            frame: None,
        }
    }

    pub(crate) fn in_lambda(
        session: &'a Session,
        module: &'a Module,
        unit: &'a mut Unit,
        imports: &'a IndexMap<String, Unit>,
        frame: Frame,
    ) -> Lowerer<'a> {
        Lowerer {
            session,
            module,
            unit,
            imports,
            frame: Some(frame),
        }
    }

    /// Lowers one top-level statement into `run` body lines.
    ///
    /// Top-level lets are pre-declared as fields on the module class, so the
    /// statement form emits only the assignment; intrinsic lets have no
    /// runtime statement at all.
    pub(crate) fn lower_top_level_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<String>, VelaError> {
        let module = self.module;
        match statement {
            Statement::Let { value: None, .. } => Ok(Vec::new()),
            Statement::Let {
                binding,
                value: Some(term),
                span,
            } => {
                let info = module.binding(*binding);
                let field_repr = self.session.repr_of(&info.ty, *span);
                let expr = self.lower_binding_value(*binding, &info.name, term, field_repr, *span)?;
                Ok(vec![format!(
                    "this.{} = {expr};",
                    names::mangle(&info.name)
                )])
            }
            Statement::Expr(term) => {
                let expected = self.session.repr_of(term.ty(), term.span());
                let expr = self.lower_expr(term, expected)?;
                Ok(vec![format!("{expr};")])
            }
        }
    }

    /// Lowers one statement of a lambda body. Unlike the top level, a let
    /// here is a true local: declared and assigned in one statement.
    pub(crate) fn lower_lambda_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<String>, VelaError> {
        let module = self.module;
        match statement {
            Statement::Let { value: None, .. } => Ok(Vec::new()),
            Statement::Let {
                binding,
                value: Some(term),
                span,
            } => {
                let info = module.binding(*binding);
                let repr = self.session.repr_of(&info.ty, *span);
                let expr = self.lower_binding_value(*binding, &info.name, term, repr, *span)?;
                let line = format!(
                    "final {} {} = {expr};",
                    repr.target_name(),
                    names::mangle(&info.name)
                );
                if let Some(frame) = self.frame.as_mut() {
                    frame.locals.insert(*binding);
                }
                Ok(vec![line])
            }
            Statement::Expr(term) => {
                let expected = self.session.repr_of(term.ty(), term.span());
                let expr = self.lower_expr(term, expected)?;
                Ok(vec![format!("{expr};")])
            }
        }
    }

    fn lower_binding_value(
        &mut self,
        binding: BindingId,
        name: &str,
        term: &Term,
        expected: ReprClass,
        span: Span,
    ) -> Result<String, VelaError> {
        if let Term::Lambda { id, .. } = term {
            self.unit.binding_lambdas.insert(binding, *id);
            let (raw, actual) = self.lower_lambda(term, Some(name), Some(binding))?;
            return Ok(self.coerced(raw, actual, expected, span));
        }
        self.lower_expr(term, expected)
    }

    /// Lowers `term` and coerces the result into `expected`.
    pub(crate) fn lower_expr(
        &mut self,
        term: &Term,
        expected: ReprClass,
    ) -> Result<String, VelaError> {
        let (raw, actual) = self.emit(term)?;
        Ok(self.coerced(raw, actual, expected, term.span()))
    }

    pub(crate) fn coerced(
        &self,
        expr: String,
        from: ReprClass,
        to: ReprClass,
        span: Span,
    ) -> String {
        coerced_with(self.session, expr, from, to, span)
    }

    /// Lowers a function literal: converts it (once) into a closure class
    /// skeleton registered on the unit, and yields the instance expression:
    /// the shared `INSTANCE` for capture-free lambdas, a constructor call
    /// threading the captured values otherwise.
    pub(crate) fn lower_lambda(
        &mut self,
        term: &Term,
        hint: Option<&str>,
        self_binding: Option<BindingId>,
    ) -> Result<(String, ReprClass), VelaError> {
        let module = self.module;
        let Some(parts) = closure::lambda_parts(term) else {
            self.session
                .internal_error(term.span(), "lambda lowering on a non-lambda term");
            return Ok(("null".to_string(), OBJECT));
        };
        if self.unit.class_for_lambda(parts.id).is_none() {
            let enclosing = match &self.frame {
                Some(frame) => frame.class.clone(),
                None => self.unit.class_name.class.clone(),
            };
            let name = self.unit.assign_closure_name(parts.id, hint, &enclosing);
            let converted = closure::convert(self.session, module, name, parts, self_binding);
            self.unit
                .register_closure(parts.id, converted, term.clone(), self_binding);
        }
        let class = self
            .unit
            .class_for_lambda(parts.id)
            .cloned()
            .expect("closure name assigned above");
        let kind = self
            .unit
            .kind_for_lambda(parts.id)
            .cloned()
            .expect("closure registered above");
        match kind {
            ClosureKind::Singleton => Ok((format!("{}.INSTANCE", class.class), FUNCTION)),
            ClosureKind::PerInstance { captures } => {
                let mut args = Vec::new();
                for capture in &captures {
                    let (expr, _) = self.lower_ref(*capture, parts.span)?;
                    args.push(expr);
                }
                Ok((
                    format!("new {}({})", class.class, args.join(", ")),
                    FUNCTION,
                ))
            }
        }
    }

    /// Lowers a binding reference to an identifier expression.
    ///
    /// Locals use the plain mangled name; captures read the closure field;
    /// module-scope globals go through the owning module's singleton (or, for
    /// intrinsics, the native implementation's instance); self-reference
    /// resolves to `this` or the singleton instance depending on the
    /// closure's representation tag.
    pub(crate) fn lower_ref(
        &self,
        binding: BindingId,
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        let module = self.module;
        let info = module.binding(binding);
        if let Some(frame) = &self.frame {
            if frame.self_binding == Some(binding) {
                let expr = if frame.singleton {
                    format!("{}.INSTANCE", frame.class)
                } else {
                    "this".to_string()
                };
                return Ok((expr, FUNCTION));
            }
            if frame.locals.contains(&binding) {
                return Ok((
                    names::mangle(&info.name),
                    self.session.repr_of(&info.ty, span),
                ));
            }
            if frame.captures.contains(&binding) {
                return Ok((
                    format!("this.{}", names::mangle(&info.name)),
                    self.session.repr_of(&info.ty, span),
                ));
            }
            if info.scope == ScopeId::Module {
                return self.module_global(binding, span);
            }
            self.session.internal_error(
                span,
                format!(
                    "binding {} referenced outside its lexical scope chain",
                    info.name
                ),
            );
            return Ok(("null".to_string(), OBJECT));
        }
        if info.scope == ScopeId::Module {
            if info.is_intrinsic() {
                return self.module_global(binding, span);
            }
            return Ok((
                format!("this.{}", names::mangle(&info.name)),
                self.session.repr_of(&info.ty, span),
            ));
        }
        self.session.internal_error(
            span,
            format!("lambda-scoped binding {} referenced at top level", info.name),
        );
        Ok(("null".to_string(), OBJECT))
    }

    fn module_global(
        &self,
        binding: BindingId,
        span: Span,
    ) -> Result<(String, ReprClass), VelaError> {
        let module = self.module;
        let info = module.binding(binding);
        if info.is_intrinsic() {
            let resolved =
                self.session
                    .resolver()
                    .resolve(&module.name, binding, &info.name, &info.ty)?;
            return Ok((resolved.instance_path(), FUNCTION));
        }
        Ok((
            format!(
                "{}.INSTANCE.{}",
                self.unit.class_name.class,
                names::mangle(&info.name)
            ),
            self.session.repr_of(&info.ty, span),
        ))
    }
}

/// Coerces `expr` from `from` to `to`, funneling rejections into the sink
/// and keeping the source expression unchanged so lowering can continue.
pub(crate) fn coerced_with(
    session: &Session,
    expr: String,
    from: ReprClass,
    to: ReprClass,
    span: Span,
) -> String {
    match coerce::coerce(&expr, from, to) {
        Ok(out) => out,
        Err(failure) => {
            session.internal_error(span, failure.to_string());
            expr
        }
    }
}

/// Generates the uniform `apply` body delegating to the strongly-typed
/// `invoke`. A multi-parameter lambda receives its arguments as one tuple
/// value and scatters them by positional structural access; a single
/// parameter passes straight through.
pub(crate) fn apply_body(
    session: &Session,
    module: &Module,
    class: &str,
    kind: &ClosureKind,
    parts: LambdaParts<'_>,
) -> Vec<String> {
    let receiver = if kind.is_singleton() {
        class.to_string()
    } else {
        "this".to_string()
    };
    let result_repr = match parts.ty {
        Type::Func(_, result) => session.repr_of(result, parts.span),
        _ => OBJECT,
    };
    if parts.params.len() > 1 {
        let mut body = vec!["final TupleVal t = ((TupleVal) (arg));".to_string()];
        let mut args = Vec::new();
        for (index, binding) in parts.params.iter().enumerate() {
            let info = module.binding(*binding);
            let repr = session.repr_of(&info.ty, parts.span);
            args.push(coerced_with(
                session,
                format!("t.at({index})"),
                OBJECT,
                repr,
                parts.span,
            ));
        }
        let call = format!("{receiver}.invoke({})", args.join(", "));
        body.push(format!(
            "return {};",
            coerced_with(session, call, result_repr, OBJECT, parts.span)
        ));
        return body;
    }
    let arg = parts.params.first().map(|binding| {
        let info = module.binding(*binding);
        let repr = session.repr_of(&info.ty, parts.span);
        coerced_with(session, "arg".to_string(), OBJECT, repr, parts.span)
    });
    let call = format!("{receiver}.invoke({})", arg.unwrap_or_default());
    vec![format!(
        "return {};",
        coerced_with(session, call, result_repr, OBJECT, parts.span)
    )]
}
