use indexmap::IndexMap;

use vela_core::term::{BindingId, LambdaId, Module, Term};
use vela_core::types::Type;

use crate::closure::{self, ClosureKind};
use crate::emit::UnitBackend;
use crate::lower::{self, Frame, Lowerer};
use crate::names;
use crate::repr::OBJECT;
use crate::session::Session;
use crate::skeleton::SkeletonState;
use crate::units::{BodyJob, BuildPhase, Unit, RUN_LATCH};
use crate::VelaError;

/// Drives the two-phase construction protocol over every skeleton of one
/// unit: shells for all known skeletons first, then placeholder signatures,
/// then real bodies.
///
/// Body filling is where lowering runs, and lowering a lambda literal may be
/// the first encounter with a nested closure, so the three-phase sequence
/// repeats until a pass discovers no new skeletons. A skeleton discovered in
/// pass N gets its shell at the start of pass N+1, before any body that
/// could reference it is finalized.
pub(crate) fn assemble_unit(
    session: &Session,
    module: &Module,
    unit: &mut Unit,
    imports: &IndexMap<String, Unit>,
    backend: &mut dyn UnitBackend,
) -> Result<(), VelaError> {
    loop {
        let newly: Vec<String> = unit
            .skeletons
            .iter()
            .filter(|(_, skeleton)| skeleton.state == SkeletonState::Declared)
            .map(|(name, _)| name.clone())
            .collect();
        let jobs = unit.take_pending();
        if newly.is_empty() && jobs.is_empty() {
            break;
        }

        for name in &newly {
            let skeleton = unit.skeleton_mut(name).expect("declared skeleton");
            backend.create_shell(skeleton)?;
            skeleton.state = SkeletonState::Shelled;
        }
        if unit.phase == BuildPhase::Empty {
            unit.phase = BuildPhase::SkeletonsStarted;
        }

        for name in &newly {
            let skeleton = unit.skeleton_mut(name).expect("shelled skeleton");
            backend.add_signatures(skeleton)?;
            skeleton.state = SkeletonState::SignatureOnly;
        }
        unit.phase = BuildPhase::SignaturesAdded;

        for job in jobs {
            match job {
                BodyJob::ModuleRun => fill_module_run(session, module, unit, imports)?,
                BodyJob::Closure {
                    id,
                    term,
                    self_binding,
                } => fill_closure(session, module, unit, imports, id, &term, self_binding)?,
            }
        }
    }

    let epoch = session.epoch();
    let class_names: Vec<String> = unit.skeletons.keys().cloned().collect();
    for name in class_names {
        let artifact = {
            let skeleton = unit.skeletons.get(&name).expect("skeleton");
            backend.finalize(skeleton, epoch)?
        };
        unit.push_artifact(artifact);
    }
    Ok(())
}

/// Installs the module class bodies: the one-shot-latched `run` executing
/// the lowered top-level statements, the eager `INSTANCE` singleton, and the
/// symbol constant pool initializers.
fn fill_module_run(
    session: &Session,
    module: &Module,
    unit: &mut Unit,
    imports: &IndexMap<String, Unit>,
) -> Result<(), VelaError> {
    let mut statements = vec![
        format!("if (this.{RUN_LATCH}) return;"),
        format!("this.{RUN_LATCH} = true;"),
    ];
    {
        let mut lowerer = Lowerer::top_level(session, module, unit, imports);
        for statement in &module.statements {
            statements.extend(lowerer.lower_top_level_statement(statement)?);
        }
    }

    let class = unit.class_name.class.clone();
    let symbols: Vec<(String, String)> = unit
        .symbol_constants()
        .iter()
        .map(|(text, field)| (text.clone(), field.clone()))
        .collect();
    let skeleton = unit.module_skeleton_mut();
    if let Some(field) = skeleton.static_field_mut("INSTANCE") {
        field.init = Some(format!("new {class}()"));
    }
    for (text, field_name) in symbols {
        if let Some(field) = skeleton.static_field_mut(&field_name) {
            field.init = Some(format!("Keyword.of({text:?})"));
        }
    }
    skeleton.fill_method("run", statements);
    skeleton.state = SkeletonState::Complete;
    Ok(())
}

/// Installs one closure class's bodies: the strongly-typed `invoke` (the
/// lowered lambda body), the generic `apply` delegate, and either the
/// singleton initializer or the capture-assigning constructor.
fn fill_closure(
    session: &Session,
    module: &Module,
    unit: &mut Unit,
    imports: &IndexMap<String, Unit>,
    id: LambdaId,
    term: &Term,
    self_binding: Option<BindingId>,
) -> Result<(), VelaError> {
    let parts = closure::lambda_parts(term).expect("closure job holds a lambda term");
    let class = unit
        .class_for_lambda(id)
        .cloned()
        .expect("closure registered before its fill job");
    let kind = unit
        .kind_for_lambda(id)
        .cloned()
        .expect("closure registered before its fill job");

    let mut invoke_body = Vec::new();
    {
        let frame = Frame::for_closure(&class.class, &kind, parts, self_binding);
        let mut lowerer = Lowerer::in_lambda(session, module, unit, imports, frame);
        for statement in parts.body {
            invoke_body.extend(lowerer.lower_lambda_statement(statement)?);
        }
        let result_repr = match parts.ty {
            Type::Func(_, result) => session.repr_of(result, parts.span),
            _ => OBJECT,
        };
        let result = lowerer.lower_expr(parts.result, result_repr)?;
        invoke_body.push(format!("return {result};"));
    }
    let apply = lower::apply_body(session, module, &class.class, &kind, parts);

    let qualified = class.qualified();
    let skeleton = unit
        .skeleton_mut(&qualified)
        .expect("closure skeleton registered");
    skeleton.fill_method("invoke", invoke_body);
    skeleton.fill_method("apply", apply);
    match &kind {
        ClosureKind::Singleton => {
            if let Some(field) = skeleton.static_field_mut("INSTANCE") {
                field.init = Some(format!("new {}()", class.class));
            }
        }
        ClosureKind::PerInstance { captures } => {
            let mut ctor = Vec::new();
            for capture in captures {
                let field = names::mangle(&module.binding(*capture).name);
                ctor.push(format!("this.{field} = {field};"));
            }
            skeleton.fill_ctor(ctor);
        }
    }
    skeleton.state = SkeletonState::Complete;
    Ok(())
}
