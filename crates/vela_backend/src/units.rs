use std::time::Instant;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use vela_core::diagnostics::Span;
use vela_core::term::{BindingId, LambdaId, Lit, Module, Program, Statement, Term};

use crate::assemble;
use crate::closure::{ClosureKind, ConvertedClosure};
use crate::emit::{ClassArtifact, TextUnitBackend, UnitBackend};
use crate::names;
use crate::session::Session;
use crate::skeleton::{ClassSkeleton, FieldDecl, MethodDecl, QualifiedName};
use crate::VelaError;

/// Latch field guarding the one-shot `run` entry point. The `$` keeps it out
/// of the user-binding namespace.
pub(crate) const RUN_LATCH: &str = "ran$";

fn trace_timing() -> bool {
    std::env::var("VELA_TRACE_TIMING").is_ok_and(|value| value == "1")
}

/// Build progress of one unit through the two-phase assembly protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Empty,
    SkeletonsStarted,
    SignaturesAdded,
    BodiesFilled { failed: bool },
}

/// A deferred body-filling task, recorded when a skeleton is first declared
/// and drained by the assembly engine's fixed-point loop.
#[derive(Debug)]
pub(crate) enum BodyJob {
    ModuleRun,
    Closure {
        id: LambdaId,
        term: Term,
        self_binding: Option<BindingId>,
    },
}

/// The compiled-artifact bundle of one source module: the module
/// representation class plus one class per function literal, with the
/// bookkeeping lowering needs while the bundle is still being built.
#[derive(Debug)]
pub struct Unit {
    pub module_name: String,
    pub class_name: QualifiedName,
    pub imports: Vec<String>,
    pub phase: BuildPhase,
    pub(crate) skeletons: IndexMap<String, ClassSkeleton>,
    pub(crate) binding_lambdas: FxHashMap<BindingId, LambdaId>,
    lambda_classes: FxHashMap<LambdaId, QualifiedName>,
    lambda_kinds: FxHashMap<LambdaId, ClosureKind>,
    symbol_constants: IndexMap<String, String>,
    pending: Vec<BodyJob>,
    next_anon: u32,
    artifacts: Vec<ClassArtifact>,
}

impl Unit {
    /// Creates the empty unit for `module` and declares the module
    /// representation skeleton: the `INSTANCE` singleton, the symbol constant
    /// pool, the run latch, one pre-declared field per top-level `let` (this
    /// is what makes forward and mutual reference among top-level bindings
    /// work), and the `run` method.
    pub(crate) fn new(session: &Session, module: &Module, epoch: u64) -> Unit {
        let class_name = module_class_name(&module.name, epoch);
        let mut unit = Unit {
            module_name: module.name.clone(),
            class_name: class_name.clone(),
            imports: module.imports.clone(),
            phase: BuildPhase::Empty,
            skeletons: IndexMap::new(),
            binding_lambdas: FxHashMap::default(),
            lambda_classes: FxHashMap::default(),
            lambda_kinds: FxHashMap::default(),
            symbol_constants: IndexMap::new(),
            pending: Vec::new(),
            next_anon: 0,
            artifacts: Vec::new(),
        };

        let mut skeleton = ClassSkeleton::new(class_name.clone());
        skeleton.implement("ModuleUnit");
        skeleton.add_static_field(FieldDecl::staticf("INSTANCE", &class_name.class));
        for text in collect_symbols(module) {
            let field = unit.intern_symbol(&text);
            skeleton.add_static_field(FieldDecl::staticf(&field, "Keyword"));
        }
        skeleton.add_field(FieldDecl {
            name: RUN_LATCH.to_string(),
            type_name: "boolean".to_string(),
            is_static: false,
            is_final: false,
            init: None,
        });
        for binding in module.top_level_lets() {
            let info = module.binding(binding);
            if info.is_intrinsic() {
                continue;
            }
            let repr = session.repr_of(&info.ty, Span::default());
            skeleton.add_field(FieldDecl::instance(
                &names::mangle(&info.name),
                repr.target_name(),
                false,
            ));
        }
        skeleton.add_method(MethodDecl::new("run", false, Vec::new(), "void"));
        unit.skeletons.insert(class_name.qualified(), skeleton);

        // Pre-register top-level `let f = \…` bindings so call sites that
        // lower before the lambda literal still resolve the callee.
        for statement in &module.statements {
            if let Statement::Let {
                binding,
                value: Some(Term::Lambda { id, .. }),
                ..
            } = statement
            {
                unit.binding_lambdas.insert(*binding, *id);
            }
        }

        unit.pending.push(BodyJob::ModuleRun);
        unit
    }

    /// Class name memoized for a lambda, assigned on first request and never
    /// reassigned. Named lambdas derive from their binding; anonymous ones
    /// get a sequential synthetic segment, qualified by the enclosing
    /// lambda's class to stay unique and debuggable.
    pub(crate) fn assign_closure_name(
        &mut self,
        id: LambdaId,
        hint: Option<&str>,
        enclosing_class: &str,
    ) -> QualifiedName {
        if let Some(existing) = self.lambda_classes.get(&id) {
            return existing.clone();
        }
        let segment = match hint {
            Some(name) => names::mangle(name),
            None => {
                let n = self.next_anon;
                self.next_anon += 1;
                format!("fn{n}")
            }
        };
        let name = QualifiedName::new(
            &self.class_name.package,
            &format!("{enclosing_class}${segment}"),
        );
        self.lambda_classes.insert(id, name.clone());
        name
    }

    pub(crate) fn register_closure(
        &mut self,
        id: LambdaId,
        converted: ConvertedClosure,
        term: Term,
        self_binding: Option<BindingId>,
    ) {
        let qualified = converted.skeleton.name.qualified();
        if self.skeletons.contains_key(&qualified) {
            return;
        }
        self.lambda_kinds.insert(id, converted.kind);
        self.skeletons.insert(qualified, converted.skeleton);
        self.pending.push(BodyJob::Closure {
            id,
            term,
            self_binding,
        });
    }

    pub fn class_for_lambda(&self, id: LambdaId) -> Option<&QualifiedName> {
        self.lambda_classes.get(&id)
    }

    pub fn kind_for_lambda(&self, id: LambdaId) -> Option<&ClosureKind> {
        self.lambda_kinds.get(&id)
    }

    pub(crate) fn symbol_field(&self, text: &str) -> Option<&str> {
        self.symbol_constants.get(text).map(String::as_str)
    }

    pub(crate) fn symbol_constants(&self) -> &IndexMap<String, String> {
        &self.symbol_constants
    }

    fn intern_symbol(&mut self, text: &str) -> String {
        if let Some(existing) = self.symbol_constants.get(text) {
            return existing.clone();
        }
        let field = format!("SYM${}", self.symbol_constants.len());
        self.symbol_constants.insert(text.to_string(), field.clone());
        field
    }

    pub(crate) fn take_pending(&mut self) -> Vec<BodyJob> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn skeleton_mut(&mut self, qualified: &str) -> Option<&mut ClassSkeleton> {
        self.skeletons.get_mut(qualified)
    }

    pub(crate) fn module_skeleton_mut(&mut self) -> &mut ClassSkeleton {
        let key = self.class_name.qualified();
        self.skeletons
            .get_mut(&key)
            .expect("module skeleton is declared at unit creation")
    }

    pub fn skeletons(&self) -> impl Iterator<Item = &ClassSkeleton> {
        self.skeletons.values()
    }

    pub(crate) fn push_artifact(&mut self, artifact: ClassArtifact) {
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[ClassArtifact] {
        &self.artifacts
    }

    /// Concatenated rendered source of every class in the unit, for
    /// debugging dumps.
    pub fn dump_source(&self) -> String {
        let mut out = String::new();
        for artifact in &self.artifacts {
            out.push_str(&format!("// ---- {} ----\n", artifact.name.qualified()));
            out.push_str(&artifact.source);
            out.push('\n');
        }
        out
    }
}

fn module_class_name(module_name: &str, epoch: u64) -> QualifiedName {
    let mut segments: Vec<&str> = module_name.split('.').filter(|s| !s.is_empty()).collect();
    let last = segments.pop().unwrap_or("module");
    let package = segments
        .iter()
        .map(|segment| names::mangle(segment))
        .collect::<Vec<_>>()
        .join(".");
    let mut class = names::class_segment(last);
    if epoch > 0 {
        class.push_str(&format!("$e{epoch}"));
    }
    QualifiedName::new(&package, &class)
}

/// Collects every symbol literal of the module, in first-occurrence order,
/// for the deduplicated constant pool.
fn collect_symbols(module: &Module) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for statement in &module.statements {
        collect_symbols_statement(statement, &mut out);
    }
    out
}

fn collect_symbols_statement(statement: &Statement, out: &mut Vec<String>) {
    match statement {
        Statement::Let { value, .. } => {
            if let Some(value) = value {
                collect_symbols_term(value, out);
            }
        }
        Statement::Expr(term) => collect_symbols_term(term, out),
    }
}

fn collect_symbols_term(term: &Term, out: &mut Vec<String>) {
    match term {
        Term::Lit {
            value: Lit::Sym(text),
            ..
        } => {
            if !out.contains(text) {
                out.push(text.clone());
            }
        }
        Term::Lit { .. } | Term::Ref { .. } | Term::ImportedRef { .. } => {}
        Term::ListLit { items, .. } | Term::TupleLit { items, .. } => {
            for item in items {
                collect_symbols_term(item, out);
            }
        }
        Term::MapLit { entries, .. } => {
            for (key, value) in entries {
                collect_symbols_term(key, out);
                collect_symbols_term(value, out);
            }
        }
        Term::RecordLit { fields, .. } => {
            for (_, value) in fields {
                collect_symbols_term(value, out);
            }
        }
        Term::VariantLit { value, .. } => collect_symbols_term(value, out),
        Term::Apply { callee, args, .. } => {
            collect_symbols_term(callee, out);
            for arg in args {
                collect_symbols_term(arg, out);
            }
        }
        Term::Lambda { body, result, .. } => {
            for statement in body {
                collect_symbols_statement(statement, out);
            }
            collect_symbols_term(result, out);
        }
        Term::Coerce { term, .. } => collect_symbols_term(term, out),
    }
}

/// Tracks already-compiled units keyed by module name, resolves cross-module
/// references, and triggers recursive compilation of not-yet-built imports.
pub struct UnitDictionary {
    backend: Box<dyn UnitBackend>,
    units: IndexMap<String, Unit>,
    building: Vec<String>,
}

impl Default for UnitDictionary {
    fn default() -> UnitDictionary {
        UnitDictionary::new()
    }
}

impl std::fmt::Debug for UnitDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitDictionary")
            .field("units", &self.units)
            .field("building", &self.building)
            .finish_non_exhaustive()
    }
}

impl UnitDictionary {
    pub fn new() -> UnitDictionary {
        UnitDictionary::with_backend(Box::new(TextUnitBackend::new()))
    }

    pub fn with_backend(backend: Box<dyn UnitBackend>) -> UnitDictionary {
        UnitDictionary {
            backend,
            units: IndexMap::new(),
            building: Vec::new(),
        }
    }

    pub fn get(&self, module_name: &str) -> Option<&Unit> {
        self.units.get(module_name)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Drops every built unit. Callers pair this with [`Session::reset`] so
    /// regenerated classes pick up the new epoch suffix.
    pub fn invalidate(&mut self) {
        self.units.clear();
    }

    /// Ensures a unit exists for `module_name`, building its imports first
    /// (depth-first, memoized, diamond-tolerant). An import cycle is a hard
    /// compilation error.
    pub fn ensure_built(
        &mut self,
        session: &Session,
        program: &Program,
        module_name: &str,
    ) -> Result<(), VelaError> {
        if self.units.contains_key(module_name) {
            return Ok(());
        }
        if self.building.iter().any(|name| name == module_name) {
            let mut path = self.building.clone();
            path.push(module_name.to_string());
            return Err(VelaError::ImportCycle(path.join(" -> ")));
        }
        let Some(module) = program.module(module_name) else {
            return Err(VelaError::UnknownModule(module_name.to_string()));
        };

        self.building.push(module_name.to_string());
        for import in &module.imports {
            if let Err(err) = self.ensure_built(session, program, import) {
                self.building.pop();
                return Err(err);
            }
        }

        let trace = trace_timing();
        let started = trace.then(Instant::now);

        session.push_checkpoint();
        let mut unit = Unit::new(session, module, session.epoch());
        let result = assemble::assemble_unit(
            session,
            module,
            &mut unit,
            &self.units,
            self.backend.as_mut(),
        );
        let errors = session.pop_checkpoint();
        self.building.pop();

        if let Some(t0) = started {
            eprintln!(
                "[VELA_TIMING] {:40} {:>8.1}ms",
                module_name,
                t0.elapsed().as_secs_f64() * 1000.0
            );
        }

        result?;
        if errors > 0 {
            unit.phase = BuildPhase::BodiesFilled { failed: true };
            return Err(VelaError::Diagnostics);
        }
        unit.phase = BuildPhase::BodiesFilled { failed: false };
        self.units.insert(module_name.to_string(), unit);
        Ok(())
    }
}
