//! Closure conversion through the full unit build: capture fields and
//! constructors, singleton sharing, self-reference resolution, the
//! apply/invoke duality, and hierarchical naming.

mod support;

use support::{add_type, call, int_lit, reference, session, source_of};
use vela_backend::compile_program;
use vela_core::diagnostics::Span;
use vela_core::term::{ModuleBuilder, Program, ScopeId, Term};
use vela_core::types::Type;

/// Scenario: `make = { (n:Int) -> { (x:Int) -> add(x, n) } }`. The inner
/// closure captures `n` from its enclosing lambda: its class carries exactly
/// one int field and a one-argument constructor, and `make` constructs a
/// fresh instance per call.
#[test]
fn captured_binding_becomes_field_and_constructor_parameter() {
    let mut builder = ModuleBuilder::new("app.main");
    let add = builder.top_level_intrinsic("add", add_type());
    let make_id = builder.fresh_lambda();
    let inner_id = builder.fresh_lambda();
    let n = builder.param("n", Type::int(), make_id);
    let x = builder.param("x", Type::int(), inner_id);
    let inner = Term::Lambda {
        id: inner_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(call(
            reference(add, add_type()),
            vec![reference(x, Type::int()), reference(n, Type::int())],
            Type::int(),
        )),
        parent: ScopeId::Lambda(make_id),
        ty: Type::func(Type::int(), Type::int()),
        span: Span::default(),
    };
    let make_ty = Type::func(Type::int(), Type::func(Type::int(), Type::int()));
    let make = Term::Lambda {
        id: make_id,
        params: vec![n],
        body: Vec::new(),
        result: Box::new(inner),
        parent: ScopeId::Module,
        ty: make_ty.clone(),
        span: Span::default(),
    };
    builder.top_level_let("make", make_ty, make);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let inner_source = source_of(unit, "Main$make$fn0");
    assert!(inner_source.contains("public final int n;"), "{inner_source}");
    assert!(
        inner_source.contains("public Main$make$fn0(int n) {"),
        "{inner_source}"
    );
    assert!(inner_source.contains("this.n = n;"), "{inner_source}");
    // Capturing closures dispatch through an instance method.
    assert!(
        inner_source.contains("public int invoke(int x) {"),
        "{inner_source}"
    );
    assert!(
        inner_source.contains("return vela.rt.math.Add.INSTANCE.invoke(x, this.n);"),
        "{inner_source}"
    );

    // `make` allocates one instance per distinct capture environment, so two
    // invocations with different `n` never share state.
    let make_source = source_of(unit, "Main$make");
    assert!(
        make_source.contains("return new Main$make$fn0(n);"),
        "{make_source}"
    );
}

#[test]
fn capture_free_closures_share_one_eager_instance() {
    let mut builder = ModuleBuilder::new("app.main");
    let id_ty = Type::func(Type::int(), Type::int());
    let f_id = builder.fresh_lambda();
    let x = builder.param("x", Type::int(), f_id);
    let identity = Term::Lambda {
        id: f_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(reference(x, Type::int())),
        parent: ScopeId::Module,
        ty: id_ty.clone(),
        span: Span::default(),
    };
    builder.top_level_let("id", id_ty, identity);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let closure = source_of(unit, "Main$id");
    assert!(
        closure.contains("public static final Main$id INSTANCE = new Main$id();"),
        "{closure}"
    );
    assert!(closure.contains("public static int invoke(int x) {"), "{closure}");
    assert!(closure.contains("implements Fn"), "{closure}");
    assert!(
        !closure.contains("public Main$id("),
        "a singleton needs no constructor of its own: {closure}"
    );
}

#[test]
fn singleton_self_reference_resolves_to_the_shared_instance() {
    // `let loop = { (x:Int) -> loop(x) }` is capture-free, so the recursive
    // call dispatches statically and a bare self-reference reads INSTANCE.
    let mut builder = ModuleBuilder::new("app.main");
    let loop_ty = Type::func(Type::int(), Type::int());
    let loop_id = builder.fresh_lambda();
    let x = builder.param("x", Type::int(), loop_id);
    // The binding must exist before the lambda body references it.
    let loop_binding = builder.bind(
        "loop",
        loop_ty.clone(),
        ScopeId::Module,
        vela_core::term::BindingKind::Let {
            intrinsic: false,
            alias_coercion: false,
        },
    );
    let body = call(
        reference(loop_binding, loop_ty.clone()),
        vec![reference(x, Type::int())],
        Type::int(),
    );
    let lambda = Term::Lambda {
        id: loop_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(body),
        parent: ScopeId::Module,
        ty: loop_ty.clone(),
        span: Span::default(),
    };
    // Attach the lambda to the pre-created binding by hand.
    let mut module = builder.finish();
    module.statements.insert(
        0,
        vela_core::term::Statement::Let {
            binding: loop_binding,
            value: Some(lambda),
            span: Span::default(),
        },
    );
    let program = Program {
        modules: vec![module],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let closure = source_of(unit, "Main$loop");
    assert!(
        closure.contains("return Main$loop.invoke(x);"),
        "recursion through a singleton is a static call: {closure}"
    );
}

#[test]
fn capturing_self_reference_resolves_to_this() {
    // outer = { (n:Int) -> let rec = { (x:Int) -> rec(n) } in rec }:
    // `rec` captures `n`, so inside its own body the recursive callee is
    // `this`.
    let mut builder = ModuleBuilder::new("app.main");
    let outer_id = builder.fresh_lambda();
    let rec_id = builder.fresh_lambda();
    let n = builder.param("n", Type::int(), outer_id);
    let x = builder.param("x", Type::int(), rec_id);
    let rec_ty = Type::func(Type::int(), Type::int());
    let rec_binding = builder.local_let("rec", rec_ty.clone(), outer_id);

    let rec_lambda = Term::Lambda {
        id: rec_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(call(
            reference(rec_binding, rec_ty.clone()),
            vec![reference(n, Type::int())],
            Type::int(),
        )),
        parent: ScopeId::Lambda(outer_id),
        ty: rec_ty.clone(),
        span: Span::default(),
    };
    let outer_ty = Type::func(Type::int(), rec_ty.clone());
    let outer = Term::Lambda {
        id: outer_id,
        params: vec![n],
        body: vec![vela_core::term::Statement::Let {
            binding: rec_binding,
            value: Some(rec_lambda),
            span: Span::default(),
        }],
        result: Box::new(reference(rec_binding, rec_ty)),
        parent: ScopeId::Module,
        ty: outer_ty.clone(),
        span: Span::default(),
    };
    builder.top_level_let("outer", outer_ty, outer);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let rec_source = source_of(unit, "Main$outer$rec");
    assert!(
        rec_source.contains("((Main$outer$rec) (this)).invoke(this.n)"),
        "{rec_source}"
    );
    assert!(rec_source.contains("public final int n;"), "{rec_source}");
}

#[test]
fn multi_parameter_apply_scatters_a_tuple_argument() {
    let mut builder = ModuleBuilder::new("app.main");
    let add = builder.top_level_intrinsic("add", add_type());
    let f_id = builder.fresh_lambda();
    let x = builder.param("x", Type::int(), f_id);
    let y = builder.param("y", Type::int(), f_id);
    let lambda = Term::Lambda {
        id: f_id,
        params: vec![x, y],
        body: Vec::new(),
        result: Box::new(call(
            reference(add, add_type()),
            vec![reference(x, Type::int()), reference(y, Type::int())],
            Type::int(),
        )),
        parent: ScopeId::Module,
        ty: add_type(),
        span: Span::default(),
    };
    builder.top_level_let("f", add_type(), lambda);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let closure = source_of(unit, "Main$f");
    assert!(
        closure.contains("public Object apply(Object arg) {"),
        "{closure}"
    );
    assert!(
        closure.contains("final TupleVal t = ((TupleVal) (arg));"),
        "{closure}"
    );
    assert!(
        closure.contains(
            "return Integer.valueOf(Main$f.invoke(((Integer) (t.at(0))).intValue(), ((Integer) (t.at(1))).intValue()));"
        ),
        "{closure}"
    );
}

#[test]
fn single_parameter_apply_passes_the_argument_straight_through() {
    let mut builder = ModuleBuilder::new("app.main");
    let id_ty = Type::func(Type::int(), Type::int());
    let f_id = builder.fresh_lambda();
    let x = builder.param("x", Type::int(), f_id);
    let lambda = Term::Lambda {
        id: f_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(reference(x, Type::int())),
        parent: ScopeId::Module,
        ty: id_ty.clone(),
        span: Span::default(),
    };
    builder.top_level_let("id", id_ty, lambda);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let closure = source_of(unit, "Main$id");
    assert!(
        closure.contains(
            "return Integer.valueOf(Main$id.invoke(((Integer) (arg)).intValue()));"
        ),
        "{closure}"
    );
    assert!(
        !closure.contains("TupleVal t"),
        "one parameter needs no tuple destructuring: {closure}"
    );
}

#[test]
fn module_globals_are_reached_through_the_singleton_not_captured() {
    // `let base = 10; let addBase = { (x:Int) -> add(x, base) }`: `base`
    // is module-scoped, so the closure stays capture-free and reads it
    // through the module instance.
    let mut builder = ModuleBuilder::new("app.main");
    let add = builder.top_level_intrinsic("add", add_type());
    let base = builder.top_level_let("base", Type::int(), int_lit(10));
    let f_id = builder.fresh_lambda();
    let x = builder.param("x", Type::int(), f_id);
    let lambda = Term::Lambda {
        id: f_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(call(
            reference(add, add_type()),
            vec![reference(x, Type::int()), reference(base, Type::int())],
            Type::int(),
        )),
        parent: ScopeId::Module,
        ty: Type::func(Type::int(), Type::int()),
        span: Span::default(),
    };
    builder.top_level_let("addBase", Type::func(Type::int(), Type::int()), lambda);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let closure = source_of(unit, "Main$addBase");
    assert!(
        closure.contains("Main.INSTANCE.base"),
        "module globals qualify through the singleton: {closure}"
    );
    assert!(
        closure.contains("public static final Main$addBase INSTANCE"),
        "no capture means singleton form: {closure}"
    );
    assert!(!closure.contains("public final int base;"), "{closure}");
}

#[test]
fn anonymous_closures_nest_their_names_under_the_enclosing_lambda() {
    // make = { (n:Int) -> { (x:Int) -> { (y:Int) -> add(n, y) } } }
    let mut builder = ModuleBuilder::new("app.main");
    let add = builder.top_level_intrinsic("add", add_type());
    let make_id = builder.fresh_lambda();
    let mid_id = builder.fresh_lambda();
    let deep_id = builder.fresh_lambda();
    let n = builder.param("n", Type::int(), make_id);
    let x = builder.param("x", Type::int(), mid_id);
    let y = builder.param("y", Type::int(), deep_id);

    let deep = Term::Lambda {
        id: deep_id,
        params: vec![y],
        body: Vec::new(),
        result: Box::new(call(
            reference(add, add_type()),
            vec![reference(n, Type::int()), reference(y, Type::int())],
            Type::int(),
        )),
        parent: ScopeId::Lambda(mid_id),
        ty: Type::func(Type::int(), Type::int()),
        span: Span::default(),
    };
    let mid = Term::Lambda {
        id: mid_id,
        params: vec![x],
        body: Vec::new(),
        result: Box::new(deep),
        parent: ScopeId::Lambda(make_id),
        ty: Type::func(Type::int(), Type::func(Type::int(), Type::int())),
        span: Span::default(),
    };
    let make_ty = Type::func(Type::int(), mid.ty().clone());
    let make = Term::Lambda {
        id: make_id,
        params: vec![n],
        body: Vec::new(),
        result: Box::new(mid),
        parent: ScopeId::Module,
        ty: make_ty.clone(),
        span: Span::default(),
    };
    builder.top_level_let("make", make_ty, make);
    let program = Program {
        modules: vec![builder.finish()],
    };

    let session = session();
    let dictionary = compile_program(&session, &program, "app.main").expect("compile");
    let unit = dictionary.get("app.main").expect("unit");

    let names = support::class_names(unit);
    assert!(names.contains(&"Main$make".to_string()), "{names:?}");
    assert!(names.contains(&"Main$make$fn0".to_string()), "{names:?}");
    assert!(
        names.contains(&"Main$make$fn0$fn1".to_string()),
        "nested anonymous names chain through the enclosing closure: {names:?}"
    );

    // The intermediate closure re-captures `n` because its nested lambda
    // needs it.
    let mid_source = source_of(unit, "Main$make$fn0");
    assert!(mid_source.contains("public final int n;"), "{mid_source}");
    assert!(
        mid_source.contains("return new Main$make$fn0$fn1(this.n);"),
        "{mid_source}"
    );
}
