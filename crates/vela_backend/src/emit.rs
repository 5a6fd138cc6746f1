use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::skeleton::{ClassSkeleton, FieldDecl, MethodDecl, QualifiedName};
use crate::VelaError;

/// Serializable summary of one finalized class, persisted as the
/// `classes/` half of the artifact pair.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub package: String,
    pub interfaces: Vec<String>,
    pub static_fields: Vec<String>,
    pub fields: Vec<String>,
    pub constructor: Option<String>,
    pub methods: Vec<String>,
    pub epoch: u64,
}

/// One finished generated class: rendered source plus its descriptor.
#[derive(Debug, Clone)]
pub struct ClassArtifact {
    pub name: QualifiedName,
    pub source: String,
    pub descriptor: ArtifactDescriptor,
}

/// The pluggable target-level emission mechanism.
///
/// The assembly engine drives each skeleton through the same three calls in
/// order: `create_shell` for every known skeleton first (so later phases can
/// resolve forward references), then `add_signatures`, then `finalize` once
/// bodies are installed.
pub trait UnitBackend {
    fn create_shell(&mut self, skeleton: &ClassSkeleton) -> Result<(), VelaError>;
    fn add_signatures(&mut self, skeleton: &ClassSkeleton) -> Result<(), VelaError>;
    fn finalize(&mut self, skeleton: &ClassSkeleton, epoch: u64) -> Result<ClassArtifact, VelaError>;
}

/// Reference backend rendering Java-like class source text.
#[derive(Debug, Default)]
pub struct TextUnitBackend {
    shelled: FxHashSet<String>,
    signed: FxHashSet<String>,
}

impl TextUnitBackend {
    pub fn new() -> TextUnitBackend {
        TextUnitBackend::default()
    }

    /// True once a shell exists for the named class, i.e. other skeletons may
    /// reference it.
    pub fn has_shell(&self, qualified: &str) -> bool {
        self.shelled.contains(qualified)
    }
}

impl UnitBackend for TextUnitBackend {
    fn create_shell(&mut self, skeleton: &ClassSkeleton) -> Result<(), VelaError> {
        self.shelled.insert(skeleton.name.qualified());
        Ok(())
    }

    fn add_signatures(&mut self, skeleton: &ClassSkeleton) -> Result<(), VelaError> {
        let qualified = skeleton.name.qualified();
        if !self.shelled.contains(&qualified) {
            return Err(VelaError::Artifact(format!(
                "signatures added to {qualified} before its shell was created"
            )));
        }
        self.signed.insert(qualified);
        Ok(())
    }

    fn finalize(&mut self, skeleton: &ClassSkeleton, epoch: u64) -> Result<ClassArtifact, VelaError> {
        let qualified = skeleton.name.qualified();
        if !self.signed.contains(&qualified) {
            return Err(VelaError::Artifact(format!(
                "finalize called on {qualified} before its signatures were added"
            )));
        }
        if !skeleton.bodies_filled() {
            let missing = skeleton
                .methods
                .iter()
                .filter(|method| !method.filled)
                .map(|method| method.signature())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(VelaError::Artifact(format!(
                "{qualified} has unfilled bodies: {missing}"
            )));
        }
        Ok(ClassArtifact {
            name: skeleton.name.clone(),
            source: render_source(skeleton),
            descriptor: describe(skeleton, epoch),
        })
    }
}

fn describe(skeleton: &ClassSkeleton, epoch: u64) -> ArtifactDescriptor {
    ArtifactDescriptor {
        name: skeleton.name.class.clone(),
        package: skeleton.name.package.clone(),
        interfaces: skeleton.interfaces.clone(),
        static_fields: skeleton
            .static_fields
            .iter()
            .map(|field| format!("{} {}", field.type_name, field.name))
            .collect(),
        fields: skeleton
            .fields
            .iter()
            .map(|field| format!("{} {}", field.type_name, field.name))
            .collect(),
        constructor: skeleton.ctor.as_ref().map(|ctor| {
            let params = ctor
                .params
                .iter()
                .map(|param| param.type_name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({params})", skeleton.name.class)
        }),
        methods: skeleton
            .methods
            .iter()
            .map(MethodDecl::signature)
            .collect(),
        epoch,
    }
}

fn render_source(skeleton: &ClassSkeleton) -> String {
    let mut out = String::new();
    if !skeleton.name.package.is_empty() {
        out.push_str(&format!("package {};\n\n", skeleton.name.package));
    }
    out.push_str(&format!("public final class {}", skeleton.name.class));
    if !skeleton.interfaces.is_empty() {
        out.push_str(&format!(" implements {}", skeleton.interfaces.join(", ")));
    }
    out.push_str(" {\n");
    for field in &skeleton.static_fields {
        out.push_str(&render_field(field));
    }
    for field in &skeleton.fields {
        out.push_str(&render_field(field));
    }
    if let Some(ctor) = &skeleton.ctor {
        let params = render_params(&ctor.params);
        out.push_str(&format!("    public {}({params}) {{\n", skeleton.name.class));
        for statement in &ctor.body {
            out.push_str(&format!("        {statement}\n"));
        }
        out.push_str("    }\n");
    }
    for method in &skeleton.methods {
        let kind = if method.is_static { "static " } else { "" };
        let params = render_params(&method.params);
        out.push_str(&format!(
            "    public {kind}{} {}({params}) {{\n",
            method.return_type, method.name
        ));
        for statement in &method.body {
            out.push_str(&format!("        {statement}\n"));
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

fn render_field(field: &FieldDecl) -> String {
    let mut decl = String::from("    public ");
    if field.is_static {
        decl.push_str("static ");
    }
    if field.is_final {
        decl.push_str("final ");
    }
    decl.push_str(&format!("{} {}", field.type_name, field.name));
    if let Some(init) = &field.init {
        decl.push_str(&format!(" = {init}"));
    }
    decl.push_str(";\n");
    decl
}

fn render_params(params: &[crate::skeleton::Param]) -> String {
    params
        .iter()
        .map(|param| format!("{} {}", param.type_name, param.name))
        .collect::<Vec<_>>()
        .join(", ")
}
