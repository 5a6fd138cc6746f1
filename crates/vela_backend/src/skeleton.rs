use serde::Serialize;

/// Fully qualified generated class name, split into a dotted package and a
/// class segment (which may itself contain `$` separators for closures).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QualifiedName {
    pub package: String,
    pub class: String,
}

impl QualifiedName {
    pub fn new(package: &str, class: &str) -> QualifiedName {
        QualifiedName {
            package: package.to_string(),
            class: class.to_string(),
        }
    }

    pub fn qualified(&self) -> String {
        if self.package.is_empty() {
            self.class.clone()
        } else {
            format!("{}.{}", self.package, self.class)
        }
    }

    /// Relative file path for persisted artifacts: package separators map to
    /// path separators.
    pub fn relative_path(&self, extension: &str) -> std::path::PathBuf {
        let mut path = std::path::PathBuf::new();
        for segment in self.package.split('.').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.push(format!("{}.{extension}", self.class));
        path
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: String,
    pub is_static: bool,
    pub is_final: bool,
    /// Initializer expression. Declared as `None` in the signature phase and
    /// installed during body filling.
    pub init: Option<String>,
}

impl FieldDecl {
    pub fn instance(name: &str, type_name: &str, is_final: bool) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_static: false,
            is_final,
            init: None,
        }
    }

    pub fn staticf(name: &str, type_name: &str) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_static: true,
            is_final: true,
            init: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub type_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDecl {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<Param>,
    pub return_type: String,
    pub body: Vec<String>,
    pub filled: bool,
}

impl MethodDecl {
    pub fn new(name: &str, is_static: bool, params: Vec<Param>, return_type: &str) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            is_static,
            params,
            return_type: return_type.to_string(),
            body: Vec::new(),
            filled: false,
        }
    }

    /// Human-readable signature used in diagnostics and descriptors.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|param| param.type_name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({params})", self.return_type, self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CtorDecl {
    pub params: Vec<Param>,
    pub body: Vec<String>,
    pub filled: bool,
}

/// Construction state of one generated class.
///
/// `SignatureOnly` is the forward-reference-safe shape: every member exists
/// with correct types and arity but no body, so other skeletons may already
/// reference it. `Complete` means bodies are installed and the skeleton can
/// be finalized into an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkeletonState {
    Declared,
    Shelled,
    SignatureOnly,
    Complete,
}

/// The accumulating declaration of one generated unit of code.
#[derive(Debug, Clone, Serialize)]
pub struct ClassSkeleton {
    pub name: QualifiedName,
    pub interfaces: Vec<String>,
    pub static_fields: Vec<FieldDecl>,
    pub fields: Vec<FieldDecl>,
    pub ctor: Option<CtorDecl>,
    pub methods: Vec<MethodDecl>,
    pub state: SkeletonState,
}

impl ClassSkeleton {
    pub fn new(name: QualifiedName) -> ClassSkeleton {
        ClassSkeleton {
            name,
            interfaces: Vec::new(),
            static_fields: Vec::new(),
            fields: Vec::new(),
            ctor: None,
            methods: Vec::new(),
            state: SkeletonState::Declared,
        }
    }

    pub fn implement(&mut self, interface: &str) -> &mut Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn add_static_field(&mut self, field: FieldDecl) -> &mut Self {
        self.static_fields.push(field);
        self
    }

    pub fn add_field(&mut self, field: FieldDecl) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn set_ctor(&mut self, params: Vec<Param>) -> &mut Self {
        self.ctor = Some(CtorDecl {
            params,
            body: Vec::new(),
            filled: false,
        });
        self
    }

    pub fn add_method(&mut self, method: MethodDecl) -> &mut Self {
        self.methods.push(method);
        self
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut MethodDecl> {
        self.methods.iter_mut().find(|method| method.name == name)
    }

    pub fn static_field_mut(&mut self, name: &str) -> Option<&mut FieldDecl> {
        self.static_fields
            .iter_mut()
            .find(|field| field.name == name)
    }

    pub fn fill_method(&mut self, name: &str, body: Vec<String>) {
        if let Some(method) = self.method_mut(name) {
            method.body = body;
            method.filled = true;
        }
    }

    pub fn fill_ctor(&mut self, body: Vec<String>) {
        if let Some(ctor) = self.ctor.as_mut() {
            ctor.body = body;
            ctor.filled = true;
        }
    }

    /// True once every declared member body has been installed.
    pub fn bodies_filled(&self) -> bool {
        self.methods.iter().all(|method| method.filled)
            && self.ctor.as_ref().is_none_or(|ctor| ctor.filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_render_and_map_to_paths() {
        let name = QualifiedName::new("app.util", "Main$addN");
        assert_eq!(name.qualified(), "app.util.Main$addN");
        assert_eq!(
            name.relative_path("java"),
            std::path::Path::new("app/util/Main$addN.java")
        );
        let rootless = QualifiedName::new("", "Main");
        assert_eq!(rootless.qualified(), "Main");
        assert_eq!(rootless.relative_path("json"), std::path::Path::new("Main.json"));
    }

    #[test]
    fn bodies_filled_requires_every_member() {
        let mut skeleton = ClassSkeleton::new(QualifiedName::new("app", "Main"));
        skeleton.add_method(MethodDecl::new("run", false, Vec::new(), "void"));
        skeleton.set_ctor(Vec::new());
        assert!(!skeleton.bodies_filled());
        skeleton.fill_method("run", vec!["return;".into()]);
        assert!(!skeleton.bodies_filled());
        skeleton.fill_ctor(Vec::new());
        assert!(skeleton.bodies_filled());
    }

    #[test]
    fn method_signatures_render_arity_and_types() {
        let method = MethodDecl::new(
            "invoke",
            true,
            vec![
                Param {
                    type_name: "int".into(),
                    name: "x".into(),
                },
                Param {
                    type_name: "int".into(),
                    name: "y".into(),
                },
            ],
            "int",
        );
        assert_eq!(method.signature(), "int invoke(int, int)");
    }
}
