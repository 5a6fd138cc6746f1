use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use vela_core::term::BindingId;
use vela_core::types::Type;

use crate::repr::{self, ReprClass};
use crate::VelaError;

/// Well-known field every native implementation class exposes its singleton
/// instance under.
pub const INSTANCE_FIELD: &str = "INSTANCE";

const LOOKUP_PREFIX: &str = "intrinsic$";

/// Canonical lookup symbol derived from a binding's declared name.
pub fn lookup_symbol(name: &str) -> String {
    format!("{LOOKUP_PREFIX}{name}")
}

/// One registered native implementation: the class carrying the singleton
/// instance and its actual (representation-level) invocation signature.
#[derive(Debug, Clone)]
pub struct IntrinsicImpl {
    pub class: String,
    pub params: Vec<ReprClass>,
    pub ret: ReprClass,
}

#[derive(Debug)]
struct Namespace {
    name: String,
    entries: FxHashMap<String, IntrinsicImpl>,
    probes: AtomicU64,
}

/// Explicit registration table replacing the source system's reflective
/// naming-convention discovery. Namespaces are probed in registration order.
#[derive(Debug, Default)]
pub struct IntrinsicRegistry {
    namespaces: Vec<Namespace>,
}

impl IntrinsicRegistry {
    pub fn new() -> IntrinsicRegistry {
        IntrinsicRegistry::default()
    }

    pub fn add_namespace(&mut self, name: &str) -> &mut Self {
        self.namespaces.push(Namespace {
            name: name.to_string(),
            entries: FxHashMap::default(),
            probes: AtomicU64::new(0),
        });
        self
    }

    /// Registers a native implementation for `binding_name` under the given
    /// namespace (which must already exist).
    pub fn register(&mut self, namespace: &str, binding_name: &str, imp: IntrinsicImpl) {
        let symbol = lookup_symbol(binding_name);
        if let Some(ns) = self
            .namespaces
            .iter_mut()
            .find(|candidate| candidate.name == namespace)
        {
            ns.entries.insert(symbol, imp);
        }
    }

    /// How many times resolution has consulted the named namespace. Used by
    /// tests to observe memoization.
    pub fn probe_count(&self, namespace: &str) -> u64 {
        self.namespaces
            .iter()
            .find(|ns| ns.name == namespace)
            .map(|ns| ns.probes.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// A verified, resolved native callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIntrinsic {
    pub namespace: String,
    pub class: String,
    pub params: Vec<ReprClass>,
    pub ret: ReprClass,
}

impl ResolvedIntrinsic {
    /// Access path of the singleton instance in generated code.
    pub fn instance_path(&self) -> String {
        format!("{}.{}.{INSTANCE_FIELD}", self.namespace, self.class)
    }
}

type CacheKey = (String, BindingId);

/// Resolves intrinsic bindings against the registry, memoizing per binding.
///
/// Resolution is queried potentially once per call site, so successful
/// resolutions are cached for the session lifetime. The cache is the one
/// piece of state shared across concurrently compiled modules, hence the
/// read/write lock.
#[derive(Debug)]
pub struct IntrinsicResolver {
    registry: IntrinsicRegistry,
    cache: RwLock<FxHashMap<CacheKey, Arc<ResolvedIntrinsic>>>,
}

impl IntrinsicResolver {
    pub fn new(registry: IntrinsicRegistry) -> IntrinsicResolver {
        IntrinsicResolver {
            registry,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn registry(&self) -> &IntrinsicRegistry {
        &self.registry
    }

    /// Drops every memoized resolution. Called when the session epoch is
    /// advanced.
    pub fn reset_cache(&self) {
        self.cache.write().clear();
    }

    /// Resolves the intrinsic binding `name` declared with type `declared`.
    ///
    /// The declared type must be a function type; its parameter side is
    /// scattered (a tuple of N members requires an N-argument native
    /// invocation) and both sides are compared structurally, after
    /// representation mapping, against the candidate's registered signature.
    /// Failure is user-visible and is not retried with another strategy.
    pub fn resolve(
        &self,
        module: &str,
        binding: BindingId,
        name: &str,
        declared: &Type,
    ) -> Result<Arc<ResolvedIntrinsic>, VelaError> {
        let key = (module.to_string(), binding);
        {
            let cache = self.cache.read();
            if let Some(resolved) = cache.get(&key) {
                return Ok(Arc::clone(resolved));
            }
        }

        let resolved = Arc::new(self.probe(name, declared)?);

        let mut cache = self.cache.write();
        let entry = cache
            .entry(key)
            .or_insert_with(|| Arc::clone(&resolved));
        Ok(Arc::clone(entry))
    }

    fn probe(&self, name: &str, declared: &Type) -> Result<ResolvedIntrinsic, VelaError> {
        let Type::Func(param, ret) = declared else {
            return Err(VelaError::Intrinsic(format!(
                "intrinsic {name} must have a function type, found {}",
                declared.render()
            )));
        };
        let want_params = param
            .scattered_params()
            .into_iter()
            .map(map_signature_part)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| intrinsic_type_error(name, declared, &err))?;
        let want_ret =
            map_signature_part(ret).map_err(|err| intrinsic_type_error(name, declared, &err))?;

        let symbol = lookup_symbol(name);
        let mut mismatches = Vec::new();
        for namespace in &self.registry.namespaces {
            namespace.probes.fetch_add(1, Ordering::Relaxed);
            let Some(candidate) = namespace.entries.get(&symbol) else {
                continue;
            };
            if candidate.params == want_params && candidate.ret == want_ret {
                return Ok(ResolvedIntrinsic {
                    namespace: namespace.name.clone(),
                    class: candidate.class.clone(),
                    params: candidate.params.clone(),
                    ret: candidate.ret,
                });
            }
            mismatches.push(format!(
                "{}.{} takes ({}) -> {}",
                namespace.name,
                candidate.class,
                candidate
                    .params
                    .iter()
                    .map(|repr| repr.target_name())
                    .collect::<Vec<_>>()
                    .join(", "),
                candidate.ret.target_name()
            ));
        }

        let detail = if mismatches.is_empty() {
            "no namespace provides it".to_string()
        } else {
            format!("candidates rejected: {}", mismatches.join("; "))
        };
        Err(VelaError::Intrinsic(format!(
            "no native implementation for {name} : {} ({detail})",
            declared.render()
        )))
    }
}

fn map_signature_part(ty: &Type) -> Result<ReprClass, String> {
    repr::map(ty)
        .map(|mapped| mapped.repr)
        .map_err(|err| err.to_string())
}

fn intrinsic_type_error(name: &str, declared: &Type, detail: &str) -> VelaError {
    VelaError::Intrinsic(format!(
        "intrinsic {name} : {} has an unmappable signature: {detail}",
        declared.render()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{PrimKind, RefKind};

    fn registry_with_add() -> IntrinsicRegistry {
        let mut registry = IntrinsicRegistry::new();
        registry.add_namespace("vela.rt.core");
        registry.add_namespace("vela.rt.math");
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

    fn add_type() -> Type {
        Type::func(Type::Tuple(vec![Type::int(), Type::int()]), Type::int())
    }

    #[test]
    fn resolves_through_the_namespace_order() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let resolved = resolver
            .resolve("app.main", BindingId(0), "add", &add_type())
            .expect("resolve add");
        assert_eq!(resolved.namespace, "vela.rt.math");
        assert_eq!(resolved.instance_path(), "vela.rt.math.Add.INSTANCE");
        assert_eq!(resolved.params.len(), 2);
    }

    #[test]
    fn tuple_parameters_scatter_to_the_native_arity() {
        let mut registry = IntrinsicRegistry::new();
        registry.add_namespace("vela.rt.core");
        registry.register(
            "vela.rt.core",
            "print",
            IntrinsicImpl {
                class: "Print".into(),
                params: vec![ReprClass::Ref(RefKind::Str)],
                ret: ReprClass::Ref(RefKind::Object),
            },
        );
        let resolver = IntrinsicResolver::new(registry);
        let one_param = Type::func(Type::string(), Type::con("Unit"));
        assert!(resolver
            .resolve("app.main", BindingId(1), "print", &one_param)
            .is_ok());
    }

    #[test]
    fn signature_mismatch_is_a_hard_error_naming_the_binding() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let wrong = Type::func(Type::Tuple(vec![Type::long(), Type::long()]), Type::long());
        let err = resolver
            .resolve("app.main", BindingId(0), "add", &wrong)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("add"), "{message}");
        assert!(message.contains("(Long, Long) -> Long"), "{message}");
    }

    #[test]
    fn missing_implementations_report_the_declared_type() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let err = resolver
            .resolve("app.main", BindingId(2), "missing", &add_type())
            .unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn resolution_is_memoized_per_binding() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let first = resolver
            .resolve("app.main", BindingId(0), "add", &add_type())
            .unwrap();
        let core_probes = resolver.registry().probe_count("vela.rt.core");
        let math_probes = resolver.registry().probe_count("vela.rt.math");
        let second = resolver
            .resolve("app.main", BindingId(0), "add", &add_type())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.registry().probe_count("vela.rt.core"), core_probes);
        assert_eq!(resolver.registry().probe_count("vela.rt.math"), math_probes);
    }

    #[test]
    fn reset_clears_the_memoized_resolutions() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let first = resolver
            .resolve("app.main", BindingId(0), "add", &add_type())
            .unwrap();
        resolver.reset_cache();
        let second = resolver
            .resolve("app.main", BindingId(0), "add", &add_type())
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn non_function_intrinsics_are_rejected() {
        let resolver = IntrinsicResolver::new(registry_with_add());
        let err = resolver
            .resolve("app.main", BindingId(3), "add", &Type::int())
            .unwrap_err();
        assert!(err.to_string().contains("function type"), "{err}");
    }
}
