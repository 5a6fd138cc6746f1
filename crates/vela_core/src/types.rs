use serde::{Deserialize, Serialize};

/// A resolved, ground structural type descriptor.
///
/// By the time the backend sees a `Type` it must contain no type variables;
/// that is guaranteed by the (excluded) type-checking stage. `Var` is kept in
/// the vocabulary only so the backend can detect a front-end defect instead
/// of silently mis-lowering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// Named constructor application. Nullary constructors are the atomics
    /// (`Bool`, `Int`, `Long`, `Float`, `Double`, `String`, `Symbol`, plus
    /// opaque host types); `List a` and `Map k v` are the modeled
    /// parameterized forms.
    Con(String, Vec<Type>),
    /// `a -> b`. A multi-parameter function carries a `Tuple` argument side.
    Func(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    /// Closed record, fields in declaration order.
    Record(Vec<(String, Type)>),
    /// Tagged alternatives, cases in declaration order.
    Variant(Vec<(String, Type)>),
    /// Transparent "new"-type alias; representation-wise it collapses to the
    /// underlying type and the alias name never escapes into codegen.
    Alias { name: String, underlying: Box<Type> },
    /// An unresolved type variable. Illegal past the type checker.
    Var(String),
}

impl Type {
    pub fn con(name: &str) -> Type {
        Type::Con(name.to_string(), Vec::new())
    }

    pub fn bool() -> Type {
        Type::con("Bool")
    }

    pub fn int() -> Type {
        Type::con("Int")
    }

    pub fn long() -> Type {
        Type::con("Long")
    }

    pub fn float() -> Type {
        Type::con("Float")
    }

    pub fn double() -> Type {
        Type::con("Double")
    }

    pub fn string() -> Type {
        Type::con("String")
    }

    pub fn symbol() -> Type {
        Type::con("Symbol")
    }

    pub fn list(elem: Type) -> Type {
        Type::Con("List".to_string(), vec![elem])
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Con("Map".to_string(), vec![key, value])
    }

    pub fn func(arg: Type, result: Type) -> Type {
        Type::Func(Box::new(arg), Box::new(result))
    }

    pub fn alias(name: &str, underlying: Type) -> Type {
        Type::Alias {
            name: name.to_string(),
            underlying: Box::new(underlying),
        }
    }

    /// True when the type contains no `Var` anywhere in its tree.
    pub fn is_ground(&self) -> bool {
        match self {
            Type::Var(_) => false,
            Type::Con(_, args) => args.iter().all(Type::is_ground),
            Type::Func(arg, result) => arg.is_ground() && result.is_ground(),
            Type::Tuple(items) => items.iter().all(Type::is_ground),
            Type::Record(fields) | Type::Variant(fields) => {
                fields.iter().all(|(_, ty)| ty.is_ground())
            }
            Type::Alias { underlying, .. } => underlying.is_ground(),
        }
    }

    /// The parameter list a call site scatters to: tuple argument sides
    /// spread to one parameter per member, anything else is one parameter.
    pub fn scattered_params(&self) -> Vec<&Type> {
        match self {
            Type::Tuple(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Renders the type for diagnostics.
    pub fn render(&self) -> String {
        match self {
            Type::Con(name, args) => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let args_str = args.iter().map(Type::render).collect::<Vec<_>>();
                    format!("{} {}", name, args_str.join(" "))
                }
            }
            Type::Func(arg, result) => {
                let left = match **arg {
                    Type::Func(_, _) => format!("({})", arg.render()),
                    _ => arg.render(),
                };
                format!("{} -> {}", left, result.render())
            }
            Type::Tuple(items) => {
                let items_str = items.iter().map(Type::render).collect::<Vec<_>>();
                format!("({})", items_str.join(", "))
            }
            Type::Record(fields) => {
                let parts = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty.render()))
                    .collect::<Vec<_>>();
                format!("{{ {} }}", parts.join(", "))
            }
            Type::Variant(cases) => {
                let parts = cases
                    .iter()
                    .map(|(name, ty)| format!("{} {}", name, ty.render()))
                    .collect::<Vec<_>>();
                format!("<{}>", parts.join(" | "))
            }
            Type::Alias { name, .. } => name.clone(),
            Type::Var(name) => format!("'{name}"),
        }
    }
}
