use serde::{Deserialize, Serialize};

use vela_core::types::Type;

/// Unboxed machine representation kinds.
///
/// Only `Int`/`Long`/`Float`/`Double` participate in primitive widening;
/// `Bool`/`Char`/`Byte`/`Short` exist for the box/unbox table and for
/// intrinsic signatures but never widen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimKind {
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimKind {
    /// Position in the fixed widening order, or `None` for kinds outside it.
    pub fn widening_rank(self) -> Option<u8> {
        match self {
            PrimKind::Int => Some(0),
            PrimKind::Long => Some(1),
            PrimKind::Float => Some(2),
            PrimKind::Double => Some(3),
            PrimKind::Bool | PrimKind::Char | PrimKind::Byte | PrimKind::Short => None,
        }
    }

    pub fn target_name(self) -> &'static str {
        match self {
            PrimKind::Bool => "boolean",
            PrimKind::Char => "char",
            PrimKind::Byte => "byte",
            PrimKind::Short => "short",
            PrimKind::Int => "int",
            PrimKind::Long => "long",
            PrimKind::Float => "float",
            PrimKind::Double => "double",
        }
    }

    /// The boxed counterpart's class name.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimKind::Bool => "Boolean",
            PrimKind::Char => "Character",
            PrimKind::Byte => "Byte",
            PrimKind::Short => "Short",
            PrimKind::Int => "Integer",
            PrimKind::Long => "Long",
            PrimKind::Float => "Float",
            PrimKind::Double => "Double",
        }
    }

    /// The accessor the boxed counterpart exposes to recover the primitive.
    pub fn unbox_accessor(self) -> &'static str {
        match self {
            PrimKind::Bool => "booleanValue",
            PrimKind::Char => "charValue",
            PrimKind::Byte => "byteValue",
            PrimKind::Short => "shortValue",
            PrimKind::Int => "intValue",
            PrimKind::Long => "longValue",
            PrimKind::Float => "floatValue",
            PrimKind::Double => "doubleValue",
        }
    }
}

/// Reference representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Boxed(PrimKind),
    Str,
    Keyword,
    List,
    Map,
    Tuple,
    Record,
    Variant,
    /// The uniform callable interface shared by every function type.
    Function,
    /// Opaque host object; the top of the reference hierarchy.
    Object,
}

impl RefKind {
    pub fn target_name(self) -> &'static str {
        match self {
            RefKind::Boxed(prim) => prim.boxed_name(),
            RefKind::Str => "String",
            RefKind::Keyword => "Keyword",
            RefKind::List => "ListVal",
            RefKind::Map => "MapVal",
            RefKind::Tuple => "TupleVal",
            RefKind::Record => "RecordVal",
            RefKind::Variant => "VariantVal",
            RefKind::Function => "Fn",
            RefKind::Object => "Object",
        }
    }
}

/// The target-level concrete representation chosen for a source type.
///
/// Every ground type maps to exactly one `ReprClass`; several types may share
/// one (all function types collapse to `Function`, aliases collapse to their
/// underlying representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReprClass {
    Prim(PrimKind),
    Ref(RefKind),
}

pub const OBJECT: ReprClass = ReprClass::Ref(RefKind::Object);
pub const FUNCTION: ReprClass = ReprClass::Ref(RefKind::Function);

impl ReprClass {
    pub fn is_primitive(self) -> bool {
        matches!(self, ReprClass::Prim(_))
    }

    /// The type name used in generated declarations.
    pub fn target_name(self) -> &'static str {
        match self {
            ReprClass::Prim(prim) => prim.target_name(),
            ReprClass::Ref(reference) => reference.target_name(),
        }
    }

    /// Covariant assignability: `self.accepts(from)` is true when a value
    /// already carrying representation `from` may appear where `self` is
    /// required, with no coercion. `Object` accepts every reference; there is
    /// no other subtyping among the modeled representations.
    pub fn accepts(self, from: ReprClass) -> bool {
        if self == from {
            return true;
        }
        matches!((self, from), (ReprClass::Ref(RefKind::Object), ReprClass::Ref(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReprError {
    #[error("unresolved type {0} reached the backend; the front end must resolve all types")]
    Unresolved(String),
}

/// Outcome of mapping one type: the chosen representation plus an optional
/// side-channel warning for un-modeled constructs that fell back to `Object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapped {
    pub repr: ReprClass,
    pub warning: Option<String>,
}

impl Mapped {
    fn clean(repr: ReprClass) -> Mapped {
        Mapped {
            repr,
            warning: None,
        }
    }
}

/// Maps a ground type to its representation class.
///
/// Total and pure over ground types. A type still containing a variable is a
/// front-end defect and yields `ReprError`; the caller reports it as an
/// internal-consistency diagnostic and aborts the unit, never patches it.
pub fn map(ty: &Type) -> Result<Mapped, ReprError> {
    if !ty.is_ground() {
        return Err(ReprError::Unresolved(ty.render()));
    }
    match ty {
        Type::Var(name) => Err(ReprError::Unresolved(name.clone())),
        Type::Alias { underlying, .. } => map(underlying),
        Type::Func(_, _) => Ok(Mapped::clean(ReprClass::Ref(RefKind::Function))),
        Type::Tuple(_) => Ok(Mapped::clean(ReprClass::Ref(RefKind::Tuple))),
        Type::Record(_) => Ok(Mapped::clean(ReprClass::Ref(RefKind::Record))),
        Type::Variant(_) => Ok(Mapped::clean(ReprClass::Ref(RefKind::Variant))),
        Type::Con(name, args) => map_con(name, args),
    }
}

fn map_con(name: &str, args: &[Type]) -> Result<Mapped, ReprError> {
    // Probe the type vocabulary by structural shape.
    let repr = match (name, args.len()) {
        ("Bool", 0) => ReprClass::Prim(PrimKind::Bool),
        ("Int", 0) => ReprClass::Prim(PrimKind::Int),
        ("Long", 0) => ReprClass::Prim(PrimKind::Long),
        ("Float", 0) => ReprClass::Prim(PrimKind::Float),
        ("Double", 0) => ReprClass::Prim(PrimKind::Double),
        ("String", 0) => ReprClass::Ref(RefKind::Str),
        ("Symbol", 0) => ReprClass::Ref(RefKind::Keyword),
        ("List", 1) => ReprClass::Ref(RefKind::List),
        ("Map", 2) => ReprClass::Ref(RefKind::Map),
        // Unknown nullary constructors are opaque host types.
        (_, 0) => ReprClass::Ref(RefKind::Object),
        _ => {
            // Un-modeled higher-kinded construct. These indicate a gap in an
            // earlier stage, so the fallback is reported, not silent.
            return Ok(Mapped {
                repr: ReprClass::Ref(RefKind::Object),
                warning: Some(format!(
                    "no representation for type constructor {name}/{}; using Object",
                    args.len()
                )),
            });
        }
    };
    Ok(Mapped::clean(repr))
}
