use crate::repr::{PrimKind, RefKind, ReprClass};

/// Why a coercion request was rejected.
///
/// Every rejection is a compiler-internal inconsistency: the upstream type
/// checker admitted a pairing this backend cannot bridge. The engine never
/// guesses a fallback; callers report the failure and keep the source
/// expression unchanged so that compilation continues accumulating
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoerceFailure {
    #[error("narrowing or cross-family primitive cast from {from} to {to}")]
    IllegalPrimitiveCast { from: &'static str, to: &'static str },
    #[error("cannot unbox {from} into {to}")]
    NotUnboxable { from: &'static str, to: &'static str },
    #[error("boxed {from} is not assignable to {to}")]
    BoxNotAssignable { from: &'static str, to: &'static str },
    #[error("unrelated reference representations {from} and {to}")]
    UnrelatedReferences { from: &'static str, to: &'static str },
}

/// Produces the expression text carrying representation `to` from an
/// expression already emitted with representation `from`.
///
/// Returns the expression unchanged when `to` already accepts `from`.
/// Primitive-to-primitive casts are legal only along the fixed widening
/// order int < long < float < double; everything narrower or cross-family is
/// rejected rather than silently truncated.
pub fn coerce(expr: &str, from: ReprClass, to: ReprClass) -> Result<String, CoerceFailure> {
    if to.accepts(from) {
        return Ok(expr.to_string());
    }
    match (from, to) {
        (ReprClass::Prim(source), ReprClass::Prim(target)) => {
            widen(expr, source, target)
        }
        (ReprClass::Ref(source), ReprClass::Prim(target)) => unbox(expr, source, target),
        (ReprClass::Prim(source), ReprClass::Ref(target)) => box_prim(expr, source, target),
        (ReprClass::Ref(source), ReprClass::Ref(target)) => downcast(expr, source, target),
    }
}

fn widen(expr: &str, source: PrimKind, target: PrimKind) -> Result<String, CoerceFailure> {
    let (Some(from_rank), Some(to_rank)) = (source.widening_rank(), target.widening_rank()) else {
        return Err(CoerceFailure::IllegalPrimitiveCast {
            from: source.target_name(),
            to: target.target_name(),
        });
    };
    if from_rank < to_rank {
        Ok(format!("(({}) ({expr}))", target.target_name()))
    } else {
        Err(CoerceFailure::IllegalPrimitiveCast {
            from: source.target_name(),
            to: target.target_name(),
        })
    }
}

fn unbox(expr: &str, source: RefKind, target: PrimKind) -> Result<String, CoerceFailure> {
    // The source must be the boxed counterpart of the target primitive, or a
    // supertype of it (Object), in which case a downcast precedes the unbox.
    match source {
        RefKind::Boxed(boxed) if boxed == target => {
            Ok(format!("({expr}).{}()", target.unbox_accessor()))
        }
        RefKind::Object => Ok(format!(
            "(({}) ({expr})).{}()",
            target.boxed_name(),
            target.unbox_accessor()
        )),
        _ => Err(CoerceFailure::NotUnboxable {
            from: source.target_name(),
            to: target.target_name(),
        }),
    }
}

fn box_prim(expr: &str, source: PrimKind, target: RefKind) -> Result<String, CoerceFailure> {
    let boxed = RefKind::Boxed(source);
    if !ReprClass::Ref(target).accepts(ReprClass::Ref(boxed)) {
        return Err(CoerceFailure::BoxNotAssignable {
            from: source.target_name(),
            to: target.target_name(),
        });
    }
    Ok(format!("{}.valueOf({expr})", source.boxed_name()))
}

fn downcast(expr: &str, source: RefKind, target: RefKind) -> Result<String, CoerceFailure> {
    // `accepts` already handled upcasts; the only legal remaining direction
    // is a downcast out of a supertype.
    if source == RefKind::Object {
        Ok(format!("(({}) ({expr}))", target.target_name()))
    } else {
        Err(CoerceFailure::UnrelatedReferences {
            from: source.target_name(),
            to: target.target_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::OBJECT;

    const INT: ReprClass = ReprClass::Prim(PrimKind::Int);
    const LONG: ReprClass = ReprClass::Prim(PrimKind::Long);
    const FLOAT: ReprClass = ReprClass::Prim(PrimKind::Float);
    const DOUBLE: ReprClass = ReprClass::Prim(PrimKind::Double);
    const BOOL: ReprClass = ReprClass::Prim(PrimKind::Bool);
    const BOXED_INT: ReprClass = ReprClass::Ref(RefKind::Boxed(PrimKind::Int));

    #[test]
    fn coercion_is_idempotent_on_matching_representations() {
        for repr in [INT, DOUBLE, OBJECT, ReprClass::Ref(RefKind::List)] {
            assert_eq!(coerce("x", repr, repr).unwrap(), "x");
        }
    }

    #[test]
    fn widening_follows_the_fixed_order() {
        assert_eq!(coerce("x", INT, LONG).unwrap(), "((long) (x))");
        assert_eq!(coerce("x", INT, DOUBLE).unwrap(), "((double) (x))");
        assert_eq!(coerce("x", LONG, FLOAT).unwrap(), "((float) (x))");
        assert_eq!(coerce("x", FLOAT, DOUBLE).unwrap(), "((double) (x))");
    }

    #[test]
    fn narrowing_is_rejected_not_truncated() {
        assert!(coerce("x", DOUBLE, INT).is_err());
        assert!(coerce("x", LONG, INT).is_err());
    }

    #[test]
    fn cross_family_casts_are_rejected() {
        assert!(coerce("x", INT, BOOL).is_err());
        assert!(coerce("x", BOOL, INT).is_err());
        // byte/short/char sit outside the widening order entirely.
        assert!(coerce("x", ReprClass::Prim(PrimKind::Byte), INT).is_err());
        assert!(coerce("x", ReprClass::Prim(PrimKind::Short), LONG).is_err());
        assert!(coerce("x", ReprClass::Prim(PrimKind::Char), INT).is_err());
    }

    #[test]
    fn box_unbox_round_trip_is_textually_inverse() {
        let boxed = coerce("x", INT, BOXED_INT).unwrap();
        assert_eq!(boxed, "Integer.valueOf(x)");
        let back = coerce(&boxed, BOXED_INT, INT).unwrap();
        assert_eq!(back, "(Integer.valueOf(x)).intValue()");
    }

    #[test]
    fn every_primitive_has_a_box_and_unbox_form() {
        for prim in [
            PrimKind::Bool,
            PrimKind::Char,
            PrimKind::Byte,
            PrimKind::Short,
            PrimKind::Int,
            PrimKind::Long,
            PrimKind::Float,
            PrimKind::Double,
        ] {
            let source = ReprClass::Prim(prim);
            let boxed_repr = ReprClass::Ref(RefKind::Boxed(prim));
            let boxed = coerce("v", source, boxed_repr).unwrap();
            assert!(boxed.contains(".valueOf("), "{boxed}");
            let unboxed = coerce(&boxed, boxed_repr, source).unwrap();
            assert!(unboxed.ends_with(&format!(".{}()", prim.unbox_accessor())));
        }
    }

    #[test]
    fn unboxing_from_object_inserts_a_downcast_first() {
        let out = coerce("v", OBJECT, INT).unwrap();
        assert_eq!(out, "((Integer) (v)).intValue()");
    }

    #[test]
    fn unboxing_an_unrelated_reference_fails() {
        assert!(coerce("v", ReprClass::Ref(RefKind::List), INT).is_err());
        assert!(coerce("v", ReprClass::Ref(RefKind::Boxed(PrimKind::Long)), INT).is_err());
    }

    #[test]
    fn boxing_targets_must_accept_the_boxed_form() {
        // Object accepts any boxed form.
        assert_eq!(coerce("v", INT, OBJECT).unwrap(), "Integer.valueOf(v)");
        // A list does not accept a boxed int.
        assert!(coerce("v", INT, ReprClass::Ref(RefKind::List)).is_err());
    }

    #[test]
    fn reference_downcasts_come_only_from_object() {
        assert_eq!(
            coerce("v", OBJECT, ReprClass::Ref(RefKind::List)).unwrap(),
            "((ListVal) (v))"
        );
        assert!(coerce(
            "v",
            ReprClass::Ref(RefKind::List),
            ReprClass::Ref(RefKind::Map)
        )
        .is_err());
    }

    #[test]
    fn upcast_to_object_is_a_no_op() {
        assert_eq!(
            coerce("v", ReprClass::Ref(RefKind::List), OBJECT).unwrap(),
            "v"
        );
    }
}
