//! The implicit conversion relation between types.

use crate::types::{builtin, Type};

/// Numeric type codes; enums and non-numeric types map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    Other,
}

fn code(ty: &Type) -> Code {
    match ty {
        Type::SByte => Code::SByte,
        Type::Byte => Code::Byte,
        Type::Int16 => Code::Int16,
        Type::UInt16 => Code::UInt16,
        Type::Int32 => Code::Int32,
        Type::UInt32 => Code::UInt32,
        Type::Int64 => Code::Int64,
        Type::UInt64 => Code::UInt64,
        Type::Single => Code::Single,
        Type::Double => Code::Double,
        Type::Decimal => Code::Decimal,
        _ => Code::Other,
    }
}

/// True when a value of `source` implicitly converts to `target`.
///
/// Covers identity, reference assignability, the widening numeric table,
/// lifting to `Nullable` (never the reverse), and user-declared
/// `op_Implicit` methods on either type.
pub fn is_compatible_with(source: &Type, target: &Type) -> bool {
    if source == target {
        return true;
    }
    if !target.is_value_type() {
        return is_assignable_from(target, source) || has_user_conversion(source, target, false);
    }

    let st = source.non_nullable();
    let tt = target.non_nullable();
    if source.is_nullable() && !target.is_nullable() {
        return false;
    }

    use Code::*;
    let (sc, tc) = (code(st), code(tt));
    let widening = match sc {
        SByte => matches!(tc, SByte | Int16 | Int32 | Int64 | Single | Double | Decimal),
        Byte => matches!(
            tc,
            Byte | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
        ),
        Int16 => matches!(tc, Int16 | Int32 | Int64 | Single | Double | Decimal),
        UInt16 => matches!(
            tc,
            UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
        ),
        Int32 => matches!(tc, Int32 | Int64 | Single | Double | Decimal),
        UInt32 => matches!(tc, UInt32 | Int64 | UInt64 | Single | Double | Decimal),
        Int64 => matches!(tc, Int64 | Single | Double | Decimal),
        UInt64 => matches!(tc, UInt64 | Single | Double | Decimal),
        Single => matches!(tc, Single | Double),
        Double => matches!(tc, Double),
        Decimal => matches!(tc, Decimal),
        Other => st == tt,
    };
    widening || has_user_conversion(source, target, false)
}

/// Reference (identity-preserving) conversion from `source` to `target`.
pub fn is_assignable_from(target: &Type, source: &Type) -> bool {
    if target == source || *target == Type::Object {
        return true;
    }
    match (target, source) {
        (Type::Class(_), Type::Class(class)) => class.ancestors().iter().any(|a| a == target),
        (Type::DynamicClass, Type::Anonymous(_)) => true,
        (Type::Sequence(wanted), _) => match source.element_type() {
            Some(element) => {
                element == **wanted
                    || (!element.is_value_type() && is_assignable_from(wanted, &element))
            }
            None => false,
        },
        _ => false,
    }
}

/// Looks for a declared `op_Implicit` (or, with `explicit`, also
/// `op_Explicit`) converting `source` into `target`, on either type.
pub fn has_user_conversion(source: &Type, target: &Type, explicit: bool) -> bool {
    let candidates = builtin::operators(source)
        .into_iter()
        .chain(builtin::operators(target));
    candidates
        .filter(|m| m.name == "op_Implicit" || (explicit && m.name == "op_Explicit"))
        .any(|m| {
            m.params.len() == 1
                && (m.params[0] == *source || m.params[0] == *source.non_nullable())
                && m.return_type.as_ref() == Some(target.non_nullable())
        })
}

/// Whether an explicit conversion from `source` to `target` exists:
/// numeric and enum narrowing, nullable wrapping either way, reference
/// up- and down-casts, and declared conversion operators.
pub fn is_explicitly_convertible(source: &Type, target: &Type) -> bool {
    if is_compatible_with(source, target) {
        return true;
    }
    let (st, tt) = (source.non_nullable(), target.non_nullable());
    if st == tt {
        return true;
    }
    let numeric_like = |t: &Type| t.is_numeric() || t.is_enum() || *t == Type::Char;
    if numeric_like(st) && numeric_like(tt) {
        return true;
    }
    if is_assignable_from(source, target) {
        return true;
    }
    has_user_conversion(source, target, true)
}
