//! Type name resolution.

use std::sync::LazyLock;

use crate::config::ParsingConfig;
use crate::parser::keywords::Keyword;
use crate::types::{builtin, Type};

/// Built-in types usable by name, with their C# aliases.
pub static PREDEFINED_TYPES: LazyLock<Vec<(&'static str, Type)>> = LazyLock::new(|| {
    vec![
        ("Object", Type::Object),
        ("Boolean", Type::Boolean),
        ("Char", Type::Char),
        ("String", Type::String),
        ("SByte", Type::SByte),
        ("Byte", Type::Byte),
        ("Int16", Type::Int16),
        ("UInt16", Type::UInt16),
        ("Int32", Type::Int32),
        ("UInt32", Type::UInt32),
        ("Int64", Type::Int64),
        ("UInt64", Type::UInt64),
        ("Single", Type::Single),
        ("Double", Type::Double),
        ("Decimal", Type::Decimal),
        ("DateTime", Type::DateTime),
        ("TimeSpan", Type::TimeSpan),
        ("Guid", Type::Guid),
        ("Math", builtin::math_type()),
        ("object", Type::Object),
        ("bool", Type::Boolean),
        ("char", Type::Char),
        ("string", Type::String),
        ("sbyte", Type::SByte),
        ("byte", Type::Byte),
        ("short", Type::Int16),
        ("ushort", Type::UInt16),
        ("int", Type::Int32),
        ("uint", Type::UInt32),
        ("long", Type::Int64),
        ("ulong", Type::UInt64),
        ("float", Type::Single),
        ("double", Type::Double),
        ("decimal", Type::Decimal),
    ]
});

/// Built-in or registered custom type; nullable forms count as their
/// underlying type.
pub fn is_predefined(config: &ParsingConfig, ty: &Type) -> bool {
    let ty = ty.non_nullable();
    PREDEFINED_TYPES.iter().any(|(_, t)| t == ty) || config.custom_types().contains(ty)
}

/// Same as [`is_predefined`], for the declaring-type name of a method.
pub fn is_predefined_name(config: &ParsingConfig, name: &str) -> bool {
    PREDEFINED_TYPES.iter().any(|(n, _)| *n == name)
        || config
            .custom_types()
            .iter()
            .any(|t| t.simple_name() == name || t.full_name() == name)
}

/// Resolves a type name.
///
/// Tried in order: the keyword table, the simple and then full names of the
/// types in `scope` (the current `it`, `parent` and `root`), and the type
/// provider. The provider is asked by full name only when `force_external`
/// is set or the configuration allows any type; on a miss it is asked by
/// simple name when that mode is configured.
pub fn resolve_type(
    config: &ParsingConfig,
    name: &str,
    scope: &[&Type],
    force_external: bool,
) -> Option<Type> {
    if let Some(Keyword::Type(ty)) = config.keyword(name) {
        return Some(ty.clone());
    }

    if let Some(ty) = scope.iter().find(|t| t.simple_name() == name) {
        return Some((*ty).clone());
    }
    if let Some(ty) = scope.iter().find(|t| t.full_name() == name) {
        return Some((*ty).clone());
    }

    let provider = config.type_provider.as_ref()?;
    if !(force_external || config.allow_new_to_evaluate_any_type) {
        return None;
    }
    let resolved = provider.resolve_type(name).or_else(|| {
        config
            .resolve_types_by_simple_name
            .then(|| provider.resolve_type_by_simple_name(name))
            .flatten()
    });
    tracing::trace!(name, found = resolved.is_some(), "external type lookup");
    resolved
}
