//! Behaviour toggles and the pluggable type lookup a compile consults.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::Deserialize;

use crate::parser::keywords::{self, Keyword};
use crate::types::{AnonymousType, Type};

/// External type lookup.
///
/// Types returned by [`TypeProvider::custom_types`] behave like the built-in
/// ones: they are usable by simple name in any expression and their methods
/// are accessible. Types only reachable through the resolve methods can be
/// named by full name where a type is expected, subject to
/// [`ParsingConfig::allow_new_to_evaluate_any_type`].
pub trait TypeProvider: Send + Sync + fmt::Debug {
    fn custom_types(&self) -> Vec<Type>;

    /// Looks a type up by namespace-qualified name.
    fn resolve_type(&self, full_name: &str) -> Option<Type>;

    fn resolve_type_by_simple_name(&self, simple_name: &str) -> Option<Type>;
}

/// The bundled [`TypeProvider`]: an in-memory list of types.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    custom: Vec<Type>,
    resolvable: Vec<Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Registers a custom type, usable by name everywhere.
    pub fn register(&mut self, ty: Type) {
        self.custom.push(ty);
    }

    /// Makes a type known to full-name resolution only.
    pub fn add_resolvable(&mut self, ty: Type) {
        self.resolvable.push(ty);
    }

    pub fn with(mut self, ty: Type) -> Self {
        self.register(ty);
        self
    }

    fn all(&self) -> impl Iterator<Item = &Type> {
        self.custom.iter().chain(self.resolvable.iter())
    }
}

impl TypeProvider for TypeRegistry {
    fn custom_types(&self) -> Vec<Type> {
        self.custom.clone()
    }

    fn resolve_type(&self, full_name: &str) -> Option<Type> {
        self.all().find(|t| t.full_name() == full_name).cloned()
    }

    fn resolve_type_by_simple_name(&self, simple_name: &str) -> Option<Type> {
        self.all().find(|t| t.simple_name() == simple_name).cloned()
    }
}

/// Configuration of a compile.
///
/// The plain toggles deserialize from JSON; the type provider and the lazily
/// built caches do not. One configuration may be shared by concurrent
/// parser sessions: the caches are filled at most once and read under
/// shared locks.
///
/// # Examples
///
/// ```
/// use dynlinq::ParsingConfig;
///
/// let config: ParsingConfig =
///     serde_json::from_str(r#"{ "is_case_sensitive": true }"#).unwrap();
/// assert!(config.is_case_sensitive);
/// assert_eq!(config.number_decimal_separator, '.');
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Match keywords, symbols and members by exact case
    pub is_case_sensitive: bool,
    /// Materialize `new(...)` projections as the `DynamicClass` bag instead
    /// of a generated record type
    pub use_dynamic_object_class_for_anonymous_types: bool,
    /// Decimal point of real literals
    pub number_decimal_separator: char,
    /// Turn off resolving unknown members through a string indexer
    pub disable_member_access_to_index_accessor_fallback: bool,
    /// Allow `new` and type arguments to name types the provider only
    /// resolves, not just registered ones
    pub allow_new_to_evaluate_any_type: bool,
    /// Let the provider resolve types by simple name
    pub resolve_types_by_simple_name: bool,
    /// Resolve a name to a member of `it` rather than to a type of the same
    /// name, as in `Role == "Admin"` over a property `Role` of type `Role`
    pub prioritize_property_or_field_over_the_type: bool,
    #[serde(skip)]
    pub type_provider: Option<Arc<dyn TypeProvider>>,

    #[serde(skip)]
    keywords: OnceLock<HashMap<String, Keyword>>,
    #[serde(skip)]
    anonymous_types: RwLock<Vec<Arc<AnonymousType>>>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        ParsingConfig {
            is_case_sensitive: false,
            use_dynamic_object_class_for_anonymous_types: false,
            number_decimal_separator: '.',
            disable_member_access_to_index_accessor_fallback: false,
            allow_new_to_evaluate_any_type: false,
            resolve_types_by_simple_name: false,
            prioritize_property_or_field_over_the_type: true,
            type_provider: None,
            keywords: OnceLock::new(),
            anonymous_types: RwLock::new(Vec::new()),
        }
    }
}

impl ParsingConfig {
    pub fn with_type_provider(mut self, provider: Arc<dyn TypeProvider>) -> Self {
        self.type_provider = Some(provider);
        self.keywords = OnceLock::new();
        self
    }

    /// Normalizes a name for case-(in)sensitive lookup.
    pub fn fold_case(&self, name: &str) -> String {
        if self.is_case_sensitive {
            name.to_string()
        } else {
            name.chars().flat_map(char::to_lowercase).collect()
        }
    }

    /// Whether two names match under [`ParsingConfig::fold_case`].
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        self.fold_case(a) == self.fold_case(b)
    }

    /// The custom types of the provider, if one is set.
    pub fn custom_types(&self) -> Vec<Type> {
        self.type_provider
            .as_ref()
            .map(|p| p.custom_types())
            .unwrap_or_default()
    }

    pub(crate) fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords
            .get_or_init(|| keywords::build_table(self))
            .get(&self.fold_case(name))
    }

    /// The record type for a projection with these members, generated on
    /// first use and reused for every later projection of the same shape.
    pub fn anonymous_type(&self, members: Vec<(String, Type)>) -> Type {
        {
            let cache = self
                .anonymous_types
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = cache.iter().find(|t| t.members == members) {
                return Type::Anonymous(found.clone());
            }
        }
        let mut cache = self
            .anonymous_types
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.iter().find(|t| t.members == members) {
            return Type::Anonymous(found.clone());
        }
        let created = Arc::new(AnonymousType {
            id: cache.len() + 1,
            members,
        });
        cache.push(created.clone());
        tracing::debug!(id = created.id, "generated anonymous type");
        Type::Anonymous(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassType;

    #[test]
    fn test_anonymous_types_are_cached_by_shape() {
        let config = ParsingConfig::default();
        let a = config.anonymous_type(vec![("Name".into(), Type::String)]);
        let b = config.anonymous_type(vec![("Name".into(), Type::String)]);
        let c = config.anonymous_type(vec![("Age".into(), Type::Int32)]);
        match (&a, &b, &c) {
            (Type::Anonymous(a), Type::Anonymous(b), Type::Anonymous(c)) => {
                assert!(Arc::ptr_eq(a, b));
                assert_ne!(a.id, c.id);
            }
            _ => panic!("expected anonymous types"),
        }
    }

    #[test]
    fn test_names_fold_like_symbols() {
        let config = ParsingConfig::default();
        assert!(config.names_equal("Ärger", "äRGER"));
        assert_eq!(config.fold_case("Ärger"), config.fold_case("äRGER"));
        assert!(!config.names_equal("Name", "Names"));

        let mut exact = ParsingConfig::default();
        exact.is_case_sensitive = true;
        assert!(!exact.names_equal("Ärger", "ärger"));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = TypeRegistry::new();
        registry.register(ClassType::builder("Person").build());
        registry.add_resolvable(ClassType::builder("Audit").namespace("Acme.Logs").build());

        assert_eq!(registry.custom_types().len(), 1);
        assert!(registry.resolve_type("Acme.Logs.Audit").is_some());
        assert!(registry.resolve_type("Audit").is_none());
        assert!(registry.resolve_type_by_simple_name("Audit").is_some());
    }
}
