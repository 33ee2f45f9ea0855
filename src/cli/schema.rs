//! JSON description of an object model.
//!
//! ```json
//! {
//!   "it": "Person",
//!   "config": { "is_case_sensitive": false },
//!   "types": [
//!     { "kind": "enum", "name": "Role", "variants": ["Admin", "User"] },
//!     { "kind": "class", "name": "Person",
//!       "properties": [ { "name": "Name", "type": "String" },
//!                       { "name": "Age", "type": "Int32?" },
//!                       { "name": "Roles", "type": "List<Role>" } ] }
//!   ]
//! }
//! ```
//!
//! Types may refer to each other in any order; classes are declared first
//! and their bodies attached once every name is known.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::CliError;
use crate::config::{ParsingConfig, TypeRegistry};
use crate::types::{ClassBody, ClassType, Constructor, EnumType, Indexer, Member, MemberKind, Method, Type};

#[derive(Debug, Deserialize)]
pub struct Schema {
    /// Default element type of compiled expressions
    #[serde(default)]
    pub it: Option<String>,
    #[serde(default)]
    pub config: ParsingConfig,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDef {
    Class(ClassDef),
    /// A class with value semantics
    Struct(ClassDef),
    Enum(EnumDef),
}

#[derive(Debug, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub constructors: Vec<Vec<String>>,
    #[serde(default)]
    pub indexers: Vec<IndexerDef>,
    /// Operator and conversion methods (`op_Equality`, `op_Implicit`, ...)
    #[serde(default)]
    pub operators: Vec<MethodDef>,
    /// Element type when the class is itself enumerable
    #[serde(default)]
    pub element: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    /// Absent for methods without a result
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Deserialize)]
pub struct IndexerDef {
    pub params: Vec<String>,
    pub returns: String,
}

#[derive(Debug, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    pub variants: Vec<VariantDef>,
}

/// `"Admin"` takes the next value; `{"name": "Admin", "value": 4}` is explicit.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VariantDef {
    Name(String),
    Valued { name: String, value: i64 },
}

/// A loaded schema: the configuration with its type registry installed,
/// and every declared type by name.
#[derive(Debug)]
pub struct Model {
    pub config: ParsingConfig,
    pub it: Option<Type>,
    pub types: HashMap<String, Type>,
}

impl Model {
    pub fn from_json(text: &str) -> Result<Model, CliError> {
        let schema: Schema = serde_json::from_str(text)?;
        Model::build(schema)
    }

    pub fn build(schema: Schema) -> Result<Model, CliError> {
        let mut types = HashMap::new();
        let mut classes = Vec::new();

        for def in &schema.types {
            match def {
                TypeDef::Class(class) | TypeDef::Struct(class) => {
                    let value_type = matches!(def, TypeDef::Struct(_));
                    let declared =
                        ClassType::declare(&class.name, class.namespace.clone(), value_type);
                    declare(&mut types, &class.name, Type::Class(declared.clone()))?;
                    classes.push((declared, class));
                }
                TypeDef::Enum(def) => {
                    let ty = build_enum(def)?;
                    declare(&mut types, &def.name, ty)?;
                }
            }
        }

        for (declared, def) in classes {
            let body = build_body(def, &types)?;
            declared.define(body);
        }

        let it = schema
            .it
            .as_deref()
            .map(|name| parse_type_name(name, &types))
            .transpose()?;

        let mut registry = TypeRegistry::new();
        for ty in types.values() {
            registry.register(ty.clone());
        }
        tracing::debug!(types = types.len(), "loaded schema");
        let config = schema.config.with_type_provider(Arc::new(registry));
        Ok(Model { config, it, types })
    }

    /// The element type to compile against: `name` when given, otherwise
    /// the schema's default.
    pub fn it_type(&self, name: Option<&str>) -> Result<Type, CliError> {
        match name {
            Some(name) => parse_type_name(name, &self.types),
            None => self.it.clone().ok_or_else(|| {
                CliError::Schema("no element type: pass --it or set \"it\" in the schema".into())
            }),
        }
    }
}

fn declare(types: &mut HashMap<String, Type>, name: &str, ty: Type) -> Result<(), CliError> {
    if types.insert(name.to_string(), ty).is_some() {
        return Err(CliError::Schema(format!("type '{}' is declared twice", name)));
    }
    Ok(())
}

fn build_enum(def: &EnumDef) -> Result<Type, CliError> {
    let underlying = match &def.underlying {
        Some(name) => parse_type_name(name, &HashMap::new())?,
        None => Type::Int32,
    };
    if !underlying.is_integral() {
        return Err(CliError::Schema(format!(
            "enum '{}' needs an integral underlying type, not {}",
            def.name, underlying
        )));
    }
    let mut next = 0;
    let mut variants = Vec::with_capacity(def.variants.len());
    for variant in &def.variants {
        let (name, value) = match variant {
            VariantDef::Name(name) => (name.as_str(), next),
            VariantDef::Valued { name, value } => (name.as_str(), *value),
        };
        variants.push((name, value));
        next = value + 1;
    }
    Ok(EnumType::with_underlying(
        &def.name,
        def.namespace.clone(),
        underlying,
        &variants,
    ))
}

fn resolve_all(names: &[String], types: &HashMap<String, Type>) -> Result<Vec<Type>, CliError> {
    names.iter().map(|n| parse_type_name(n, types)).collect()
}

fn build_method(
    declaring: &str,
    def: &MethodDef,
    is_static: bool,
    types: &HashMap<String, Type>,
) -> Result<Arc<Method>, CliError> {
    Ok(Arc::new(Method {
        name: def.name.clone(),
        declaring_type: declaring.to_string(),
        params: resolve_all(&def.params, types)?,
        return_type: def
            .returns
            .as_deref()
            .map(|r| parse_type_name(r, types))
            .transpose()?,
        is_static,
    }))
}

fn build_body(def: &ClassDef, types: &HashMap<String, Type>) -> Result<ClassBody, CliError> {
    let resolve = |name: &str| parse_type_name(name, types);

    let members = def
        .properties
        .iter()
        .map(|p| {
            Ok(Member {
                name: p.name.clone(),
                ty: resolve(&p.ty)?,
                kind: MemberKind::Property,
                is_static: p.is_static,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    let methods = def
        .methods
        .iter()
        .map(|m| build_method(&def.name, m, m.is_static, types))
        .collect::<Result<Vec<_>, _>>()?;
    let operators = def
        .operators
        .iter()
        .map(|m| build_method(&def.name, m, true, types))
        .collect::<Result<Vec<_>, _>>()?;
    let constructors = def
        .constructors
        .iter()
        .map(|params| {
            Ok(Constructor {
                params: resolve_all(params, types)?,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    let indexers = def
        .indexers
        .iter()
        .map(|ix| {
            Ok(Indexer {
                params: resolve_all(&ix.params, types)?,
                ty: resolve(&ix.returns)?,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    Ok(ClassBody {
        base: def.base.as_deref().map(resolve).transpose()?,
        members,
        methods,
        constructors,
        indexers,
        operators,
        element_type: def.element.as_deref().map(resolve).transpose()?,
    })
}

/// Parses a textual type reference: a primitive or declared name, with
/// `?`, `[]`, `List<T>` and `IEnumerable<T>` forms.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use dynlinq::cli::parse_type_name;
/// use dynlinq::types::Type;
///
/// let types = HashMap::new();
/// let ty = parse_type_name("List<Int32?>", &types).unwrap();
/// assert_eq!(ty, Type::list(Type::nullable(Type::Int32)));
/// ```
pub fn parse_type_name(text: &str, types: &HashMap<String, Type>) -> Result<Type, CliError> {
    let text = text.trim();
    if let Some(inner) = text.strip_suffix('?') {
        let inner = parse_type_name(inner, types)?;
        if !inner.is_value_type() || inner.is_nullable() {
            return Err(CliError::Schema(format!("type '{}' has no nullable form", inner)));
        }
        return Ok(Type::nullable(inner));
    }
    if let Some(inner) = text.strip_suffix("[]") {
        return Ok(Type::array(parse_type_name(inner, types)?));
    }
    if let Some((outer, rest)) = text.split_once('<') {
        let inner = rest
            .strip_suffix('>')
            .ok_or_else(|| CliError::Schema(format!("unbalanced '<' in '{}'", text)))?;
        let element = parse_type_name(inner, types)?;
        return match outer.trim() {
            "List" | "IList" | "ICollection" => Ok(Type::list(element)),
            "IEnumerable" | "IQueryable" => Ok(Type::sequence(element)),
            other => Err(CliError::Schema(format!("unknown generic type '{}'", other))),
        };
    }

    let primitive = match text {
        "Object" | "object" => Type::Object,
        "Boolean" | "bool" => Type::Boolean,
        "Char" | "char" => Type::Char,
        "String" | "string" => Type::String,
        "SByte" | "sbyte" => Type::SByte,
        "Byte" | "byte" => Type::Byte,
        "Int16" | "short" => Type::Int16,
        "UInt16" | "ushort" => Type::UInt16,
        "Int32" | "int" => Type::Int32,
        "UInt32" | "uint" => Type::UInt32,
        "Int64" | "long" => Type::Int64,
        "UInt64" | "ulong" => Type::UInt64,
        "Single" | "float" => Type::Single,
        "Double" | "double" => Type::Double,
        "Decimal" | "decimal" => Type::Decimal,
        "DateTime" => Type::DateTime,
        "TimeSpan" => Type::TimeSpan,
        "Guid" => Type::Guid,
        "DynamicClass" => Type::DynamicClass,
        name => {
            return types
                .get(name)
                .cloned()
                .ok_or_else(|| CliError::Schema(format!("unknown type '{}'", name)))
        }
    };
    Ok(primitive)
}
