//! Members, methods and indexers the object model provides without being
//! declared: those of `String`, `DateTime`, `TimeSpan`, `Nullable`,
//! collections, groupings and the static `Math` class.

use std::sync::{Arc, LazyLock};

use crate::types::{ClassBody, ClassType, Indexer, Member, MemberKind, Method, Type};

fn property(name: &str, ty: Type) -> Member {
    Member {
        name: name.to_string(),
        ty,
        kind: MemberKind::Property,
        is_static: false,
    }
}

fn static_property(name: &str, ty: Type) -> Member {
    Member {
        is_static: true,
        ..property(name, ty)
    }
}

fn method(declaring: &str, name: &str, params: Vec<Type>, ret: Type) -> Arc<Method> {
    Arc::new(Method::new(declaring, name, params, ret))
}

fn static_method(declaring: &str, name: &str, params: Vec<Type>, ret: Type) -> Arc<Method> {
    Arc::new(Method::new_static(declaring, name, params, ret))
}

static TO_STRING: LazyLock<Arc<Method>> =
    LazyLock::new(|| method("Object", "ToString", vec![], Type::String));

static STRING_METHODS: LazyLock<Vec<Arc<Method>>> = LazyLock::new(|| {
    let s = "String";
    vec![
        method(s, "Contains", vec![Type::String], Type::Boolean),
        method(s, "StartsWith", vec![Type::String], Type::Boolean),
        method(s, "EndsWith", vec![Type::String], Type::Boolean),
        method(s, "Equals", vec![Type::String], Type::Boolean),
        method(s, "ToUpper", vec![], Type::String),
        method(s, "ToLower", vec![], Type::String),
        method(s, "Trim", vec![], Type::String),
        method(s, "Substring", vec![Type::Int32], Type::String),
        method(s, "Substring", vec![Type::Int32, Type::Int32], Type::String),
        method(s, "IndexOf", vec![Type::String], Type::Int32),
        method(s, "Replace", vec![Type::String, Type::String], Type::String),
        static_method(s, "IsNullOrEmpty", vec![Type::String], Type::Boolean),
        static_method(s, "IsNullOrWhiteSpace", vec![Type::String], Type::Boolean),
        static_method(s, "Concat", vec![Type::Object, Type::Object], Type::String),
        static_method(s, "Compare", vec![Type::String, Type::String], Type::Int32),
    ]
});

static DATE_TIME_METHODS: LazyLock<Vec<Arc<Method>>> = LazyLock::new(|| {
    let d = "DateTime";
    vec![
        method(d, "AddDays", vec![Type::Double], Type::DateTime),
        method(d, "AddHours", vec![Type::Double], Type::DateTime),
        method(d, "AddMinutes", vec![Type::Double], Type::DateTime),
        method(d, "AddSeconds", vec![Type::Double], Type::DateTime),
    ]
});

static MATH: LazyLock<Type> = LazyLock::new(|| {
    let m = "Math";
    let class = ClassType::declare("Math", Some("System".to_string()), false);
    let mut methods = vec![];
    for ty in [Type::Int32, Type::Int64, Type::Single, Type::Double, Type::Decimal] {
        methods.push(static_method(m, "Abs", vec![ty.clone()], ty.clone()));
        methods.push(static_method(m, "Max", vec![ty.clone(), ty.clone()], ty.clone()));
        methods.push(static_method(m, "Min", vec![ty.clone(), ty.clone()], ty.clone()));
    }
    for ty in [Type::Double, Type::Decimal] {
        methods.push(static_method(m, "Round", vec![ty.clone()], ty.clone()));
        methods.push(static_method(m, "Round", vec![ty.clone(), Type::Int32], ty.clone()));
        methods.push(static_method(m, "Floor", vec![ty.clone()], ty.clone()));
        methods.push(static_method(m, "Ceiling", vec![ty.clone()], ty.clone()));
        methods.push(static_method(m, "Truncate", vec![ty.clone()], ty.clone()));
    }
    methods.push(static_method(m, "Sqrt", vec![Type::Double], Type::Double));
    methods.push(static_method(m, "Pow", vec![Type::Double, Type::Double], Type::Double));
    class.define(ClassBody {
        members: vec![
            static_property("PI", Type::Double),
            static_property("E", Type::Double),
        ],
        methods,
        ..ClassBody::default()
    });
    Type::Class(class)
});

/// The static `System.Math` class.
pub fn math_type() -> Type {
    MATH.clone()
}

/// Every member of `ty`, instance and static, own members before inherited
/// ones.
pub fn members(ty: &Type) -> Vec<Member> {
    match ty {
        Type::String => vec![
            property("Length", Type::Int32),
            static_property("Empty", Type::String),
        ],
        Type::DateTime => {
            let mut list: Vec<Member> = [
                "Year",
                "Month",
                "Day",
                "Hour",
                "Minute",
                "Second",
                "Millisecond",
                "DayOfYear",
            ]
            .iter()
            .map(|n| property(n, Type::Int32))
            .collect();
            list.push(property("Date", Type::DateTime));
            list.push(property("Ticks", Type::Int64));
            list.push(static_property("Now", Type::DateTime));
            list.push(static_property("Today", Type::DateTime));
            list.push(static_property("MinValue", Type::DateTime));
            list.push(static_property("MaxValue", Type::DateTime));
            list
        }
        Type::TimeSpan => vec![
            property("Days", Type::Int32),
            property("Hours", Type::Int32),
            property("Minutes", Type::Int32),
            property("Seconds", Type::Int32),
            property("TotalDays", Type::Double),
            property("TotalHours", Type::Double),
            property("TotalMinutes", Type::Double),
            property("TotalSeconds", Type::Double),
        ],
        Type::Int32 | Type::Int64 | Type::UInt32 | Type::UInt64 | Type::Int16 | Type::Byte => vec![
            static_property("MaxValue", ty.clone()),
            static_property("MinValue", ty.clone()),
        ],
        Type::Nullable(inner) => vec![
            property("HasValue", Type::Boolean),
            property("Value", (**inner).clone()),
        ],
        Type::Array(_) => vec![property("Length", Type::Int32)],
        Type::List(_) => vec![property("Count", Type::Int32)],
        Type::Grouping(key, _) => vec![property("Key", (**key).clone())],
        Type::Anonymous(anon) => anon
            .members
            .iter()
            .map(|(n, t)| property(n, t.clone()))
            .collect(),
        Type::Class(class) => {
            let mut list = class.body().members.clone();
            for base in class.ancestors() {
                if let Some(base) = base.as_class() {
                    list.extend(base.body().members.iter().cloned());
                }
            }
            list
        }
        _ => vec![],
    }
}

/// Every method of `ty`, including `ToString` inherited from `Object`.
pub fn methods(ty: &Type) -> Vec<Arc<Method>> {
    let mut list = match ty {
        Type::String => STRING_METHODS.clone(),
        Type::DateTime => DATE_TIME_METHODS.clone(),
        Type::Class(class) => {
            let mut list = class.body().methods.clone();
            for base in class.ancestors() {
                if let Some(base) = base.as_class() {
                    list.extend(base.body().methods.iter().cloned());
                }
            }
            list
        }
        _ => vec![],
    };
    list.push(TO_STRING.clone());
    list
}

/// Declared conversion and operator methods of `ty` and its bases.
pub fn operators(ty: &Type) -> Vec<Arc<Method>> {
    match ty.non_nullable() {
        Type::Class(class) => {
            let mut list = class.body().operators.clone();
            for base in class.ancestors() {
                if let Some(base) = base.as_class() {
                    list.extend(base.body().operators.iter().cloned());
                }
            }
            list
        }
        _ => vec![],
    }
}

pub fn indexers(ty: &Type) -> Vec<Indexer> {
    match ty {
        Type::String => vec![Indexer {
            params: vec![Type::Int32],
            ty: Type::Char,
        }],
        Type::List(element) => vec![Indexer {
            params: vec![Type::Int32],
            ty: (**element).clone(),
        }],
        Type::DynamicClass => vec![Indexer {
            params: vec![Type::String],
            ty: Type::Object,
        }],
        Type::Class(class) => {
            let mut list = class.body().indexers.clone();
            for base in class.ancestors() {
                if let Some(base) = base.as_class() {
                    list.extend(base.body().indexers.iter().cloned());
                }
            }
            list
        }
        _ => vec![],
    }
}
