//! JSON <-> Value conversion, guided by the model's static types

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;

use super::CliError;
use crate::types::{builtin, Type};
use crate::Value;

/// Converts a JSON document to a value of type `ty`.
///
/// Numbers take the width of the target type, strings are parsed into
/// dates, guids and enum members, and objects keep the declared members of
/// a class (converted to their member types) plus any extra keys as-is.
pub fn json_to_value(json: serde_json::Value, ty: &Type) -> Result<Value, CliError> {
    let target = ty.non_nullable();
    let mismatch = |json: &serde_json::Value| {
        CliError::Input(format!("expected {} but found {}", ty, json))
    };

    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => match target {
            Type::Boolean | Type::Object => Ok(Value::Boolean(b)),
            _ => Err(mismatch(&serde_json::Value::Bool(b))),
        },
        serde_json::Value::Number(n) => {
            let natural = if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::Int32(small),
                    Err(_) => Value::Int64(i),
                }
            } else if let Some(u) = n.as_u64() {
                Value::UInt64(u)
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            };
            match target {
                Type::Object => Ok(natural),
                t if t.is_numeric() || t.is_enum() => natural
                    .convert_numeric(t)
                    .ok_or_else(|| mismatch(&serde_json::Value::Number(n))),
                _ => Err(mismatch(&serde_json::Value::Number(n))),
            }
        }
        serde_json::Value::String(s) => {
            if let Some(e) = target.as_enum() {
                return e
                    .value_of(&s)
                    .map(|value| Value::Enum {
                        ty: e.clone(),
                        value,
                    })
                    .ok_or_else(|| CliError::Input(format!("'{}' is not a member of {}", s, ty)));
            }
            match Value::convert_from_invariant_string(&s, target) {
                Some(Ok(value)) => Ok(value),
                Some(Err(())) => Err(CliError::Input(format!("'{}' is not a valid {}", s, ty))),
                None => Ok(Value::String(s)),
            }
        }
        serde_json::Value::Array(items) => {
            let element = target.element_type().unwrap_or(Type::Object);
            items
                .into_iter()
                .map(|item| json_to_value(item, &element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        serde_json::Value::Object(map) => {
            let members = builtin::members(target);
            let mut object = BTreeMap::new();
            for (key, item) in map {
                let member_type = members
                    .iter()
                    .find(|m| !m.is_static && m.name == key)
                    .map_or(Type::Object, |m| m.ty.clone());
                object.insert(key, json_to_value(item, &member_type)?);
            }
            Ok(Value::Object(object))
        }
    }
}

/// Converts a value to JSON. Values without a JSON counterpart (dates,
/// guids, enum members, characters) become strings.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::SByte(n) => n.into(),
        Value::Byte(n) => n.into(),
        Value::Int16(n) => n.into(),
        Value::UInt16(n) => n.into(),
        Value::Int32(n) => n.into(),
        Value::UInt32(n) => n.into(),
        Value::Int64(n) => n.into(),
        Value::UInt64(n) => n.into(),
        Value::Single(n) => float(n as f64),
        Value::Double(n) => float(n),
        Value::Decimal(d) => d.to_f64().map_or(serde_json::Value::Null, float),
        Value::String(s) => serde_json::Value::String(s),
        Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(value_to_json).collect())
        }
        Value::Object(members) => serde_json::Value::Object(
            members
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn float(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassType, EnumType};
    use serde_json::json;

    #[test]
    fn numbers_take_the_declared_width() {
        let person = ClassType::builder("Person")
            .property("Age", Type::Int16)
            .property("Income", Type::Decimal)
            .build();
        let value = json_to_value(json!({ "Age": 41, "Income": 12.5, "Extra": 1 }), &person).unwrap();
        let Value::Object(members) = value else {
            panic!("expected an object");
        };
        assert_eq!(members["Age"], Value::Int16(41));
        assert_eq!(members["Income"], Value::Decimal("12.5".parse().unwrap()));
        assert_eq!(members["Extra"], Value::Int32(1));
    }

    #[test]
    fn strings_become_enum_members() {
        let role = EnumType::new("Role", &[("Admin", 0), ("User", 1)]);
        let value = json_to_value(json!("user"), &role).unwrap();
        assert_eq!(value.to_string(), "User");
        assert!(json_to_value(json!("Guest"), &role).is_err());
    }

    #[test]
    fn dates_print_as_text() {
        let value = json_to_value(json!("2024-05-01"), &Type::DateTime).unwrap();
        assert_eq!(value_to_json(value), json!("2024-05-01T00:00:00"));
    }
}
