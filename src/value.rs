use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{EnumType, Type};

/// A runtime value: the payload of constant nodes and the currency of the
/// reference evaluator.
///
/// Unlike JSON, every numeric width keeps its own variant so a constant's
/// value always matches the static type of the node that holds it.
///
/// # Examples
///
/// ```
/// use dynlinq::Value;
/// use dynlinq::types::Type;
///
/// assert_eq!(Value::Int32(42).natural_type(), Type::Int32);
/// assert_eq!(Value::Single(3.5).to_string(), "3.5");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Char(char),
    String(String),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    TimeSpan(TimeDelta),
    Guid(Uuid),
    /// Enum member, stored by underlying value
    Enum { ty: Arc<EnumType>, value: i64 },
    /// A type literal such as the argument of `is(Int32)`
    Type(Type),
    Array(Vec<Value>),
    /// Object with named members; also the runtime shape of anonymous
    /// projections and dynamic bags
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The static type a constant holding this value gets when nothing
    /// better is known.
    pub fn natural_type(&self) -> Type {
        match self {
            Value::Null => Type::Object,
            Value::Boolean(_) => Type::Boolean,
            Value::Char(_) => Type::Char,
            Value::String(_) => Type::String,
            Value::SByte(_) => Type::SByte,
            Value::Byte(_) => Type::Byte,
            Value::Int16(_) => Type::Int16,
            Value::UInt16(_) => Type::UInt16,
            Value::Int32(_) => Type::Int32,
            Value::UInt32(_) => Type::UInt32,
            Value::Int64(_) => Type::Int64,
            Value::UInt64(_) => Type::UInt64,
            Value::Single(_) => Type::Single,
            Value::Double(_) => Type::Double,
            Value::Decimal(_) => Type::Decimal,
            Value::DateTime(_) => Type::DateTime,
            Value::TimeSpan(_) => Type::TimeSpan,
            Value::Guid(_) => Type::Guid,
            Value::Enum { ty, .. } => Type::Enum(ty.clone()),
            Value::Type(_) => Type::SystemType,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Value::natural_type)
                    .filter(|t| items.iter().all(|v| v.is_null() || v.natural_type() == *t))
                    .unwrap_or(Type::Object);
                Type::Array(Box::new(element))
            }
            Value::Object(_) => Type::DynamicClass,
        }
    }

    /// Integral view of any integral or enum value.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::SByte(n) => Some(*n as i128),
            Value::Byte(n) => Some(*n as i128),
            Value::Int16(n) => Some(*n as i128),
            Value::UInt16(n) => Some(*n as i128),
            Value::Int32(n) => Some(*n as i128),
            Value::UInt32(n) => Some(*n as i128),
            Value::Int64(n) => Some(*n as i128),
            Value::UInt64(n) => Some(*n as i128),
            Value::Char(c) => Some(*c as i128),
            Value::Enum { value, .. } => Some(*value as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Single(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            other => other.as_i128().map(|n| n as f64),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Single(n) => Decimal::from_f32(*n),
            Value::Double(n) => Decimal::from_f64(*n),
            other => other.as_i128().and_then(Decimal::from_i128),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Builds a value of the non-nullable numeric (or enum) type `ty` from
    /// an integral quantity, failing when it does not fit.
    pub fn from_i128(ty: &Type, n: i128) -> Option<Value> {
        let value = match ty.non_nullable() {
            Type::SByte => Value::SByte(i8::try_from(n).ok()?),
            Type::Byte => Value::Byte(u8::try_from(n).ok()?),
            Type::Int16 => Value::Int16(i16::try_from(n).ok()?),
            Type::UInt16 => Value::UInt16(u16::try_from(n).ok()?),
            Type::Int32 => Value::Int32(i32::try_from(n).ok()?),
            Type::UInt32 => Value::UInt32(u32::try_from(n).ok()?),
            Type::Int64 => Value::Int64(i64::try_from(n).ok()?),
            Type::UInt64 => Value::UInt64(u64::try_from(n).ok()?),
            Type::Single => Value::Single(n as f32),
            Type::Double => Value::Double(n as f64),
            Type::Decimal => Value::Decimal(Decimal::from_i128(n)?),
            Type::Char => Value::Char(char::from_u32(u32::try_from(n).ok()?)?),
            Type::Enum(e) => Value::Enum {
                ty: e.clone(),
                value: i64::try_from(n).ok()?,
            },
            _ => return None,
        };
        Some(value)
    }

    /// Converts this value to the numeric representation of `ty`,
    /// truncating reals toward zero the way an explicit cast does.
    pub fn convert_numeric(&self, ty: &Type) -> Option<Value> {
        let target = ty.non_nullable();
        match target {
            Type::Single => return self.as_f64().map(|n| Value::Single(n as f32)),
            Type::Double => return self.as_f64().map(Value::Double),
            Type::Decimal => return self.as_decimal().map(Value::Decimal),
            _ => {}
        }
        let integral = match self {
            Value::Single(n) => n.trunc() as i128,
            Value::Double(n) => n.trunc() as i128,
            Value::Decimal(d) => d.trunc().to_i128()?,
            other => other.as_i128()?,
        };
        Value::from_i128(target, integral)
    }

    /// Converts invariant-culture text into a value of `ty`.
    ///
    /// Returns `None` when `ty` has no text conversion at all and
    /// `Some(Err(()))` when it has one but `text` is not a valid
    /// representation.
    pub fn convert_from_invariant_string(text: &str, ty: &Type) -> Option<Result<Value, ()>> {
        let text = text.trim();
        let target = ty.non_nullable();
        let parsed = match target {
            Type::Boolean => bool::from_str(&text.to_ascii_lowercase())
                .map(Value::Boolean)
                .map_err(|_| ()),
            Type::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(()),
                }
            }
            Type::SByte
            | Type::Byte
            | Type::Int16
            | Type::UInt16
            | Type::Int32
            | Type::UInt32
            | Type::Int64
            | Type::UInt64 => i128::from_str(text)
                .ok()
                .and_then(|n| Value::from_i128(target, n))
                .ok_or(()),
            Type::Single => f32::from_str(text).map(Value::Single).map_err(|_| ()),
            Type::Double => f64::from_str(text).map(Value::Double).map_err(|_| ()),
            Type::Decimal => Decimal::from_str(text).map(Value::Decimal).map_err(|_| ()),
            Type::DateTime => parse_date_time(text).map(Value::DateTime).ok_or(()),
            Type::Guid => Uuid::parse_str(text).map(Value::Guid).map_err(|_| ()),
            _ => return None,
        };
        Some(parsed)
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => write!(f, "{}", s),
            Value::SByte(n) => write!(f, "{}", n),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::UInt16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::UInt32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::UInt64(n) => write!(f, "{}", n),
            Value::Single(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::TimeSpan(d) => write!(f, "{}", d),
            Value::Guid(g) => write!(f, "{}", g),
            Value::Enum { ty, value } => match ty.name_of(*value) {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "{}", value),
            },
            Value::Type(t) => write!(f, "{}", t),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(members) => {
                write!(f, "{{")?;
                for (i, (name, item)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, item)?;
                }
                write!(f, "}}")
            }
        }
    }
}
