use rust_decimal::Decimal;
use std::fmt::{self, Display, Formatter};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

/// Dynamically typed cell exchanged with the drivers.
///
/// Every variant carries an `Option` so that a typed NULL (the column prototype) can be
/// expressed without losing the type information.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Timestamp(Option<PrimitiveDateTime>),
    TimestampWithTimezone(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
    Json(Option<serde_json::Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::UInt8(l), Self::UInt8(r)) => l == r,
            (Self::UInt16(l), Self::UInt16(r)) => l == r,
            (Self::UInt32(l), Self::UInt32(r)) => l == r,
            (Self::UInt64(l), Self::UInt64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::TimestampWithTimezone(l), Self::TimestampWithTimezone(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::Json(l), Self::Json(r)) => l == r,
            (l, r) if l.is_null() && r.is_null() => true,
            (l, r) => match (l.as_integer(), r.as_integer()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
        }
    }
}

impl Value {
    /// True for `Null` and for every typed variant holding `None`.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int8(v) => v.is_none(),
            Value::Int16(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::UInt8(v) => v.is_none(),
            Value::UInt16(v) => v.is_none(),
            Value::UInt32(v) => v.is_none(),
            Value::UInt64(v) => v.is_none(),
            Value::Float32(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::TimestampWithTimezone(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::Json(v) => v.is_none(),
        }
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// Integer view over every integral variant (booleans included), used to compare
    /// values that crossed a driver which widens integers.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Boolean(Some(v)) => Some(*v as i128),
            Value::Int8(Some(v)) => Some(*v as i128),
            Value::Int16(Some(v)) => Some(*v as i128),
            Value::Int32(Some(v)) => Some(*v as i128),
            Value::Int64(Some(v)) => Some(*v as i128),
            Value::UInt8(Some(v)) => Some(*v as i128),
            Value::UInt16(Some(v)) => Some(*v as i128),
            Value::UInt32(Some(v)) => Some(*v as i128),
            Value::UInt64(Some(v)) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(Some(v)) => Some(v),
            _ => None,
        }
    }

    /// Stable textual key, used to deduplicate materialized rows by primary key.
    pub fn identity_key(&self) -> String {
        match self.as_integer() {
            Some(v) => format!("i:{v}"),
            None => format!("{self}"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("NULL");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::Int8(Some(v)) => write!(f, "{v}"),
            Value::Int16(Some(v)) => write!(f, "{v}"),
            Value::Int32(Some(v)) => write!(f, "{v}"),
            Value::Int64(Some(v)) => write!(f, "{v}"),
            Value::UInt8(Some(v)) => write!(f, "{v}"),
            Value::UInt16(Some(v)) => write!(f, "{v}"),
            Value::UInt32(Some(v)) => write!(f, "{v}"),
            Value::UInt64(Some(v)) => write!(f, "{v}"),
            Value::Float32(Some(v)) => write!(f, "{v}"),
            Value::Float64(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) => write!(f, "{v}"),
            Value::Varchar(Some(v)) => write!(f, "'{v}'"),
            Value::Blob(Some(v)) => {
                f.write_str("0x")?;
                for b in v.iter() {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
            Value::Date(Some(v)) => write!(f, "{v}"),
            Value::Timestamp(Some(v)) => write!(f, "{v}"),
            Value::TimestampWithTimezone(Some(v)) => write!(f, "{v}"),
            Value::Uuid(Some(v)) => write!(f, "{v}"),
            Value::Json(Some(v)) => write!(f, "{v}"),
            _ => f.write_str("NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn integers_compare_across_widths() {
        assert_eq!(Value::Int32(Some(7)), Value::Int64(Some(7)));
        assert_ne!(Value::Int32(Some(7)), Value::Int64(Some(8)));
        assert_eq!(Value::Varchar(None), Value::Null);
        assert_ne!(Value::Varchar(Some("7".into())), Value::Int32(Some(7)));
    }

    #[test]
    fn identity_key_ignores_integer_width() {
        assert_eq!(
            Value::Int16(Some(3)).identity_key(),
            Value::UInt64(Some(3)).identity_key()
        );
    }
}
