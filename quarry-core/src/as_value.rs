use crate::{Error, Result, Value, truncate_long};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use std::{any, str::FromStr};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant for the type and, where it is lossless,
/// the widened or textual representation that drivers hand back (SQLite for example
/// returns every integer as `Int64` and stores uuids, decimals and timestamps as text).
///
/// ```rust
/// use quarry_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i16 = AsValue::try_from_value(Value::Int64(Some(42))).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Typed NULL for this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

pub const TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
pub const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

fn mismatch<T>(value: &Value) -> Error {
    let value = format!("{value:?}");
    Error::msg(format!(
        "Cannot convert {} to {}",
        truncate_long!(value),
        any::type_name::<T>(),
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                if let $destination(Some(v)) = value {
                    return Ok(v);
                }
                if let Some(v) = value.as_integer() {
                    return <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {v} is out of range for {}",
                            any::type_name::<Self>(),
                        ))
                    });
                }
                match value {
                    Value::Varchar(Some(ref v)) => v.trim().parse::<$source>().map_err(|e| {
                        Error::new(e).context(format!(
                            "Cannot parse `{}` as {}",
                            truncate_long!(v),
                            any::type_name::<Self>()
                        ))
                    }),
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value!(i8, Value::Int8);
impl_as_value!(i16, Value::Int16);
impl_as_value!(i32, Value::Int32);
impl_as_value!(i64, Value::Int64);
impl_as_value!(u8, Value::UInt8);
impl_as_value!(u16, Value::UInt16);
impl_as_value!(u32, Value::UInt32);
impl_as_value!(u64, Value::UInt64);

macro_rules! impl_as_value {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    #[allow(unreachable_patterns)]
                    Value::Float32(Some(v)) => Ok(v as _),
                    #[allow(unreachable_patterns)]
                    Value::Float64(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => {
                        v.to_f64().map(|v| v as _).ok_or_else(|| mismatch::<Self>(&value))
                    }
                    Value::Varchar(Some(ref v)) => {
                        v.trim().parse::<$source>().map_err(|_| mismatch::<Self>(&value))
                    }
                    _ => value
                        .as_integer()
                        .map(|v| v as _)
                        .ok_or_else(|| mismatch::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value!(f32, Value::Float32);
impl_as_value!(f64, Value::Float64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(mismatch::<Self>(&value)),
            },
            _ => match value.as_integer() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(mismatch::<Self>(&value)),
            },
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Blob(Some(ref v)) => {
                String::from_utf8(v.to_vec()).map_err(|_| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Float32(Some(v)) => Decimal::from_f32(v).ok_or_else(|| mismatch::<Self>(&value)),
            Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| mismatch::<Self>(&value)),
            Value::Varchar(Some(ref v)) => {
                Decimal::from_str(v.trim()).map_err(|_| mismatch::<Self>(&value))
            }
            _ => value
                .as_integer()
                .and_then(Decimal::from_i128)
                .ok_or_else(|| mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v.into_vec()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Uuid::parse_str(v).map_err(|_| mismatch::<Self>(&value)),
            Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(|_| mismatch::<Self>(&value)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => {
                Date::parse(v, DATE_FORMAT).map_err(|_| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::TimestampWithTimezone(Some(v)) => {
                let v = v.to_offset(time::UtcOffset::UTC);
                Ok(PrimitiveDateTime::new(v.date(), v.time()))
            }
            Value::Varchar(Some(ref v)) => {
                PrimitiveDateTime::parse(v, TIMESTAMP_FORMAT).map_err(|_| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::TimestampWithTimezone(None)
    }
    fn as_value(self) -> Value {
        Value::TimestampWithTimezone(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::TimestampWithTimezone(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
            Value::Varchar(Some(ref v)) => {
                OffsetDateTime::parse(v, &Rfc3339).map_err(|_| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for serde_json::Value {
    fn as_empty_value() -> Value {
        Value::Json(None)
    }
    fn as_value(self) -> Value {
        Value::Json(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => {
                serde_json::from_str(v).map_err(|_| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Self::new(<T as AsValue>::try_from_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn integers_narrow_with_range_check() {
        assert_eq!(i8::try_from_value(Value::Int64(Some(-5))).unwrap(), -5);
        assert!(i8::try_from_value(Value::Int64(Some(300))).is_err());
        assert!(u32::try_from_value(Value::Int32(Some(-1))).is_err());
        assert_eq!(u64::try_from_value(Value::Varchar(Some("17".into()))).unwrap(), 17);
    }

    #[test]
    fn textual_representations() {
        let id = Uuid::new_v4();
        assert_eq!(
            Uuid::try_from_value(Value::Varchar(Some(id.to_string()))).unwrap(),
            id
        );
        let at = datetime!(2024-03-01 10:20:30.123456789 UTC);
        let text = at.format(&Rfc3339).unwrap();
        assert_eq!(
            OffsetDateTime::try_from_value(Value::Varchar(Some(text))).unwrap(),
            at
        );
        let local = datetime!(2024-03-01 10:20:30.5);
        let text = local.format(TIMESTAMP_FORMAT).unwrap();
        assert_eq!(
            PrimitiveDateTime::try_from_value(Value::Varchar(Some(text))).unwrap(),
            local
        );
        assert_eq!(
            Decimal::try_from_value(Value::Varchar(Some("12.50".into()))).unwrap(),
            Decimal::new(1250, 2)
        );
        assert!(bool::try_from_value(Value::Int64(Some(1))).unwrap());
    }

    #[test]
    fn options_map_nulls() {
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::try_from_value(Value::Varchar(Some("x".into()))).unwrap(),
            Some("x".to_string())
        );
        assert!(matches!(Option::<i32>::None.as_value(), Value::Int32(None)));
    }
}
