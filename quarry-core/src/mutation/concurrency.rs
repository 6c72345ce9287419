use crate::{AsValue, ColumnType, OrmError, Result, Row, Value, VersionKind};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

/// Outcome chosen when an update finds the stored version changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Write the client values anyway, the version moves past the stored one.
    ClientWins,
    /// Keep the stored row and load it into the entity, the version is still bumped.
    DatabaseWins,
    /// Per field: values the client changed win, the others keep the stored value.
    ///
    /// The stored row stands in for the values the client originally read, there is no
    /// snapshot of those. Every field whose incoming value differs from the stored one
    /// counts as changed by the client.
    MergeChanges,
}

const ROW_VERSION_WIDTH: usize = 8;

/// Version assigned on insert.
pub fn initial_version(kind: VersionKind, column_type: ColumnType) -> Value {
    match kind {
        VersionKind::Integer => integer_value(column_type, 1),
        VersionKind::Timestamp => timestamp_after(column_type, &Value::Null),
        VersionKind::Guid => Value::Uuid(Some(Uuid::new_v4())),
        VersionKind::RowVersion => {
            let mut bytes = [0u8; ROW_VERSION_WIDTH];
            bytes[ROW_VERSION_WIDTH - 1] = 1;
            Value::Blob(Some(bytes.into()))
        }
    }
}

/// Version following `current`, a NULL current version yields the initial one.
pub fn next_version(kind: VersionKind, column_type: ColumnType, current: &Value) -> Result<Value> {
    if current.is_null() {
        return Ok(initial_version(kind, column_type));
    }
    Ok(match kind {
        VersionKind::Integer => {
            let Some(value) = current.as_integer() else {
                return Err(OrmError::InvalidOperation(format!(
                    "version {current} is not an integer"
                ))
                .into());
            };
            integer_value(column_type, value + 1)
        }
        VersionKind::Timestamp => timestamp_after(column_type, current),
        VersionKind::Guid => Value::Uuid(Some(Uuid::new_v4())),
        VersionKind::RowVersion => {
            let Value::Blob(Some(bytes)) = current else {
                return Err(OrmError::InvalidOperation(format!(
                    "row version {current} is not a byte array"
                ))
                .into());
            };
            let mut bytes = bytes.clone();
            for byte in bytes.iter_mut().rev() {
                let (value, overflow) = byte.overflowing_add(1);
                *byte = value;
                if !overflow {
                    break;
                }
            }
            Value::Blob(Some(bytes))
        }
    })
}

/// Truncating cast, `value` is at most one above the column maximum so this wraps.
fn integer_value(column_type: ColumnType, value: i128) -> Value {
    match column_type {
        ColumnType::Int8 => Value::Int8(Some(value as i8)),
        ColumnType::Int16 => Value::Int16(Some(value as i16)),
        ColumnType::Int32 => Value::Int32(Some(value as i32)),
        ColumnType::UInt8 => Value::UInt8(Some(value as u8)),
        ColumnType::UInt16 => Value::UInt16(Some(value as u16)),
        ColumnType::UInt32 => Value::UInt32(Some(value as u32)),
        ColumnType::UInt64 => Value::UInt64(Some(value as u64)),
        _ => Value::Int64(Some(value as i64)),
    }
}

/// Current UTC time at microsecond precision, strictly after `current`.
fn timestamp_after(column_type: ColumnType, current: &Value) -> Value {
    let now = OffsetDateTime::now_utc();
    let now = now - Duration::nanoseconds((now.nanosecond() % 1000) as i64);
    let previous = OffsetDateTime::try_from_value(current.clone()).ok().or_else(|| {
        PrimitiveDateTime::try_from_value(current.clone())
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    });
    let next = match previous {
        Some(previous) if previous >= now => previous + Duration::microseconds(1),
        _ => now,
    };
    match column_type {
        ColumnType::TimestampWithTimezone => Value::TimestampWithTimezone(Some(next)),
        _ => Value::Timestamp(Some(PrimitiveDateTime::new(next.date(), next.time()))),
    }
}

/// Field by field: `incoming` when it differs from `original`, `current` otherwise.
pub fn merge_values(original: &[Value], incoming: &[Value], current: &[Value]) -> Row {
    incoming
        .iter()
        .zip(original)
        .zip(current)
        .map(|((incoming, original), current)| {
            if incoming != original {
                incoming.clone()
            } else {
                current.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn integer_versions_wrap_at_width() {
        let next = |column_type, value| {
            next_version(VersionKind::Integer, column_type, &value).unwrap()
        };
        assert_eq!(next(ColumnType::Int32, Value::Int32(Some(1))), Value::Int32(Some(2)));
        assert_eq!(next(ColumnType::Int32, Value::Int64(Some(9))), Value::Int32(Some(10)));
        assert!(matches!(
            next(ColumnType::Int8, Value::Int8(Some(i8::MAX))),
            Value::Int8(Some(i8::MIN))
        ));
        assert!(matches!(
            next(ColumnType::UInt16, Value::UInt16(Some(u16::MAX))),
            Value::UInt16(Some(0))
        ));
        assert!(matches!(
            next(ColumnType::Int64, Value::Int64(Some(i64::MAX))),
            Value::Int64(Some(i64::MIN))
        ));
        assert!(matches!(
            next(ColumnType::Int64, Value::Int64(None)),
            Value::Int64(Some(1))
        ));
        assert!(
            next_version(
                VersionKind::Integer,
                ColumnType::Int32,
                &Value::Varchar(Some("x".into()))
            )
            .is_err()
        );
    }

    #[test]
    fn row_version_big_endian_increment() {
        let initial = initial_version(VersionKind::RowVersion, ColumnType::Blob);
        assert_eq!(initial, Value::Blob(Some([0, 0, 0, 0, 0, 0, 0, 1].into())));
        let carry = Value::Blob(Some([0, 0, 0, 0, 0, 0, 0x01, 0xFF].into()));
        assert_eq!(
            next_version(VersionKind::RowVersion, ColumnType::Blob, &carry).unwrap(),
            Value::Blob(Some([0, 0, 0, 0, 0, 0, 0x02, 0x00].into()))
        );
        let last = Value::Blob(Some([0xFF; 8].into()));
        assert_eq!(
            next_version(VersionKind::RowVersion, ColumnType::Blob, &last).unwrap(),
            Value::Blob(Some([0; 8].into()))
        );
    }

    #[test]
    fn timestamps_always_move_forward() {
        let future = datetime!(2999-01-01 10:00:00);
        let next = next_version(
            VersionKind::Timestamp,
            ColumnType::Timestamp,
            &Value::Timestamp(Some(future)),
        )
        .unwrap();
        assert_eq!(next, Value::Timestamp(Some(datetime!(2999-01-01 10:00:00.000001))));
        let past = Value::Varchar(Some("2001-05-01 08:30:00.5".into()));
        let Value::Timestamp(Some(next)) =
            next_version(VersionKind::Timestamp, ColumnType::Timestamp, &past).unwrap()
        else {
            panic!("Expected a timestamp");
        };
        assert!(next > datetime!(2001-05-01 08:30:00.5));
        assert_eq!(next.nanosecond() % 1000, 0);
    }

    #[test]
    fn guid_versions_change() {
        let first = initial_version(VersionKind::Guid, ColumnType::Uuid);
        let second = next_version(VersionKind::Guid, ColumnType::Uuid, &first).unwrap();
        assert!(matches!(second, Value::Uuid(Some(..))));
        assert_ne!(first, second);
    }

    #[test]
    fn merge_prefers_changed_fields() {
        let original = [Value::Int32(Some(1)), "a".into(), "b".into()];
        let incoming = [Value::Int32(Some(1)), "a".into(), "client".into()];
        let current = [Value::Int32(Some(1)), "server".into(), "b".into()];
        let merged = merge_values(&original, &incoming, &current);
        assert_eq!(
            merged.as_ref(),
            &[Value::Int32(Some(1)), "server".into(), "client".into()]
        );
    }
}
