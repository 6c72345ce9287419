use crate::Value;

/// Semantic type of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Varchar,
    Blob,
    Date,
    Timestamp,
    TimestampWithTimezone,
    Uuid,
    Json,
}

impl ColumnType {
    /// Typed NULL of this column type.
    pub fn empty_value(&self) -> Value {
        match self {
            ColumnType::Boolean => Value::Boolean(None),
            ColumnType::Int8 => Value::Int8(None),
            ColumnType::Int16 => Value::Int16(None),
            ColumnType::Int32 => Value::Int32(None),
            ColumnType::Int64 => Value::Int64(None),
            ColumnType::UInt8 => Value::UInt8(None),
            ColumnType::UInt16 => Value::UInt16(None),
            ColumnType::UInt32 => Value::UInt32(None),
            ColumnType::UInt64 => Value::UInt64(None),
            ColumnType::Float32 => Value::Float32(None),
            ColumnType::Float64 => Value::Float64(None),
            ColumnType::Decimal => Value::Decimal(None),
            ColumnType::Varchar => Value::Varchar(None),
            ColumnType::Blob => Value::Blob(None),
            ColumnType::Date => Value::Date(None),
            ColumnType::Timestamp => Value::Timestamp(None),
            ColumnType::TimestampWithTimezone => Value::TimestampWithTimezone(None),
            ColumnType::Uuid => Value::Uuid(None),
            ColumnType::Json => Value::Json(None),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::Int8
                | ColumnType::Int16
                | ColumnType::Int32
                | ColumnType::Int64
                | ColumnType::UInt8
                | ColumnType::UInt16
                | ColumnType::UInt32
                | ColumnType::UInt64
        )
    }

    /// Whether the column can carry a version of the given kind.
    pub fn supports_version(&self, kind: VersionKind) -> bool {
        match kind {
            VersionKind::Integer => self.is_integer(),
            VersionKind::Timestamp => matches!(
                self,
                ColumnType::Timestamp | ColumnType::TimestampWithTimezone
            ),
            VersionKind::Guid => *self == ColumnType::Uuid,
            VersionKind::RowVersion => *self == ColumnType::Blob,
        }
    }
}

/// How a version column advances on every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKind {
    /// `+1`, wrapping at the width of the column type.
    Integer,
    /// Current UTC time.
    Timestamp,
    /// Fresh random uuid.
    Guid,
    /// Fixed width byte array, big endian increment wrapping to all zeros.
    RowVersion,
}

/// Declaration of one column, as written in [`crate::Entity::describe`].
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub field: &'static str,
    pub name: Option<&'static str>,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub version: Option<VersionKind>,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub required: bool,
}

impl ColumnDef {
    pub fn new(field: &'static str, column_type: ColumnType) -> Self {
        Self {
            field,
            name: None,
            column_type,
            primary_key: false,
            auto_increment: false,
            version: None,
            nullable: false,
            max_length: None,
            required: false,
        }
    }
    /// Column name, defaults to the field name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
    pub fn version(mut self, kind: VersionKind) -> Self {
        self.version = Some(kind);
        self
    }
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
    pub fn max_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Resolved column of an [`crate::EntityMetadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub field: &'static str,
    pub name: &'static str,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub nullable: bool,
    /// Advisory, not enforced.
    pub max_length: Option<u32>,
    /// Advisory, not enforced.
    pub required: bool,
}

impl From<&ColumnDef> for ColumnMapping {
    fn from(value: &ColumnDef) -> Self {
        Self {
            field: value.field,
            name: value.name.unwrap_or(value.field),
            column_type: value.column_type,
            primary_key: value.primary_key,
            auto_increment: value.auto_increment,
            nullable: value.nullable,
            max_length: value.max_length,
            required: value.required,
        }
    }
}
