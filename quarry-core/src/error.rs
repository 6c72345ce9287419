use thiserror::Error;

/// Failure kinds raised by the engine itself.
///
/// They travel as [`anyhow::Error`] like every other error in the crate; driver errors are
/// never converted into this type. Use [`OrmError::kind_of`] to recover the kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrmError {
    #[error("Invalid mapping for entity `{entity}`: {message}")]
    Configuration { entity: String, message: String },
    #[error("Cannot translate expression: {0}")]
    Translation(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Optimistic concurrency conflict on `{table}` (key {key}): {message}")]
    OptimisticConcurrency {
        table: String,
        key: String,
        message: String,
    },
    #[error("Row not found in `{table}` (key {key})")]
    NotFound { table: String, key: String },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl OrmError {
    pub fn kind_of(error: &anyhow::Error) -> Option<&OrmError> {
        error.chain().find_map(|e| e.downcast_ref::<OrmError>())
    }

    pub fn is_concurrency_conflict(error: &anyhow::Error) -> bool {
        matches!(
            Self::kind_of(error),
            Some(OrmError::OptimisticConcurrency { .. })
        )
    }

    pub(crate) fn concurrency(table: &str, key: &crate::Value, message: impl Into<String>) -> Self {
        OrmError::OptimisticConcurrency {
            table: table.into(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(table: &str, key: &crate::Value) -> Self {
        OrmError::NotFound {
            table: table.into(),
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrmError;
    use crate::Value;
    use anyhow::Context;

    #[test]
    fn kind_survives_context() {
        let error = anyhow::Error::new(OrmError::concurrency(
            "orders",
            &Value::Int64(Some(4)),
            "version 3 is stale",
        ))
        .context("While updating the order");
        assert!(OrmError::is_concurrency_conflict(&error));
        assert!(format!("{error:#}").contains("concurrency conflict"));
        let plain: anyhow::Result<()> = Err(anyhow::anyhow!("socket closed"));
        let plain = plain.context("query").unwrap_err();
        assert_eq!(OrmError::kind_of(&plain), None);
    }
}
