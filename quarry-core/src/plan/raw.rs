use crate::{OrmError, Result, SqlWriter, Value, writer::Context};

/// Caller supplied SQL fragment with positional `?` markers.
///
/// Markers inside quoted text (`'...'`, `"..."`, `` `...` ``, `[...]`) are left alone, every other
/// `?` is replaced by the dialect placeholder of the next parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub params: Vec<Value>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            sql: sql.into(),
            params: params.into_iter().collect(),
        }
    }

    pub fn write(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        let mut params = self.params.iter();
        let mut closing = None;
        let mut markers = 0;
        for c in self.sql.chars() {
            match closing {
                Some(end) => {
                    if c == end {
                        closing = None;
                    }
                    out.push(c);
                }
                None => match c {
                    '\'' | '"' | '`' => {
                        closing = Some(c);
                        out.push(c);
                    }
                    '[' => {
                        closing = Some(']');
                        out.push(c);
                    }
                    '?' => {
                        markers += 1;
                        let Some(value) = params.next() else {
                            return Err(self.mismatch(markers).into());
                        };
                        writer.write_parameter(context, out, value.clone());
                    }
                    _ => out.push(c),
                },
            }
        }
        if markers != self.params.len() {
            return Err(self.mismatch(markers).into());
        }
        Ok(())
    }

    fn mismatch(&self, markers: usize) -> OrmError {
        OrmError::InvalidOperation(format!(
            "raw fragment `{}` has {}{markers} `?` markers but {} parameters were supplied",
            self.sql,
            if markers > self.params.len() { "at least " } else { "" },
            self.params.len()
        ))
    }
}

impl From<&str> for RawSql {
    fn from(value: &str) -> Self {
        RawSql::new(value, [])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MsSqlSqlWriter, PostgresSqlWriter, SqliteSqlWriter};

    #[test]
    fn placeholders_follow_the_dialect() {
        let raw = RawSql::new(
            "age > ? AND name <> ?",
            [Value::Int32(Some(30)), Value::Varchar(Some("x".into()))],
        );
        let mut out = String::new();
        let mut context = Context::default();
        context.params.push(Value::Null);
        raw.write(&PostgresSqlWriter::default(), &mut context, &mut out)
            .unwrap();
        assert_eq!(out, "age > $2 AND name <> $3");
        assert_eq!(context.params.len(), 3);

        let mut out = String::new();
        raw.write(&MsSqlSqlWriter::default(), &mut Context::default(), &mut out)
            .unwrap();
        assert_eq!(out, "age > @p1 AND name <> @p2");
    }

    #[test]
    fn quoted_markers_are_kept() {
        let raw = RawSql::new(
            "note = 'why?' AND \"odd?\" = ? AND [x?] = 1",
            [Value::Int64(Some(1))],
        );
        let mut out = String::new();
        raw.write(&PostgresSqlWriter::default(), &mut Context::default(), &mut out)
            .unwrap();
        assert_eq!(out, "note = 'why?' AND \"odd?\" = $1 AND [x?] = 1");
    }

    #[test]
    fn marker_count_must_match() {
        let missing = RawSql::new("a = ? AND b = ?", [Value::Int32(Some(1))]);
        let error = missing
            .write(&SqliteSqlWriter::default(), &mut Context::default(), &mut String::new())
            .unwrap_err();
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::InvalidOperation(..))
        ));
        let extra = RawSql::new("a = 1", [Value::Int32(Some(1))]);
        assert!(
            extra
                .write(&SqliteSqlWriter::default(), &mut Context::default(), &mut String::new())
                .is_err()
        );
    }
}
