#[cfg(test)]
mod tests {
    use indoc::indoc;
    use quarry::{
        AsValue, ColumnDef, ColumnType, Entity, EntityDef, Expr, MsSqlSqlWriter, MySqlSqlWriter,
        OrmError, PostgresSqlWriter, Query, Result, Row, RowLabeled, SqlWriter, SqliteSqlWriter,
        Value, col,
    };

    struct Event {
        id: i64,
        kind: String,
        payload: String,
    }

    impl Entity for Event {
        fn describe() -> EntityDef {
            EntityDef::new("events")
                .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
                .column(ColumnDef::new("kind", ColumnType::Varchar).nullable())
                .column(ColumnDef::new("payload", ColumnType::Json))
        }
        fn values(&self) -> Row {
            [
                self.id.as_value(),
                self.kind.clone().as_value(),
                self.payload.clone().as_value(),
            ]
            .into()
        }
        fn from_row(row: &RowLabeled) -> Result<Self> {
            Ok(Self {
                id: row.read("id")?,
                kind: row.read("kind")?,
                payload: row.read("payload")?,
            })
        }
        fn set_value(&mut self, _column: &str, _value: Value) -> Result<()> {
            Ok(())
        }
    }

    /// Only the WHERE clause of the generated statement.
    fn filter(writer: &dyn SqlWriter, expression: Expr) -> Result<Query> {
        let mut query = Event::query().where_(expression).build_sql(writer)?;
        let start = query.sql.find("WHERE ").expect("no where clause") + "WHERE ".len();
        query.sql = query.sql[start..query.sql.len() - 1].to_string();
        Ok(query)
    }

    fn sqlite(expression: Expr) -> String {
        filter(&SqliteSqlWriter::default(), expression)
            .expect("sqlite")
            .sql
    }

    fn postgres(expression: Expr) -> Query {
        filter(&PostgresSqlWriter::default(), expression).expect("postgres")
    }

    #[test]
    fn null_comparisons() {
        let query = postgres(col("kind").eq(Value::Varchar(None)));
        assert_eq!(query.sql, r#"t0."kind" IS NULL"#);
        assert!(query.params.is_empty(), "NULL is never bound");
        assert_eq!(
            postgres(col("kind").ne(Value::Null)).sql,
            r#"t0."kind" IS NOT NULL"#
        );
        assert_eq!(
            postgres(Expr::from(Value::Null).eq(col("kind"))).sql,
            r#"t0."kind" IS NULL"#
        );
        let error = filter(
            &PostgresSqlWriter::default(),
            col("id").lt(Value::Int64(None)),
        )
        .expect_err("ordering against NULL");
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::NotSupported(..))
        ));
    }

    #[test]
    fn precedence() {
        assert_eq!(
            postgres(
                col("id")
                    .eq(1)
                    .or(col("id").eq(2))
                    .and(col("kind").eq("click"))
            )
            .sql,
            r#"(t0."id" = $1 OR t0."id" = $2) AND t0."kind" = $3"#
        );
        assert_eq!(
            postgres(
                col("id")
                    .eq(1)
                    .and(col("kind").eq("click"))
                    .or(col("kind").is_null())
            )
            .sql,
            r#"(t0."id" = $1 AND t0."kind" = $2) OR t0."kind" IS NULL"#
        );
        assert_eq!(
            postgres(col("id").eq(1).or(col("id").eq(2)).not()).sql,
            r#"NOT (t0."id" = $1 OR t0."id" = $2)"#
        );
        assert_eq!(
            postgres(col("id").sub(col("id").sub(1)).gt(0)).sql,
            r#"t0."id" - (t0."id" - $1) > $2"#
        );
        assert_eq!(
            postgres(col("id").add(col("id").add(1)).mul(2).gt(0)).sql,
            r#"(t0."id" + t0."id" + $1) * $2 > $3"#
        );
    }

    #[test]
    fn case_functions() {
        assert_eq!(sqlite(col("kind").to_upper().eq("CLICK")), r#"UPPER(t0."kind") = ?"#);
        assert_eq!(sqlite(col("kind").to_upper().eq("click")), "0");
        assert_eq!(sqlite(col("kind").to_upper().ne("click")), "1");
        assert_eq!(
            filter(&MsSqlSqlWriter::default(), col("kind").to_lower().eq("Click"))
                .expect("mssql")
                .sql,
            "1 = 0"
        );
        assert_eq!(postgres(col("kind").to_lower().eq("Click")).sql, "false");
    }

    #[test]
    fn like_patterns_are_escaped() {
        let query = postgres(col("kind").contains("50%_off"));
        assert_eq!(query.sql, r#"t0."kind" LIKE $1 ESCAPE '\'"#);
        assert_eq!(query.params, [Value::Varchar(Some(r"%50\%\_off%".into()))]);
        let query = filter(&MySqlSqlWriter::default(), col("kind").starts_with("a_"))
            .expect("mysql");
        assert_eq!(query.sql, r"t0.`kind` LIKE ? ESCAPE '\\'");
        assert_eq!(query.params, [Value::Varchar(Some(r"a\_%".into()))]);
        let query = filter(&MsSqlSqlWriter::default(), col("kind").ends_with("[x]"))
            .expect("mssql");
        assert_eq!(query.sql, r"t0.[kind] LIKE @p1 ESCAPE '\'");
        assert_eq!(query.params, [Value::Varchar(Some(r"%\[x]".into()))]);
        let error = filter(
            &SqliteSqlWriter::default(),
            col("kind").contains(col("payload")),
        )
        .expect_err("the pattern must be a constant");
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::NotSupported(..))
        ));
    }

    #[test]
    fn membership() {
        let query = postgres(col("id").is_in([3i64, 5, 8]));
        assert_eq!(query.sql, r#"t0."id" IN ($1, $2, $3)"#);
        assert_eq!(
            query.params,
            [
                Value::Int64(Some(3)),
                Value::Int64(Some(5)),
                Value::Int64(Some(8))
            ]
        );
        assert_eq!(sqlite(col("id").is_in(Vec::<i64>::new())), "0");
        assert_eq!(postgres(col("id").is_in(Vec::<i64>::new())).sql, "false");
        assert_eq!(
            filter(&MsSqlSqlWriter::default(), col("id").is_in(Vec::<i64>::new()))
                .expect("mssql")
                .sql,
            "1 = 0"
        );
    }

    #[test]
    fn json_paths() {
        let city = || col("payload").json_get("address.city").eq("Oslo");
        assert_eq!(
            sqlite(city()),
            r#"json_extract(t0."payload", '$.address.city') = ?"#
        );
        assert_eq!(
            postgres(city()).sql,
            r#"(t0."payload" #>> '{address,city}') = $1"#
        );
        assert_eq!(
            filter(&MySqlSqlWriter::default(), city())
                .expect("mysql")
                .sql,
            "JSON_UNQUOTE(JSON_EXTRACT(t0.`payload`, '$.address.city')) = ?"
        );
        assert_eq!(
            filter(&MsSqlSqlWriter::default(), city())
                .expect("mssql")
                .sql,
            "JSON_VALUE(t0.[payload], '$.address.city') = @p1"
        );
        assert_eq!(
            sqlite(col("payload").json_get("tags.0").eq("new")),
            r#"json_extract(t0."payload", '$.tags[0]') = ?"#
        );
        let error = filter(
            &PostgresSqlWriter::default(),
            col("payload").json_get("it's").eq("x"),
        )
        .expect_err("quotes cannot be inlined");
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::NotSupported(..))
        ));
    }

    #[test]
    fn conditional() {
        let sql = Event::query()
            .select([quarry::when(col("kind").is_null(), "unknown", col("kind")).alias("kind")])
            .build_sql(&MySqlSqlWriter::default())
            .expect("mysql");
        assert_eq!(
            sql.sql,
            indoc! {"
                SELECT CASE WHEN t0.`kind` IS NULL THEN ? ELSE t0.`kind` END AS `kind`
                FROM `events` t0;
            "}
            .trim()
        );
        assert_eq!(sql.params, [Value::Varchar(Some("unknown".into()))]);
    }
}
