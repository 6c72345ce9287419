#[cfg(test)]
mod tests {
    use indoc::indoc;
    use quarry::{
        AsValue, ColumnDef, ColumnType, Entity, EntityDef, FrameBound, MsSqlSqlWriter,
        MySqlSqlWriter, OrmError, PostgresSqlWriter, Result, Row, RowLabeled, SqliteSqlWriter,
        Value, WindowSpec, col,
    };

    struct Order {
        id: Option<i64>,
        customer: String,
        total: f64,
        notes: Option<String>,
    }

    impl Entity for Order {
        fn describe() -> EntityDef {
            EntityDef::new("orders")
                .column(
                    ColumnDef::new("id", ColumnType::Int64)
                        .primary_key()
                        .auto_increment(),
                )
                .column(ColumnDef::new("customer", ColumnType::Varchar).max_length(60))
                .column(ColumnDef::new("total", ColumnType::Float64))
                .column(ColumnDef::new("notes", ColumnType::Varchar).nullable())
        }
        fn values(&self) -> Row {
            [
                self.id.as_value(),
                self.customer.clone().as_value(),
                self.total.as_value(),
                self.notes.clone().as_value(),
            ]
            .into()
        }
        fn from_row(row: &RowLabeled) -> Result<Self> {
            Ok(Self {
                id: row.read("id")?,
                customer: row.read("customer")?,
                total: row.read("total")?,
                notes: row.read("notes")?,
            })
        }
        fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
            if column == "id" {
                self.id = AsValue::try_from_value(value)?;
            }
            Ok(())
        }
    }

    #[test]
    fn filter_order_and_page() {
        let query = Order::query()
            .where_(col("customer").eq("ann").and(col("total").gt(10)))
            .order_by(col("total").desc())
            .skip(20)
            .take(10);
        let sql = query
            .build_sql(&PostgresSqlWriter::default())
            .expect("postgres");
        assert_eq!(
            sql.sql,
            indoc! {r#"
                SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                WHERE t0."customer" = $1 AND t0."total" > $2
                ORDER BY t0."total" DESC
                LIMIT 10
                OFFSET 20;
            "#}
            .trim()
        );
        assert_eq!(
            sql.params,
            [Value::Varchar(Some("ann".into())), Value::Int32(Some(10))]
        );
        let sql = query.build_sql(&MySqlSqlWriter::default()).expect("mysql");
        assert_eq!(
            sql.sql,
            indoc! {"
                SELECT t0.`id`, t0.`customer`, t0.`total`, t0.`notes`
                FROM `orders` t0
                WHERE t0.`customer` = ? AND t0.`total` > ?
                ORDER BY t0.`total` DESC
                LIMIT 10 OFFSET 20;
            "}
            .trim()
        );
    }

    #[test]
    fn paging_without_order_uses_the_key() {
        let skipped = Order::query().skip(5);
        assert_eq!(
            skipped
                .build_sql(&MsSqlSqlWriter::default())
                .expect("mssql")
                .sql,
            indoc! {"
                SELECT t0.[id], t0.[customer], t0.[total], t0.[notes]
                FROM [orders] t0
                ORDER BY t0.[id] ASC
                OFFSET 5 ROWS;
            "}
            .trim()
        );
        assert_eq!(
            skipped
                .build_sql(&SqliteSqlWriter::default())
                .expect("sqlite")
                .sql,
            indoc! {r#"
                SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                ORDER BY t0."id" ASC
                LIMIT -1 OFFSET 5;
            "#}
            .trim()
        );
        assert_eq!(
            Order::query()
                .take(3)
                .build_sql(&MsSqlSqlWriter::default())
                .expect("mssql")
                .sql,
            indoc! {"
                SELECT t0.[id], t0.[customer], t0.[total], t0.[notes]
                FROM [orders] t0
                ORDER BY t0.[id] ASC
                OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY;
            "}
            .trim()
        );
        assert_eq!(
            Order::query()
                .build_sql(&SqliteSqlWriter::default())
                .expect("sqlite")
                .sql,
            indoc! {r#"
                SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0;
            "#}
            .trim(),
            "Unpaged queries are left unordered"
        );
    }

    #[test]
    fn grouped_page_orders_by_first_column() {
        let sql = Order::query()
            .select([
                col("customer").alias("customer"),
                col("total").sum().alias("spent"),
            ])
            .group_by(col("customer"))
            .having(col("total").sum().gt(100))
            .take(5)
            .build_sql(&SqliteSqlWriter::default())
            .expect("sqlite");
        assert_eq!(
            sql.sql,
            indoc! {r#"
                SELECT t0."customer" AS "customer", SUM(t0."total") AS "spent"
                FROM "orders" t0
                GROUP BY t0."customer"
                HAVING SUM(t0."total") > ?
                ORDER BY 1 ASC
                LIMIT 5;
            "#}
            .trim()
        );
        assert_eq!(sql.params, [Value::Int32(Some(100))]);
    }

    #[test]
    fn aggregate_in_where_is_rejected() {
        let error = Order::query()
            .where_(col("total").sum().gt(5))
            .build_sql(&PostgresSqlWriter::default())
            .expect_err("aggregates belong in having");
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::NotSupported(..))
        ));
    }

    #[test]
    fn set_operations() {
        let query = Order::query()
            .where_(col("total").gt(100))
            .union(Order::query().where_(col("notes").is_null()))
            .order_by(col("id").asc())
            .take(10);
        assert_eq!(
            query
                .build_sql(&PostgresSqlWriter::default())
                .expect("postgres")
                .sql,
            indoc! {r#"
                (SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                WHERE t0."total" > $1)
                UNION
                (SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                WHERE t0."notes" IS NULL)
                ORDER BY "id" ASC
                LIMIT 10;
            "#}
            .trim()
        );
        assert_eq!(
            query
                .build_sql(&SqliteSqlWriter::default())
                .expect("sqlite")
                .sql,
            indoc! {r#"
                SELECT * FROM (SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                WHERE t0."total" > ?)
                UNION
                SELECT * FROM (SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                WHERE t0."notes" IS NULL)
                ORDER BY "id" ASC
                LIMIT 10;
            "#}
            .trim()
        );
        assert_eq!(
            Order::query()
                .except(Order::query().where_(col("total").lt(1)))
                .build_sql(&MySqlSqlWriter::default())
                .expect("mysql")
                .sql,
            indoc! {"
                (SELECT t0.`id`, t0.`customer`, t0.`total`, t0.`notes`
                FROM `orders` t0)
                EXCEPT
                (SELECT t0.`id`, t0.`customer`, t0.`total`, t0.`notes`
                FROM `orders` t0
                WHERE t0.`total` < ?);
            "}
            .trim()
        );
    }

    #[test]
    fn common_table_expressions() {
        let query = Order::query()
            .with_recursive_cte(
                "chain",
                &["id"],
                "SELECT id FROM orders WHERE id = ? UNION ALL SELECT o.id FROM orders o JOIN chain c ON o.id = c.id + 1",
                [Value::Int64(Some(1))],
            )
            .join_raw("INNER JOIN chain c ON c.id = t0.id", [])
            .where_(col("total").gt(5));
        let sql = query
            .build_sql(&PostgresSqlWriter::default())
            .expect("postgres");
        assert_eq!(
            sql.sql,
            indoc! {r#"
                WITH RECURSIVE "chain" ("id") AS (
                SELECT id FROM orders WHERE id = $1 UNION ALL SELECT o.id FROM orders o JOIN chain c ON o.id = c.id + 1
                )
                SELECT t0."id", t0."customer", t0."total", t0."notes"
                FROM "orders" t0
                INNER JOIN chain c ON c.id = t0.id
                WHERE t0."total" > $2;
            "#}
            .trim()
        );
        assert_eq!(
            sql.params,
            [Value::Int64(Some(1)), Value::Int32(Some(5))]
        );
        assert!(
            query
                .build_sql(&MsSqlSqlWriter::default())
                .expect("mssql")
                .sql
                .starts_with("WITH [chain] ([id]) AS (\nSELECT id FROM orders WHERE id = @p1 "),
            "The recursive keyword is implicit on mssql"
        );
    }

    #[test]
    fn raw_fragments_keep_quoted_markers() {
        let sql = Order::query()
            .select_raw("coalesce(notes, '?')", [], Some("note"))
            .where_raw("notes <> '?' AND total > ?", [Value::Float64(Some(1.5))])
            .build_sql(&PostgresSqlWriter::default())
            .expect("postgres");
        assert_eq!(
            sql.sql,
            indoc! {r#"
                SELECT coalesce(notes, '?') AS "note"
                FROM "orders" t0
                WHERE notes <> '?' AND total > $1;
            "#}
            .trim()
        );
        let error = Order::query()
            .where_raw("total > ?", [])
            .build_sql(&PostgresSqlWriter::default())
            .expect_err("missing parameter");
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::InvalidOperation(..))
        ));
    }

    #[test]
    fn window_functions() {
        let sql = Order::query()
            .select([col("customer").alias("customer")])
            .window(
                WindowSpec::sum(col("total"))
                    .partition_by(col("customer"))
                    .order_by(col("id").asc())
                    .rows(FrameBound::UnboundedPreceding, FrameBound::CurrentRow)
                    .alias("running"),
            )
            .window(WindowSpec::row_number().order_by(col("total").desc()).alias("position"))
            .order_by(col("running").desc())
            .build_sql(&PostgresSqlWriter::default())
            .expect("postgres");
        assert_eq!(
            sql.sql,
            indoc! {r#"
                SELECT t0."customer" AS "customer", SUM(t0."total") OVER (PARTITION BY t0."customer" ORDER BY t0."id" ASC ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS "running", ROW_NUMBER() OVER (ORDER BY t0."total" DESC) AS "position"
                FROM "orders" t0
                ORDER BY "running" DESC;
            "#}
            .trim()
        );
    }

    #[test]
    fn unknown_members_are_reported() {
        for expression in [col("discount").gt(1), col("customer.name").eq("ann")] {
            let error = Order::query()
                .where_(expression)
                .build_sql(&SqliteSqlWriter::default())
                .expect_err("unknown member");
            assert!(matches!(
                OrmError::kind_of(&error),
                Some(OrmError::Translation(..))
            ));
        }
    }
}
