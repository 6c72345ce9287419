#[cfg(test)]
mod tests {
    use indoc::indoc;
    use quarry::{
        AsValue, ColumnDef, ColumnType, Entity, EntityDef, EntityMetadata, Fragment,
        GenericSqlWriter, MsSqlSqlWriter, MySqlSqlWriter, PostgresSqlWriter, Result, Row,
        RowLabeled, SqlWriter, SqliteSqlWriter, Value, col, writer::Context,
    };

    #[derive(Debug, Clone)]
    struct Invoice {
        id: i64,
        client: String,
        amount: i64,
    }

    impl Entity for Invoice {
        fn describe() -> EntityDef {
            EntityDef::new("invoices")
                .column(ColumnDef::new("id", ColumnType::Int64).primary_key().auto_increment())
                .column(ColumnDef::new("client", ColumnType::Varchar))
                .column(ColumnDef::new("amount", ColumnType::Int64))
        }
        fn values(&self) -> Row {
            [
                self.id.as_value(),
                self.client.clone().as_value(),
                self.amount.as_value(),
            ]
            .into()
        }
        fn from_row(row: &RowLabeled) -> Result<Self> {
            Ok(Self {
                id: row.read("id")?,
                client: row.read("client")?,
                amount: row.read("amount")?,
            })
        }
        fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
            if column == "id" {
                self.id = AsValue::try_from_value(value)?;
            }
            Ok(())
        }
    }

    fn metadata() -> &'static EntityMetadata {
        Invoice::metadata().expect("valid mapping")
    }

    fn rows() -> Vec<Row> {
        [(1, "acme", 120), (2, "globex", 75)]
            .into_iter()
            .map(|(id, client, amount)| {
                Invoice {
                    id,
                    client: client.into(),
                    amount,
                }
                .values()
            })
            .collect()
    }

    fn insert(
        writer: &dyn SqlWriter,
        columns: &[usize],
        rows: &[Row],
        returning: bool,
    ) -> (String, Vec<Value>) {
        let mut context = Context::new(Fragment::None, false);
        let mut out = String::new();
        writer.write_insert(&mut context, &mut out, metadata(), columns, rows, returning);
        (out, context.params)
    }

    fn upsert(writer: &dyn SqlWriter, conflict_columns: &[usize]) -> String {
        let mut context = Context::new(Fragment::None, false);
        let mut out = String::new();
        let rows = rows();
        writer.write_upsert(
            &mut context,
            &mut out,
            metadata(),
            &[0, 1, 2],
            conflict_columns,
            &rows[..1],
        );
        assert_eq!(context.params.len(), 3);
        out
    }

    #[test]
    fn insert_returning_the_key() {
        let rows = rows();
        let rows = &rows[..1];
        let (sql, params) = insert(&PostgresSqlWriter::default(), &[1, 2], rows, true);
        assert_eq!(
            sql,
            indoc! {r#"
                INSERT INTO "invoices" ("client", "amount") VALUES
                ($1, $2)
                RETURNING "id";
            "#}
            .trim()
        );
        assert_eq!(
            params,
            [Value::Varchar(Some("acme".into())), Value::Int64(Some(120))]
        );
        let (sql, _) = insert(&MsSqlSqlWriter::default(), &[1, 2], rows, true);
        assert_eq!(
            sql,
            indoc! {"
                INSERT INTO [invoices] ([client], [amount]) OUTPUT INSERTED.[id] VALUES
                (@p1, @p2);
            "}
            .trim()
        );
        let (sql, _) = insert(&MySqlSqlWriter::default(), &[1, 2], rows, true);
        assert_eq!(
            sql,
            indoc! {"
                INSERT INTO `invoices` (`client`, `amount`) VALUES
                (?, ?);
            "}
            .trim(),
            "The generated key is read from the last insert id"
        );
    }

    #[test]
    fn multi_row_insert() {
        let (sql, params) = insert(&SqliteSqlWriter::default(), &[0, 1, 2], &rows(), false);
        assert_eq!(
            sql,
            indoc! {r#"
                INSERT INTO "invoices" ("id", "client", "amount") VALUES
                (?, ?, ?),
                (?, ?, ?);
            "#}
            .trim()
        );
        assert_eq!(params.len(), 6);
        assert_eq!(params[3], Value::Int64(Some(2)));
    }

    #[test]
    fn upsert_per_dialect() {
        assert_eq!(
            upsert(&SqliteSqlWriter::default(), &[0]),
            indoc! {r#"
                INSERT INTO "invoices" ("id", "client", "amount") VALUES
                (?, ?, ?)
                ON CONFLICT ("id") DO UPDATE SET
                "client" = EXCLUDED."client",
                "amount" = EXCLUDED."amount";
            "#}
            .trim()
        );
        assert_eq!(
            upsert(&MySqlSqlWriter::default(), &[0]),
            indoc! {"
                INSERT INTO `invoices` (`id`, `client`, `amount`) VALUES
                (?, ?, ?)
                ON DUPLICATE KEY UPDATE
                `client` = VALUES(`client`),
                `amount` = VALUES(`amount`);
            "}
            .trim()
        );
        assert_eq!(
            upsert(&MsSqlSqlWriter::default(), &[0]),
            indoc! {"
                MERGE INTO [invoices] WITH (HOLDLOCK) AS target
                USING (VALUES
                (@p1, @p2, @p3)) AS source ([id], [client], [amount])
                ON target.[id] = source.[id]
                WHEN MATCHED THEN UPDATE SET
                target.[client] = source.[client],
                target.[amount] = source.[amount]
                WHEN NOT MATCHED THEN INSERT ([id], [client], [amount]) VALUES (source.[id], source.[client], source.[amount]);
            "}
            .trim()
        );
    }

    #[test]
    fn upsert_on_a_unique_key() {
        assert_eq!(
            upsert(&PostgresSqlWriter::default(), &[1]),
            indoc! {r#"
                INSERT INTO "invoices" ("id", "client", "amount") VALUES
                ($1, $2, $3)
                ON CONFLICT ("client") DO UPDATE SET
                "amount" = EXCLUDED."amount";
            "#}
            .trim()
        );
        assert_eq!(
            upsert(&SqliteSqlWriter::default(), &[1, 2]),
            indoc! {r#"
                INSERT INTO "invoices" ("id", "client", "amount") VALUES
                (?, ?, ?)
                ON CONFLICT ("client", "amount") DO NOTHING;
            "#}
            .trim()
        );
        assert_eq!(
            upsert(&MySqlSqlWriter::default(), &[1]),
            indoc! {"
                INSERT INTO `invoices` (`id`, `client`, `amount`) VALUES
                (?, ?, ?)
                ON DUPLICATE KEY UPDATE
                `amount` = VALUES(`amount`);
            "}
            .trim()
        );
        assert_eq!(
            upsert(&MsSqlSqlWriter::default(), &[1]),
            indoc! {"
                MERGE INTO [invoices] WITH (HOLDLOCK) AS target
                USING (VALUES
                (@p1, @p2, @p3)) AS source ([id], [client], [amount])
                ON target.[client] = source.[client]
                WHEN MATCHED THEN UPDATE SET
                target.[amount] = source.[amount]
                WHEN NOT MATCHED THEN INSERT ([id], [client], [amount]) VALUES (source.[id], source.[client], source.[amount]);
            "}
            .trim()
        );
    }

    #[test]
    fn upsert_of_the_key_alone() {
        let mut context = Context::new(Fragment::None, false);
        let mut out = String::new();
        let rows = [Row::from([Value::Int64(Some(9))])];
        PostgresSqlWriter::default().write_upsert(
            &mut context,
            &mut out,
            metadata(),
            &[0],
            &[0],
            &rows,
        );
        assert_eq!(
            out,
            indoc! {r#"
                INSERT INTO "invoices" ("id") VALUES
                ($1)
                ON CONFLICT ("id") DO NOTHING;
            "#}
            .trim()
        );
    }

    #[test]
    fn update_and_delete() {
        let condition = col("id").eq(7i64).and(col("amount").eq(120i64));
        let assignments = [
            (1, Value::Varchar(Some("initech".into()))),
            (2, Value::Int64(Some(130))),
        ];
        let mut context = Context::new(Fragment::None, false);
        let mut out = String::new();
        PostgresSqlWriter::default()
            .write_update(&mut context, &mut out, metadata(), &assignments, &condition)
            .expect("update");
        assert_eq!(
            out,
            indoc! {r#"
                UPDATE "invoices" SET
                "client" = $1,
                "amount" = $2
                WHERE "id" = $3 AND "amount" = $4;
            "#}
            .trim()
        );
        assert_eq!(context.params.len(), 4);

        let mut context = Context::new(Fragment::None, false);
        let mut out = String::new();
        MsSqlSqlWriter::default()
            .write_delete(&mut context, &mut out, metadata(), &col("id").eq(7i64))
            .expect("delete");
        assert_eq!(
            out,
            indoc! {"
                DELETE FROM [invoices]
                WHERE [id] = @p1;
            "}
            .trim()
        );
    }

    #[test]
    fn transaction_statements() {
        let writers: [(&dyn SqlWriter, [&str; 6]); 4] = [
            (
                &SqliteSqlWriter::default(),
                [
                    "BEGIN;",
                    "COMMIT;",
                    "ROLLBACK;",
                    "SAVEPOINT sp_1;",
                    "RELEASE SAVEPOINT sp_1;",
                    "ROLLBACK TO SAVEPOINT sp_1;",
                ],
            ),
            (
                &PostgresSqlWriter::default(),
                [
                    "BEGIN;",
                    "COMMIT;",
                    "ROLLBACK;",
                    "SAVEPOINT sp_1;",
                    "RELEASE SAVEPOINT sp_1;",
                    "ROLLBACK TO SAVEPOINT sp_1;",
                ],
            ),
            (
                &MySqlSqlWriter::default(),
                [
                    "START TRANSACTION;",
                    "COMMIT;",
                    "ROLLBACK;",
                    "SAVEPOINT sp_1;",
                    "RELEASE SAVEPOINT sp_1;",
                    "ROLLBACK TO SAVEPOINT sp_1;",
                ],
            ),
            (
                &MsSqlSqlWriter::default(),
                [
                    "BEGIN TRANSACTION;",
                    "COMMIT TRANSACTION;",
                    "ROLLBACK TRANSACTION;",
                    "SAVE TRANSACTION sp_1;",
                    "",
                    "ROLLBACK TRANSACTION sp_1;",
                ],
            ),
        ];
        for (writer, expected) in writers {
            let mut out = [const { String::new() }; 6];
            writer.write_transaction_begin(&mut out[0]);
            writer.write_transaction_commit(&mut out[1]);
            writer.write_transaction_rollback(&mut out[2]);
            writer.write_savepoint(&mut out[3], "sp_1");
            writer.write_release_savepoint(&mut out[4], "sp_1");
            writer.write_rollback_to_savepoint(&mut out[5], "sp_1");
            assert_eq!(out, expected, "{}", writer.dialect_name());
        }
    }

    #[test]
    fn identifiers_and_schemas() {
        let metadata = EntityMetadata::build(
            "Archived",
            EntityDef::new("old \"orders\"")
                .schema("archive")
                .column(ColumnDef::new("id", ColumnType::Int64).primary_key()),
        )
        .expect("valid mapping");
        let mut context = Context::new(Fragment::None, true);
        let mut out = String::new();
        GenericSqlWriter::new().write_table_ref(&mut context, &mut out, &metadata, Some("t0"));
        assert_eq!(out, r#""archive"."old ""orders""" t0"#);
        out.clear();
        MySqlSqlWriter::default().write_identifier_quoted(&mut context, &mut out, "a`b");
        assert_eq!(out, "`a``b`");
        out.clear();
        MsSqlSqlWriter::default().write_identifier_quoted(&mut context, &mut out, "a]b");
        assert_eq!(out, "[a]]b]");
    }
}
