use crate::{error_kind, recreate_table};
use quarry::{
    AsValue, BatchInsertConfiguration, ColumnDef, ColumnType, Entity, EntityDef, Executor,
    FromRow, OrmError, Result, Row, RowLabeled, Value, WindowSpec, col, count_all, when,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Employee {
    id: i64,
    name: String,
    manager_id: Option<i64>,
    department: String,
    salary: i64,
}

impl Employee {
    fn new(id: i64, name: &str, manager_id: Option<i64>, department: &str, salary: i64) -> Self {
        Self {
            id,
            name: name.into(),
            manager_id,
            department: department.into(),
            salary,
        }
    }
}

impl Entity for Employee {
    fn describe() -> EntityDef {
        EntityDef::new("employees")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("name", ColumnType::Varchar))
            .column(ColumnDef::new("manager_id", ColumnType::Int64).nullable())
            .column(ColumnDef::new("department", ColumnType::Varchar))
            .column(ColumnDef::new("salary", ColumnType::Int64))
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.name.clone().as_value(),
            self.manager_id.as_value(),
            self.department.clone().as_value(),
            self.salary.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            name: row.read("name")?,
            manager_id: row.read("manager_id")?,
            department: row.read("department")?,
            salary: row.read("salary")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "name" => self.name = AsValue::try_from_value(value)?,
            "manager_id" => self.manager_id = AsValue::try_from_value(value)?,
            "department" => self.department = AsValue::try_from_value(value)?,
            "salary" => self.salary = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct DepartmentTotal {
    department: String,
    headcount: i64,
    total: i64,
}

impl FromRow for DepartmentTotal {
    fn from_labeled(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            department: row.read("department")?,
            headcount: row.read("headcount")?,
            total: row.read("total")?,
        })
    }
}

fn ids(employees: &[Employee]) -> Vec<i64> {
    employees.iter().map(|v| v.id).collect()
}

pub async fn queries<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        executor,
        "employees",
        &[
            "id BIGINT PRIMARY KEY",
            "name VARCHAR(80) NOT NULL",
            "manager_id BIGINT",
            "department VARCHAR(40) NOT NULL",
            "salary BIGINT NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the employees table");
    let mut employees = vec![
        Employee::new(1, "Margaret", None, "board", 9000),
        Employee::new(2, "Dennis", Some(1), "engineering", 7000),
        Employee::new(3, "Ken", Some(2), "engineering", 6500),
        Employee::new(4, "Barbara", Some(2), "engineering", 6500),
        Employee::new(5, "Frances", Some(1), "sales", 5000),
        Employee::new(6, "Jean", Some(5), "sales", 4200),
        Employee::new(7, "Edsger", Some(3), "engineering", 6000),
    ];
    Employee::create_many(executor, &mut employees, BatchInsertConfiguration::DEFAULT)
        .await
        .expect("Failed to insert the employees");

    // Recursive common table expression
    let reports = Employee::query()
        .with_recursive_cte(
            "chain",
            &["id"],
            "SELECT id FROM employees WHERE manager_id = ? \
             UNION ALL SELECT e.id FROM employees e INNER JOIN chain c ON e.manager_id = c.id",
            [Value::Int64(Some(2))],
        )
        .join_raw("INNER JOIN chain c ON c.id = t0.\"id\"", [])
        .order_by(col("id").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to run the recursive query");
    assert_eq!(ids(&reports), [3, 4, 7]);

    // Non recursive common table expression from another query
    let seniors = Employee::query()
        .with_cte_query(
            "seniors",
            &["id"],
            Employee::query()
                .select([col("id").alias("id")])
                .where_(col("salary").ge(6500)),
        )
        .join_raw("INNER JOIN seniors s ON s.id = t0.\"id\"", [])
        .order_by(col("id").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to run the common table expression");
    assert_eq!(ids(&seniors), [1, 2, 3, 4]);

    // Window functions
    #[cfg(not(feature = "disable-window-functions"))]
    {
        let ranked = Employee::query()
            .select([col("name").alias("name")])
            .window(
                WindowSpec::rank()
                    .partition_by(col("department"))
                    .order_by(col("salary").desc())
                    .alias("position"),
            )
            .window(
                WindowSpec::sum(col("salary"))
                    .partition_by(col("department"))
                    .alias("department_total"),
            )
            .where_(col("department").eq("engineering"))
            .order_by(col("salary").desc())
            .then_by(col("name").asc())
            .fetch_rows(executor)
            .await
            .expect("Failed to rank the engineers");
        let ranked = ranked
            .iter()
            .map(|row| {
                (
                    row.read::<String>("name").expect("name"),
                    row.read::<i64>("position").expect("position"),
                    row.read::<i64>("department_total").expect("department_total"),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            ranked,
            [
                ("Dennis".to_string(), 1, 26000),
                ("Barbara".to_string(), 2, 26000),
                ("Ken".to_string(), 2, 26000),
                ("Edsger".to_string(), 4, 26000),
            ]
        );
    }

    // Set operations
    #[cfg(not(feature = "disable-set-operations"))]
    {
        let sales = || Employee::query().where_(col("department").eq("sales"));
        let rich = || Employee::query().where_(col("salary").gt(6000));
        let union = sales()
            .union(rich())
            .order_by(col("id").asc())
            .fetch_all(executor)
            .await
            .expect("Failed to run the union");
        assert_eq!(ids(&union), [1, 2, 3, 4, 5, 6]);
        let page = sales()
            .union(rich())
            .order_by(col("id").desc())
            .skip(1)
            .take(2)
            .fetch_all(executor)
            .await
            .expect("Failed to page the union");
        assert_eq!(ids(&page), [5, 4]);
        let both = Employee::query()
            .where_(col("department").eq("engineering"))
            .intersect(rich())
            .order_by(col("id").asc())
            .fetch_all(executor)
            .await
            .expect("Failed to run the intersection");
        assert_eq!(ids(&both), [2, 3, 4]);
        let rest = Employee::query()
            .except(rich())
            .order_by(col("id").asc())
            .fetch_all(executor)
            .await
            .expect("Failed to run the difference");
        assert_eq!(ids(&rest), [5, 6, 7]);
        let error = Employee::query()
            .include("manager")
            .union(rich())
            .fetch_all(executor)
            .await
            .expect_err("Includes cannot be combined with set operations");
        assert!(matches!(error_kind(&error), OrmError::NotSupported(..)));
    }

    // Grouping
    let totals = Employee::query()
        .select([
            col("department").alias("department"),
            count_all().alias("headcount"),
            col("salary").sum().alias("total"),
        ])
        .group_by(col("department"))
        .having(count_all().gt(1))
        .order_by(col("department").asc())
        .fetch_as::<DepartmentTotal, _>(executor)
        .await
        .expect("Failed to group the employees");
    assert_eq!(
        totals,
        [
            DepartmentTotal {
                department: "engineering".into(),
                headcount: 4,
                total: 26000,
            },
            DepartmentTotal {
                department: "sales".into(),
                headcount: 2,
                total: 9200,
            },
        ]
    );

    // Raw fragments and case expressions
    let rows = Employee::query()
        .select([
            col("name").alias("name"),
            when(col("salary").ge(6500), "senior", "junior").alias("band"),
        ])
        .select_raw("upper(t0.\"name\")", [], Some("shout"))
        .where_raw("length(t0.\"name\") > ?", [Value::Int64(Some(5))])
        .where_(col("name").ends_with("s"))
        .order_by(col("name").asc())
        .fetch_rows(executor)
        .await
        .expect("Failed to run the raw query");
    let rows = rows
        .iter()
        .map(|row| {
            (
                row.read::<String>("band").expect("band"),
                row.read::<String>("shout").expect("shout"),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        [
            ("senior".to_string(), "DENNIS".to_string()),
            ("junior".to_string(), "FRANCES".to_string()),
        ]
    );

    // Raw parameters are checked
    let error = Employee::query()
        .where_raw("salary > ? AND salary < ?", [Value::Int64(Some(1))])
        .fetch_all(executor)
        .await
        .expect_err("Missing raw parameters must be reported");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));

    // Default ordering makes pages stable
    let mut seen = Vec::new();
    for page in 0..4 {
        let employees = Employee::query()
            .skip(page * 2)
            .take(2)
            .fetch_all(executor)
            .await
            .expect("Failed to load a page");
        seen.extend(ids(&employees));
    }
    assert_eq!(seen, [1, 2, 3, 4, 5, 6, 7]);
}
