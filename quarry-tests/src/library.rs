use crate::{error_kind, recreate_table};
use quarry::{
    AsValue, BatchInsertConfiguration, ColumnDef, ColumnType, Entity, EntityDef, EntityNode,
    Executor, OrmError, Result, Row, RowLabeled, Value, col,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub books: Vec<Book>,
}

impl Entity for Author {
    fn describe() -> EntityDef {
        EntityDef::new("authors")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("name", ColumnType::Varchar).max_length(80))
            .has_many::<Book>("books", "author_id")
    }
    fn values(&self) -> Row {
        [self.id.as_value(), self.name.clone().as_value()].into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            name: row.read("name")?,
            books: Vec::new(),
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "name" => self.name = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
    fn attach(&mut self, navigation: &str, related: Vec<EntityNode>) -> Result<()> {
        match navigation {
            "books" => {
                self.books = related
                    .into_iter()
                    .map(EntityNode::into_entity)
                    .collect::<Result<_>>()?;
                self.books.sort_by_key(|v| v.id);
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub year: i32,
    pub author: Option<Box<Author>>,
}

impl Book {
    fn new(id: i64, author_id: i64, title: &str, year: i32) -> Self {
        Self {
            id,
            author_id,
            title: title.into(),
            year,
            author: None,
        }
    }
}

impl Entity for Book {
    fn describe() -> EntityDef {
        EntityDef::new("books")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("author_id", ColumnType::Int64))
            .column(ColumnDef::new("title", ColumnType::Varchar).max_length(120))
            .column(ColumnDef::new("year", ColumnType::Int32))
            .belongs_to::<Author>("author", "author_id")
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.author_id.as_value(),
            self.title.clone().as_value(),
            self.year.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            author_id: row.read("author_id")?,
            title: row.read("title")?,
            year: row.read("year")?,
            author: None,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "author_id" => self.author_id = AsValue::try_from_value(value)?,
            "title" => self.title = AsValue::try_from_value(value)?,
            "year" => self.year = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
    fn attach(&mut self, navigation: &str, related: Vec<EntityNode>) -> Result<()> {
        match navigation {
            "author" => {
                self.author = related
                    .into_iter()
                    .next()
                    .map(|v| v.into_entity().map(Box::new))
                    .transpose()?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn names(authors: &[Author]) -> Vec<&str> {
    authors.iter().map(|v| v.name.as_str()).collect()
}

fn shelf(authors: &[Author]) -> Vec<usize> {
    authors.iter().map(|v| v.books.len()).collect()
}

pub async fn library<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        executor,
        "authors",
        &["id BIGINT PRIMARY KEY", "name VARCHAR(80) NOT NULL"],
    )
    .await
    .expect("Failed to create the authors table");
    recreate_table(
        executor,
        "books",
        &[
            "id BIGINT PRIMARY KEY",
            "author_id BIGINT NOT NULL",
            "title VARCHAR(120) NOT NULL",
            "year INTEGER NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the books table");
    let mut authors = ["Ada", "Brian", "Carla", "Dmitri"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| Author {
            id: i as i64 + 1,
            name: name.into(),
            books: Vec::new(),
        })
        .collect::<Vec<_>>();
    Author::create_many(executor, &mut authors, BatchInsertConfiguration::DEFAULT)
        .await
        .expect("Failed to insert the authors");
    let mut books = vec![
        Book::new(1, 1, "Notes on the Analytical Engine", 1843),
        Book::new(2, 1, "Sketch of the Analytical Engine", 1842),
        Book::new(3, 2, "The C Programming Language", 1978),
        Book::new(4, 4, "Roadside Picnic", 1972),
        Book::new(5, 4, "Metro 2033", 2005),
        Book::new(6, 4, "Metro 2034", 2009),
    ];
    let inserted = Book::create_many(executor, &mut books, BatchInsertConfiguration::SMALL_BATCH)
        .await
        .expect("Failed to insert the books");
    assert_eq!(inserted, 6);

    // Collection include: one entity per parent, children grouped under it
    let loaded = Author::query()
        .include("books")
        .order_by(col("id").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to load the authors with their books");
    assert_eq!(names(&loaded), ["Ada", "Brian", "Carla", "Dmitri"]);
    assert_eq!(shelf(&loaded), [2, 1, 0, 3]);
    assert_eq!(
        loaded[3].books.iter().map(|v| v.id).collect::<Vec<_>>(),
        [4, 5, 6]
    );
    assert_eq!(
        Author::query()
            .include("books")
            .count(executor)
            .await
            .expect("Failed to count the authors"),
        4,
        "Counting with an include must count the parents once"
    );

    // Pages are made of parents, not of joined rows
    let mut seen = Vec::new();
    for page in 0..3 {
        let loaded = Author::query()
            .include("books")
            .order_by(col("id").asc())
            .skip(page * 2)
            .take(2)
            .fetch_all(executor)
            .await
            .expect("Failed to load a page of authors");
        for author in &loaded {
            assert!(!seen.contains(&author.id), "Pages must be disjoint");
            seen.push(author.id);
        }
        match page {
            0 => assert_eq!(shelf(&loaded), [2, 1]),
            1 => assert_eq!(shelf(&loaded), [0, 3]),
            _ => assert!(loaded.is_empty()),
        }
    }
    assert_eq!(seen, [1, 2, 3, 4]);

    // First keeps every child of the entity
    let dmitri = Author::query()
        .include("books")
        .where_(col("name").eq("Dmitri"))
        .first(executor)
        .await
        .expect("Failed to load Dmitri")
        .expect("Dmitri is missing");
    assert_eq!(dmitri.books.len(), 3);

    // Reference include
    let loaded = Book::query()
        .include("author")
        .where_(col("year").lt(1900))
        .order_by(col("year").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to load the books with their author");
    assert_eq!(loaded.len(), 2);
    for book in &loaded {
        let author = book.author.as_ref().expect("The author was not included");
        assert_eq!(author.name, "Ada");
    }
    assert_eq!(loaded[0].title, "Sketch of the Analytical Engine");

    // Filters through an included reference count like they fetch
    let by_dmitri = || {
        Book::query()
            .include("author")
            .where_(col("author.name").eq("Dmitri"))
    };
    assert_eq!(
        by_dmitri()
            .fetch_all(executor)
            .await
            .expect("Failed to load the books of Dmitri")
            .len(),
        3
    );
    assert_eq!(
        by_dmitri()
            .count(executor)
            .await
            .expect("Failed to count the books of Dmitri"),
        3
    );

    // Two levels
    let loaded = Book::query()
        .include("author.books")
        .where_(col("id").eq(3))
        .fetch_all(executor)
        .await
        .expect("Failed to load the nested include");
    let author = loaded[0].author.as_ref().expect("The author was not included");
    assert_eq!(author.name, "Brian");
    assert_eq!(author.books.len(), 1);

    // Unknown navigation
    let error = Author::query()
        .include("publisher")
        .fetch_all(executor)
        .await
        .expect_err("An unknown navigation must be rejected");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
}
