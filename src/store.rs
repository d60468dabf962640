//! Owns the SQLite store: the connection pool handed to every request, the
//! table layout, and the sample data an empty database starts with.
//!
//! Connections are checked out per operation and go back to the pool when
//! dropped, so a request can never leak one, whatever path it exits by.

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use serde_derive::Deserialize;
use thiserror::Error;

use crate::models::{NewCategory, NewQuestion};
use crate::schema::{categories, questions};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    category INTEGER NOT NULL,
    difficulty INTEGER NOT NULL
);
";

const SEED_DATA: &str = include_str!("../data/seed.json");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not open the connection pool: {0}")]
    Pool(#[from] PoolError),
    #[error("Store query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Seed data is malformed: {0}")]
    Seed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct SeedData {
    categories: Vec<String>,
    questions: Vec<NewQuestion>,
}

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

/// Builds the pool. An in-memory database lives and dies with its connection,
/// so it is pinned to exactly one that is never recycled.
///
/// The pin only covers expiry. If diesel flags that connection as broken (a
/// panic inside a transaction, say) r2d2 discards it and the replacement opens
/// a fresh, empty `:memory:` database. Use a file path for anything that must
/// outlive such a failure.
pub fn open_pool(database_url: &str, max_size: u32) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let builder = Pool::builder()
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(SqlitePragmas));

    let builder = if database_url == IN_MEMORY {
        if max_size > 1 {
            warn!("In-memory database requested, limiting pool to one connection");
        }
        builder
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
    } else {
        builder.max_size(max_size)
    };

    debug!("Opening database {}", database_url);
    builder.build(manager)
}

/// Creates the tables if they are missing.
pub fn bootstrap(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(SCHEMA)
}

/// Fills empty tables with the sample categories and questions. Tables that
/// already hold rows are left alone.
pub fn seed(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let data: SeedData = serde_json::from_str(SEED_DATA)?;

    conn.transaction(|conn| {
        let category_count: i64 = categories::table.count().get_result(conn)?;
        if category_count == 0 {
            let rows: Vec<NewCategory> = data
                .categories
                .iter()
                .map(|kind| NewCategory { kind: kind.as_str() })
                .collect();
            diesel::insert_into(categories::table)
                .values(&rows)
                .execute(conn)?;
            info!("Seeded {} categories", rows.len());
        }

        let question_count: i64 = questions::table.count().get_result(conn)?;
        if question_count == 0 {
            diesel::insert_into(questions::table)
                .values(&data.questions)
                .execute(conn)?;
            info!("Seeded {} questions", data.questions.len());
        }

        Ok(())
    })
}

/// Opens the pool and prepares the schema, seeding it when asked to.
pub fn init(database_url: &str, max_size: u32, with_seed: bool) -> Result<DbPool, StoreError> {
    let pool = open_pool(database_url, max_size)?;
    let mut conn = pool.get()?;
    bootstrap(&mut conn)?;
    if with_seed {
        seed(&mut conn)?;
    }
    drop(conn);
    Ok(pool)
}
