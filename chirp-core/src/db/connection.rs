use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::PathBuf;

use super::schema::SCHEMA;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";
const SQLITE_SCHEME: &str = "sqlite:";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Where a store connection string points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Parse a connection string.
    ///
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, `sqlite::memory:`, `:memory:`
    /// or a bare path. Any other `<driver>://` scheme is rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            anyhow::bail!("Store connection string is empty");
        }

        let target = match trimmed.get(..SQLITE_SCHEME.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SQLITE_SCHEME) => {
                let rest = &trimmed[SQLITE_SCHEME.len()..];
                rest.strip_prefix("//").unwrap_or(rest)
            }
            _ => {
                if let Some((driver, _)) = trimmed.split_once("://") {
                    anyhow::bail!("Unsupported store driver: {}", driver);
                }
                trimmed
            }
        };

        if target.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            Ok(StoreLocation::Memory)
        } else if target.is_empty() {
            anyhow::bail!("Store connection string has no database path: {}", url)
        } else {
            Ok(StoreLocation::File(PathBuf::from(target)))
        }
    }
}

/// Handle to the relational store, passed explicitly to the loader and queries
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Open a connection pool for the given connection string
    pub fn new(url: &str) -> Result<Self> {
        let location = StoreLocation::parse(url)?;
        Self::open(location)
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::open(StoreLocation::Memory)
    }

    fn open(location: StoreLocation) -> Result<Self> {
        // Every pooled connection enforces foreign keys, so a dangling
        // association row is rejected by the store itself
        let (manager, max_size) = match location {
            StoreLocation::Memory => (SqliteConnectionManager::memory(), 1),
            StoreLocation::File(path) => (SqliteConnectionManager::file(path), 4),
        };
        let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        // A pooled in-memory database only exists inside its own connection
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .context("Failed to create database connection pool")?;
        Ok(Self { pool })
    }

    /// Create the six tables if they do not exist yet
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}
