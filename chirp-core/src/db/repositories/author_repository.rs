use anyhow::{Context, Result};
use chirp_types::{Author, Table};

use super::next_id;
use crate::db::DbPool;

pub struct AuthorRepository {
    pool: DbPool,
}

impl AuthorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// First free author id
    pub fn next_id(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        next_id(&conn, Table::Author)
    }

    /// Append authors with their ids as given, in one transaction
    pub fn append(&self, authors: &[Author]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare("INSERT INTO author (id, author_name) VALUES (?, ?)")?;
            for author in authors {
                stmt.execute((author.id, &author.author_name))
                    .with_context(|| format!("Failed to insert author {:?}", author.author_name))?;
            }
        }
        tx.commit().context("Failed to commit authors")?;
        Ok(authors.len())
    }

    /// All authors in id order
    pub fn get_all(&self) -> Result<Vec<Author>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, author_name FROM author ORDER BY id")?;
        let authors = stmt
            .query_map([], |row| {
                Ok(Author {
                    id: row.get(0)?,
                    author_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }
}
