use anyhow::{Context, Result};
use chirp_types::{Post, Table};
use rusqlite::OptionalExtension;

use super::next_id;
use crate::db::DbPool;

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// First free post id
    pub fn next_id(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        next_id(&conn, Table::Post)
    }

    /// Append posts with their ids as given, in one transaction.
    /// Every `author_id` must already exist in `author`.
    pub fn append(&self, posts: &[Post]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO twitt (id, author_id, text, twitt_real_id) VALUES (?, ?, ?, ?)",
            )?;
            for post in posts {
                stmt.execute((post.id, post.author_id, &post.text, &post.external_id))
                    .with_context(|| format!("Failed to insert post {}", post.external_id))?;
            }
        }
        tx.commit().context("Failed to commit posts")?;
        Ok(posts.len())
    }

    /// Get a single post by the identifier the social network assigned to it
    pub fn get_by_external_id(&self, external_id: &str) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                "SELECT id, twitt_real_id, text, author_id FROM twitt
                 WHERE twitt_real_id = ?
                 ORDER BY id
                 LIMIT 1",
                [external_id],
                |row| {
                    Ok(Post {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        text: row.get(2)?,
                        author_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(post)
    }

    /// All posts in id order
    pub fn get_all(&self) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, twitt_real_id, text, author_id FROM twitt ORDER BY id")?;
        let posts = stmt
            .query_map([], |row| {
                Ok(Post {
                    id: row.get(0)?,
                    external_id: row.get(1)?,
                    text: row.get(2)?,
                    author_id: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }
}
