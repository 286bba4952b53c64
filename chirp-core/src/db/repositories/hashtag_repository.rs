use anyhow::{Context, Result};
use chirp_types::{Hashtag, Table};

use super::next_id;
use crate::db::DbPool;

pub struct HashtagRepository {
    pool: DbPool,
}

impl HashtagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn next_id(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        next_id(&conn, Table::Hashtag)
    }

    /// Store hashtags with their ids as given (no case folding, no dedup)
    pub fn append(&self, hashtags: &[Hashtag]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare("INSERT INTO hashtag (id, hashtag_name) VALUES (?, ?)")?;
            for hashtag in hashtags {
                stmt.execute((hashtag.id, &hashtag.name))
                    .with_context(|| format!("Failed to insert hashtag {:?}", hashtag.name))?;
            }
        }
        tx.commit().context("Failed to commit hashtags")?;
        Ok(hashtags.len())
    }

    pub fn get_all(&self) -> Result<Vec<Hashtag>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, hashtag_name FROM hashtag ORDER BY id")?;
        let hashtags = stmt
            .query_map([], |row| {
                Ok(Hashtag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hashtags)
    }

    /// Get hashtag names attached to a post
    pub fn get_by_post(&self, post_id: i64) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT h.hashtag_name FROM hashtag h
             JOIN association_hashtag_twitt aht ON h.id = aht.hashtag_id
             WHERE aht.twitt_id = ?
             ORDER BY h.id",
        )?;

        let hashtags = stmt
            .query_map([post_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hashtags)
    }
}
