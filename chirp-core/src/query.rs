//! Read-only lookups over the stored schema.
//!
//! Results come back in the store's natural row order; there is no
//! pagination.

use anyhow::{Context, Result};
use chirp_types::{HashtagPost, Post, Table};

use crate::db::repositories::{count_rows, HashtagRepository, PostRepository};
use crate::db::{Database, DbPool};

/// A stored post with the hashtags attached to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetails {
    pub post: Post,
    pub hashtags: Vec<String>,
}

pub struct PostQueries {
    pool: DbPool,
}

impl PostQueries {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }

    /// First stored post with this external id, if any
    pub fn post(&self, external_id: &str) -> Result<Option<PostDetails>> {
        let post = match PostRepository::new(self.pool.clone()).get_by_external_id(external_id)? {
            Some(post) => post,
            None => return Ok(None),
        };
        let hashtags = HashtagRepository::new(self.pool.clone()).get_by_post(post.id)?;
        Ok(Some(PostDetails { post, hashtags }))
    }

    /// External ids of every post written by `author_name`
    pub fn posts_by_author(&self, author_name: &str) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.twitt_real_id FROM twitt t
             JOIN author a ON t.author_id = a.id
             WHERE a.author_name = ?",
        )?;

        let ids = stmt
            .query_map([author_name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query posts by author")?;

        Ok(ids)
    }

    /// External ids of every post carrying `hashtag_name`
    pub fn posts_by_hashtag(&self, hashtag_name: &str) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.twitt_real_id FROM twitt t
             JOIN association_hashtag_twitt aht ON t.id = aht.twitt_id
             JOIN hashtag h ON aht.hashtag_id = h.id
             WHERE h.hashtag_name = ?",
        )?;

        let ids = stmt
            .query_map([hashtag_name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query posts by hashtag")?;

        Ok(ids)
    }

    /// External ids of every post mentioning `user_name`
    pub fn posts_mentioning(&self, user_name: &str) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.twitt_real_id FROM twitt t
             JOIN association_muser_twitt amt ON t.id = amt.twitt_id
             JOIN muser m ON amt.muser_id = m.id
             WHERE m.mentioned_user_name = ?",
        )?;

        let ids = stmt
            .query_map([user_name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query posts by mention")?;

        Ok(ids)
    }

    /// Every hashtag joined to every post carrying it
    pub fn hashtag_posts(&self) -> Result<Vec<HashtagPost>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT h.hashtag_name, t.twitt_real_id, t.text FROM hashtag h
             JOIN association_hashtag_twitt aht ON h.id = aht.hashtag_id
             JOIN twitt t ON aht.twitt_id = t.id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(HashtagPost {
                    hashtag_name: row.get(0)?,
                    twitt_real_id: row.get(1)?,
                    text: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to traverse hashtags")?;

        Ok(rows)
    }

    /// Row count of every table, in load order
    pub fn table_counts(&self) -> Result<Vec<(Table, i64)>> {
        let conn = self.pool.get()?;
        Table::LOAD_ORDER
            .into_iter()
            .map(|table| Ok((table, count_rows(&conn, table)?)))
            .collect()
    }
}
