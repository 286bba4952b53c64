use anyhow::{Context, Result};
use chirp_types::{PostHashtag, PostMention};

use crate::db::DbPool;

/// Junction tables linking posts to mentioned users and hashtags
pub struct AssociationRepository {
    pool: DbPool,
}

impl AssociationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Link posts to mentioned users. Both sides must already be stored.
    pub fn append_mentions(&self, links: &[PostMention]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO association_muser_twitt (muser_id, twitt_id) VALUES (?, ?)",
            )?;
            for link in links {
                stmt.execute((link.mentioned_user_id, link.post_id)).with_context(|| {
                    format!(
                        "Failed to link post {} to mentioned user {}",
                        link.post_id, link.mentioned_user_id
                    )
                })?;
            }
        }
        tx.commit().context("Failed to commit post mentions")?;
        Ok(links.len())
    }

    /// Link posts to hashtags. Both sides must already be stored.
    pub fn append_hashtags(&self, links: &[PostHashtag]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO association_hashtag_twitt (hashtag_id, twitt_id) VALUES (?, ?)",
            )?;
            for link in links {
                stmt.execute((link.hashtag_id, link.post_id)).with_context(|| {
                    format!(
                        "Failed to link post {} to hashtag {}",
                        link.post_id, link.hashtag_id
                    )
                })?;
            }
        }
        tx.commit().context("Failed to commit post hashtags")?;
        Ok(links.len())
    }

    pub fn get_mentions(&self) -> Result<Vec<PostMention>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT twitt_id, muser_id FROM association_muser_twitt ORDER BY twitt_id, muser_id",
        )?;
        let links = stmt
            .query_map([], |row| {
                Ok(PostMention {
                    post_id: row.get(0)?,
                    mentioned_user_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn get_hashtags(&self) -> Result<Vec<PostHashtag>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT twitt_id, hashtag_id FROM association_hashtag_twitt ORDER BY twitt_id, hashtag_id",
        )?;
        let links = stmt
            .query_map([], |row| {
                Ok(PostHashtag {
                    post_id: row.get(0)?,
                    hashtag_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}
